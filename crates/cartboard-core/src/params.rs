//! One-time chip identity and memory parameters supplied by the cartridge
//! loader. Immutable for the lifetime of the attached board.

use crate::space::Mirroring;

/// Default CHR RAM allocation for cartridges that ship no CHR ROM and whose
/// header does not state a RAM size. Matches the historical 8 KiB fallback
/// used by iNES-era dumps.
pub const DEFAULT_CHR_RAM_SIZE: usize = 8 * 1024;

/// Everything the loader hands over when attaching a cartridge.
///
/// File-format parsing is the loader's business; by the time a `BoardParams`
/// exists the ROM images are plain byte slices and the chip identity is a
/// resolved numeric id.
#[derive(Debug, Clone)]
pub struct BoardParams {
    /// Numeric chip identity (iNES mapper numbering).
    pub chip_id: u16,
    /// Sub-variant selector for families that share one id.
    pub submapper: u8,
    /// CPU-visible program ROM.
    pub prg_rom: Box<[u8]>,
    /// PPU-visible character ROM. Empty means the board carries CHR RAM
    /// instead.
    pub chr_rom: Box<[u8]>,
    /// Work RAM size in bytes; zero means the board has none.
    pub prg_ram_size: usize,
    /// CHR RAM size in bytes. Only meaningful when `chr_rom` is empty; zero
    /// falls back to [`DEFAULT_CHR_RAM_SIZE`].
    pub chr_ram_size: usize,
    /// Whether work RAM is battery backed and should be persisted by the host.
    pub battery_backed: bool,
    /// Solder-pad nametable arrangement before any chip override.
    pub mirroring: Mirroring,
}

impl BoardParams {
    /// Minimal parameter set: a chip id and a PRG image, everything else at
    /// its conservative default.
    pub fn new(chip_id: u16, prg_rom: impl Into<Box<[u8]>>) -> Self {
        Self {
            chip_id,
            submapper: 0,
            prg_rom: prg_rom.into(),
            chr_rom: Box::default(),
            prg_ram_size: 0,
            chr_ram_size: 0,
            battery_backed: false,
            mirroring: Mirroring::Horizontal,
        }
    }

    /// Effective CHR RAM size after the legacy fallback.
    pub fn effective_chr_ram_size(&self) -> usize {
        if !self.chr_rom.is_empty() {
            0
        } else if self.chr_ram_size == 0 {
            DEFAULT_CHR_RAM_SIZE
        } else {
            self.chr_ram_size
        }
    }
}
