//! Derived logical-to-physical bank tables.
//!
//! A [`SpaceTable`] is the sole output of a chip's `sync` step: a fixed set
//! of non-overlapping window slots per address class, each naming the bank
//! currently visible through it. Out-of-range bank values are brought into
//! `[0, bank_count)` *here*, inside the table setters, so per-chip sync code
//! never has to repeat the masking logic.

use crate::memory::{cpu, ppu};

/// Nametable arrangement presented to the PPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "savestate-serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Mirroring {
    Horizontal,
    Vertical,
    SingleScreenLower,
    SingleScreenUpper,
    FourScreen,
}

/// How a raw bank register value is brought into range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BankPolicy {
    /// `bank & (count - 1)`. What discrete-logic boards actually wire up;
    /// falls back to modulo for ROMs that are not a power-of-two number of
    /// banks.
    Mask,
    /// `bank % count`.
    Wrap,
    /// Saturate at the last bank.
    Clamp,
}

/// Physical backing for one window slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "savestate-serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BankSource {
    PrgRom,
    PrgRam,
    ChrRom,
    ChrRam,
    /// Nothing drives the bus here; reads see the open-bus latch.
    OpenBus,
}

/// One fixed-size slice of an address class and the bank behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub source: BankSource,
    /// Resolved physical bank index, always in range for `source`.
    pub bank: usize,
    pub writable: bool,
}

impl Slot {
    const OPEN: Slot = Slot {
        source: BankSource::OpenBus,
        bank: 0,
        writable: false,
    };
}

/// Declarative "bank count, granularity" pair for one address class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassLayout {
    /// Window size in bytes.
    pub granularity: usize,
    /// Number of physical banks behind this class.
    pub bank_count: usize,
    pub policy: BankPolicy,
    /// What ROM-area slots of this class resolve to.
    pub source: BankSource,
}

impl ClassLayout {
    /// Bring a raw register value into `[0, bank_count)`.
    pub fn resolve(&self, raw: usize) -> usize {
        let count = self.bank_count;
        if count == 0 {
            return 0;
        }
        match self.policy {
            BankPolicy::Mask => {
                if count.is_power_of_two() {
                    raw & (count - 1)
                } else {
                    raw % count
                }
            }
            BankPolicy::Wrap => raw % count,
            BankPolicy::Clamp => raw.min(count - 1),
        }
    }
}

/// Enable and write-protect state of the work-RAM window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WorkRamWindow {
    pub enabled: bool,
    pub writable: bool,
}

/// The derived mapping for both address classes plus mirroring.
///
/// Rebuilt from scratch on every sync; comparing two tables for equality is
/// the definition of "table-equivalent" used by the save-state round-trip
/// guarantees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpaceTable {
    prg_layout: ClassLayout,
    chr_layout: ClassLayout,
    prg: Box<[Slot]>,
    chr: Box<[Slot]>,
    work_ram: WorkRamWindow,
    base_mirroring: Mirroring,
    mirroring: Mirroring,
}

impl SpaceTable {
    pub fn new(prg_layout: ClassLayout, chr_layout: ClassLayout, base_mirroring: Mirroring) -> Self {
        let prg_slots = cpu::PRG_WINDOW_LEN / prg_layout.granularity;
        let chr_slots = ppu::CHR_WINDOW_LEN / chr_layout.granularity;
        Self {
            prg_layout,
            chr_layout,
            prg: vec![Slot::OPEN; prg_slots].into_boxed_slice(),
            chr: vec![Slot::OPEN; chr_slots].into_boxed_slice(),
            work_ram: WorkRamWindow::default(),
            base_mirroring,
            mirroring: base_mirroring,
        }
    }

    /// Reset every slot to open bus and mirroring to the solder-pad default.
    /// Called by the engine before each sync so a chip's sync output is a
    /// pure function of the register file.
    pub fn clear(&mut self) {
        self.prg.fill(Slot::OPEN);
        self.chr.fill(Slot::OPEN);
        self.work_ram = WorkRamWindow::default();
        self.mirroring = self.base_mirroring;
    }

    pub fn prg_layout(&self) -> &ClassLayout {
        &self.prg_layout
    }

    pub fn chr_layout(&self) -> &ClassLayout {
        &self.chr_layout
    }

    /// Map a PRG ROM bank into a slot, applying the class wrap policy.
    pub fn map_prg_rom(&mut self, slot: usize, raw_bank: usize) {
        let bank = self.prg_layout.resolve(raw_bank);
        self.prg[slot] = Slot {
            source: self.prg_layout.source,
            bank,
            writable: false,
        };
    }

    /// Map a fixed PRG ROM bank counted from the end of the image
    /// (`back == 1` is the last bank).
    pub fn map_prg_rom_from_end(&mut self, slot: usize, back: usize) {
        let bank = self.prg_layout.bank_count.saturating_sub(back);
        self.prg[slot] = Slot {
            source: self.prg_layout.source,
            bank,
            writable: false,
        };
    }

    /// Map a CHR bank into a slot. The slot is writable when the board
    /// carries CHR RAM.
    pub fn map_chr(&mut self, slot: usize, raw_bank: usize) {
        let bank = self.chr_layout.resolve(raw_bank);
        self.chr[slot] = Slot {
            source: self.chr_layout.source,
            bank,
            writable: self.chr_layout.source == BankSource::ChrRam,
        };
    }

    pub fn set_work_ram(&mut self, enabled: bool, writable: bool) {
        self.work_ram = WorkRamWindow { enabled, writable };
    }

    pub fn work_ram(&self) -> WorkRamWindow {
        self.work_ram
    }

    pub fn set_mirroring(&mut self, mirroring: Mirroring) {
        self.mirroring = mirroring;
    }

    pub fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    pub fn prg_slots(&self) -> &[Slot] {
        &self.prg
    }

    pub fn chr_slots(&self) -> &[Slot] {
        &self.chr
    }

    /// Resolve a CPU address in `0x8000..=0xFFFF` to its backing source and
    /// physical byte offset.
    pub fn resolve_prg(&self, addr: u16) -> (BankSource, usize) {
        let rel = (addr - cpu::PRG_ROM_START) as usize;
        let slot = &self.prg[rel / self.prg_layout.granularity];
        let offset = rel % self.prg_layout.granularity;
        (slot.source, slot.bank * self.prg_layout.granularity + offset)
    }

    /// Resolve a PPU address in `0x0000..=0x1FFF`.
    pub fn resolve_chr(&self, addr: u16) -> (BankSource, usize) {
        let rel = (addr & ppu::CHR_END) as usize;
        let slot = &self.chr[rel / self.chr_layout.granularity];
        let offset = rel % self.chr_layout.granularity;
        (slot.source, slot.bank * self.chr_layout.granularity + offset)
    }

    /// Whether the slot behind a PPU address currently accepts writes.
    pub fn chr_writable(&self, addr: u16) -> bool {
        let rel = (addr & ppu::CHR_END) as usize;
        self.chr[rel / self.chr_layout.granularity].writable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(count: usize, policy: BankPolicy) -> ClassLayout {
        ClassLayout {
            granularity: 0x2000,
            bank_count: count,
            policy,
            source: BankSource::PrgRom,
        }
    }

    #[test]
    fn mask_policy_wraps_power_of_two_counts() {
        let l = layout(16, BankPolicy::Mask);
        assert_eq!(l.resolve(5), 5);
        assert_eq!(l.resolve(0x15), 5);
        assert_eq!(l.resolve(255), 15);
    }

    #[test]
    fn mask_policy_falls_back_to_modulo() {
        let l = layout(6, BankPolicy::Mask);
        assert_eq!(l.resolve(7), 1);
    }

    #[test]
    fn clamp_policy_saturates() {
        let l = layout(6, BankPolicy::Clamp);
        assert_eq!(l.resolve(2), 2);
        assert_eq!(l.resolve(99), 5);
    }

    #[test]
    fn zero_bank_count_resolves_to_zero() {
        let l = layout(0, BankPolicy::Wrap);
        assert_eq!(l.resolve(42), 0);
    }

    fn table() -> SpaceTable {
        let prg = ClassLayout {
            granularity: 0x2000,
            bank_count: 16,
            policy: BankPolicy::Mask,
            source: BankSource::PrgRom,
        };
        let chr = ClassLayout {
            granularity: 0x0400,
            bank_count: 8,
            policy: BankPolicy::Wrap,
            source: BankSource::ChrRam,
        };
        SpaceTable::new(prg, chr, Mirroring::Vertical)
    }

    #[test]
    fn every_address_resolves_to_exactly_one_slot() {
        let mut t = table();
        for slot in 0..4 {
            t.map_prg_rom(slot, slot);
        }
        for addr in 0x8000..=0xFFFFu16 {
            let (_, offset) = t.resolve_prg(addr);
            let expected_slot = (addr as usize - 0x8000) / 0x2000;
            assert_eq!(offset / 0x2000, expected_slot);
        }
    }

    #[test]
    fn clear_returns_every_slot_to_open_bus() {
        let mut t = table();
        t.map_prg_rom(0, 7);
        t.map_chr(3, 2);
        t.set_work_ram(true, true);
        t.set_mirroring(Mirroring::SingleScreenUpper);

        t.clear();
        assert!(t.prg_slots().iter().all(|s| s.source == BankSource::OpenBus));
        assert!(t.chr_slots().iter().all(|s| s.source == BankSource::OpenBus));
        assert!(!t.work_ram().enabled);
        assert_eq!(t.mirroring(), Mirroring::Vertical);
    }

    #[test]
    fn from_end_mapping_survives_tiny_images() {
        let mut t = table();
        t.map_prg_rom_from_end(3, 1);
        assert_eq!(t.prg_slots()[3].bank, 15);
        t.map_prg_rom_from_end(3, 99);
        assert_eq!(t.prg_slots()[3].bank, 0);
    }

    #[test]
    fn chr_ram_slots_are_writable() {
        let mut t = table();
        t.map_chr(0, 0);
        assert!(t.chr_writable(0x0000));
    }
}
