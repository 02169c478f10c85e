//! Bus address ranges owned by the cartridge.

/// CPU-side address class.
pub mod cpu {
    /// First address decoded to the cartridge at all.
    pub const CART_SPACE_START: u16 = 0x4020;
    /// Work RAM window.
    pub const WORK_RAM_START: u16 = 0x6000;
    pub const WORK_RAM_END: u16 = 0x7FFF;
    /// Banked ROM area.
    pub const PRG_ROM_START: u16 = 0x8000;
    pub const PRG_ROM_END: u16 = 0xFFFF;
    /// Size of the banked ROM area in bytes.
    pub const PRG_WINDOW_LEN: usize = 0x8000;
}

/// PPU-side address class.
pub mod ppu {
    /// Pattern area mapped by the cartridge.
    pub const CHR_START: u16 = 0x0000;
    pub const CHR_END: u16 = 0x1FFF;
    /// Size of the pattern area in bytes.
    pub const CHR_WINDOW_LEN: usize = 0x2000;
}
