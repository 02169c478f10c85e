//! Builtin chip behaviors.
//!
//! A representative slice of the mapper catalog, chosen so that every engine
//! capability has at least one real user: fixed windows (NROM), single-latch
//! discrete boards with bus conflicts (UxROM/CNROM), a serial shift register
//! (MMC1), a scanline-clocked IRQ with an eight-entry bank file (MMC3), and
//! sparse bitmask decode with a cycle-clocked, prescaled IRQ (VRC4).

pub mod cnrom;
pub mod mmc1;
pub mod mmc3;
pub mod nrom;
pub mod uxrom;
pub mod vrc4;

pub use cnrom::CnRom;
pub use mmc1::Mmc1;
pub use mmc3::Mmc3;
pub use nrom::Nrom;
pub use uxrom::UxRom;
pub use vrc4::Vrc4;
