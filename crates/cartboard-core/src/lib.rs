//! Declarative cartridge bank-switching engine.
//!
//! NES-style cartridges interpose a mapper chip between the console buses
//! and the on-cartridge memories. Rather than giving every chip its own
//! read/write path, this crate factors the common machinery into one
//! engine: a resolved window table for both address classes, a named
//! register file, a bitmask bus decoder, a declarative IRQ timer and a
//! field-tagged save-state stream. A [`Chip`] implementation supplies only
//! the per-part register semantics and the pure `sync` function that turns
//! registers into windows.
//!
//! [`Board`] ties the pieces to a concrete cartridge image:
//!
//! ```
//! use cartboard_core::{Board, BoardParams};
//!
//! let rom = vec![0u8; 32 * 1024];
//! let mut board = Board::new(BoardParams::new(0, rom))?;
//! let byte = board.read_byte(0x8000);
//! # Ok::<(), cartboard_core::LoadError>(())
//! ```
//!
//! Chips outside the builtin set plug in through [`ChipProvider`].

pub mod board;
pub mod chip;
pub mod chips;
pub mod decode;
pub mod error;
pub mod irq;
pub mod memory;
pub mod params;
pub mod registers;
pub mod registry;
pub mod space;
pub mod state;

pub use board::Board;
pub use chip::{Chip, ChipLayout, ChipMetadata, Confidence};
pub use decode::{DecodeRule, DecodeTable};
pub use error::{CorruptStateError, LoadError};
pub use irq::{ClockSource, CounterWidth, IrqConfig, IrqTimer, TimerState, Trigger};
pub use params::BoardParams;
pub use registers::{RegisterDef, RegisterFile, RegWidth};
pub use registry::ChipProvider;
pub use space::{BankPolicy, BankSource, ClassLayout, Mirroring, Slot, SpaceTable, WorkRamWindow};
pub use state::{StateReader, StateWriter};
