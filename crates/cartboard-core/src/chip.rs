//! The chip capability trait.
//!
//! A [`Chip`] is the behavior of one mapper ASIC (or discrete-logic board):
//! it declares its windows, registers, decode rules and timer shape, and
//! supplies the handful of functions the engine calls back into. All mutable
//! state lives in the owning board (register file, timer, RAM) or in the
//! chip value itself — one cartridge load is one chip instance, and cloning
//! a board clones the chip with it.

use std::borrow::Cow;
use std::fmt::Debug;

use dyn_clone::DynClone;

use crate::decode::DecodeRule;
use crate::irq::{IrqConfig, IrqTimer};
use crate::registers::{RegisterDef, RegisterFile};
use crate::space::{BankPolicy, SpaceTable};
use crate::state::{StateReader, StateWriter};

/// How well a chip's modelled behavior is believed to match hardware.
///
/// The original sources for several third-party chips carry "by guess"
/// comments; carrying that uncertainty in metadata keeps it visible instead
/// of silently asserting exactness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    /// Verified against hardware documentation or test ROM results.
    Verified,
    /// Plausible but unproven timing or decode details.
    Approximate,
}

/// Identity and provenance of a chip implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChipMetadata {
    pub id: u16,
    pub name: Cow<'static, str>,
    pub confidence: Confidence,
}

/// Window granularity and wrap policy for both address classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipLayout {
    /// PRG window size in bytes (divides the 32 KiB ROM area).
    pub prg_granularity: usize,
    /// CHR window size in bytes (divides the 8 KiB pattern area).
    pub chr_granularity: usize,
    pub prg_policy: BankPolicy,
    pub chr_policy: BankPolicy,
}

pub trait Chip: DynClone + Debug {
    fn metadata(&self) -> ChipMetadata;

    fn layout(&self) -> ChipLayout;

    /// Register set, in save-state order.
    fn register_defs(&self) -> &'static [RegisterDef];

    /// Bus decode table for register writes. Rule indices are the ids passed
    /// to [`register_write`].
    ///
    /// [`register_write`]: Chip::register_write
    fn decode_rules(&self) -> &'static [DecodeRule];

    /// Timer description, or `None` for chips without IRQ capability.
    fn irq_config(&self) -> Option<IrqConfig> {
        None
    }

    /// Adjust power-on state beyond the declared register defaults (e.g.
    /// per-cartridge mirroring seeds) and reset private chip state.
    fn power_on(&mut self, regs: &mut RegisterFile, irq: &mut IrqTimer);

    /// Soft reset. Most chips behave like a power cycle.
    fn reset(&mut self, regs: &mut RegisterFile, irq: &mut IrqTimer) {
        self.power_on(regs, irq);
    }

    /// A qualifying bus write matched decode rule `rule`. `bus_value` is the
    /// byte the mapped ROM currently drives at `addr`, for boards with bus
    /// conflicts. Exactly one register or register field may change.
    fn register_write(
        &mut self,
        rule: usize,
        addr: u16,
        data: u8,
        bus_value: u8,
        regs: &mut RegisterFile,
        irq: &mut IrqTimer,
    );

    /// Derive the full window table from the register file. Pure: called on
    /// a cleared table, must not touch registers or the timer, and must be
    /// idempotent for unchanged registers.
    fn sync(&self, regs: &RegisterFile, table: &mut SpaceTable);

    /// Intercept a CPU read before window resolution (status registers and
    /// similar). `None` falls through to the mapped window.
    fn cpu_read_override(&self, _regs: &RegisterFile, _irq: &IrqTimer, _addr: u16) -> Option<u8> {
        None
    }

    /// Escape hatch for chip-driven timers: raw CPU-cycle events, delivered
    /// after any declaratively-routed clocking.
    fn on_cpu_cycles(&mut self, _cycles: u32, _regs: &mut RegisterFile, _irq: &mut IrqTimer) {}

    /// Escape hatch counterpart for scanline events.
    fn on_scanline_end(&mut self, _line: u16, _regs: &mut RegisterFile, _irq: &mut IrqTimer) {}

    /// Write chip-private fields (shift registers, prescalers) to a state
    /// stream. Field names should be namespaced by chip.
    fn save_extra(&self, _w: &mut StateWriter) {}

    /// Restore chip-private fields. Missing or out-of-range fields fall back
    /// to power-on defaults; this hook must not fail.
    fn load_extra(&mut self, _r: &StateReader) {}
}

dyn_clone::clone_trait_object!(Chip);
