//! Chip 0 (NROM): no banking hardware at all.
//!
//! The 32 KiB ROM area shows the first and last 16 KiB banks; 16 KiB
//! cartridges see the same bank twice through the wrap policy. CHR is a
//! single fixed 8 KiB window.

use std::borrow::Cow;

use crate::chip::{Chip, ChipLayout, ChipMetadata, Confidence};
use crate::decode::DecodeRule;
use crate::irq::IrqTimer;
use crate::params::BoardParams;
use crate::registers::{RegisterDef, RegisterFile};
use crate::space::{BankPolicy, SpaceTable};

#[derive(Debug, Clone)]
pub struct Nrom;

impl Nrom {
    pub fn new(_params: &BoardParams) -> Self {
        Self
    }
}

impl Chip for Nrom {
    fn metadata(&self) -> ChipMetadata {
        ChipMetadata {
            id: 0,
            name: Cow::Borrowed("NROM"),
            confidence: Confidence::Verified,
        }
    }

    fn layout(&self) -> ChipLayout {
        ChipLayout {
            prg_granularity: 16 * 1024,
            chr_granularity: 8 * 1024,
            prg_policy: BankPolicy::Mask,
            chr_policy: BankPolicy::Mask,
        }
    }

    fn register_defs(&self) -> &'static [RegisterDef] {
        &[]
    }

    fn decode_rules(&self) -> &'static [DecodeRule] {
        &[]
    }

    fn power_on(&mut self, _regs: &mut RegisterFile, _irq: &mut IrqTimer) {}

    fn register_write(
        &mut self,
        _rule: usize,
        _addr: u16,
        _data: u8,
        _bus_value: u8,
        _regs: &mut RegisterFile,
        _irq: &mut IrqTimer,
    ) {
    }

    fn sync(&self, _regs: &RegisterFile, table: &mut SpaceTable) {
        table.map_prg_rom(0, 0);
        table.map_prg_rom(1, 1);
        table.map_chr(0, 0);
        table.set_work_ram(true, true);
    }
}
