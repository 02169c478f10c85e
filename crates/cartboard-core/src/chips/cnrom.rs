//! Chip 3 (CNROM): one CHR latch, PRG fixed.

use std::borrow::Cow;

use crate::chip::{Chip, ChipLayout, ChipMetadata, Confidence};
use crate::decode::DecodeRule;
use crate::irq::IrqTimer;
use crate::params::BoardParams;
use crate::registers::{RegisterDef, RegisterFile};
use crate::space::{BankPolicy, SpaceTable};

const R_CHR: usize = 0;

static DEFS: &[RegisterDef] = &[RegisterDef::byte("cnrom.chr", 0)];
static RULES: &[DecodeRule] = &[DecodeRule::new(0x8000, 0x8000)];

#[derive(Debug, Clone)]
pub struct CnRom {
    bus_conflicts: bool,
}

impl CnRom {
    pub fn new(params: &BoardParams) -> Self {
        Self {
            bus_conflicts: params.submapper == 2,
        }
    }
}

impl Chip for CnRom {
    fn metadata(&self) -> ChipMetadata {
        ChipMetadata {
            id: 3,
            name: Cow::Borrowed("CNROM"),
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
        DEFS
    }

    fn decode_rules(&self) -> &'static [DecodeRule] {
        RULES
    }

    fn power_on(&mut self, _regs: &mut RegisterFile, _irq: &mut IrqTimer) {}

    fn register_write(
        &mut self,
        _rule: usize,
        _addr: u16,
        data: u8,
        bus_value: u8,
        regs: &mut RegisterFile,
        _irq: &mut IrqTimer,
    ) {
        let value = if self.bus_conflicts {
            data & bus_value
        } else {
            data
        };
        regs.set(R_CHR, value as u16);
    }

    fn sync(&self, regs: &RegisterFile, table: &mut SpaceTable) {
        table.map_prg_rom(0, 0);
        table.map_prg_rom_from_end(1, 1);
        table.map_chr(0, regs.get(R_CHR) as usize);
        table.set_work_ram(true, true);
    }
}
