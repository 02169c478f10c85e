//! Chip 2 (UxROM): one PRG latch, fixed last bank.
//!
//! Every write in `$8000-$FFFF` loads the 16 KiB bank shown at `$8000`; the
//! window at `$C000` is hard-wired to the last bank. Boards wired without a
//! data buffer suffer bus conflicts: the value latched is the AND of the CPU
//! data and the ROM byte the addressed location drives (submapper 2).

use std::borrow::Cow;

use crate::chip::{Chip, ChipLayout, ChipMetadata, Confidence};
use crate::decode::DecodeRule;
use crate::irq::IrqTimer;
use crate::params::BoardParams;
use crate::registers::{RegisterDef, RegisterFile};
use crate::space::{BankPolicy, SpaceTable};

const R_PRG: usize = 0;

static DEFS: &[RegisterDef] = &[RegisterDef::byte("uxrom.prg", 0)];
static RULES: &[DecodeRule] = &[DecodeRule::new(0x8000, 0x8000)];

#[derive(Debug, Clone)]
pub struct UxRom {
    bus_conflicts: bool,
}

impl UxRom {
    pub fn new(params: &BoardParams) -> Self {
        Self {
            bus_conflicts: params.submapper == 2,
        }
    }
}

impl Chip for UxRom {
    fn metadata(&self) -> ChipMetadata {
        ChipMetadata {
            id: 2,
            name: Cow::Borrowed("UxROM"),
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
        regs.set(R_PRG, value as u16);
    }

    fn sync(&self, regs: &RegisterFile, table: &mut SpaceTable) {
        table.map_prg_rom(0, regs.get(R_PRG) as usize);
        table.map_prg_rom_from_end(1, 1);
        table.map_chr(0, 0);
        table.set_work_ram(true, true);
    }
}
