//! Chip 1 (MMC1): serial-loaded register file.
//!
//! The CPU programs MMC1 one bit at a time: five writes to anywhere in
//! `$8000-$FFFF` shift data bit 0 into an internal register, and the fifth
//! write commits the five collected bits to one of four registers selected
//! by address bits 13-14. A write with bit 7 set aborts the sequence and
//! forces the control register into 16 KiB fixed-last-bank mode.
//!
//! Registers:
//! - control: mirroring (bits 0-1), PRG mode (bits 2-3), CHR mode (bit 4)
//! - chr bank 0 / chr bank 1: 4 KiB CHR pages
//! - prg bank: 16 KiB PRG page (bits 0-3) plus work-RAM disable (bit 4)

use std::borrow::Cow;

use crate::chip::{Chip, ChipLayout, ChipMetadata, Confidence};
use crate::decode::DecodeRule;
use crate::irq::IrqTimer;
use crate::params::BoardParams;
use crate::registers::{RegisterDef, RegisterFile};
use crate::space::{BankPolicy, Mirroring, SpaceTable};
use crate::state::{StateReader, StateWriter};

const R_CONTROL: usize = 0;
const R_CHR0: usize = 1;
const R_CHR1: usize = 2;
const R_PRG: usize = 3;

/// Power-on control value: PRG mode 3 (switch at `$8000`, fix last bank).
const CONTROL_POWER_ON: u8 = 0x0C;
/// Shift register idle value; bit 4 reaching bit 0 marks the fifth write.
const SHIFT_IDLE: u8 = 0x10;

static DEFS: &[RegisterDef] = &[
    RegisterDef::byte("mmc1.control", CONTROL_POWER_ON),
    RegisterDef::byte("mmc1.chr0", 0),
    RegisterDef::byte("mmc1.chr1", 0),
    RegisterDef::byte("mmc1.prg", 0),
];

static RULES: &[DecodeRule] = &[DecodeRule::new(0x8000, 0x8000)];

/// Named view of the control register's packed fields.
#[derive(Debug, Clone, Copy)]
struct Control(u8);

impl Control {
    fn mirroring(self) -> Mirroring {
        match self.0 & 0x03 {
            0 => Mirroring::SingleScreenLower,
            1 => Mirroring::SingleScreenUpper,
            2 => Mirroring::Vertical,
            _ => Mirroring::Horizontal,
        }
    }

    /// PRG banking mode: 0/1 = 32 KiB, 2 = fix first, 3 = fix last.
    fn prg_mode(self) -> u8 {
        (self.0 >> 2) & 0x03
    }

    /// true selects two independent 4 KiB CHR windows.
    fn chr_4k(self) -> bool {
        self.0 & 0x10 != 0
    }
}

#[derive(Debug, Clone)]
pub struct Mmc1 {
    shift_reg: u8,
    shift_count: u8,
}

impl Mmc1 {
    pub fn new(_params: &BoardParams) -> Self {
        Self {
            shift_reg: SHIFT_IDLE,
            shift_count: 0,
        }
    }

    fn reset_shift(&mut self) {
        self.shift_reg = SHIFT_IDLE;
        self.shift_count = 0;
    }
}

impl Chip for Mmc1 {
    fn metadata(&self) -> ChipMetadata {
        ChipMetadata {
            id: 1,
            name: Cow::Borrowed("MMC1"),
            confidence: Confidence::Verified,
        }
    }

    fn layout(&self) -> ChipLayout {
        ChipLayout {
            prg_granularity: 16 * 1024,
            chr_granularity: 4 * 1024,
            prg_policy: BankPolicy::Wrap,
            chr_policy: BankPolicy::Wrap,
        }
    }

    fn register_defs(&self) -> &'static [RegisterDef] {
        DEFS
    }

    fn decode_rules(&self) -> &'static [DecodeRule] {
        RULES
    }

    fn power_on(&mut self, _regs: &mut RegisterFile, _irq: &mut IrqTimer) {
        self.reset_shift();
    }

    fn register_write(
        &mut self,
        _rule: usize,
        addr: u16,
        data: u8,
        _bus_value: u8,
        regs: &mut RegisterFile,
        _irq: &mut IrqTimer,
    ) {
        if data & 0x80 != 0 {
            // Abort write: clear the sequence and force fixed-last-bank mode.
            self.reset_shift();
            regs.set(R_CONTROL, regs.get(R_CONTROL) | CONTROL_POWER_ON as u16);
            return;
        }

        self.shift_reg = (self.shift_reg >> 1) | ((data & 0x01) << 4);
        self.shift_count += 1;
        if self.shift_count < 5 {
            return;
        }

        // Fifth write commits; address bits 13-14 pick the target register.
        let target = ((addr >> 13) & 0x03) as usize;
        regs.set(target, (self.shift_reg & 0x1F) as u16);
        self.reset_shift();
    }

    fn sync(&self, regs: &RegisterFile, table: &mut SpaceTable) {
        let control = Control(regs.get8(R_CONTROL));
        let prg_reg = regs.get8(R_PRG);
        let prg_bank = (prg_reg & 0x0F) as usize;

        match control.prg_mode() {
            0 | 1 => {
                let pair = prg_bank & !1;
                table.map_prg_rom(0, pair);
                table.map_prg_rom(1, pair + 1);
            }
            2 => {
                table.map_prg_rom(0, 0);
                table.map_prg_rom(1, prg_bank);
            }
            _ => {
                table.map_prg_rom(0, prg_bank);
                table.map_prg_rom_from_end(1, 1);
            }
        }

        let chr0 = regs.get8(R_CHR0) as usize;
        if control.chr_4k() {
            table.map_chr(0, chr0);
            table.map_chr(1, regs.get8(R_CHR1) as usize);
        } else {
            let pair = chr0 & !1;
            table.map_chr(0, pair);
            table.map_chr(1, pair + 1);
        }

        // MMC1B: PRG register bit 4 disables the work-RAM chip select.
        let wram_enabled = prg_reg & 0x10 == 0;
        table.set_work_ram(wram_enabled, wram_enabled);
        table.set_mirroring(control.mirroring());
    }

    fn save_extra(&self, w: &mut StateWriter) {
        w.put_u8("mmc1.shift", self.shift_reg);
        w.put_u8("mmc1.shift.count", self.shift_count);
    }

    fn load_extra(&mut self, r: &StateReader) {
        self.shift_reg = r.u8("mmc1.shift").unwrap_or(SHIFT_IDLE);
        self.shift_count = r.u8("mmc1.shift.count").unwrap_or(0);
        if self.shift_count > 4 {
            self.reset_shift();
        }
    }
}
