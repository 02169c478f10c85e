//! Chip 23 (Konami VRC4, E-revision wiring): nibble-built CHR registers and
//! a CPU-cycle IRQ counter.
//!
//! The VRC4's two register-select lines land on different address pins per
//! board revision; this implementation wires them as the E revision does
//! (A2 and A3). Each 1 KiB CHR register is nine bits wide, written in two
//! halves through adjacent ports.
//!
//! The IRQ counter counts up and fires on `$FF`, reloading from the latch.
//! In its default mode a prescaler divides the CPU clock by 341/3 so the
//! counter steps once per scanline; control bit 2 switches to raw
//! cycle-mode counting.

use std::borrow::Cow;

use crate::chip::{Chip, ChipLayout, ChipMetadata, Confidence};
use crate::decode::DecodeRule;
use crate::irq::{ClockSource, CounterWidth, IrqConfig, IrqTimer, TimerState, Trigger};
use crate::params::BoardParams;
use crate::registers::{RegisterDef, RegisterFile};
use crate::space::{BankPolicy, Mirroring, SpaceTable};
use crate::state::{StateReader, StateWriter};

const R_PRG0: usize = 0;
const R_PRG1: usize = 1;
const R_MODE: usize = 2;
const R_MIRROR: usize = 3;
const R_CHR0: usize = 4;

/// Prescaler reload: 341 PPU dots per scanline, drained 3 per CPU cycle.
const PRESCALER_RELOAD: i32 = 341;

static DEFS: &[RegisterDef] = &[
    RegisterDef::byte("vrc4.prg0", 0),
    RegisterDef::byte("vrc4.prg1", 1),
    RegisterDef::byte("vrc4.mode", 0),
    RegisterDef::byte("vrc4.mirror", 0),
    RegisterDef::word("vrc4.chr0", 0),
    RegisterDef::word("vrc4.chr1", 0),
    RegisterDef::word("vrc4.chr2", 0),
    RegisterDef::word("vrc4.chr3", 0),
    RegisterDef::word("vrc4.chr4", 0),
    RegisterDef::word("vrc4.chr5", 0),
    RegisterDef::word("vrc4.chr6", 0),
    RegisterDef::word("vrc4.chr7", 0),
];

// E-revision select lines: A0 = address bit 2, A1 = address bit 3. The CHR
// block spans four 4 KiB regions of two registers each, low nibble at the
// even port and the high five bits at the odd one.
static RULES: &[DecodeRule] = &[
    DecodeRule::new(0xF000, 0x8000), // 0: PRG bank 0
    DecodeRule::new(0xF008, 0x9000), // 1: mirroring
    DecodeRule::new(0xF008, 0x9008), // 2: PRG swap mode
    DecodeRule::new(0xF000, 0xA000), // 3: PRG bank 1
    DecodeRule::new(0xF00C, 0xB000), // 4: CHR0 low
    DecodeRule::new(0xF00C, 0xB004), // 5: CHR0 high
    DecodeRule::new(0xF00C, 0xB008), // 6: CHR1 low
    DecodeRule::new(0xF00C, 0xB00C), // 7: CHR1 high
    DecodeRule::new(0xF00C, 0xC000), // 8: CHR2 low
    DecodeRule::new(0xF00C, 0xC004), // 9: CHR2 high
    DecodeRule::new(0xF00C, 0xC008), // 10: CHR3 low
    DecodeRule::new(0xF00C, 0xC00C), // 11: CHR3 high
    DecodeRule::new(0xF00C, 0xD000), // 12: CHR4 low
    DecodeRule::new(0xF00C, 0xD004), // 13: CHR4 high
    DecodeRule::new(0xF00C, 0xD008), // 14: CHR5 low
    DecodeRule::new(0xF00C, 0xD00C), // 15: CHR5 high
    DecodeRule::new(0xF00C, 0xE000), // 16: CHR6 low
    DecodeRule::new(0xF00C, 0xE004), // 17: CHR6 high
    DecodeRule::new(0xF00C, 0xE008), // 18: CHR7 low
    DecodeRule::new(0xF00C, 0xE00C), // 19: CHR7 high
    DecodeRule::new(0xF00C, 0xF000), // 20: IRQ latch low nibble
    DecodeRule::new(0xF00C, 0xF004), // 21: IRQ latch high nibble
    DecodeRule::new(0xF00C, 0xF008), // 22: IRQ control
    DecodeRule::new(0xF00C, 0xF00C), // 23: IRQ acknowledge
];

const RULE_CHR_FIRST: usize = 4;
const RULE_CHR_LAST: usize = 19;
const RULE_IRQ_LATCH_LOW: usize = 20;
const RULE_IRQ_LATCH_HIGH: usize = 21;
const RULE_IRQ_CONTROL: usize = 22;
const RULE_IRQ_ACK: usize = 23;

#[derive(Debug, Clone)]
pub struct Vrc4 {
    cycle_mode: bool,
    enable_after_ack: bool,
    prescaler: i32,
}

impl Vrc4 {
    pub fn new(_params: &BoardParams) -> Self {
        Self {
            cycle_mode: false,
            enable_after_ack: false,
            prescaler: PRESCALER_RELOAD,
        }
    }
}

impl Chip for Vrc4 {
    fn metadata(&self) -> ChipMetadata {
        ChipMetadata {
            id: 23,
            name: Cow::Borrowed("Konami VRC4e"),
            confidence: Confidence::Approximate,
        }
    }

    fn layout(&self) -> ChipLayout {
        ChipLayout {
            prg_granularity: 8 * 1024,
            chr_granularity: 1024,
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

    fn irq_config(&self) -> Option<IrqConfig> {
        Some(IrqConfig {
            width: CounterWidth::Bits8,
            trigger: Trigger::AtValue(0xFF),
            source: ClockSource::ChipDriven,
        })
    }

    fn power_on(&mut self, _regs: &mut RegisterFile, _irq: &mut IrqTimer) {
        self.cycle_mode = false;
        self.enable_after_ack = false;
        self.prescaler = PRESCALER_RELOAD;
    }

    fn register_write(
        &mut self,
        rule: usize,
        _addr: u16,
        data: u8,
        _bus_value: u8,
        regs: &mut RegisterFile,
        irq: &mut IrqTimer,
    ) {
        match rule {
            0 => regs.set(R_PRG0, (data & 0x1F) as u16),
            1 => regs.set(R_MIRROR, data as u16),
            2 => regs.set(R_MODE, data as u16),
            3 => regs.set(R_PRG1, (data & 0x1F) as u16),
            RULE_CHR_FIRST..=RULE_CHR_LAST => {
                let port = rule - RULE_CHR_FIRST;
                let reg = R_CHR0 + port / 2;
                let current = regs.get(reg);
                let value = if port % 2 == 0 {
                    (current & 0x01F0) | (data & 0x0F) as u16
                } else {
                    (current & 0x000F) | (((data & 0x1F) as u16) << 4)
                };
                regs.set(reg, value);
            }
            RULE_IRQ_LATCH_LOW => {
                irq.set_latch((irq.latch() & 0xF0) | (data & 0x0F) as u16);
            }
            RULE_IRQ_LATCH_HIGH => {
                irq.set_latch((irq.latch() & 0x0F) | (((data & 0x0F) as u16) << 4));
            }
            RULE_IRQ_CONTROL => {
                self.enable_after_ack = data & 0x01 != 0;
                self.cycle_mode = data & 0x04 != 0;
                irq.acknowledge();
                if data & 0x02 != 0 {
                    irq.enable(true);
                    self.prescaler = PRESCALER_RELOAD;
                } else {
                    irq.disable();
                }
            }
            RULE_IRQ_ACK => {
                irq.acknowledge();
                if self.enable_after_ack {
                    irq.enable(false);
                } else {
                    irq.disable();
                }
            }
            _ => {}
        }
    }

    fn sync(&self, regs: &RegisterFile, table: &mut SpaceTable) {
        let prg0 = regs.get8(R_PRG0) as usize;
        let prg1 = regs.get8(R_PRG1) as usize;
        if regs.get8(R_MODE) & 0x02 != 0 {
            table.map_prg_rom_from_end(0, 2);
            table.map_prg_rom(1, prg1);
            table.map_prg_rom(2, prg0);
        } else {
            table.map_prg_rom(0, prg0);
            table.map_prg_rom(1, prg1);
            table.map_prg_rom_from_end(2, 2);
        }
        table.map_prg_rom_from_end(3, 1);

        for slot in 0..8 {
            table.map_chr(slot, regs.get(R_CHR0 + slot) as usize);
        }

        table.set_mirroring(match regs.get8(R_MIRROR) & 0x03 {
            0 => Mirroring::Vertical,
            1 => Mirroring::Horizontal,
            2 => Mirroring::SingleScreenLower,
            _ => Mirroring::SingleScreenUpper,
        });
        table.set_work_ram(true, true);
    }

    fn on_cpu_cycles(&mut self, cycles: u32, _regs: &mut RegisterFile, irq: &mut IrqTimer) {
        if irq.state() == TimerState::Disabled {
            return;
        }
        for _ in 0..cycles {
            if self.cycle_mode {
                irq.clock();
            } else {
                self.prescaler -= 3;
                if self.prescaler <= 0 {
                    self.prescaler += PRESCALER_RELOAD;
                    irq.clock();
                }
            }
        }
    }

    fn save_extra(&self, w: &mut StateWriter) {
        w.put_u8("vrc4.cycle_mode", self.cycle_mode as u8);
        w.put_u8("vrc4.enable_after_ack", self.enable_after_ack as u8);
        w.put_u32("vrc4.prescaler", self.prescaler as u32);
    }

    fn load_extra(&mut self, r: &StateReader) {
        self.cycle_mode = r.u8("vrc4.cycle_mode").unwrap_or(0) != 0;
        self.enable_after_ack = r.u8("vrc4.enable_after_ack").unwrap_or(0) != 0;
        let prescaler = r.u32("vrc4.prescaler").unwrap_or(PRESCALER_RELOAD as u32);
        self.prescaler = if prescaler <= PRESCALER_RELOAD as u32 {
            prescaler as i32
        } else {
            PRESCALER_RELOAD
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Board;

    const PRG_BANK: usize = 8 * 1024;
    const CHR_BANK: usize = 1024;

    fn board(prg_banks: usize, chr_banks: usize) -> Board {
        let mut prg = vec![0u8; prg_banks * PRG_BANK];
        for bank in 0..prg_banks {
            prg[bank * PRG_BANK..(bank + 1) * PRG_BANK].fill(bank as u8);
        }
        let mut chr = vec![0u8; chr_banks * CHR_BANK];
        for bank in 0..chr_banks {
            chr[bank * CHR_BANK..(bank + 1) * CHR_BANK].fill(bank as u8);
        }
        let mut params = BoardParams::new(23, prg);
        params.chr_rom = chr.into_boxed_slice();
        params.prg_ram_size = 8 * 1024;
        Board::new(params).unwrap()
    }

    #[test]
    fn prg_banks_switch_and_swap() {
        let mut b = board(16, 16);
        b.write_byte(0x8000, 5);
        b.write_byte(0xA000, 6);
        assert_eq!(b.read_byte(0x8000), 5);
        assert_eq!(b.read_byte(0xA000), 6);
        assert_eq!(b.read_byte(0xC000), 14);
        assert_eq!(b.read_byte(0xE000), 15);

        // Swap mode moves bank 0's window to $C000 and fixes $8000.
        b.write_byte(0x9008, 0x02);
        assert_eq!(b.read_byte(0x8000), 14);
        assert_eq!(b.read_byte(0xC000), 5);
        assert_eq!(b.read_byte(0xA000), 6);
    }

    #[test]
    fn chr_registers_assemble_from_two_nibbles() {
        let mut b = board(4, 32);
        // CHR3 lives at $C008/$C00C on the E revision. Value 0x19.
        b.write_byte(0xC008, 0x09);
        b.write_byte(0xC00C, 0x01);
        assert_eq!(b.ppu_read(0x0C00), 0x19);

        // Rewriting one nibble leaves the other intact.
        b.write_byte(0xC008, 0x02);
        assert_eq!(b.ppu_read(0x0C00), 0x12);
    }

    #[test]
    fn mirroring_register_selects_all_four_modes() {
        let mut b = board(4, 4);
        b.write_byte(0x9000, 0);
        assert_eq!(b.mirroring(), Mirroring::Vertical);
        b.write_byte(0x9000, 1);
        assert_eq!(b.mirroring(), Mirroring::Horizontal);
        b.write_byte(0x9000, 2);
        assert_eq!(b.mirroring(), Mirroring::SingleScreenLower);
        b.write_byte(0x9000, 3);
        assert_eq!(b.mirroring(), Mirroring::SingleScreenUpper);
    }

    #[test]
    fn cycle_mode_counts_raw_cpu_cycles() {
        let mut b = board(4, 4);
        // Latch 0xFC: three clocks climb to 0xFF, the fourth fires.
        b.write_byte(0xF000, 0x0C);
        b.write_byte(0xF004, 0x0F);
        b.write_byte(0xF008, 0x02 | 0x04); // enable, cycle mode
        b.on_cpu_cycles(3);
        assert!(!b.irq_line_asserted());
        b.on_cpu_cycles(1);
        assert!(b.irq_line_asserted());
    }

    #[test]
    fn scanline_mode_divides_by_the_prescaler() {
        let mut b = board(4, 4);
        // Latch 0xFF: the very first prescaled clock fires.
        b.write_byte(0xF000, 0x0F);
        b.write_byte(0xF004, 0x0F);
        b.write_byte(0xF008, 0x02);
        // 113 CPU cycles drain 339 of the 341-dot prescaler.
        b.on_cpu_cycles(113);
        assert!(!b.irq_line_asserted());
        b.on_cpu_cycles(1);
        assert!(b.irq_line_asserted());
    }

    #[test]
    fn ack_write_honors_the_enable_after_ack_bit() {
        let mut b = board(4, 4);
        b.write_byte(0xF000, 0x0F);
        b.write_byte(0xF004, 0x0F);
        b.write_byte(0xF008, 0x02 | 0x04 | 0x01);
        b.on_cpu_cycles(1);
        assert!(b.irq_line_asserted());

        // Acknowledge keeps counting (bit 0 was set at enable time).
        b.write_byte(0xF00C, 0);
        assert!(!b.irq_line_asserted());
        b.on_cpu_cycles(256);
        assert!(b.irq_line_asserted());
    }

    #[test]
    fn counter_reloads_from_the_latch_on_fire() {
        let mut b = board(4, 4);
        b.write_byte(0xF000, 0x0E);
        b.write_byte(0xF004, 0x0F);
        b.write_byte(0xF008, 0x02 | 0x04);
        b.on_cpu_cycles(2);
        assert!(b.irq_line_asserted());
        assert_eq!(b.irq_timer().counter(), 0xFE);
    }
}
