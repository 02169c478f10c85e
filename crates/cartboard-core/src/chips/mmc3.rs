//! Chip 4 (MMC3): indexed bank registers and the scanline IRQ counter.
//!
//! Eight bank values sit behind a single select register; even/odd address
//! pairs across `$8000-$FFFF` pick which of the eight ports a write lands
//! in. The IRQ counter reloads from a latch whenever it reaches zero and
//! asserts on the reload-to-zero transition.
//!
//! The counter here is driven by an end-of-scanline clock rather than the
//! PPU A12 edge the real part watches, so games that toggle A12 manually
//! mid-line will see slightly different timing.

use std::borrow::Cow;

use bitflags::bitflags;

use crate::chip::{Chip, ChipLayout, ChipMetadata, Confidence};
use crate::decode::DecodeRule;
use crate::irq::{ClockSource, CounterWidth, IrqConfig, IrqTimer, Trigger};
use crate::params::BoardParams;
use crate::registers::{RegisterDef, RegisterFile};
use crate::space::{BankPolicy, Mirroring, SpaceTable};

const R_SELECT: usize = 0;
const R_BANK0: usize = 1;
const R_MIRROR: usize = 9;
const R_WRAM: usize = 10;

static DEFS: &[RegisterDef] = &[
    RegisterDef::byte("mmc3.bank.select", 0x40),
    RegisterDef::byte("mmc3.bank.r0", 0),
    RegisterDef::byte("mmc3.bank.r1", 0),
    RegisterDef::byte("mmc3.bank.r2", 0),
    RegisterDef::byte("mmc3.bank.r3", 0),
    RegisterDef::byte("mmc3.bank.r4", 0),
    RegisterDef::byte("mmc3.bank.r5", 0),
    RegisterDef::byte("mmc3.bank.r6", 0),
    RegisterDef::byte("mmc3.bank.r7", 0),
    RegisterDef::byte("mmc3.mirror", 0),
    RegisterDef::byte("mmc3.wram", 0x40),
];

// Even/odd port pairs: A0 and A13-A14 select, everything between is
// ignored by the address decoder.
static RULES: &[DecodeRule] = &[
    DecodeRule::new(0xE001, 0x8000), // bank select
    DecodeRule::new(0xE001, 0x8001), // bank data
    DecodeRule::new(0xE001, 0xA000), // mirroring
    DecodeRule::new(0xE001, 0xA001), // work-RAM protect
    DecodeRule::new(0xE001, 0xC000), // IRQ latch
    DecodeRule::new(0xE001, 0xC001), // IRQ reload
    DecodeRule::new(0xE001, 0xE000), // IRQ disable
    DecodeRule::new(0xE001, 0xE001), // IRQ enable
];

bitflags! {
    #[derive(Debug, Clone, Copy)]
    struct BankSelect: u8 {
        const PRG_SWAP = 0x40;
        const CHR_INVERT = 0x80;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy)]
    struct WramControl: u8 {
        const WRITE_PROTECT = 0x40;
        const ENABLE = 0x80;
    }
}

#[derive(Debug, Clone)]
pub struct Mmc3 {
    base_mirroring: Mirroring,
    four_screen: bool,
}

impl Mmc3 {
    pub fn new(params: &BoardParams) -> Self {
        Self {
            base_mirroring: params.mirroring,
            four_screen: params.mirroring == Mirroring::FourScreen,
        }
    }
}

impl Chip for Mmc3 {
    fn metadata(&self) -> ChipMetadata {
        ChipMetadata {
            id: 4,
            name: Cow::Borrowed("MMC3"),
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
            trigger: Trigger::OnZeroReload,
            source: ClockSource::ScanlineEnd { skip_vblank: true },
        })
    }

    fn power_on(&mut self, regs: &mut RegisterFile, _irq: &mut IrqTimer) {
        let base = match self.base_mirroring {
            Mirroring::Horizontal => 1,
            _ => 0,
        };
        regs.set(R_MIRROR, base);
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
            0 => regs.set(R_SELECT, data as u16),
            1 => {
                let port = (regs.get8(R_SELECT) & 0x07) as usize;
                regs.set(R_BANK0 + port, data as u16);
            }
            2 => regs.set(R_MIRROR, data as u16),
            3 => regs.set(R_WRAM, data as u16),
            4 => irq.set_latch(data as u16),
            5 => irq.request_reload(),
            6 => irq.disable(),
            _ => irq.enable(false),
        }
    }

    fn sync(&self, regs: &RegisterFile, table: &mut SpaceTable) {
        let select = BankSelect::from_bits_retain(regs.get8(R_SELECT));
        let bank = |port: usize| regs.get8(R_BANK0 + port) as usize;

        let r6 = bank(6);
        let r7 = bank(7);
        if select.contains(BankSelect::PRG_SWAP) {
            table.map_prg_rom_from_end(0, 2);
            table.map_prg_rom(1, r7);
            table.map_prg_rom(2, r6);
        } else {
            table.map_prg_rom(0, r6);
            table.map_prg_rom(1, r7);
            table.map_prg_rom_from_end(2, 2);
        }
        table.map_prg_rom_from_end(3, 1);

        // R0/R1 are 2 KiB ports; their low bit is ignored.
        let pairs = [bank(0) & !1, bank(1) & !1];
        let singles = [bank(2), bank(3), bank(4), bank(5)];
        let flip = if select.contains(BankSelect::CHR_INVERT) {
            4
        } else {
            0
        };
        table.map_chr(flip, pairs[0]);
        table.map_chr(flip + 1, pairs[0] + 1);
        table.map_chr(flip + 2, pairs[1]);
        table.map_chr(flip + 3, pairs[1] + 1);
        for (i, &single) in singles.iter().enumerate() {
            table.map_chr((4 - flip) + i, single);
        }

        let wram = WramControl::from_bits_retain(regs.get8(R_WRAM));
        table.set_work_ram(
            wram.contains(WramControl::ENABLE),
            !wram.contains(WramControl::WRITE_PROTECT),
        );

        if !self.four_screen {
            table.set_mirroring(if regs.get8(R_MIRROR) & 0x01 != 0 {
                Mirroring::Horizontal
            } else {
                Mirroring::Vertical
            });
        }
    }
}
