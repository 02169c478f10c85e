//! The board engine: one attached cartridge.
//!
//! A [`Board`] owns everything a loaded cartridge is: the ROM images, work
//! and character RAM, the chip's register file and IRQ timer, the derived
//! window table and the chip behavior itself. There are no globals; cloning
//! a board yields an independent instance (rewind buffers, second players).
//!
//! The engine enforces the sync contract centrally: after every qualifying
//! register write, at power-on, at reset and after a state load, the window
//! table is rebuilt from the register file. Chip code never decides whether
//! to sync.

use crate::chip::{Chip, ChipMetadata};
use crate::decode::DecodeTable;
use crate::error::{CorruptStateError, LoadError};
use crate::irq::IrqTimer;
use crate::memory::{cpu, ppu};
use crate::params::BoardParams;
use crate::registers::RegisterFile;
use crate::registry::{self, ChipProvider};
use crate::space::{BankSource, ClassLayout, Mirroring, SpaceTable};
use crate::state::{StateReader, StateWriter};

#[derive(Debug, Clone)]
pub struct Board {
    chip: Box<dyn Chip>,
    regs: RegisterFile,
    irq: IrqTimer,
    table: SpaceTable,
    decode: DecodeTable,

    prg_rom: Box<[u8]>,
    prg_ram: Box<[u8]>,
    chr_rom: Box<[u8]>,
    chr_ram: Box<[u8]>,
    battery_backed: bool,

    /// Last value seen on the CPU data bus. Reads of unmapped cartridge
    /// space return this, reproducing stock open-bus behavior.
    bus_latch: u8,
}

fn check_granularity(class: &'static str, granularity: usize, window: usize) -> Result<(), LoadError> {
    if granularity == 0 || !granularity.is_power_of_two() || window % granularity != 0 {
        return Err(LoadError::BadGranularity { class, granularity });
    }
    Ok(())
}

fn check_alignment(class: &'static str, len: usize, granularity: usize) -> Result<(), LoadError> {
    if len % granularity != 0 {
        return Err(LoadError::RomNotBankAligned {
            class,
            len,
            granularity,
        });
    }
    Ok(())
}

impl Board {
    /// Attach using the builtin chip registry.
    pub fn new(params: BoardParams) -> Result<Self, LoadError> {
        let chip = registry::builtin_chip(&params)?;
        Self::with_chip(params, chip)
    }

    /// Attach, consulting `provider` for chip ids the builtin registry does
    /// not know.
    pub fn with_provider(
        params: BoardParams,
        provider: Option<&dyn ChipProvider>,
    ) -> Result<Self, LoadError> {
        let chip = registry::resolve_chip(&params, provider)?;
        Self::with_chip(params, chip)
    }

    /// Attach an explicit chip instance. All misconfiguration checks happen
    /// here; a board that constructs is safe to run.
    pub fn with_chip(params: BoardParams, chip: Box<dyn Chip>) -> Result<Self, LoadError> {
        if params.prg_rom.is_empty() {
            return Err(LoadError::EmptyPrgRom);
        }

        let layout = chip.layout();
        check_granularity("PRG", layout.prg_granularity, cpu::PRG_WINDOW_LEN)?;
        check_granularity("CHR", layout.chr_granularity, ppu::CHR_WINDOW_LEN)?;
        check_alignment("PRG", params.prg_rom.len(), layout.prg_granularity)?;

        let chr_ram_size = params.effective_chr_ram_size();
        let (chr_source, chr_len) = if params.chr_rom.is_empty() {
            (BankSource::ChrRam, chr_ram_size)
        } else {
            (BankSource::ChrRom, params.chr_rom.len())
        };
        check_alignment("CHR", chr_len, layout.chr_granularity)?;

        let decode = DecodeTable::new(chip.decode_rules());
        decode.verify_exclusive()?;

        let prg_layout = ClassLayout {
            granularity: layout.prg_granularity,
            bank_count: params.prg_rom.len() / layout.prg_granularity,
            policy: layout.prg_policy,
            source: BankSource::PrgRom,
        };
        let chr_layout = ClassLayout {
            granularity: layout.chr_granularity,
            bank_count: chr_len / layout.chr_granularity,
            policy: layout.chr_policy,
            source: chr_source,
        };

        let metadata = chip.metadata();
        tracing::debug!(
            id = metadata.id,
            name = %metadata.name,
            prg_banks = prg_layout.bank_count,
            chr_banks = chr_layout.bank_count,
            "attaching cartridge board"
        );

        let mut board = Self {
            regs: RegisterFile::new(chip.register_defs()),
            irq: IrqTimer::new(chip.irq_config()),
            table: SpaceTable::new(prg_layout, chr_layout, params.mirroring),
            decode,
            chip,
            prg_ram: vec![0; params.prg_ram_size].into_boxed_slice(),
            chr_ram: vec![0; chr_ram_size].into_boxed_slice(),
            prg_rom: params.prg_rom,
            chr_rom: params.chr_rom,
            battery_backed: params.battery_backed,
            bus_latch: 0,
        };
        board.power_on();
        Ok(board)
    }

    pub fn metadata(&self) -> ChipMetadata {
        self.chip.metadata()
    }

    /// The derived bank table. This is one of the engine's two outputs (the
    /// other is the IRQ line); consumers may inspect it freely.
    pub fn table(&self) -> &SpaceTable {
        &self.table
    }

    pub fn registers(&self) -> &RegisterFile {
        &self.regs
    }

    pub fn irq_timer(&self) -> &IrqTimer {
        &self.irq
    }

    pub fn mirroring(&self) -> Mirroring {
        self.table.mirroring()
    }

    fn resync(&mut self) {
        self.table.clear();
        self.chip.sync(&self.regs, &mut self.table);
    }

    /// Power cycle: register defaults, timer to `Disabled`, chip power-on
    /// adjustments, then a sync.
    pub fn power_on(&mut self) {
        self.regs.reset_to_power_on();
        self.irq.reset();
        self.chip.power_on(&mut self.regs, &mut self.irq);
        self.bus_latch = 0;
        self.resync();
    }

    /// Soft reset. Builtin chips treat this as a power cycle.
    pub fn reset(&mut self) {
        self.regs.reset_to_power_on();
        self.irq.reset();
        self.chip.reset(&mut self.regs, &mut self.irq);
        self.bus_latch = 0;
        self.resync();
    }

    /// CPU-side read. Updates the open-bus latch with the returned value.
    pub fn read_byte(&mut self, addr: u16) -> u8 {
        let value = self.peek_byte(addr);
        self.bus_latch = value;
        value
    }

    /// Side-effect-free variant of [`read_byte`] for debuggers and tests.
    ///
    /// [`read_byte`]: Board::read_byte
    pub fn peek_byte(&self, addr: u16) -> u8 {
        if let Some(value) = self.chip.cpu_read_override(&self.regs, &self.irq, addr) {
            return value;
        }

        match addr {
            cpu::WORK_RAM_START..=cpu::WORK_RAM_END => {
                let window = self.table.work_ram();
                if window.enabled && !self.prg_ram.is_empty() {
                    let index = (addr - cpu::WORK_RAM_START) as usize % self.prg_ram.len();
                    self.prg_ram[index]
                } else {
                    self.bus_latch
                }
            }
            cpu::PRG_ROM_START..=cpu::PRG_ROM_END => {
                let (source, offset) = self.table.resolve_prg(addr);
                match source {
                    BankSource::PrgRom => {
                        self.prg_rom.get(offset).copied().unwrap_or(self.bus_latch)
                    }
                    BankSource::PrgRam if !self.prg_ram.is_empty() => {
                        self.prg_ram[offset % self.prg_ram.len()]
                    }
                    _ => self.bus_latch,
                }
            }
            _ => self.bus_latch,
        }
    }

    /// CPU-side write: dispatches to the chip's decode table, and to work
    /// RAM when no rule claims the address. Non-qualifying writes are no-ops.
    pub fn write_byte(&mut self, addr: u16, data: u8) {
        self.bus_latch = data;

        if let Some(rule) = self.decode.lookup(addr) {
            // Boards with bus conflicts see the AND of the written value and
            // the ROM byte the addressed window currently drives.
            let bus_value = if addr >= cpu::PRG_ROM_START {
                self.peek_rom_byte(addr)
            } else {
                data
            };
            self.chip
                .register_write(rule, addr, data, bus_value, &mut self.regs, &mut self.irq);
            self.resync();
            return;
        }

        if (cpu::WORK_RAM_START..=cpu::WORK_RAM_END).contains(&addr) {
            let window = self.table.work_ram();
            if window.enabled && window.writable && !self.prg_ram.is_empty() {
                let index = (addr - cpu::WORK_RAM_START) as usize % self.prg_ram.len();
                self.prg_ram[index] = data;
            }
        }
    }

    fn peek_rom_byte(&self, addr: u16) -> u8 {
        let (source, offset) = self.table.resolve_prg(addr);
        match source {
            BankSource::PrgRom => self.prg_rom.get(offset).copied().unwrap_or(0xFF),
            _ => 0xFF,
        }
    }

    /// PPU-side read of the pattern area.
    pub fn ppu_read(&self, addr: u16) -> u8 {
        let (source, offset) = self.table.resolve_chr(addr);
        let backing = match source {
            BankSource::ChrRom => &self.chr_rom,
            BankSource::ChrRam => &self.chr_ram,
            _ => return 0,
        };
        backing.get(offset).copied().unwrap_or(0)
    }

    /// PPU-side write; lands only in writable CHR RAM slots.
    pub fn ppu_write(&mut self, addr: u16, data: u8) {
        if !self.table.chr_writable(addr) {
            return;
        }
        let (source, offset) = self.table.resolve_chr(addr);
        if source == BankSource::ChrRam
            && let Some(slot) = self.chr_ram.get_mut(offset)
        {
            *slot = data;
        }
    }

    /// Clock-source input: `cycles` CPU cycles elapsed.
    pub fn on_cpu_cycles(&mut self, cycles: u32) {
        if let Some(config) = self.irq.config()
            && config.source == crate::irq::ClockSource::CpuCycles
        {
            self.irq.tick_cycles(cycles);
        }
        self.chip.on_cpu_cycles(cycles, &mut self.regs, &mut self.irq);
    }

    /// Clock-source input: scanline `line` finished rendering.
    pub fn on_scanline_end(&mut self, line: u16) {
        if let Some(config) = self.irq.config()
            && matches!(config.source, crate::irq::ClockSource::ScanlineEnd { .. })
        {
            self.irq.tick_scanline(line);
        }
        self.chip.on_scanline_end(line, &mut self.regs, &mut self.irq);
    }

    /// The cartridge IRQ line, polled by the CPU core at instruction
    /// boundaries.
    pub fn irq_line_asserted(&self) -> bool {
        self.irq.line_asserted()
    }

    /// Battery-backed work RAM for host persistence, if any.
    pub fn save_ram(&self) -> Option<&[u8]> {
        (self.battery_backed && !self.prg_ram.is_empty()).then(|| self.prg_ram.as_ref())
    }

    pub fn save_ram_mut(&mut self) -> Option<&mut [u8]> {
        (self.battery_backed && !self.prg_ram.is_empty()).then(|| self.prg_ram.as_mut())
    }

    /// Serialize every register, timer field, RAM image and chip-private
    /// field. Derived window tables are never written; loading re-syncs.
    pub fn save_state(&self) -> Vec<u8> {
        let mut w = StateWriter::new();
        for (def, value) in self.regs.iter() {
            match def.width {
                crate::registers::RegWidth::Byte => w.put_u8(def.name, value as u8),
                crate::registers::RegWidth::Word => w.put_u16(def.name, value),
            }
        }
        w.put_u8("irq.state", self.irq.state_code());
        w.put_u16("irq.counter", self.irq.counter());
        w.put_u16("irq.latch", self.irq.latch());
        w.put_u8("irq.reload", self.irq.reload_pending() as u8);
        w.put_u8("bus.latch", self.bus_latch);
        if !self.prg_ram.is_empty() {
            w.put_bytes("ram.work", &self.prg_ram);
        }
        if !self.chr_ram.is_empty() {
            w.put_bytes("ram.chr", &self.chr_ram);
        }
        self.chip.save_extra(&mut w);
        w.finish()
    }

    /// Restore a stream produced by [`save_state`]. All-or-nothing: the
    /// stream is fully parsed and size-checked before any field is applied,
    /// so an error leaves this board untouched. Fields the stream lacks keep
    /// chip power-on values; the load always ends in a sync, and a timer
    /// serialized as asserted comes back with the line held.
    ///
    /// [`save_state`]: Board::save_state
    pub fn load_state(&mut self, stream: &[u8]) -> Result<(), CorruptStateError> {
        let reader = StateReader::parse(stream)?;

        if let Some(bytes) = reader.bytes("ram.work")
            && bytes.len() != self.prg_ram.len()
        {
            return Err(CorruptStateError::FieldSize {
                field: "ram.work",
                expected: self.prg_ram.len(),
                actual: bytes.len(),
            });
        }
        if let Some(bytes) = reader.bytes("ram.chr")
            && bytes.len() != self.chr_ram.len()
        {
            return Err(CorruptStateError::FieldSize {
                field: "ram.chr",
                expected: self.chr_ram.len(),
                actual: bytes.len(),
            });
        }

        // Start from chip-defined power-on state so missing fields land on
        // their documented defaults, then overlay what the stream carries.
        self.regs.reset_to_power_on();
        self.irq.reset();
        self.chip.power_on(&mut self.regs, &mut self.irq);

        for index in 0..self.regs.len() {
            let def = self.regs.defs()[index];
            let value = match def.width {
                crate::registers::RegWidth::Byte => reader.u8(def.name).map(u16::from),
                crate::registers::RegWidth::Word => reader.u16(def.name),
            };
            if let Some(value) = value {
                self.regs.set(index, value);
            }
        }

        let state_code = reader.u8("irq.state").unwrap_or(0);
        let counter = reader.u16("irq.counter").unwrap_or(0);
        let latch = reader.u16("irq.latch").unwrap_or(0);
        let reload = reader.u8("irq.reload").unwrap_or(0) != 0;
        self.irq.restore(state_code, counter, latch, reload);

        self.bus_latch = reader.u8("bus.latch").unwrap_or(0);

        if let Some(bytes) = reader.bytes("ram.work") {
            self.prg_ram.copy_from_slice(bytes);
        }
        if let Some(bytes) = reader.bytes("ram.chr") {
            self.chr_ram.copy_from_slice(bytes);
        }

        self.chip.load_extra(&reader);
        self.resync();
        tracing::debug!(id = self.metadata().id, "restored board state");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chip::{ChipLayout, Confidence};
    use crate::decode::DecodeRule;
    use crate::irq::IrqConfig;
    use crate::registers::RegisterDef;
    use crate::space::BankPolicy;
    use std::borrow::Cow;

    fn banked_rom(bank_count: usize, bank_size: usize) -> Vec<u8> {
        let mut rom = vec![0u8; bank_count * bank_size];
        for bank in 0..bank_count {
            rom[bank * bank_size..(bank + 1) * bank_size].fill(bank as u8);
        }
        rom
    }

    fn uxrom_board() -> Board {
        let mut params = BoardParams::new(2, banked_rom(8, 16 * 1024));
        params.prg_ram_size = 8 * 1024;
        Board::new(params).unwrap()
    }

    #[test]
    fn rejects_empty_prg_rom() {
        let err = Board::new(BoardParams::new(0, vec![])).unwrap_err();
        assert!(matches!(err, LoadError::EmptyPrgRom));
    }

    #[test]
    fn rejects_unknown_chip_ids() {
        let err = Board::new(BoardParams::new(999, banked_rom(2, 16 * 1024))).unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedChip { id: 999 }));
    }

    #[test]
    fn rejects_misaligned_rom_images() {
        let err = Board::new(BoardParams::new(2, vec![0u8; 16 * 1024 + 5])).unwrap_err();
        assert!(matches!(err, LoadError::RomNotBankAligned { class: "PRG", .. }));
    }

    #[test]
    fn open_bus_reads_return_the_data_latch() {
        let mut board = uxrom_board();
        // 0x5000 is in the claimed cartridge range but nothing decodes it.
        board.write_byte(0x5000, 0x42);
        assert_eq!(board.read_byte(0x5000), 0x42);
        // A ROM read replaces the latch.
        board.read_byte(0x8000);
        assert_ne!(board.read_byte(0x5000), 0x42);
    }

    #[test]
    fn non_qualifying_writes_are_no_ops() {
        let mut board = uxrom_board();
        let before = board.table().clone();
        board.write_byte(0x4100, 0x07);
        assert_eq!(*board.table(), before);
    }

    #[test]
    fn sync_is_idempotent() {
        let mut board = uxrom_board();
        board.write_byte(0x8000, 0x03);
        let first = board.table().clone();
        board.resync();
        board.resync();
        assert_eq!(*board.table(), first);
    }

    #[test]
    fn save_state_round_trips_banking() {
        let mut board = uxrom_board();
        board.write_byte(0x8000, 0x05);
        board.write_byte(0x6000, 0xA7);
        let stream = board.save_state();

        let mut restored = uxrom_board();
        restored.load_state(&stream).unwrap();
        assert_eq!(restored.table(), board.table());
        assert_eq!(restored.read_byte(0x8000), 0x05);
        assert_eq!(restored.read_byte(0x6000), 0xA7);
    }

    #[test]
    fn corrupt_state_leaves_board_untouched() {
        let mut board = uxrom_board();
        board.write_byte(0x8000, 0x05);
        board.write_byte(0x6000, 0x99);
        let table_before = board.table().clone();

        let mut stream = board.save_state();
        stream.truncate(stream.len() - 3);
        assert!(board.load_state(&stream).is_err());
        assert_eq!(*board.table(), table_before);
        assert_eq!(board.read_byte(0x6000), 0x99);
        assert_eq!(board.read_byte(0x8000), 0x05);
    }

    #[test]
    fn wrong_sized_ram_image_is_corrupt() {
        let mut donor = BoardParams::new(2, banked_rom(8, 16 * 1024));
        donor.prg_ram_size = 2 * 1024;
        let donor = Board::new(donor).unwrap();

        let mut board = uxrom_board();
        let err = board.load_state(&donor.save_state()).unwrap_err();
        assert!(matches!(
            err,
            CorruptStateError::FieldSize { field: "ram.work", .. }
        ));
    }

    #[test]
    fn cloned_boards_do_not_share_state() {
        let mut a = uxrom_board();
        let mut b = a.clone();
        a.write_byte(0x8000, 0x04);
        b.write_byte(0x8000, 0x01);
        assert_eq!(a.read_byte(0x8000), 0x04);
        assert_eq!(b.read_byte(0x8000), 0x01);
    }

    // A deliberately broken chip whose decode rules overlap, to prove the
    // attach-time exclusivity check fires.
    #[derive(Debug, Clone)]
    struct OverlappingChip;

    impl Chip for OverlappingChip {
        fn metadata(&self) -> ChipMetadata {
            ChipMetadata {
                id: 900,
                name: Cow::Borrowed("overlap"),
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
            static RULES: &[DecodeRule] = &[
                DecodeRule::new(0x8000, 0x8000),
                DecodeRule::new(0xC000, 0xC000),
            ];
            RULES
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

        fn sync(&self, _regs: &RegisterFile, _table: &mut SpaceTable) {}
    }

    #[test]
    fn ambiguous_decode_tables_refuse_to_attach() {
        let err = Board::with_chip(
            BoardParams::new(900, banked_rom(2, 16 * 1024)),
            Box::new(OverlappingChip),
        )
        .unwrap_err();
        assert!(matches!(err, LoadError::AmbiguousDecode { .. }));
    }

    #[test]
    fn unwired_irq_never_asserts() {
        let mut board = uxrom_board();
        for line in 0..262 {
            board.on_scanline_end(line);
        }
        board.on_cpu_cycles(100_000);
        assert!(!board.irq_line_asserted());
    }

    #[derive(Debug, Clone)]
    struct StatusChip;

    impl Chip for StatusChip {
        fn metadata(&self) -> ChipMetadata {
            ChipMetadata {
                id: 901,
                name: Cow::Borrowed("status"),
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

        fn irq_config(&self) -> Option<IrqConfig> {
            Some(IrqConfig {
                width: crate::irq::CounterWidth::Bits8,
                trigger: crate::irq::Trigger::OnUnderflow,
                source: crate::irq::ClockSource::CpuCycles,
            })
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
        }

        fn cpu_read_override(
            &self,
            _regs: &RegisterFile,
            irq: &IrqTimer,
            addr: u16,
        ) -> Option<u8> {
            (addr == 0x5000).then(|| irq.line_asserted() as u8)
        }
    }

    #[test]
    fn read_overrides_bypass_window_resolution() {
        let board = Board::with_chip(
            BoardParams::new(901, banked_rom(2, 16 * 1024)),
            Box::new(StatusChip),
        )
        .unwrap();
        assert_eq!(board.peek_byte(0x5000), 0);
    }

    #[derive(Debug)]
    struct StatusProvider;

    impl ChipProvider for StatusProvider {
        fn chip_for(&self, params: &BoardParams) -> Option<Box<dyn Chip>> {
            (params.chip_id == 901).then(|| Box::new(StatusChip) as Box<dyn Chip>)
        }
    }

    #[test]
    fn provider_supplies_unknown_chip_ids() {
        let board =
            Board::with_provider(BoardParams::new(901, banked_rom(2, 16 * 1024)), Some(&StatusProvider));
        assert!(board.is_ok());

        let missing =
            Board::with_provider(BoardParams::new(902, banked_rom(2, 16 * 1024)), Some(&StatusProvider));
        assert!(matches!(missing, Err(LoadError::UnsupportedChip { id: 902 })));
    }
}
