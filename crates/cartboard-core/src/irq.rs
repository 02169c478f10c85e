//! Cartridge IRQ timers.
//!
//! Chips describe their counter declaratively — width, comparator shape and
//! clock source — and the engine owns a single [`IrqTimer`] per board. Chips
//! with genuinely idiosyncratic timing keep their own prescaler state and
//! drive [`IrqTimer::clock`] themselves via [`ClockSource::ChipDriven`].

/// Counter width in bits. Values are masked to this width on reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterWidth {
    Bits8,
    Bits9,
    Bits12,
    Bits16,
}

impl CounterWidth {
    pub fn mask(self) -> u16 {
        match self {
            CounterWidth::Bits8 => 0x00FF,
            CounterWidth::Bits9 => 0x01FF,
            CounterWidth::Bits12 => 0x0FFF,
            CounterWidth::Bits16 => 0xFFFF,
        }
    }
}

/// Comparator shape. The count direction is part of the shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Down count; decrementing past zero fires and reloads from the latch.
    OnUnderflow,
    /// Down count, MMC3 shape: a pending reload request or a zero counter
    /// reloads from the latch instead of decrementing, and a zero counter
    /// after the clock fires. A zero latch therefore fires on every clock.
    OnZeroReload,
    /// Up count; reaching this value fires and reloads from the latch.
    AtValue(u16),
}

/// Where this timer's clock comes from. Exactly one source is wired per
/// chip; the chip logic itself never needs to know which.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockSource {
    /// Clocked once per elapsed CPU cycle.
    CpuCycles,
    /// Clocked once per rendered scanline. When `skip_vblank` is set the
    /// clock is suppressed for lines 240..=260 (the NTSC vertical blank),
    /// matching chips whose counter only runs while the PPU fetches.
    ScanlineEnd { skip_vblank: bool },
    /// The engine routes raw clock events to the chip hook instead; the chip
    /// steps the counter through [`IrqTimer::clock`].
    ChipDriven,
}

/// First scanline of the NTSC vertical blanking interval.
const VBLANK_FIRST_LINE: u16 = 240;
/// Last vblank line; 261 is the pre-render line and clocks again.
const VBLANK_LAST_LINE: u16 = 260;

/// Declarative timer description supplied by the chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrqConfig {
    pub width: CounterWidth,
    pub trigger: Trigger,
    pub source: ClockSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "savestate-serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TimerState {
    Disabled,
    Counting,
    /// The IRQ line is held. The counter keeps clocking; only an explicit
    /// acknowledge or disable releases the line.
    Asserted,
}

/// One cartridge IRQ counter.
///
/// A board whose chip has no IRQ capability holds an unwired timer: every
/// operation is a no-op and the state is permanently [`TimerState::Disabled`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrqTimer {
    config: Option<IrqConfig>,
    state: TimerState,
    counter: u16,
    latch: u16,
    reload_pending: bool,
}

impl IrqTimer {
    pub fn new(config: Option<IrqConfig>) -> Self {
        Self {
            config,
            state: TimerState::Disabled,
            counter: 0,
            latch: 0,
            reload_pending: false,
        }
    }

    pub fn wired(&self) -> bool {
        self.config.is_some()
    }

    pub fn config(&self) -> Option<&IrqConfig> {
        self.config.as_ref()
    }

    /// Power-on / hard-reset state.
    pub fn reset(&mut self) {
        self.state = TimerState::Disabled;
        self.counter = 0;
        self.latch = 0;
        self.reload_pending = false;
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn line_asserted(&self) -> bool {
        self.state == TimerState::Asserted
    }

    pub fn counter(&self) -> u16 {
        self.counter
    }

    pub fn latch(&self) -> u16 {
        self.latch
    }

    fn width_mask(&self) -> u16 {
        self.config.map(|c| c.width.mask()).unwrap_or(0xFFFF)
    }

    pub fn set_latch(&mut self, value: u16) {
        self.latch = value & self.width_mask();
    }

    pub fn set_counter(&mut self, value: u16) {
        self.counter = value & self.width_mask();
    }

    /// Ask for the latch to be loaded on the next clock instead of counting
    /// (the MMC3 `$C001` strobe).
    pub fn request_reload(&mut self) {
        self.reload_pending = true;
    }

    /// Enable-writing register write. Reloading from the latch here is
    /// chip-defined. A held line stays held; pair with [`acknowledge`] for
    /// chips whose enable write also clears the line.
    ///
    /// [`acknowledge`]: IrqTimer::acknowledge
    pub fn enable(&mut self, reload_from_latch: bool) {
        if self.config.is_none() {
            return;
        }
        if reload_from_latch {
            self.counter = self.latch;
        }
        if self.state == TimerState::Disabled {
            self.state = TimerState::Counting;
        }
    }

    /// IRQ-end register write: release the line and stop counting.
    pub fn disable(&mut self) {
        self.state = TimerState::Disabled;
    }

    /// Release the line but keep counting.
    pub fn acknowledge(&mut self) {
        if self.state == TimerState::Asserted {
            self.state = TimerState::Counting;
        }
    }

    /// Advance the counter by one source clock. Returns whether the
    /// comparator fired on this step.
    pub fn clock(&mut self) -> bool {
        let Some(config) = self.config else {
            return false;
        };
        if self.state == TimerState::Disabled {
            return false;
        }

        let mask = config.width.mask();
        let fired = match config.trigger {
            Trigger::OnUnderflow => {
                if self.counter == 0 {
                    self.counter = self.latch;
                    true
                } else {
                    self.counter -= 1;
                    false
                }
            }
            Trigger::OnZeroReload => {
                if self.reload_pending || self.counter == 0 {
                    self.counter = self.latch;
                    self.reload_pending = false;
                } else {
                    self.counter -= 1;
                }
                self.counter == 0
            }
            Trigger::AtValue(value) => {
                if self.counter == value & mask {
                    self.counter = self.latch;
                    true
                } else {
                    self.counter = (self.counter + 1) & mask;
                    false
                }
            }
        };

        if fired {
            self.state = TimerState::Asserted;
        }
        fired
    }

    /// Clock once per elapsed CPU cycle.
    pub fn tick_cycles(&mut self, cycles: u32) {
        for _ in 0..cycles {
            self.clock();
        }
    }

    /// Clock for one finished scanline, honoring the configured vblank
    /// suppression.
    pub fn tick_scanline(&mut self, line: u16) {
        let Some(config) = self.config else {
            return;
        };
        if let ClockSource::ScanlineEnd { skip_vblank: true } = config.source
            && (VBLANK_FIRST_LINE..=VBLANK_LAST_LINE).contains(&line)
        {
            return;
        }
        self.clock();
    }

    // Save-state plumbing. The numeric codes are part of the stream format.

    pub(crate) fn state_code(&self) -> u8 {
        match self.state {
            TimerState::Disabled => 0,
            TimerState::Counting => 1,
            TimerState::Asserted => 2,
        }
    }

    pub(crate) fn reload_pending(&self) -> bool {
        self.reload_pending
    }

    pub(crate) fn restore(&mut self, state_code: u8, counter: u16, latch: u16, reload: bool) {
        if self.config.is_none() {
            return;
        }
        self.state = match state_code {
            1 => TimerState::Counting,
            2 => TimerState::Asserted,
            _ => TimerState::Disabled,
        };
        let mask = self.width_mask();
        self.counter = counter & mask;
        self.latch = latch & mask;
        self.reload_pending = reload;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cycle_timer(width: CounterWidth, trigger: Trigger) -> IrqTimer {
        IrqTimer::new(Some(IrqConfig {
            width,
            trigger,
            source: ClockSource::CpuCycles,
        }))
    }

    #[test]
    fn twelve_bit_underflow_asserts_exactly_once() {
        let mut t = cycle_timer(CounterWidth::Bits12, Trigger::OnUnderflow);
        t.set_latch(100);
        t.enable(true);

        let mut assert_edges = 0;
        let mut was_asserted = false;
        for _ in 0..101 {
            t.tick_cycles(1);
            if t.line_asserted() && !was_asserted {
                assert_edges += 1;
            }
            was_asserted = t.line_asserted();
        }
        assert_eq!(assert_edges, 1);
        assert!(t.line_asserted());

        t.acknowledge();
        assert!(!t.line_asserted());
        assert_eq!(t.state(), TimerState::Counting);
    }

    #[test]
    fn never_asserts_without_an_enabling_write() {
        let mut t = cycle_timer(CounterWidth::Bits8, Trigger::OnUnderflow);
        t.set_latch(0);
        t.tick_cycles(10_000);
        assert_eq!(t.state(), TimerState::Disabled);
        assert!(!t.line_asserted());
    }

    #[test]
    fn unwired_timer_is_permanently_disabled() {
        let mut t = IrqTimer::new(None);
        t.enable(true);
        t.tick_cycles(1_000);
        t.tick_scanline(100);
        assert_eq!(t.state(), TimerState::Disabled);
    }

    #[test]
    fn zero_reload_shape_reloads_on_strobe() {
        let mut t = IrqTimer::new(Some(IrqConfig {
            width: CounterWidth::Bits8,
            trigger: Trigger::OnZeroReload,
            source: ClockSource::ScanlineEnd { skip_vblank: true },
        }));
        t.set_latch(3);
        t.enable(false);
        t.request_reload();

        // First clock consumes the strobe: counter = 3.
        t.tick_scanline(0);
        assert_eq!(t.counter(), 3);
        // Three more visible lines count down to zero and fire.
        t.tick_scanline(1);
        t.tick_scanline(2);
        assert!(!t.line_asserted());
        t.tick_scanline(3);
        assert!(t.line_asserted());
    }

    #[test]
    fn scanline_clock_suppressed_during_vblank() {
        let mut t = IrqTimer::new(Some(IrqConfig {
            width: CounterWidth::Bits8,
            trigger: Trigger::OnUnderflow,
            source: ClockSource::ScanlineEnd { skip_vblank: true },
        }));
        t.set_latch(10);
        t.enable(true);
        for line in 240..=260 {
            t.tick_scanline(line);
        }
        assert_eq!(t.counter(), 10);
        t.tick_scanline(261);
        assert_eq!(t.counter(), 9);
    }

    #[test]
    fn up_count_compare_fires_at_value() {
        let mut t = cycle_timer(CounterWidth::Bits8, Trigger::AtValue(0xFF));
        t.set_latch(0xFE);
        t.enable(true);
        // 0xFE -> 0xFF takes one clock; the next fires and reloads.
        t.tick_cycles(1);
        assert!(!t.line_asserted());
        t.tick_cycles(1);
        assert!(t.line_asserted());
        assert_eq!(t.counter(), 0xFE);
    }

    #[test]
    fn disable_releases_the_line() {
        let mut t = cycle_timer(CounterWidth::Bits8, Trigger::OnUnderflow);
        t.set_latch(0);
        t.enable(true);
        t.tick_cycles(1);
        assert!(t.line_asserted());
        t.disable();
        assert!(!t.line_asserted());
        assert_eq!(t.state(), TimerState::Disabled);
    }
}
