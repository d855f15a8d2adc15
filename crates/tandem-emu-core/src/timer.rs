use crate::state::{Serializable, Serializer};

/// Scheduler clocks between two decrements of the value register: the timer
/// ticks once every 1024 CPU cycles and a CPU cycle is 3 scheduler clocks.
pub const TIMER_QUANTUM: i64 = 1024 * 3;

/// Countdown timer feeding the TIQ interrupt line.
#[derive(Debug, Clone)]
pub struct Timer {
    /// Scheduler clocks left before the next decrement of `value`.
    pub counter: i64,
    /// Value loaded on start and after every underflow (7 bits).
    pub reload: u8,
    /// Current countdown value.
    pub value: u8,
    pub enable: bool,
    /// Asserted on underflow while enabled, cleared by [`Timer::acknowledge`].
    pub line: bool,
    quantum: i64,
}

impl Timer {
    pub fn new() -> Self {
        Self::with_quantum(TIMER_QUANTUM)
    }

    pub fn with_quantum(quantum: i64) -> Self {
        Self {
            counter: 0,
            reload: 0,
            value: 0,
            enable: false,
            line: false,
            quantum: quantum.max(1),
        }
    }

    pub fn quantum(&self) -> i64 {
        self.quantum
    }

    pub fn read(&self) -> u8 {
        self.value & 0x7F
    }

    pub fn write_reload(&mut self, val: u8) {
        self.reload = val & 0x7F;
    }

    pub fn control(&self) -> u8 {
        self.enable as u8
    }

    /// Bit 0 starts or stops the timer. Starting reloads the value and begins
    /// a fresh quantum.
    pub fn write_control(&mut self, val: u8) {
        let enable = val & 0x01 != 0;
        if enable && !self.enable {
            self.value = self.reload;
            self.counter = self.quantum - 1;
        }
        self.enable = enable;
    }

    pub fn acknowledge(&mut self) {
        self.line = false;
    }

    pub fn irq_line(&self) -> bool {
        self.line
    }

    /// Advance by `clocks` scheduler clocks. Returns how many times the line
    /// was asserted during the step.
    pub fn step(&mut self, clocks: u32) -> u32 {
        let mut fired = 0;
        self.counter -= clocks as i64;
        while self.counter < 0 {
            self.counter += self.quantum;
            if self.value == 0 {
                self.value = self.reload;
                if self.enable {
                    self.line = true;
                    fired += 1;
                }
            } else {
                self.value -= 1;
            }
        }
        fired
    }
}

impl Serializable for Timer {
    fn serialize(&mut self, s: &mut Serializer) {
        s.integer(&mut self.counter);
        s.integer(&mut self.reload);
        s.integer(&mut self.value);
        s.boolean(&mut self.enable);
        s.boolean(&mut self.line);
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
