//! CPU turn logic: interrupt arbitration, the interrupt/timer I/O block and
//! the seam to an instruction-set implementation.
//!
//! Instruction decode is not part of this module. A [`Core`] executes one
//! instruction or one interrupt entry and reports its cost in CPU cycles; the
//! [`Cpu`] decides which of the two happens on a given turn.

use crate::bus::Io;
use crate::debug::{Debugger, InstructionEvent};
use crate::state::{Serializable, Serializer};
use crate::timer::Timer;

/// Scheduler clocks per CPU cycle.
pub const CLOCKS_PER_CYCLE: u32 = 3;

// Vector locations in the fixed ROM bank.
pub const VECTOR_IRQ2: u16 = 0x3FF6;
pub const VECTOR_IRQ1: u16 = 0x3FF8;
pub const VECTOR_TIQ: u16 = 0x3FFA;
pub const VECTOR_RESET: u16 = 0x3FFE;

// Interrupt disable / status bits.
pub const IRQ2_BIT: u8 = 0x01;
pub const IRQ1_BIT: u8 = 0x02;
pub const TIQ_BIT: u8 = 0x04;

/// Memory interface seen by an instruction-set core.
pub trait CpuBus {
    fn read(&mut self, address: u16) -> u8;

    fn write(&mut self, address: u16, value: u8);

    /// Read without side effects, for disassembly.
    fn peek(&self, address: u16) -> u8;

    /// Physical address of a logical one, for debug events.
    fn physical(&self, address: u16) -> u32 {
        address as u32
    }

    /// Timing counters of attached peripherals, for debug events.
    fn counters(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Instruction-set specific half of a CPU. Its registers are part of a
/// save state.
pub trait Core: Serializable {
    /// Reset the register file. The program counter is loaded afterwards from
    /// the reset vector.
    fn power(&mut self);

    fn pc(&self) -> u16;

    fn set_pc(&mut self, pc: u16);

    /// Whether the core's own flag masks maskable interrupts.
    fn interrupts_masked(&self) -> bool;

    /// Execute one instruction, returning the CPU cycles it took.
    fn instruction(&mut self, bus: &mut dyn CpuBus) -> u32;

    /// Run the interrupt entry sequence for `vector`, returning CPU cycles.
    fn interrupt(&mut self, bus: &mut dyn CpuBus, vector: u16) -> u32;

    fn disassemble(&self, bus: &dyn CpuBus) -> String;

    /// Register dump accompanying a disassembly line.
    fn context(&self) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    Tiq,
    Irq1,
    Irq2,
}

impl Interrupt {
    /// Service order, highest first.
    pub const PRIORITY: [Interrupt; 3] = [Interrupt::Tiq, Interrupt::Irq1, Interrupt::Irq2];

    pub const fn name(self) -> &'static str {
        match self {
            Interrupt::Tiq => "TIQ",
            Interrupt::Irq1 => "IRQ1",
            Interrupt::Irq2 => "IRQ2",
        }
    }

    const fn bit(self) -> u8 {
        match self {
            Interrupt::Tiq => TIQ_BIT,
            Interrupt::Irq1 => IRQ1_BIT,
            Interrupt::Irq2 => IRQ2_BIT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterruptLine {
    /// Sampled at instruction boundaries by [`Interrupts::last_cycle`].
    pub pending: bool,
    pub disable: bool,
    pub vector: u16,
}

impl InterruptLine {
    const fn new(vector: u16) -> Self {
        Self {
            pending: false,
            disable: false,
            vector,
        }
    }
}

/// Interrupt lines, the timer and their I/O ports.
///
/// Port layout relative to the block base:
/// - `+0` timer value (read) / reload (write)
/// - `+1` timer control, bit 0 enables
/// - `+2` interrupt disable mask
/// - `+3` interrupt status (read) / timer acknowledge (any write)
#[derive(Debug, Clone)]
pub struct Interrupts {
    pub tiq: InterruptLine,
    pub irq1: InterruptLine,
    pub irq2: InterruptLine,
    pub timer: Timer,
    /// Asserted condition of IRQ1, mirrored from its source.
    pub irq1_input: bool,
    /// Asserted condition of IRQ2, mirrored from its source.
    pub irq2_input: bool,
    /// Last value written to any port; unused read bits return it.
    latch: u8,
}

impl Interrupts {
    pub fn new() -> Self {
        Self {
            tiq: InterruptLine::new(VECTOR_TIQ),
            irq1: InterruptLine::new(VECTOR_IRQ1),
            irq2: InterruptLine::new(VECTOR_IRQ2),
            timer: Timer::new(),
            irq1_input: false,
            irq2_input: false,
            latch: 0,
        }
    }

    pub fn power(&mut self) {
        *self = Self::new();
    }

    fn line(&self, interrupt: Interrupt) -> &InterruptLine {
        match interrupt {
            Interrupt::Tiq => &self.tiq,
            Interrupt::Irq1 => &self.irq1,
            Interrupt::Irq2 => &self.irq2,
        }
    }

    /// Recompute every pending flag. Called once per instruction boundary, so
    /// an assertion is only noticed at the following boundary.
    pub fn last_cycle(&mut self, masked: bool) {
        self.irq2.pending = self.irq2_input && !self.irq2.disable && !masked;
        self.irq1.pending = self.irq1_input && !self.irq1.disable && !masked;
        self.tiq.pending = self.timer.irq_line() && !self.tiq.disable && !masked;
    }

    /// Highest-priority pending line and its vector.
    pub fn next(&self) -> Option<(Interrupt, u16)> {
        Interrupt::PRIORITY
            .into_iter()
            .map(|i| (i, self.line(i)))
            .find(|(_, line)| line.pending)
            .map(|(i, line)| (i, line.vector))
    }

    fn disable_mask(&self) -> u8 {
        let mut mask = 0;
        for interrupt in Interrupt::PRIORITY {
            if self.line(interrupt).disable {
                mask |= interrupt.bit();
            }
        }
        mask
    }

    fn status(&self) -> u8 {
        let mut status = 0;
        if self.irq2_input {
            status |= IRQ2_BIT;
        }
        if self.irq1_input {
            status |= IRQ1_BIT;
        }
        if self.timer.irq_line() {
            status |= TIQ_BIT;
        }
        status
    }
}

impl Serializable for InterruptLine {
    fn serialize(&mut self, s: &mut Serializer) {
        s.boolean(&mut self.pending);
        s.boolean(&mut self.disable);
    }
}

impl Serializable for Interrupts {
    fn serialize(&mut self, s: &mut Serializer) {
        self.tiq.serialize(s);
        self.irq1.serialize(s);
        self.irq2.serialize(s);
        self.timer.serialize(s);
        s.boolean(&mut self.irq1_input);
        s.boolean(&mut self.irq2_input);
        s.integer(&mut self.latch);
    }
}

impl Default for Interrupts {
    fn default() -> Self {
        Self::new()
    }
}

impl Io for Interrupts {
    fn peek(&self, address: u32) -> u8 {
        match address & 0x03 {
            0 => self.timer.read() | (self.latch & 0x80),
            1 => self.timer.control() | (self.latch & 0xFE),
            2 => self.disable_mask() | (self.latch & 0xF8),
            _ => self.status() | (self.latch & 0xF8),
        }
    }

    fn write(&mut self, address: u32, value: u8) {
        self.latch = value;
        match address & 0x03 {
            0 => self.timer.write_reload(value),
            1 => self.timer.write_control(value),
            2 => {
                self.irq2.disable = value & IRQ2_BIT != 0;
                self.irq1.disable = value & IRQ1_BIT != 0;
                self.tiq.disable = value & TIQ_BIT != 0;
            }
            _ => self.timer.acknowledge(),
        }
    }
}

/// One instruction-set core plus turn bookkeeping.
#[derive(Debug, Clone)]
pub struct Cpu<C> {
    pub core: C,
    pub instructions: u64,
    pub interrupts_taken: u64,
}

impl<C: Core> Cpu<C> {
    pub fn new(core: C) -> Self {
        Self {
            core,
            instructions: 0,
            interrupts_taken: 0,
        }
    }

    /// Reset the core and load the program counter from the reset vector.
    pub fn power(&mut self, bus: &mut dyn CpuBus) {
        self.core.power();
        self.instructions = 0;
        self.interrupts_taken = 0;
        let lo = bus.read(VECTOR_RESET) as u16;
        let hi = bus.read(VECTOR_RESET.wrapping_add(1)) as u16;
        self.core.set_pc(hi << 8 | lo);
    }

    /// Run one turn: service `pending` if present, otherwise execute one
    /// instruction. Returns the CPU cycles consumed.
    pub fn main(
        &mut self,
        pending: Option<(Interrupt, u16)>,
        bus: &mut dyn CpuBus,
        debugger: &mut Debugger,
    ) -> u32 {
        if let Some((interrupt, vector)) = pending {
            if debugger.interrupt_enabled() {
                debugger.notify_interrupt(interrupt.name());
            }
            self.interrupts_taken += 1;
            return self.core.interrupt(bus, vector);
        }

        if debugger.instruction_enabled() {
            let address = bus.physical(self.core.pc());
            if debugger.address(address) {
                let event = InstructionEvent {
                    address,
                    disassembly: self.core.disassemble(&*bus),
                    context: self.core.context(),
                    extra: bus.counters(),
                };
                debugger.notify_instruction(&event);
            }
        }

        self.instructions += 1;
        self.core.instruction(bus)
    }
}

impl<C: Core> Serializable for Cpu<C> {
    fn serialize(&mut self, s: &mut Serializer) {
        self.core.serialize(s);
        s.integer(&mut self.instructions);
        s.integer(&mut self.interrupts_taken);
    }
}
