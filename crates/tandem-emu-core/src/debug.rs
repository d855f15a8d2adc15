//! Opt-in debug notifications.
//!
//! Both channels are off by default. Callers check
//! [`Debugger::instruction_enabled`] / [`Debugger::interrupt_enabled`] before
//! building an event so a disabled channel costs a branch and nothing else.

use std::fmt;
use std::ops::RangeInclusive;

use log::trace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionEvent {
    /// Bank register combined with the low address bits.
    pub address: u32,
    pub disassembly: String,
    /// Register dump.
    pub context: String,
    /// Peripheral timing counters.
    pub extra: Vec<String>,
}

impl fmt::Display for InstructionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06X}  {:<16} {}", self.address, self.disassembly, self.context)?;
        if !self.extra.is_empty() {
            write!(f, "  {}", self.extra.join(" "))?;
        }
        Ok(())
    }
}

/// Receiver for debug notifications.
pub trait DebugSink {
    fn instruction(&mut self, event: &InstructionEvent);

    fn interrupt(&mut self, name: &'static str);
}

/// Forwards every notification to `log::trace!`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DebugSink for LogSink {
    fn instruction(&mut self, event: &InstructionEvent) {
        trace!(target: "tandem::cpu", "{event}");
    }

    fn interrupt(&mut self, name: &'static str) {
        trace!(target: "tandem::cpu", "interrupt {name}");
    }
}

#[derive(Default)]
pub struct Debugger {
    sink: Option<Box<dyn DebugSink>>,
    instructions: bool,
    interrupts: bool,
    filter: Option<RangeInclusive<u32>>,
}

impl fmt::Debug for Debugger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Debugger")
            .field("attached", &self.sink.is_some())
            .field("instructions", &self.instructions)
            .field("interrupts", &self.interrupts)
            .field("filter", &self.filter)
            .finish()
    }
}

impl Debugger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, sink: Box<dyn DebugSink>) {
        self.sink = Some(sink);
    }

    pub fn detach(&mut self) -> Option<Box<dyn DebugSink>> {
        self.sink.take()
    }

    pub fn set_instruction_enabled(&mut self, enabled: bool) {
        self.instructions = enabled;
    }

    pub fn set_interrupt_enabled(&mut self, enabled: bool) {
        self.interrupts = enabled;
    }

    /// Only report instructions whose physical address falls in `range`.
    pub fn set_address_filter(&mut self, range: Option<RangeInclusive<u32>>) {
        self.filter = range;
    }

    #[inline]
    pub fn instruction_enabled(&self) -> bool {
        self.instructions && self.sink.is_some()
    }

    #[inline]
    pub fn interrupt_enabled(&self) -> bool {
        self.interrupts && self.sink.is_some()
    }

    pub fn address(&self, address: u32) -> bool {
        self.filter
            .as_ref()
            .is_none_or(|range| range.contains(&address))
    }

    pub fn notify_instruction(&mut self, event: &InstructionEvent) {
        if let Some(sink) = self.sink.as_mut() {
            sink.instruction(event);
        }
    }

    pub fn notify_interrupt(&mut self, name: &'static str) {
        if let Some(sink) = self.sink.as_mut() {
            sink.interrupt(name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default, Clone)]
    struct Shared(Rc<RefCell<Vec<String>>>);

    impl DebugSink for Shared {
        fn instruction(&mut self, event: &InstructionEvent) {
            self.0.borrow_mut().push(event.disassembly.clone());
        }

        fn interrupt(&mut self, name: &'static str) {
            self.0.borrow_mut().push(name.to_string());
        }
    }

    #[test]
    fn channels_require_a_sink() {
        let mut dbg = Debugger::new();
        dbg.set_instruction_enabled(true);
        dbg.set_interrupt_enabled(true);
        assert!(!dbg.instruction_enabled());
        assert!(!dbg.interrupt_enabled());

        let shared = Shared::default();
        dbg.attach(Box::new(shared.clone()));
        assert!(dbg.instruction_enabled());
        dbg.notify_interrupt("TIQ");
        assert_eq!(shared.0.borrow().as_slice(), ["TIQ"]);
    }

    #[test]
    fn address_filter_limits_instruction_events() {
        let mut dbg = Debugger::new();
        assert!(dbg.address(0x12_3456));
        dbg.set_address_filter(Some(0x01_0000..=0x01_3FFF));
        assert!(dbg.address(0x01_0100));
        assert!(!dbg.address(0x00_0100));
    }

    #[test]
    fn event_display_includes_counters() {
        let event = InstructionEvent {
            address: 0x01_4000,
            disassembly: "nop".into(),
            context: "A:00".into(),
            extra: vec!["V:001".into(), "H:0004".into()],
        };
        let line = event.to_string();
        assert!(line.starts_with("014000"));
        assert!(line.ends_with("V:001 H:0004"));
    }
}
