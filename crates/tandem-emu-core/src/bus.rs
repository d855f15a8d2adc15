//! Address-to-handler dispatch table.
//!
//! The table holds a small handler tag per address (a machine-defined enum),
//! not the components themselves. Components live in the machine's device set
//! and are looked up through [`Devices`] when an access is routed.

/// Value returned for reads that hit no registered handler.
pub const UNMAPPED: u8 = 0xFF;

/// Widest address space the table will allocate.
pub const MAX_WIDTH: u32 = 24;

/// Port capability implemented by every bus-mapped component.
pub trait Io {
    /// Side-effect-free read used by debug tooling.
    fn peek(&self, address: u32) -> u8;

    fn read(&mut self, address: u32) -> u8 {
        self.peek(address)
    }

    fn write(&mut self, address: u32, value: u8);
}

/// Resolves handler tags to the components that own them.
pub trait Devices<H> {
    fn device(&mut self, handler: H) -> &mut dyn Io;

    fn device_ref(&self, handler: H) -> &dyn Io;
}

#[derive(Debug, Clone)]
pub struct Bus<H> {
    width: u32,
    table: Vec<Option<H>>,
}

impl<H: Copy> Bus<H> {
    /// Create an empty table covering `width` address bits (clamped to
    /// [`MAX_WIDTH`]).
    pub fn new(width: u32) -> Self {
        let width = width.clamp(1, MAX_WIDTH);
        Self {
            width,
            table: vec![None; 1 << width],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    fn index(&self, address: u32) -> usize {
        (address as usize) & (self.table.len() - 1)
    }

    /// Claim every address yielded by `addresses` for `handler`. Later
    /// registrations replace earlier ones.
    pub fn register<I>(&mut self, addresses: I, handler: H)
    where
        I: IntoIterator<Item = u32>,
    {
        for address in addresses {
            let idx = self.index(address);
            self.table[idx] = Some(handler);
        }
    }

    pub fn unregister<I>(&mut self, addresses: I)
    where
        I: IntoIterator<Item = u32>,
    {
        for address in addresses {
            let idx = self.index(address);
            self.table[idx] = None;
        }
    }

    pub fn clear(&mut self) {
        self.table.fill(None);
    }

    pub fn handler(&self, address: u32) -> Option<H> {
        self.table[self.index(address)]
    }

    pub fn mapped(&self, address: u32) -> bool {
        self.handler(address).is_some()
    }

    pub fn read<D>(&self, devices: &mut D, address: u32) -> u8
    where
        D: Devices<H> + ?Sized,
    {
        match self.handler(address) {
            Some(handler) => devices.device(handler).read(address),
            None => UNMAPPED,
        }
    }

    pub fn peek<D>(&self, devices: &D, address: u32) -> u8
    where
        D: Devices<H> + ?Sized,
    {
        match self.handler(address) {
            Some(handler) => devices.device_ref(handler).peek(address),
            None => UNMAPPED,
        }
    }

    pub fn write<D>(&self, devices: &mut D, address: u32, value: u8)
    where
        D: Devices<H> + ?Sized,
    {
        if let Some(handler) = self.handler(address) {
            devices.device(handler).write(address, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Tag {
        Low,
        High,
    }

    #[derive(Default)]
    struct Cells {
        low: Cell,
        high: Cell,
    }

    #[derive(Default)]
    struct Cell {
        value: u8,
        reads: u32,
    }

    impl Io for Cell {
        fn peek(&self, _address: u32) -> u8 {
            self.value
        }

        fn read(&mut self, address: u32) -> u8 {
            self.reads += 1;
            self.peek(address)
        }

        fn write(&mut self, _address: u32, value: u8) {
            self.value = value;
        }
    }

    impl Devices<Tag> for Cells {
        fn device(&mut self, handler: Tag) -> &mut dyn Io {
            match handler {
                Tag::Low => &mut self.low,
                Tag::High => &mut self.high,
            }
        }

        fn device_ref(&self, handler: Tag) -> &dyn Io {
            match handler {
                Tag::Low => &self.low,
                Tag::High => &self.high,
            }
        }
    }

    #[test]
    fn unmapped_reads_sentinel_and_ignores_writes() {
        let mut bus = Bus::<Tag>::new(16);
        bus.register(0x0000..=0x00FF, Tag::Low);
        let mut cells = Cells::default();

        assert_eq!(bus.read(&mut cells, 0x1234), UNMAPPED);
        bus.write(&mut cells, 0x1234, 0x55);
        assert_eq!(cells.low.value, 0);
        assert_eq!(cells.high.value, 0);
        assert_eq!(cells.low.reads, 0);
    }

    #[test]
    fn last_registration_wins() {
        let mut bus = Bus::new(16);
        bus.register(0x0000..=0x0FFF, Tag::Low);
        bus.register([0x0800, 0x0801], Tag::High);
        assert_eq!(bus.handler(0x07FF), Some(Tag::Low));
        assert_eq!(bus.handler(0x0800), Some(Tag::High));
        assert_eq!(bus.handler(0x0802), Some(Tag::Low));

        bus.unregister([0x0801]);
        assert_eq!(bus.handler(0x0801), None);
    }

    #[test]
    fn addresses_mirror_above_width() {
        let mut bus = Bus::new(16);
        bus.register([0x0010], Tag::High);
        let mut cells = Cells::default();
        bus.write(&mut cells, 0x1_0010, 0x42);
        assert_eq!(bus.read(&mut cells, 0x0010), 0x42);
    }

    #[test]
    fn peek_has_no_side_effects() {
        let mut bus = Bus::new(8);
        bus.register(0..=0xFF, Tag::Low);
        let mut cells = Cells::default();
        cells.low.value = 7;
        assert_eq!(bus.peek(&cells, 3), 7);
        assert_eq!(cells.low.reads, 0);
        assert_eq!(bus.read(&mut cells, 3), 7);
        assert_eq!(cells.low.reads, 1);
    }
}
