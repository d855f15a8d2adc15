/// Byte-addressed cartridge storage.
///
/// Offsets past the end wrap around modulo the size, so a mapper can combine
/// bank registers with address bits without knowing how big the chip is. An
/// empty region reads back as [`OPEN_BUS`] and ignores writes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Memory {
    data: Vec<u8>,
}

pub const OPEN_BUS: u8 = 0xFF;

impl Memory {
    pub fn allocate(size: usize, fill: u8) -> Self {
        Self {
            data: vec![fill; size],
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn read(&self, offset: usize) -> u8 {
        if self.data.is_empty() {
            return OPEN_BUS;
        }
        self.data[offset % self.data.len()]
    }

    #[inline]
    pub fn write(&mut self, offset: usize, value: u8) {
        if self.data.is_empty() {
            return;
        }
        let len = self.data.len();
        self.data[offset % len] = value;
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

/// The three regions a board can declare.
#[derive(Debug, Clone, Default)]
pub struct Memories {
    pub rom: Memory,
    pub ram: Memory,
    pub rtc: Memory,
}
