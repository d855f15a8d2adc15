use super::{Mapper, Memories, OPEN_BUS};
use crate::state::{Serializable, Serializer};

/// No banking: 32 KiB of ROM and an optional RAM window.
#[derive(Debug, Default)]
pub struct Mbc0;

impl Mapper for Mbc0 {
    fn power(&mut self) {}

    fn read(&self, memories: &Memories, address: u16) -> u8 {
        match address {
            0x0000..=0x7FFF => memories.rom.read((address & 0x7FFF) as usize),
            0xA000..=0xBFFF => memories.ram.read((address & 0x1FFF) as usize),
            _ => OPEN_BUS,
        }
    }

    fn write(&mut self, memories: &mut Memories, address: u16, value: u8) {
        if let 0xA000..=0xBFFF = address {
            memories.ram.write((address & 0x1FFF) as usize, value);
        }
    }
}

impl Serializable for Mbc0 {
    fn serialize(&mut self, _s: &mut Serializer) {}
}
