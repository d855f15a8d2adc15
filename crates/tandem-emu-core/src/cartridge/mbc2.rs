use super::{Mapper, Memories, OPEN_BUS};
use crate::state::{Serializable, Serializer};

/// 4-bit ROM banking with 512 nibbles of on-chip RAM.
#[derive(Debug, Default)]
pub struct Mbc2 {
    ram_enable: bool,
    rom_bank: u8,
}

impl Mapper for Mbc2 {
    fn power(&mut self) {
        self.ram_enable = false;
        self.rom_bank = 1;
    }

    fn read(&self, memories: &Memories, address: u16) -> u8 {
        match address {
            0x0000..=0x3FFF => memories.rom.read((address & 0x3FFF) as usize),
            0x4000..=0x7FFF => memories
                .rom
                .read((self.rom_bank as usize) << 14 | (address & 0x3FFF) as usize),
            0xA000..=0xBFFF if self.ram_enable => {
                0xF0 | memories.ram.read((address & 0x01FF) as usize) & 0x0F
            }
            _ => OPEN_BUS,
        }
    }

    fn write(&mut self, memories: &mut Memories, address: u16, value: u8) {
        match address {
            // Address bit 8 picks the register.
            0x0000..=0x3FFF if address & 0x0100 == 0 => {
                self.ram_enable = value & 0x0F == 0x0A;
            }
            0x0000..=0x3FFF => {
                self.rom_bank = value & 0x0F;
                if self.rom_bank == 0 {
                    self.rom_bank = 1;
                }
            }
            0xA000..=0xBFFF if self.ram_enable => {
                memories
                    .ram
                    .write((address & 0x01FF) as usize, value & 0x0F);
            }
            _ => {}
        }
    }

    fn bank(&self, address: u16) -> u32 {
        match address {
            0x4000..=0x7FFF => self.rom_bank as u32,
            _ => 0,
        }
    }
}

impl Serializable for Mbc2 {
    fn serialize(&mut self, s: &mut Serializer) {
        s.boolean(&mut self.ram_enable);
        s.integer(&mut self.rom_bank);
    }
}
