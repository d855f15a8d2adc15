use super::{Mapper, Memories, OPEN_BUS};
use crate::state::{Serializable, Serializer};

/// MBC1 wired for multicarts: the secondary register selects 256 KiB games,
/// so it sits one bit lower than on a plain MBC1.
#[derive(Debug, Default)]
pub struct Mbc1m {
    ram_enable: bool,
    rom_bank: u8,
    upper: u8,
    mode: bool,
}

impl Mbc1m {
    fn low_bank(&self) -> u32 {
        if self.mode { (self.upper as u32) << 4 } else { 0 }
    }

    fn high_bank(&self) -> u32 {
        let mut low = self.rom_bank & 0x0F;
        if self.rom_bank & 0x1F == 0 {
            low = 1;
        }
        (self.upper as u32) << 4 | low as u32
    }
}

impl Mapper for Mbc1m {
    fn power(&mut self) {
        *self = Self {
            rom_bank: 1,
            ..Self::default()
        };
    }

    fn read(&self, memories: &Memories, address: u16) -> u8 {
        match address {
            0x0000..=0x3FFF => memories
                .rom
                .read((self.low_bank() as usize) << 14 | (address & 0x3FFF) as usize),
            0x4000..=0x7FFF => memories
                .rom
                .read((self.high_bank() as usize) << 14 | (address & 0x3FFF) as usize),
            0xA000..=0xBFFF if self.ram_enable => {
                memories.ram.read((address & 0x1FFF) as usize)
            }
            _ => OPEN_BUS,
        }
    }

    fn write(&mut self, memories: &mut Memories, address: u16, value: u8) {
        match address {
            0x0000..=0x1FFF => self.ram_enable = value & 0x0F == 0x0A,
            0x2000..=0x3FFF => self.rom_bank = value & 0x1F,
            0x4000..=0x5FFF => self.upper = value & 0x03,
            0x6000..=0x7FFF => self.mode = value & 0x01 != 0,
            0xA000..=0xBFFF if self.ram_enable => {
                memories.ram.write((address & 0x1FFF) as usize, value);
            }
            _ => {}
        }
    }

    fn bank(&self, address: u16) -> u32 {
        match address {
            0x0000..=0x3FFF => self.low_bank(),
            0x4000..=0x7FFF => self.high_bank(),
            _ => 0,
        }
    }
}

impl Serializable for Mbc1m {
    fn serialize(&mut self, s: &mut Serializer) {
        s.boolean(&mut self.ram_enable);
        s.integer(&mut self.rom_bank);
        s.integer(&mut self.upper);
        s.boolean(&mut self.mode);
    }
}
