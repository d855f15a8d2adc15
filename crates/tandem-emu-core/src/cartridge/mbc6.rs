//! MBC6: two independently banked 8 KiB ROM windows and two 4 KiB RAM
//! windows.
//!
//! The board's flash chip is not fitted here; a window switched over to
//! flash reads open bus and ignores writes.

use super::{Mapper, Memories, OPEN_BUS};
use crate::state::{Serializable, Serializer};

/// Value written to a flash select register that maps flash into a window.
const FLASH_SELECT: u8 = 0x08;

#[derive(Debug, Default)]
pub struct Mbc6 {
    ram_enable: bool,
    /// 4 KiB banks at `0xA000` and `0xB000`.
    ram_bank: [u8; 2],
    /// 8 KiB banks at `0x4000` and `0x6000`.
    rom_bank: [u8; 2],
    flash: [bool; 2],
}

impl Mbc6 {
    fn rom_window(address: u16) -> usize {
        ((address >> 13) & 1) as usize
    }

    fn ram_offset(&self, address: u16) -> usize {
        let window = ((address >> 12) & 1) as usize;
        (self.ram_bank[window] as usize) << 12 | (address & 0x0FFF) as usize
    }
}

impl Mapper for Mbc6 {
    fn power(&mut self) {
        *self = Self {
            rom_bank: [2, 3],
            ..Self::default()
        };
    }

    fn read(&self, memories: &Memories, address: u16) -> u8 {
        match address {
            0x0000..=0x3FFF => memories.rom.read((address & 0x3FFF) as usize),
            0x4000..=0x7FFF => {
                let window = Self::rom_window(address);
                if self.flash[window] {
                    return OPEN_BUS;
                }
                memories
                    .rom
                    .read((self.rom_bank[window] as usize) << 13 | (address & 0x1FFF) as usize)
            }
            0xA000..=0xBFFF if self.ram_enable => memories.ram.read(self.ram_offset(address)),
            _ => OPEN_BUS,
        }
    }

    fn write(&mut self, memories: &mut Memories, address: u16, value: u8) {
        match address {
            0x0000..=0x03FF => self.ram_enable = value & 0x0F == 0x0A,
            0x0400..=0x07FF => self.ram_bank[0] = value,
            0x0800..=0x0BFF => self.ram_bank[1] = value,
            0x2000..=0x27FF => self.rom_bank[0] = value,
            0x2800..=0x2FFF => self.flash[0] = value == FLASH_SELECT,
            0x3000..=0x37FF => self.rom_bank[1] = value,
            0x3800..=0x3FFF => self.flash[1] = value == FLASH_SELECT,
            0xA000..=0xBFFF if self.ram_enable => {
                let offset = self.ram_offset(address);
                memories.ram.write(offset, value);
            }
            _ => {}
        }
    }

    /// Banks are reported in 8 KiB units.
    fn bank(&self, address: u16) -> u32 {
        match address {
            0x4000..=0x7FFF => self.rom_bank[Self::rom_window(address)] as u32,
            0xA000..=0xBFFF => self.ram_bank[((address >> 12) & 1) as usize] as u32,
            _ => 0,
        }
    }
}

impl Serializable for Mbc6 {
    fn serialize(&mut self, s: &mut Serializer) {
        s.boolean(&mut self.ram_enable);
        s.bytes(&mut self.ram_bank);
        s.bytes(&mut self.rom_bank);
        s.boolean(&mut self.flash[0]);
        s.boolean(&mut self.flash[1]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::Memory;

    fn memories() -> Memories {
        let mut rom = Memory::allocate(0x10000, 0);
        for bank in 0..8 {
            rom.write(bank << 13, bank as u8);
        }
        Memories {
            rom,
            ram: Memory::allocate(0x8000, 0),
            rtc: Memory::default(),
        }
    }

    #[test]
    fn rom_windows_bank_independently() {
        let mut m = memories();
        let mut mbc = Mbc6::default();
        mbc.power();
        assert_eq!(mbc.read(&m, 0x4000), 2);
        assert_eq!(mbc.read(&m, 0x6000), 3);

        mbc.write(&mut m, 0x2000, 7);
        mbc.write(&mut m, 0x3000, 5);
        assert_eq!(mbc.read(&m, 0x4000), 7);
        assert_eq!(mbc.read(&m, 0x6000), 5);
        assert_eq!(mbc.bank(0x6000), 5);

        mbc.write(&mut m, 0x2800, FLASH_SELECT);
        assert_eq!(mbc.read(&m, 0x4000), OPEN_BUS);
        assert_eq!(mbc.read(&m, 0x6000), 5);
        mbc.write(&mut m, 0x2800, 0x00);
        assert_eq!(mbc.read(&m, 0x4000), 7);
    }

    #[test]
    fn ram_windows_bank_independently() {
        let mut m = memories();
        let mut mbc = Mbc6::default();
        mbc.power();
        mbc.write(&mut m, 0xA000, 0x11);
        assert_eq!(m.ram.read(0), 0);

        mbc.write(&mut m, 0x0000, 0x0A);
        mbc.write(&mut m, 0x0400, 2);
        mbc.write(&mut m, 0x0800, 5);
        mbc.write(&mut m, 0xA010, 0x11);
        mbc.write(&mut m, 0xB010, 0x22);
        assert_eq!(m.ram.read(0x2010), 0x11);
        assert_eq!(m.ram.read(0x5010), 0x22);
        assert_eq!(mbc.read(&m, 0xB010), 0x22);
    }
}
