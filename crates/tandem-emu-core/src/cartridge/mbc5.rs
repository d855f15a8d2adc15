use super::{Mapper, Memories, OPEN_BUS};
use crate::error::LoadError;
use crate::manifest::BoardSection;
use crate::state::{Serializable, Serializer};

#[derive(Debug, Default)]
pub struct Mbc5 {
    ram_enable: bool,
    rom_bank: u16,
    ram_bank: u8,
    rumble: bool,
    motor: bool,
}

impl Mapper for Mbc5 {
    fn load(&mut self, board: &BoardSection, _memories: &Memories) -> Result<(), LoadError> {
        self.rumble = board.rumble;
        Ok(())
    }

    fn power(&mut self) {
        self.ram_enable = false;
        self.rom_bank = 1;
        self.ram_bank = 0;
        self.motor = false;
    }

    fn read(&self, memories: &Memories, address: u16) -> u8 {
        match address {
            0x0000..=0x3FFF => memories.rom.read((address & 0x3FFF) as usize),
            0x4000..=0x7FFF => memories
                .rom
                .read((self.rom_bank as usize) << 14 | (address & 0x3FFF) as usize),
            0xA000..=0xBFFF if self.ram_enable => memories
                .ram
                .read((self.ram_bank as usize) << 13 | (address & 0x1FFF) as usize),
            _ => OPEN_BUS,
        }
    }

    fn write(&mut self, memories: &mut Memories, address: u16, value: u8) {
        match address {
            0x0000..=0x1FFF => self.ram_enable = value & 0x0F == 0x0A,
            0x2000..=0x2FFF => self.rom_bank = (self.rom_bank & 0x100) | value as u16,
            0x3000..=0x3FFF => {
                self.rom_bank = (self.rom_bank & 0x0FF) | ((value & 0x01) as u16) << 8;
            }
            0x4000..=0x5FFF => {
                if self.rumble {
                    self.motor = value & 0x08 != 0;
                    self.ram_bank = value & 0x07;
                } else {
                    self.ram_bank = value & 0x0F;
                }
            }
            0xA000..=0xBFFF if self.ram_enable => memories.ram.write(
                (self.ram_bank as usize) << 13 | (address & 0x1FFF) as usize,
                value,
            ),
            _ => {}
        }
    }

    fn bank(&self, address: u16) -> u32 {
        match address {
            0x4000..=0x7FFF => self.rom_bank as u32,
            _ => 0,
        }
    }

    fn rumble(&self) -> bool {
        self.motor
    }
}

impl Serializable for Mbc5 {
    fn serialize(&mut self, s: &mut Serializer) {
        s.boolean(&mut self.ram_enable);
        s.integer(&mut self.rom_bank);
        s.integer(&mut self.ram_bank);
        s.boolean(&mut self.motor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::Memory;

    fn board(rumble: bool) -> BoardSection {
        BoardSection {
            id: "MBC5".into(),
            accelerometer: false,
            rumble,
            memories: Vec::new(),
        }
    }

    #[test]
    fn nine_bit_bank_and_bank_zero() {
        let mut rom = Memory::allocate(512 * 0x4000, 0);
        rom.write(0x1FF * 0x4000, 0x77);
        rom.write(0x4000, 0x11);
        let mut m = Memories {
            rom,
            ..Memories::default()
        };
        let mut mbc = Mbc5::default();
        mbc.load(&board(false), &m).unwrap();
        mbc.power();
        assert_eq!(mbc.read(&m, 0x4000), 0x11);

        mbc.write(&mut m, 0x2000, 0xFF);
        mbc.write(&mut m, 0x3000, 0x01);
        assert_eq!(mbc.read(&m, 0x4000), 0x77);

        mbc.write(&mut m, 0x3000, 0x00);
        mbc.write(&mut m, 0x2000, 0x00);
        assert_eq!(mbc.bank(0x4000), 0);
        assert_eq!(mbc.read(&m, 0x4000), 0x00);
    }

    #[test]
    fn rumble_bit_drives_the_motor_not_the_bank() {
        let mut m = Memories {
            rom: Memory::allocate(0x8000, 0),
            ram: Memory::allocate(0x20000, 0),
            rtc: Memory::default(),
        };
        let mut mbc = Mbc5::default();
        mbc.load(&board(true), &m).unwrap();
        mbc.power();
        mbc.write(&mut m, 0x0000, 0x0A);
        mbc.write(&mut m, 0x4000, 0x09);
        assert!(mbc.rumble());
        mbc.write(&mut m, 0xA000, 0x42);
        assert_eq!(m.ram.read(0x2000), 0x42);

        let mut plain = Mbc5::default();
        plain.load(&board(false), &m).unwrap();
        plain.power();
        plain.write(&mut m, 0x4000, 0x09);
        assert!(!plain.rumble());
        assert_eq!(plain.ram_bank, 9);
    }
}
