//! MMM01 multi-game board.
//!
//! Out of reset the last 32 KiB of ROM (the menu) sits at `0x0000`. The menu
//! picks a base bank and then maps the board, after which the game sees an
//! MBC1-style layout relative to that base.

use super::{Mapper, Memories, OPEN_BUS};
use crate::state::{Serializable, Serializer};

const MENU_SIZE: usize = 0x8000;

#[derive(Debug, Default)]
pub struct Mmm01 {
    mapped: bool,
    base: u8,
    rom_bank: u8,
    ram_enable: bool,
    ram_bank: u8,
}

impl Mmm01 {
    fn rom_offset(&self, bank: u8, address: u16) -> usize {
        (self.base as usize + bank as usize) << 14 | (address & 0x3FFF) as usize
    }

    fn ram_offset(&self, address: u16) -> usize {
        (self.ram_bank as usize) << 13 | (address & 0x1FFF) as usize
    }
}

impl Mapper for Mmm01 {
    fn power(&mut self) {
        *self = Self {
            rom_bank: 1,
            ..Self::default()
        };
    }

    fn read(&self, memories: &Memories, address: u16) -> u8 {
        match address {
            0x0000..=0x7FFF if !self.mapped => {
                let menu = memories.rom.size().saturating_sub(MENU_SIZE);
                memories.rom.read(menu + address as usize)
            }
            0x0000..=0x3FFF => memories.rom.read(self.rom_offset(0, address)),
            0x4000..=0x7FFF => memories.rom.read(self.rom_offset(self.rom_bank, address)),
            0xA000..=0xBFFF if self.ram_enable => memories.ram.read(self.ram_offset(address)),
            _ => OPEN_BUS,
        }
    }

    fn write(&mut self, memories: &mut Memories, address: u16, value: u8) {
        match address {
            0x0000..=0x1FFF => {
                self.ram_enable = value & 0x0F == 0x0A;
                if value & 0x40 != 0 {
                    self.mapped = true;
                }
            }
            0x2000..=0x3FFF if !self.mapped => self.base = value & 0x3F,
            0x2000..=0x3FFF => {
                self.rom_bank = value & 0x1F;
                if self.rom_bank == 0 {
                    self.rom_bank = 1;
                }
            }
            0x4000..=0x5FFF => self.ram_bank = value & 0x03,
            0xA000..=0xBFFF if self.ram_enable => {
                let offset = self.ram_offset(address);
                memories.ram.write(offset, value);
            }
            _ => {}
        }
    }

    fn bank(&self, address: u16) -> u32 {
        match address {
            0x0000..=0x3FFF if self.mapped => self.base as u32,
            0x4000..=0x7FFF if self.mapped => self.base as u32 + self.rom_bank as u32,
            _ => 0,
        }
    }
}

impl Serializable for Mmm01 {
    fn serialize(&mut self, s: &mut Serializer) {
        s.boolean(&mut self.mapped);
        s.integer(&mut self.base);
        s.integer(&mut self.rom_bank);
        s.boolean(&mut self.ram_enable);
        s.integer(&mut self.ram_bank);
    }
}
