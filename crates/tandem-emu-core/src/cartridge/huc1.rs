use super::{Mapper, Memories, OPEN_BUS};
use crate::state::{Serializable, Serializer};

/// Reading the RAM window in IR mode: no light received.
const IR_IDLE: u8 = 0xC0;

#[derive(Debug, Default)]
pub struct Huc1 {
    ir_mode: bool,
    ram_writable: bool,
    rom_bank: u8,
    ram_bank: u8,
    ir_led: bool,
}

impl Huc1 {
    fn ram_offset(&self, address: u16) -> usize {
        (self.ram_bank as usize) << 13 | (address & 0x1FFF) as usize
    }
}

impl Mapper for Huc1 {
    fn power(&mut self) {
        *self = Self {
            rom_bank: 1,
            ..Self::default()
        };
    }

    fn read(&self, memories: &Memories, address: u16) -> u8 {
        match address {
            0x0000..=0x3FFF => memories.rom.read((address & 0x3FFF) as usize),
            0x4000..=0x7FFF => memories
                .rom
                .read((self.rom_bank as usize) << 14 | (address & 0x3FFF) as usize),
            0xA000..=0xBFFF if self.ir_mode => IR_IDLE,
            0xA000..=0xBFFF => memories.ram.read(self.ram_offset(address)),
            _ => OPEN_BUS,
        }
    }

    fn write(&mut self, memories: &mut Memories, address: u16, value: u8) {
        match address {
            0x0000..=0x1FFF => {
                self.ir_mode = value & 0x0F == 0x0E;
                self.ram_writable = value & 0x0F == 0x0A;
            }
            0x2000..=0x3FFF => {
                self.rom_bank = value & 0x3F;
                if self.rom_bank == 0 {
                    self.rom_bank = 1;
                }
            }
            0x4000..=0x5FFF => self.ram_bank = value & 0x03,
            0xA000..=0xBFFF if self.ir_mode => self.ir_led = value & 0x01 != 0,
            0xA000..=0xBFFF if self.ram_writable => {
                memories.ram.write(self.ram_offset(address), value);
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

    fn ir_led(&self) -> bool {
        self.ir_led
    }
}

impl Serializable for Huc1 {
    fn serialize(&mut self, s: &mut Serializer) {
        s.boolean(&mut self.ir_mode);
        s.boolean(&mut self.ram_writable);
        s.integer(&mut self.rom_bank);
        s.integer(&mut self.ram_bank);
        s.boolean(&mut self.ir_led);
    }
}
