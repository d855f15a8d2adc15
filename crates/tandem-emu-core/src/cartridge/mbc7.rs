//! MBC7: ROM banking, a two-axis accelerometer and a 93LC56 serial EEPROM.
//!
//! The EEPROM's 128 sixteen-bit words live in the board's RAM region, low
//! byte first.

use super::{Mapper, Memories, Memory, OPEN_BUS};
use crate::error::LoadError;
use crate::manifest::BoardSection;
use crate::state::{Serializable, Serializer};

const ACCEL_CENTER: u16 = 0x8000;
const ACCEL_LATCH_BASE: u16 = 0x81D0;
const EEPROM_WORDS: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum EepromState {
    #[default]
    Idle,
    Command,
    Read {
        data: u16,
        remaining: u8,
    },
    Write {
        /// `None` writes every word.
        address: Option<u8>,
        data: u16,
        count: u8,
    },
    Ready,
}

#[derive(Debug, Default)]
struct Eeprom {
    select: bool,
    clock: bool,
    input: bool,
    output: bool,
    writable: bool,
    shift: u16,
    bits: u8,
    state: EepromState,
}

impl Eeprom {
    fn read_word(ram: &Memory, address: u8) -> u16 {
        let offset = (address as usize % EEPROM_WORDS) * 2;
        u16::from_le_bytes([ram.read(offset), ram.read(offset + 1)])
    }

    fn write_word(ram: &mut Memory, address: u8, word: u16) {
        let offset = (address as usize % EEPROM_WORDS) * 2;
        let [lo, hi] = word.to_le_bytes();
        ram.write(offset, lo);
        ram.write(offset + 1, hi);
    }

    fn read_io(&self) -> u8 {
        (self.select as u8) << 7 | (self.clock as u8) << 6 | (self.input as u8) << 1 | self.output as u8
    }

    fn write_io(&mut self, ram: &mut Memory, value: u8) {
        let select = value & 0x80 != 0;
        let clock = value & 0x40 != 0;
        let input = value & 0x02 != 0;

        if !select {
            self.select = false;
            self.clock = clock;
            self.input = input;
            self.state = EepromState::Idle;
            return;
        }
        if !self.select {
            self.select = true;
            self.state = EepromState::Command;
            self.shift = 0;
            self.bits = 0;
        }

        let rising = clock && !self.clock;
        self.clock = clock;
        self.input = input;
        if rising {
            self.shift_in(ram, input);
        }
    }

    fn shift_in(&mut self, ram: &mut Memory, bit: bool) {
        match self.state {
            EepromState::Idle | EepromState::Ready => {}
            EepromState::Command => {
                // Leading zeros before the start bit are ignored.
                if self.bits == 0 && !bit {
                    return;
                }
                self.shift = self.shift << 1 | bit as u16;
                self.bits += 1;
                // Start bit, two opcode bits, eight address bits.
                if self.bits == 11 {
                    let opcode = (self.shift >> 8) & 0x03;
                    let address = (self.shift & 0xFF) as u8;
                    self.execute(ram, opcode, address);
                }
            }
            EepromState::Read { data, remaining } => {
                self.output = data & 0x8000 != 0;
                self.state = if remaining > 1 {
                    EepromState::Read {
                        data: data << 1,
                        remaining: remaining - 1,
                    }
                } else {
                    EepromState::Ready
                };
            }
            EepromState::Write {
                address,
                data,
                count,
            } => {
                let data = data << 1 | bit as u16;
                if count + 1 < 16 {
                    self.state = EepromState::Write {
                        address,
                        data,
                        count: count + 1,
                    };
                    return;
                }
                if self.writable {
                    match address {
                        Some(a) => Self::write_word(ram, a, data),
                        None => (0..EEPROM_WORDS as u8).for_each(|a| Self::write_word(ram, a, data)),
                    }
                }
                self.output = true;
                self.state = EepromState::Ready;
            }
        }
    }

    fn execute(&mut self, ram: &mut Memory, opcode: u16, address: u8) {
        let word = address & 0x7F;
        self.state = EepromState::Ready;
        self.output = true;
        match opcode {
            0b10 => {
                // Dummy zero precedes the data bits.
                self.output = false;
                self.state = EepromState::Read {
                    data: Self::read_word(ram, word),
                    remaining: 16,
                };
            }
            0b01 => {
                self.state = EepromState::Write {
                    address: Some(word),
                    data: 0,
                    count: 0,
                };
            }
            0b11 => {
                if self.writable {
                    Self::write_word(ram, word, 0xFFFF);
                }
            }
            _ => match address >> 6 {
                0b11 => self.writable = true,
                0b00 => self.writable = false,
                0b10 => {
                    if self.writable {
                        (0..EEPROM_WORDS as u8).for_each(|a| Self::write_word(ram, a, 0xFFFF));
                    }
                }
                _ => {
                    self.state = EepromState::Write {
                        address: None,
                        data: 0,
                        count: 0,
                    };
                }
            },
        }
    }
}

impl Serializable for EepromState {
    fn serialize(&mut self, s: &mut Serializer) {
        let (mut tag, mut address, mut data, mut count) = match *self {
            EepromState::Idle => (0u8, 0u8, 0u16, 0u8),
            EepromState::Command => (1, 0, 0, 0),
            EepromState::Read { data, remaining } => (2, 0, data, remaining),
            EepromState::Write {
                address: Some(a),
                data,
                count,
            } => (3, a, data, count),
            EepromState::Write {
                address: None,
                data,
                count,
            } => (4, 0, data, count),
            EepromState::Ready => (5, 0, 0, 0),
        };
        s.integer(&mut tag);
        s.integer(&mut address);
        s.integer(&mut data);
        s.integer(&mut count);
        if s.is_loading() {
            *self = match tag {
                1 => EepromState::Command,
                2 => EepromState::Read {
                    data,
                    remaining: count,
                },
                3 | 4 => EepromState::Write {
                    address: (tag == 3).then_some(address),
                    data,
                    count,
                },
                5 => EepromState::Ready,
                _ => EepromState::Idle,
            };
        }
    }
}

impl Serializable for Eeprom {
    fn serialize(&mut self, s: &mut Serializer) {
        s.boolean(&mut self.select);
        s.boolean(&mut self.clock);
        s.boolean(&mut self.input);
        s.boolean(&mut self.output);
        s.boolean(&mut self.writable);
        s.integer(&mut self.shift);
        s.integer(&mut self.bits);
        self.state.serialize(s);
    }
}

#[derive(Debug, Default)]
pub struct Mbc7 {
    rom_bank: u8,
    ram_enable: bool,
    ram_select: bool,
    axis: (i16, i16),
    x: u16,
    y: u16,
    eeprom: Eeprom,
}

impl Mbc7 {
    fn registers_open(&self) -> bool {
        self.ram_enable && self.ram_select
    }
}

impl Mapper for Mbc7 {
    fn load(&mut self, board: &BoardSection, _memories: &Memories) -> Result<(), LoadError> {
        if !board.accelerometer {
            return Err(LoadError::Configuration(
                "MBC7 boards need the accelerometer feature".to_string(),
            ));
        }
        Ok(())
    }

    fn power(&mut self) {
        self.rom_bank = 1;
        self.ram_enable = false;
        self.ram_select = false;
        self.x = ACCEL_CENTER;
        self.y = ACCEL_CENTER;
        self.eeprom = Eeprom::default();
    }

    fn read(&self, memories: &Memories, address: u16) -> u8 {
        match address {
            0x0000..=0x3FFF => memories.rom.read((address & 0x3FFF) as usize),
            0x4000..=0x7FFF => memories
                .rom
                .read((self.rom_bank as usize) << 14 | (address & 0x3FFF) as usize),
            0xA000..=0xAFFF if self.registers_open() => match (address >> 4) & 0x0F {
                2 => self.x as u8,
                3 => (self.x >> 8) as u8,
                4 => self.y as u8,
                5 => (self.y >> 8) as u8,
                6 => 0x00,
                8 => self.eeprom.read_io(),
                _ => OPEN_BUS,
            },
            _ => OPEN_BUS,
        }
    }

    fn write(&mut self, memories: &mut Memories, address: u16, value: u8) {
        match address {
            0x0000..=0x1FFF => {
                self.ram_enable = value & 0x0F == 0x0A;
                if !self.ram_enable {
                    self.ram_select = false;
                }
            }
            0x2000..=0x3FFF => self.rom_bank = value & 0x7F,
            0x4000..=0x5FFF if self.ram_enable => self.ram_select = value == 0x40,
            0xA000..=0xAFFF if self.registers_open() => match (address >> 4) & 0x0F {
                0 if value == 0x55 => {
                    self.x = ACCEL_CENTER;
                    self.y = ACCEL_CENTER;
                }
                1 if value == 0xAA => {
                    self.x = ACCEL_LATCH_BASE.wrapping_add_signed(self.axis.0);
                    self.y = ACCEL_LATCH_BASE.wrapping_add_signed(self.axis.1.wrapping_neg());
                }
                8 => self.eeprom.write_io(&mut memories.ram, value),
                _ => {}
            },
            _ => {}
        }
    }

    fn bank(&self, address: u16) -> u32 {
        match address {
            0x4000..=0x7FFF => self.rom_bank as u32,
            _ => 0,
        }
    }

    fn set_accelerometer(&mut self, x: i16, y: i16) {
        self.axis = (x, y);
    }
}

impl Serializable for Mbc7 {
    fn serialize(&mut self, s: &mut Serializer) {
        s.integer(&mut self.rom_bank);
        s.boolean(&mut self.ram_enable);
        s.boolean(&mut self.ram_select);
        s.integer(&mut self.axis.0);
        s.integer(&mut self.axis.1);
        s.integer(&mut self.x);
        s.integer(&mut self.y);
        self.eeprom.serialize(s);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CS: u8 = 0x80;
    const CLK: u8 = 0x40;
    const DI: u8 = 0x02;

    fn setup() -> (Mbc7, Memories) {
        let m = Memories {
            rom: Memory::allocate(0x8000, 0),
            ram: Memory::allocate(256, 0xFF),
            rtc: Memory::default(),
        };
        let mut mbc = Mbc7::default();
        mbc.power();
        mbc.ram_enable = true;
        mbc.ram_select = true;
        (mbc, m)
    }

    fn clock_bit(mbc: &mut Mbc7, m: &mut Memories, bit: bool) -> bool {
        let di = if bit { DI } else { 0 };
        mbc.write(m, 0xA080, CS | di);
        mbc.write(m, 0xA080, CS | CLK | di);
        mbc.read(m, 0xA080) & 0x01 != 0
    }

    fn command(mbc: &mut Mbc7, m: &mut Memories, opcode: u8, address: u8) {
        mbc.write(m, 0xA080, 0x00);
        clock_bit(mbc, m, true);
        for i in (0..2).rev() {
            clock_bit(mbc, m, opcode >> i & 1 != 0);
        }
        for i in (0..8).rev() {
            clock_bit(mbc, m, address >> i & 1 != 0);
        }
    }

    #[test]
    fn eeprom_write_then_read() {
        let (mut mbc, mut m) = setup();
        command(&mut mbc, &mut m, 0b00, 0xC0);
        command(&mut mbc, &mut m, 0b01, 0x05);
        for i in (0..16).rev() {
            clock_bit(&mut mbc, &mut m, 0xBEEF >> i & 1 != 0);
        }
        assert_eq!(m.ram.read(10), 0xEF);
        assert_eq!(m.ram.read(11), 0xBE);

        command(&mut mbc, &mut m, 0b10, 0x05);
        let mut word = 0u16;
        for _ in 0..16 {
            word = word << 1 | clock_bit(&mut mbc, &mut m, false) as u16;
        }
        assert_eq!(word, 0xBEEF);
    }

    #[test]
    fn eeprom_resumes_a_read_from_saved_state() {
        let (mut mbc, mut m) = setup();
        m.ram.write(6, 0x34);
        m.ram.write(7, 0x12);
        command(&mut mbc, &mut m, 0b10, 0x03);
        let mut word = 0u16;
        for _ in 0..8 {
            word = word << 1 | clock_bit(&mut mbc, &mut m, false) as u16;
        }

        let mut s = Serializer::saving();
        mbc.serialize(&mut s);
        let bytes = s.into_bytes();
        let (mut restored, _) = setup();
        let mut s = Serializer::loading(&bytes).unwrap();
        restored.serialize(&mut s);
        s.finish().unwrap();

        for _ in 0..8 {
            word = word << 1 | clock_bit(&mut restored, &mut m, false) as u16;
        }
        assert_eq!(word, 0x1234);
    }

    #[test]
    fn writes_are_ignored_until_enabled() {
        let (mut mbc, mut m) = setup();
        command(&mut mbc, &mut m, 0b01, 0x00);
        for _ in 0..16 {
            clock_bit(&mut mbc, &mut m, false);
        }
        assert_eq!(m.ram.read(0), 0xFF);
    }

    #[test]
    fn accelerometer_latches_on_aa() {
        let (mut mbc, mut m) = setup();
        mbc.set_accelerometer(0x10, 0x20);
        assert_eq!(mbc.read(&m, 0xA020), 0x00);
        assert_eq!(mbc.read(&m, 0xA030), 0x80);
        mbc.write(&mut m, 0xA000, 0x55);
        mbc.write(&mut m, 0xA010, 0xAA);
        let x = mbc.read(&m, 0xA020) as u16 | (mbc.read(&m, 0xA030) as u16) << 8;
        let y = mbc.read(&m, 0xA040) as u16 | (mbc.read(&m, 0xA050) as u16) << 8;
        assert_eq!(x, 0x81E0);
        assert_eq!(y, 0x81B0);

        mbc.write(&mut m, 0x0000, 0x00);
        assert_eq!(mbc.read(&m, 0xA020), OPEN_BUS);
    }

    #[test]
    fn board_without_accelerometer_is_rejected() {
        let board = BoardSection {
            id: "MBC7".into(),
            accelerometer: false,
            rumble: false,
            memories: Vec::new(),
        };
        assert!(matches!(
            Mbc7::default().load(&board, &Memories::default()),
            Err(LoadError::Configuration(_))
        ));
    }
}
