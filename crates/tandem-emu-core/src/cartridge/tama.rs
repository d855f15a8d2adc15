//! TAMA5: every register is reached through a nibble-wide port at `0xA000`.
//!
//! Writing `0xA001` selects a register; writing `0xA000` stores a nibble in
//! it. Registers 0 and 1 hold the ROM bank. Registers 4 to 7 form a command:
//! a data byte, an operation and a 5-bit address. Storing register 7 runs it
//! against the 32-byte RAM or the clock.

use log::debug;

use super::{Mapper, Memories, OPEN_BUS, require_rtc_size};
use crate::error::LoadError;
use crate::manifest::BoardSection;
use crate::state::{Serializable, Serializer};

const CLOCK_MAGIC: &[u8; 4] = b"TAM5";

/// Bytes needed in the RTC region to persist the clock.
pub const CLOCK_STATE_SIZE: usize = 4 + 3 + 2;

const REGISTERS: usize = 8;

const SELECT_READY: u8 = 0x0A;
const SELECT_OUTPUT_LOW: u8 = 0x0C;
const SELECT_OUTPUT_HIGH: u8 = 0x0D;

const OP_RAM_WRITE: u8 = 0;
const OP_RAM_READ: u8 = 1;
const OP_CLOCK_READ: u8 = 2;
const OP_CLOCK_WRITE: u8 = 3;

fn to_bcd(value: u8) -> u8 {
    (value / 10) << 4 | value % 10
}

fn from_bcd(value: u8) -> u8 {
    (value >> 4) * 10 + (value & 0x0F)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Clock {
    seconds: u8,
    minutes: u8,
    hours: u8,
    days: u16,
}

impl Clock {
    fn tick(&mut self) {
        self.seconds += 1;
        if self.seconds < 60 {
            return;
        }
        self.seconds = 0;
        self.minutes += 1;
        if self.minutes < 60 {
            return;
        }
        self.minutes = 0;
        self.hours += 1;
        if self.hours < 24 {
            return;
        }
        self.hours = 0;
        self.days = self.days.wrapping_add(1);
    }

    /// Clock register `index`; time fields are BCD.
    fn register(&self, index: u8) -> u8 {
        match index {
            0 => to_bcd(self.seconds),
            1 => to_bcd(self.minutes),
            2 => to_bcd(self.hours),
            3 => self.days as u8,
            4 => (self.days >> 8) as u8,
            _ => OPEN_BUS,
        }
    }

    fn set_register(&mut self, index: u8, value: u8) {
        match index {
            0 => self.seconds = from_bcd(value) % 60,
            1 => self.minutes = from_bcd(value) % 60,
            2 => self.hours = from_bcd(value) % 24,
            3 => self.days = (self.days & 0xFF00) | value as u16,
            4 => self.days = (self.days & 0x00FF) | (value as u16) << 8,
            _ => {}
        }
    }

    fn encode(&self, out: &mut [u8]) {
        out[..4].copy_from_slice(CLOCK_MAGIC);
        out[4] = self.seconds;
        out[5] = self.minutes;
        out[6] = self.hours;
        out[7..9].copy_from_slice(&self.days.to_le_bytes());
    }

    fn decode(data: &[u8]) -> Option<Self> {
        if data.len() < CLOCK_STATE_SIZE || &data[..4] != CLOCK_MAGIC {
            return None;
        }
        Some(Self {
            seconds: data[4] % 60,
            minutes: data[5] % 60,
            hours: data[6] % 24,
            days: u16::from_le_bytes([data[7], data[8]]),
        })
    }
}

#[derive(Debug, Default)]
pub struct Tama {
    select: u8,
    registers: [u8; REGISTERS],
    output: u8,
    clock: Clock,
}

impl Tama {
    fn rom_bank(&self) -> u8 {
        (self.registers[1] & 0x01) << 4 | self.registers[0]
    }

    fn execute(&mut self, memories: &mut Memories) {
        let address = (self.registers[6] & 0x01) << 4 | self.registers[7];
        let data = self.registers[5] << 4 | self.registers[4];
        match self.registers[6] >> 1 {
            OP_RAM_WRITE => memories.ram.write(address as usize, data),
            OP_RAM_READ => self.output = memories.ram.read(address as usize),
            OP_CLOCK_READ => self.output = self.clock.register(address),
            OP_CLOCK_WRITE => self.clock.set_register(address, data),
            op => debug!("TAMA5: unhandled operation {op}"),
        }
    }
}

impl Mapper for Tama {
    fn load(&mut self, board: &BoardSection, memories: &Memories) -> Result<(), LoadError> {
        require_rtc_size(board, &memories.rtc, CLOCK_STATE_SIZE)?;
        self.clock = Clock::decode(memories.rtc.as_slice()).unwrap_or_default();
        Ok(())
    }

    fn save(&mut self, memories: &mut Memories) {
        if memories.rtc.size() >= CLOCK_STATE_SIZE {
            self.clock.encode(memories.rtc.as_mut_slice());
        }
    }

    fn power(&mut self) {
        *self = Self {
            clock: self.clock,
            ..Self::default()
        };
    }

    fn read(&self, memories: &Memories, address: u16) -> u8 {
        match address {
            0x0000..=0x3FFF => memories.rom.read((address & 0x3FFF) as usize),
            0x4000..=0x7FFF => memories
                .rom
                .read((self.rom_bank() as usize) << 14 | (address & 0x3FFF) as usize),
            0xA000 => match self.select {
                SELECT_READY => 0xF1,
                SELECT_OUTPUT_LOW => 0xF0 | (self.output & 0x0F),
                SELECT_OUTPUT_HIGH => 0xF0 | self.output >> 4,
                _ => OPEN_BUS,
            },
            _ => OPEN_BUS,
        }
    }

    fn write(&mut self, memories: &mut Memories, address: u16, value: u8) {
        match address {
            0xA001 => self.select = value & 0x0F,
            0xA000 => {
                let index = self.select as usize;
                if index < REGISTERS {
                    self.registers[index] = value & 0x0F;
                }
                if index == REGISTERS - 1 {
                    self.execute(memories);
                }
            }
            _ => {}
        }
    }

    fn second(&mut self) {
        self.clock.tick();
    }

    fn bank(&self, address: u16) -> u32 {
        match address {
            0x4000..=0x7FFF => self.rom_bank() as u32,
            _ => 0,
        }
    }
}

impl Serializable for Tama {
    fn serialize(&mut self, s: &mut Serializer) {
        s.integer(&mut self.select);
        s.bytes(&mut self.registers);
        s.integer(&mut self.output);
        s.integer(&mut self.clock.seconds);
        s.integer(&mut self.clock.minutes);
        s.integer(&mut self.clock.hours);
        s.integer(&mut self.clock.days);
    }
}
