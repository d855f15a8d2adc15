//! HuC3: ROM and RAM banking, an infrared port and a command-driven clock.
//!
//! The register at `0x0000` picks what the `0xA000` window talks to. In
//! command mode each write is one 4-bit command plus a 4-bit argument; the
//! clock is reached through a small nibble scratchpad addressed by an index.

use log::debug;

use super::{Mapper, Memories, OPEN_BUS, require_rtc_size};
use crate::error::LoadError;
use crate::manifest::BoardSection;
use crate::state::{Serializable, Serializer};

const CLOCK_MAGIC: &[u8; 4] = b"HUC3";

/// Bytes needed in the RTC region to persist the clock.
pub const CLOCK_STATE_SIZE: usize = 4 + 1 + 2 + 2;

const MINUTES_PER_DAY: u16 = 24 * 60;

/// Reading the window in IR mode: no light received.
const IR_IDLE: u8 = 0xC0;

const MODE_RAM_READ: u8 = 0x00;
const MODE_RAM: u8 = 0x0A;
const MODE_COMMAND: u8 = 0x0B;
const MODE_RESPONSE: u8 = 0x0C;
const MODE_SEMAPHORE: u8 = 0x0D;
const MODE_IR: u8 = 0x0E;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Clock {
    seconds: u8,
    minutes: u16,
    /// 12 bits.
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
        if self.minutes >= MINUTES_PER_DAY {
            self.minutes = 0;
            self.days = (self.days + 1) & 0x0FFF;
        }
    }

    fn encode(&self, out: &mut [u8]) {
        out[..4].copy_from_slice(CLOCK_MAGIC);
        out[4] = self.seconds;
        out[5..7].copy_from_slice(&self.minutes.to_le_bytes());
        out[7..9].copy_from_slice(&self.days.to_le_bytes());
    }

    fn decode(data: &[u8]) -> Option<Self> {
        if data.len() < CLOCK_STATE_SIZE || &data[..4] != CLOCK_MAGIC {
            return None;
        }
        Some(Self {
            seconds: data[4] % 60,
            minutes: u16::from_le_bytes([data[5], data[6]]) % MINUTES_PER_DAY,
            days: u16::from_le_bytes([data[7], data[8]]) & 0x0FFF,
        })
    }
}

#[derive(Debug, Default)]
pub struct Huc3 {
    mode: u8,
    rom_bank: u8,
    ram_bank: u8,
    ir_led: bool,
    command: u8,
    response: u8,
    index: u8,
    scratch: [u8; 16],
    clock: Clock,
}

impl Huc3 {
    fn ram_offset(&self, address: u16) -> usize {
        (self.ram_bank as usize) << 13 | (address & 0x1FFF) as usize
    }

    fn nibble(&mut self) -> &mut u8 {
        &mut self.scratch[self.index as usize & 0x0F]
    }

    fn execute(&mut self, value: u8) {
        let argument = value & 0x0F;
        self.command = value & 0xF0;
        match value >> 4 {
            0x1 => {
                self.response = *self.nibble();
                self.index = self.index.wrapping_add(1);
            }
            0x3 => {
                *self.nibble() = argument;
                self.index = self.index.wrapping_add(1);
            }
            0x4 => self.index = (self.index & 0xF0) | argument,
            0x5 => self.index = (self.index & 0x0F) | argument << 4,
            0x6 => match argument {
                0x0 => self.latch_clock(),
                0x1 => self.set_clock(),
                _ => debug!("HuC3: unhandled extended command {argument:#X}"),
            },
            _ => debug!("HuC3: unhandled command {value:#04X}"),
        }
    }

    /// Copy minutes into nibbles 0-2 and days into nibbles 3-5.
    fn latch_clock(&mut self) {
        let Clock { minutes, days, .. } = self.clock;
        for i in 0..3 {
            self.scratch[i] = (minutes >> (4 * i)) as u8 & 0x0F;
            self.scratch[3 + i] = (days >> (4 * i)) as u8 & 0x0F;
        }
    }

    fn set_clock(&mut self) {
        let field = |nibbles: &[u8]| {
            nibbles
                .iter()
                .enumerate()
                .fold(0u16, |acc, (i, &n)| acc | (n as u16) << (4 * i))
        };
        self.clock.minutes = field(&self.scratch[0..3]) % MINUTES_PER_DAY;
        self.clock.days = field(&self.scratch[3..6]);
        self.clock.seconds = 0;
    }
}

impl Mapper for Huc3 {
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
            rom_bank: 1,
            clock: self.clock,
            ..Self::default()
        };
    }

    fn read(&self, memories: &Memories, address: u16) -> u8 {
        match address {
            0x0000..=0x3FFF => memories.rom.read((address & 0x3FFF) as usize),
            0x4000..=0x7FFF => memories
                .rom
                .read((self.rom_bank as usize) << 14 | (address & 0x3FFF) as usize),
            0xA000..=0xBFFF => match self.mode {
                MODE_RAM_READ | MODE_RAM => memories.ram.read(self.ram_offset(address)),
                MODE_RESPONSE => self.command | self.response,
                MODE_SEMAPHORE => 0x01,
                MODE_IR => IR_IDLE,
                _ => OPEN_BUS,
            },
            _ => OPEN_BUS,
        }
    }

    fn write(&mut self, memories: &mut Memories, address: u16, value: u8) {
        match address {
            0x0000..=0x1FFF => self.mode = value & 0x0F,
            0x2000..=0x3FFF => self.rom_bank = value & 0x7F,
            0x4000..=0x5FFF => self.ram_bank = value & 0x03,
            0xA000..=0xBFFF => match self.mode {
                MODE_RAM => {
                    let offset = self.ram_offset(address);
                    memories.ram.write(offset, value);
                }
                MODE_COMMAND => self.execute(value),
                MODE_IR => self.ir_led = value & 0x01 != 0,
                _ => {}
            },
            _ => {}
        }
    }

    fn second(&mut self) {
        self.clock.tick();
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

impl Serializable for Huc3 {
    fn serialize(&mut self, s: &mut Serializer) {
        s.integer(&mut self.mode);
        s.integer(&mut self.rom_bank);
        s.integer(&mut self.ram_bank);
        s.boolean(&mut self.ir_led);
        s.integer(&mut self.command);
        s.integer(&mut self.response);
        s.integer(&mut self.index);
        s.bytes(&mut self.scratch);
        s.integer(&mut self.clock.seconds);
        s.integer(&mut self.clock.minutes);
        s.integer(&mut self.clock.days);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::Memory;

    fn memories() -> Memories {
        Memories {
            rom: Memory::allocate(0x8000, 0),
            ram: Memory::allocate(0x8000, 0x33),
            rtc: Memory::allocate(CLOCK_STATE_SIZE, 0xFF),
        }
    }

    fn board() -> BoardSection {
        BoardSection {
            id: "HuC3".into(),
            accelerometer: false,
            rumble: false,
            memories: Vec::new(),
        }
    }

    fn command(mbc: &mut Huc3, m: &mut Memories, value: u8) {
        mbc.write(m, 0x0000, MODE_COMMAND);
        mbc.write(m, 0xA000, value);
    }

    fn read_nibble(mbc: &mut Huc3, m: &mut Memories) -> u8 {
        command(mbc, m, 0x10);
        mbc.write(m, 0x0000, MODE_RESPONSE);
        let response = mbc.read(m, 0xA000);
        assert_eq!(response & 0xF0, 0x10);
        response & 0x0F
    }

    #[test]
    fn clock_is_latched_through_the_scratchpad() {
        let mut m = memories();
        let mut mbc = Huc3::default();
        mbc.load(&board(), &m).unwrap();
        mbc.power();
        for _ in 0..(61 * 60 + 59) {
            mbc.second();
        }
        command(&mut mbc, &mut m, 0x60);
        command(&mut mbc, &mut m, 0x40);
        command(&mut mbc, &mut m, 0x50);
        let minutes: Vec<u8> = (0..3).map(|_| read_nibble(&mut mbc, &mut m)).collect();
        // 61 minutes = 0x03D.
        assert_eq!(minutes, vec![0xD, 0x3, 0x0]);
    }

    #[test]
    fn clock_is_set_and_persisted() {
        let mut m = memories();
        let mut mbc = Huc3::default();
        mbc.load(&board(), &m).unwrap();
        mbc.power();
        command(&mut mbc, &mut m, 0x40);
        // Minutes 0x59F (1439), days 0x012.
        for nibble in [0xF, 0x9, 0x5, 0x2, 0x1, 0x0] {
            command(&mut mbc, &mut m, 0x30 | nibble);
        }
        command(&mut mbc, &mut m, 0x61);
        for _ in 0..60 {
            mbc.second();
        }
        assert_eq!(mbc.clock.minutes, 0);
        assert_eq!(mbc.clock.days, 0x13);

        mbc.save(&mut m);
        let mut reloaded = Huc3::default();
        reloaded.load(&board(), &m).unwrap();
        reloaded.power();
        assert_eq!(reloaded.clock, mbc.clock);
    }

    #[test]
    fn window_modes() {
        let mut m = memories();
        let mut mbc = Huc3::default();
        mbc.power();
        assert_eq!(mbc.read(&m, 0xA000), 0x33);
        mbc.write(&mut m, 0xA000, 0x44);
        assert_eq!(m.ram.read(0), 0x33);

        mbc.write(&mut m, 0x0000, MODE_RAM);
        mbc.write(&mut m, 0x4000, 0x01);
        mbc.write(&mut m, 0xA000, 0x44);
        assert_eq!(m.ram.read(0x2000), 0x44);

        mbc.write(&mut m, 0x0000, MODE_SEMAPHORE);
        assert_eq!(mbc.read(&m, 0xA000), 0x01);
        mbc.write(&mut m, 0x0000, MODE_IR);
        assert_eq!(mbc.read(&m, 0xA000), IR_IDLE);
        mbc.write(&mut m, 0xA000, 0x01);
        assert!(mbc.ir_led());
    }

    #[test]
    fn undersized_clock_region_is_rejected() {
        let m = Memories {
            rtc: Memory::allocate(4, 0xFF),
            ..Memories::default()
        };
        assert!(matches!(
            Huc3::default().load(&board(), &m),
            Err(LoadError::Configuration(_))
        ));
    }
}
