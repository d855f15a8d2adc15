use log::debug;

use super::{Mapper, Memories, OPEN_BUS, require_rtc_size};
use crate::error::LoadError;
use crate::manifest::BoardSection;
use crate::state::{Serializable, Serializer};

const RTC_MAGIC: &[u8; 4] = b"RTC1";
const RTC_VERSION: u8 = 2;

/// Bytes needed in the RTC region to persist the clock.
pub const RTC_STATE_SIZE: usize = 4 + 1 + 6 + 6;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct RtcRegisters {
    seconds: u8,
    minutes: u8,
    hours: u8,
    days: u16,
    halt: bool,
    carry: bool,
}

impl RtcRegisters {
    fn control_byte(&self) -> u8 {
        let mut out = ((self.days >> 8) as u8) & 0x01;
        if self.halt {
            out |= 0x40;
        }
        if self.carry {
            out |= 0x80;
        }
        out
    }

    fn encode(&self, out: &mut [u8]) {
        out[0] = self.seconds & 0x3F;
        out[1] = self.minutes & 0x3F;
        out[2] = self.hours & 0x1F;
        out[3..5].copy_from_slice(&(self.days & 0x01FF).to_le_bytes());
        out[5] = self.halt as u8 | (self.carry as u8) << 1;
    }

    fn decode(data: &[u8]) -> Self {
        Self {
            seconds: data[0] & 0x3F,
            minutes: data[1] & 0x3F,
            hours: data[2] & 0x1F,
            days: u16::from_le_bytes([data[3], data[4]]) & 0x01FF,
            halt: data[5] & 0x01 != 0,
            carry: data[5] & 0x02 != 0,
        }
    }
}

impl Serializable for RtcRegisters {
    fn serialize(&mut self, s: &mut Serializer) {
        s.integer(&mut self.seconds);
        s.integer(&mut self.minutes);
        s.integer(&mut self.hours);
        s.integer(&mut self.days);
        s.boolean(&mut self.halt);
        s.boolean(&mut self.carry);
    }
}

/// Real-time clock advanced by emulated seconds only.
#[derive(Debug, Clone, Default)]
struct Rtc {
    regs: RtcRegisters,
    latched: RtcRegisters,
}

impl Rtc {
    fn read_latched(&self, reg: u8) -> u8 {
        match reg {
            0x08 => self.latched.seconds & 0x3F,
            0x09 => self.latched.minutes & 0x3F,
            0x0A => self.latched.hours & 0x1F,
            0x0B => (self.latched.days & 0x00FF) as u8,
            0x0C => self.latched.control_byte(),
            _ => OPEN_BUS,
        }
    }

    fn write_register(&mut self, reg: u8, value: u8) {
        match reg {
            0x08 => self.regs.seconds = value & 0x3F,
            0x09 => self.regs.minutes = value & 0x3F,
            0x0A => self.regs.hours = value & 0x1F,
            0x0B => self.regs.days = (self.regs.days & 0x0100) | value as u16,
            0x0C => {
                self.regs.days = (self.regs.days & 0x00FF) | (((value & 0x01) as u16) << 8);
                self.regs.halt = value & 0x40 != 0;
                self.regs.carry = value & 0x80 != 0;
            }
            _ => {}
        }
        self.latched = self.regs;
    }

    fn tick(&mut self) {
        if self.regs.halt {
            return;
        }
        // Out-of-range values keep counting up to the register width before
        // wrapping, without carrying into the next unit.
        if self.regs.seconds == 59 {
            self.regs.seconds = 0;
            self.minute_tick();
        } else {
            self.regs.seconds = (self.regs.seconds + 1) & 0x3F;
        }
    }

    fn minute_tick(&mut self) {
        if self.regs.minutes == 59 {
            self.regs.minutes = 0;
            self.hour_tick();
        } else {
            self.regs.minutes = (self.regs.minutes + 1) & 0x3F;
        }
    }

    fn hour_tick(&mut self) {
        if self.regs.hours == 23 {
            self.regs.hours = 0;
            self.day_tick();
        } else {
            self.regs.hours = (self.regs.hours + 1) & 0x1F;
        }
    }

    fn day_tick(&mut self) {
        if self.regs.days >= 0x01FF {
            self.regs.days = 0;
            self.regs.carry = true;
        } else {
            self.regs.days += 1;
        }
    }

    fn encode(&self, out: &mut [u8]) {
        out[..4].copy_from_slice(RTC_MAGIC);
        out[4] = RTC_VERSION;
        self.regs.encode(&mut out[5..11]);
        self.latched.encode(&mut out[11..17]);
    }

    fn decode(data: &[u8]) -> Option<Self> {
        if data.len() < RTC_STATE_SIZE || &data[..4] != RTC_MAGIC || data[4] != RTC_VERSION {
            return None;
        }
        Some(Self {
            regs: RtcRegisters::decode(&data[5..11]),
            latched: RtcRegisters::decode(&data[11..17]),
        })
    }
}

/// 7-bit ROM banking, four RAM banks and the clock registers.
#[derive(Debug, Default)]
pub struct Mbc3 {
    enable: bool,
    rom_bank: u8,
    select: u8,
    latch_armed: bool,
    rtc: Rtc,
}

impl Mapper for Mbc3 {
    fn load(&mut self, board: &BoardSection, memories: &Memories) -> Result<(), LoadError> {
        require_rtc_size(board, &memories.rtc, RTC_STATE_SIZE)?;
        match Rtc::decode(memories.rtc.as_slice()) {
            Some(rtc) => self.rtc = rtc,
            None => {
                if !memories.rtc.is_empty() {
                    debug!("RTC region holds no saved clock, starting at zero");
                }
                self.rtc = Rtc::default();
            }
        }
        Ok(())
    }

    fn save(&mut self, memories: &mut Memories) {
        if memories.rtc.size() >= RTC_STATE_SIZE {
            self.rtc.encode(memories.rtc.as_mut_slice());
        }
    }

    fn power(&mut self) {
        self.enable = false;
        self.rom_bank = 1;
        self.select = 0;
        self.latch_armed = false;
    }

    fn read(&self, memories: &Memories, address: u16) -> u8 {
        match address {
            0x0000..=0x3FFF => memories.rom.read((address & 0x3FFF) as usize),
            0x4000..=0x7FFF => memories
                .rom
                .read((self.rom_bank as usize) << 14 | (address & 0x3FFF) as usize),
            0xA000..=0xBFFF if self.enable => match self.select {
                0x00..=0x03 => memories
                    .ram
                    .read((self.select as usize) << 13 | (address & 0x1FFF) as usize),
                0x08..=0x0C => self.rtc.read_latched(self.select),
                _ => OPEN_BUS,
            },
            _ => OPEN_BUS,
        }
    }

    fn write(&mut self, memories: &mut Memories, address: u16, value: u8) {
        match address {
            0x0000..=0x1FFF => self.enable = value & 0x0F == 0x0A,
            0x2000..=0x3FFF => {
                self.rom_bank = value & 0x7F;
                if self.rom_bank == 0 {
                    self.rom_bank = 1;
                }
            }
            0x4000..=0x5FFF => self.select = value,
            0x6000..=0x7FFF => {
                if self.latch_armed && value == 0x01 {
                    self.rtc.latched = self.rtc.regs;
                }
                self.latch_armed = value == 0x00;
            }
            0xA000..=0xBFFF if self.enable => match self.select {
                0x00..=0x03 => memories.ram.write(
                    (self.select as usize) << 13 | (address & 0x1FFF) as usize,
                    value,
                ),
                0x08..=0x0C => self.rtc.write_register(self.select, value),
                _ => {}
            },
            _ => {}
        }
    }

    fn second(&mut self) {
        self.rtc.tick();
    }

    fn bank(&self, address: u16) -> u32 {
        match address {
            0x4000..=0x7FFF => self.rom_bank as u32,
            _ => 0,
        }
    }
}

impl Serializable for Mbc3 {
    fn serialize(&mut self, s: &mut Serializer) {
        s.boolean(&mut self.enable);
        s.integer(&mut self.rom_bank);
        s.integer(&mut self.select);
        s.boolean(&mut self.latch_armed);
        self.rtc.regs.serialize(s);
        self.rtc.latched.serialize(s);
    }
}
