#![allow(dead_code)]

use tandem_emu_core::platform::{MemoryPlatform, PathId};

pub const PATH: PathId = 0;
pub const ROM_NAME: &str = "program.rom";
pub const RAM_NAME: &str = "save.ram";
pub const RTC_NAME: &str = "time.rtc";

/// Manifest text for a board with the given regions.
pub struct Board {
    pub id: &'static str,
    pub rom_size: usize,
    pub ram: Option<(usize, bool)>,
    pub rtc: Option<usize>,
    pub accelerometer: bool,
    pub rumble: bool,
}

impl Board {
    pub fn new(id: &'static str, rom_size: usize) -> Self {
        Self {
            id,
            rom_size,
            ram: None,
            rtc: None,
            accelerometer: false,
            rumble: false,
        }
    }

    pub fn ram(mut self, size: usize, non_volatile: bool) -> Self {
        self.ram = Some((size, non_volatile));
        self
    }

    pub fn rtc(mut self, size: usize) -> Self {
        self.rtc = Some(size);
        self
    }

    pub fn accelerometer(mut self) -> Self {
        self.accelerometer = true;
        self
    }

    pub fn manifest(&self) -> String {
        let mut text = format!(
            "[game]\nlabel = \"fixture\"\n\n[game.board]\nid = \"{}\"\naccelerometer = {}\nrumble = {}\n",
            self.id, self.accelerometer, self.rumble
        );
        text += &region("ROM", "Program", self.rom_size, ROM_NAME, false);
        if let Some((size, non_volatile)) = self.ram {
            text += &region("RAM", "Save", size, RAM_NAME, non_volatile);
        }
        if let Some(size) = self.rtc {
            text += &region("RTC", "Time", size, RTC_NAME, true);
        }
        text
    }

    /// In-memory storage holding the manifest and `rom`.
    pub fn platform(&self, rom: Vec<u8>) -> MemoryPlatform {
        let mut platform = MemoryPlatform::new();
        platform.insert(PATH, "manifest.toml", self.manifest().into_bytes());
        platform.insert(PATH, ROM_NAME, rom);
        platform
    }
}

fn region(kind: &str, content: &str, size: usize, name: &str, non_volatile: bool) -> String {
    format!(
        "\n[[game.board.memory]]\ntype = \"{kind}\"\ncontent = \"{content}\"\nsize = {size}\nname = \"{name}\"\nnonVolatile = {non_volatile}\n"
    )
}

/// ROM whose first byte of every 16 KiB bank holds the bank number.
pub fn banked_rom(size: usize) -> Vec<u8> {
    let mut rom = vec![0u8; size];
    for (bank, chunk) in rom.chunks_mut(0x4000).enumerate() {
        chunk[0] = bank as u8;
        chunk[1] = 0xA5 ^ bank as u8;
    }
    rom
}

/// 32 KiB ROM with `program` at `origin` and the given vectors.
pub fn program_rom(origin: u16, program: &[u8], vectors: &[(u16, u16)]) -> Vec<u8> {
    let mut rom = vec![0xEA; 0x8000];
    let start = origin as usize;
    rom[start..start + program.len()].copy_from_slice(program);
    for &(vector, target) in vectors {
        let [lo, hi] = target.to_le_bytes();
        rom[vector as usize] = lo;
        rom[vector as usize + 1] = hi;
    }
    rom
}
