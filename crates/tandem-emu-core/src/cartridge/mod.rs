mod huc1;
mod huc3;
mod mbc0;
mod mbc1;
mod mbc1m;
mod mbc2;
mod mbc3;
mod mbc5;
mod mbc6;
mod mbc7;
pub mod memory;
mod mmm01;
mod tama;

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use log::{debug, info};

use crate::bus::Io;
use crate::error::{LoadError, SaveError};
use crate::manifest::{BoardSection, MANIFEST_NAME, Manifest, MemoryKind, MemoryRegion};
use crate::platform::{FileMode, PathId, Platform, Requirement};
use crate::state::{Serializable, Serializer};

pub use memory::{Memories, Memory, OPEN_BUS};

/// Clock rate of the cartridge domain.
pub const FREQUENCY: u32 = 4 * 1024 * 1024;

/// Smallest program ROM allocation.
pub const MIN_ROM_SIZE: usize = 0x4000;

/// Largest region a manifest may declare: 512 banks of 16 KiB.
pub const MAX_REGION_SIZE: usize = 512 * 0x4000;

/// Fill value for freshly allocated regions.
pub const SENTINEL: u8 = 0xFF;

pub const BOOT_DISABLE: u16 = 0xFF50;
const BOOT_WINDOW: usize = 0x100;

/// Bank-switching logic for one board family.
///
/// Bank registers are private to each implementation; all storage lives in
/// the [`Memories`] owned by the cartridge. Save states cover the registers
/// only; the memories are serialized by the cartridge.
pub trait Mapper: fmt::Debug + Serializable {
    /// Pick up board features and any state persisted in the memories.
    fn load(&mut self, _board: &BoardSection, _memories: &Memories) -> Result<(), LoadError> {
        Ok(())
    }

    /// Flush mapper-held state into the memories before they are written out.
    fn save(&mut self, _memories: &mut Memories) {}

    fn power(&mut self);

    fn read(&self, memories: &Memories, address: u16) -> u8;

    fn write(&mut self, memories: &mut Memories, address: u16, value: u8);

    /// One emulated second has elapsed.
    fn second(&mut self) {}

    /// Bank currently mapped at `address`, for debug addressing.
    fn bank(&self, _address: u16) -> u32 {
        0
    }

    fn rumble(&self) -> bool {
        false
    }

    /// State of the infrared transmitter.
    fn ir_led(&self) -> bool {
        false
    }

    fn set_accelerometer(&mut self, _x: i16, _y: i16) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Board {
    Mbc0,
    Mbc1,
    Mbc1m,
    Mbc2,
    Mbc3,
    Mbc5,
    Mbc6,
    Mbc7,
    Mmm01,
    Huc1,
    Huc3,
    Tama,
}

impl Board {
    pub const ALL: [Board; 12] = [
        Board::Mbc0,
        Board::Mbc1,
        Board::Mbc1m,
        Board::Mbc2,
        Board::Mbc3,
        Board::Mbc5,
        Board::Mbc6,
        Board::Mbc7,
        Board::Mmm01,
        Board::Huc1,
        Board::Huc3,
        Board::Tama,
    ];

    pub const fn id(self) -> &'static str {
        match self {
            Board::Mbc0 => "MBC0",
            Board::Mbc1 => "MBC1",
            Board::Mbc1m => "MBC1M",
            Board::Mbc2 => "MBC2",
            Board::Mbc3 => "MBC3",
            Board::Mbc5 => "MBC5",
            Board::Mbc6 => "MBC6",
            Board::Mbc7 => "MBC7",
            Board::Mmm01 => "MMM01",
            Board::Huc1 => "HuC1",
            Board::Huc3 => "HuC3",
            Board::Tama => "TAMA",
        }
    }

    fn mapper(self) -> Box<dyn Mapper> {
        match self {
            Board::Mbc0 => Box::new(mbc0::Mbc0),
            Board::Mbc1 => Box::<mbc1::Mbc1>::default(),
            Board::Mbc1m => Box::<mbc1m::Mbc1m>::default(),
            Board::Mbc2 => Box::<mbc2::Mbc2>::default(),
            Board::Mbc3 => Box::<mbc3::Mbc3>::default(),
            Board::Mbc5 => Box::<mbc5::Mbc5>::default(),
            Board::Mbc6 => Box::<mbc6::Mbc6>::default(),
            Board::Mbc7 => Box::<mbc7::Mbc7>::default(),
            Board::Mmm01 => Box::<mmm01::Mmm01>::default(),
            Board::Huc1 => Box::<huc1::Huc1>::default(),
            Board::Huc3 => Box::<huc3::Huc3>::default(),
            Board::Tama => Box::<tama::Tama>::default(),
        }
    }
}

impl FromStr for Board {
    type Err = LoadError;

    fn from_str(id: &str) -> Result<Self, Self::Err> {
        Board::ALL
            .into_iter()
            .find(|b| b.id() == id)
            .ok_or_else(|| LoadError::Configuration(format!("unrecognized board id '{id}'")))
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Debug)]
pub struct Cartridge {
    pub title: String,
    pub board: Board,
    pub memory: Memories,
    manifest: Manifest,
    mapper: Box<dyn Mapper>,
    boot_rom: Option<Vec<u8>>,
    bootstrap: bool,
    /// Set once the domain has run its first second.
    clock_started: bool,
}

impl Cartridge {
    /// Address ranges the cartridge answers on the reference bus.
    pub fn ranges() -> [RangeInclusive<u32>; 3] {
        [
            0x0000..=0x7FFF,
            0xA000..=0xBFFF,
            BOOT_DISABLE as u32..=BOOT_DISABLE as u32,
        ]
    }

    /// Read `manifest.toml` under `path` and load the board it describes.
    pub fn load(platform: &mut dyn Platform, path: PathId) -> Result<Self, LoadError> {
        let Some(mut file) = platform.open(path, MANIFEST_NAME, FileMode::Read, Requirement::Required)
        else {
            return Err(LoadError::RequiredResourceMissing {
                name: MANIFEST_NAME.to_string(),
            });
        };
        let bytes = file.reads().map_err(|source| LoadError::Io {
            name: MANIFEST_NAME.to_string(),
            source,
        })?;
        let text = String::from_utf8_lossy(&bytes);
        Self::from_manifest(Manifest::parse(&text)?, platform, path)
    }

    pub fn from_manifest(
        manifest: Manifest,
        platform: &mut dyn Platform,
        path: PathId,
    ) -> Result<Self, LoadError> {
        let board: Board = manifest.board().id.parse()?;
        debug!("Selected mapper {board}");

        let Some(rom_region) = manifest.memory(MemoryKind::Rom, "Program") else {
            return Err(LoadError::Configuration(
                "manifest declares no program ROM".to_string(),
            ));
        };

        let rom = load_region(
            platform,
            path,
            rom_region,
            rom_region.size.max(MIN_ROM_SIZE),
            Requirement::Required,
        )?;
        let ram = match manifest.memory(MemoryKind::Ram, "Save") {
            Some(region) => load_region(platform, path, region, region.size, Requirement::Optional)?,
            None => Memory::default(),
        };
        let rtc = match manifest.memory(MemoryKind::Rtc, "Time") {
            Some(region) => load_region(platform, path, region, region.size, Requirement::Optional)?,
            None => Memory::default(),
        };
        let memory = Memories { rom, ram, rtc };

        let mut mapper = board.mapper();
        mapper.load(manifest.board(), &memory)?;

        let title = manifest.game.label.clone();
        info!(
            "Loaded cartridge '{}' (board {}, ROM {} KiB, RAM {} bytes)",
            title,
            board,
            memory.rom.size() / 1024,
            memory.ram.size()
        );

        Ok(Self {
            title,
            board,
            memory,
            manifest,
            mapper,
            boot_rom: None,
            bootstrap: false,
            clock_started: false,
        })
    }

    /// Write every non-volatile region back through the platform.
    pub fn save(&mut self, platform: &mut dyn Platform, path: PathId) -> Result<(), SaveError> {
        self.mapper.save(&mut self.memory);

        let targets = [
            (self.manifest.memory(MemoryKind::Ram, "Save"), &self.memory.ram),
            (self.manifest.memory(MemoryKind::Rtc, "Time"), &self.memory.rtc),
        ];
        for (region, memory) in targets {
            let Some(region) = region.filter(|r| r.non_volatile) else {
                continue;
            };
            let Some(mut file) =
                platform.open(path, &region.name, FileMode::Write, Requirement::Required)
            else {
                return Err(SaveError::Unavailable {
                    name: region.name.clone(),
                });
            };
            file.write(memory.as_slice()).map_err(|source| SaveError::Io {
                name: region.name.clone(),
                source,
            })?;
            info!("Saved {} bytes to {}", memory.size(), region.name);
        }
        Ok(())
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Overlay `image` on the low ROM window until `0xFF50` is written.
    pub fn attach_boot_rom(&mut self, image: Vec<u8>) {
        self.boot_rom = Some(image);
    }

    pub fn bootstrap_enabled(&self) -> bool {
        self.bootstrap
    }

    pub fn power(&mut self) {
        self.bootstrap = self.boot_rom.is_some();
        self.clock_started = false;
        self.mapper.power();
    }

    /// Entry point of the cartridge domain: one emulated second per call.
    ///
    /// The clock ticks at the start of every call but the first, so a second
    /// is only counted once it has fully elapsed. Returns the clocks to step.
    pub fn main(&mut self) -> u32 {
        if self.clock_started {
            self.mapper.second();
        }
        self.clock_started = true;
        FREQUENCY
    }

    pub fn read(&self, address: u16) -> u8 {
        if address == BOOT_DISABLE {
            return OPEN_BUS;
        }
        if self.bootstrap && (address as usize) < BOOT_WINDOW {
            if let Some(boot) = &self.boot_rom {
                return boot.get(address as usize).copied().unwrap_or(OPEN_BUS);
            }
        }
        self.mapper.read(&self.memory, address)
    }

    pub fn write(&mut self, address: u16, value: u8) {
        if address == BOOT_DISABLE {
            if self.bootstrap {
                debug!("Boot overlay disabled");
            }
            self.bootstrap = false;
            return;
        }
        self.mapper.write(&mut self.memory, address, value);
    }

    pub fn second(&mut self) {
        self.mapper.second();
    }

    pub fn bank(&self, address: u16) -> u32 {
        self.mapper.bank(address)
    }

    pub fn rumble(&self) -> bool {
        self.mapper.rumble()
    }

    pub fn ir_led(&self) -> bool {
        self.mapper.ir_led()
    }

    pub fn set_accelerometer(&mut self, x: i16, y: i16) {
        self.mapper.set_accelerometer(x, y);
    }
}

impl Serializable for Cartridge {
    fn serialize(&mut self, s: &mut Serializer) {
        s.boolean(&mut self.bootstrap);
        s.boolean(&mut self.clock_started);
        s.bytes(self.memory.ram.as_mut_slice());
        s.bytes(self.memory.rtc.as_mut_slice());
        self.mapper.serialize(s);
    }
}

impl Io for Cartridge {
    fn peek(&self, address: u32) -> u8 {
        Cartridge::read(self, address as u16)
    }

    fn write(&mut self, address: u32, value: u8) {
        Cartridge::write(self, address as u16, value);
    }
}

fn load_region(
    platform: &mut dyn Platform,
    path: PathId,
    region: &MemoryRegion,
    size: usize,
    requirement: Requirement,
) -> Result<Memory, LoadError> {
    if size > MAX_REGION_SIZE {
        return Err(LoadError::Configuration(format!(
            "{} declares {size} bytes, more than the {MAX_REGION_SIZE} a board can address",
            region.name
        )));
    }
    let mut memory = Memory::allocate(size, SENTINEL);
    if requirement == Requirement::Optional && !region.non_volatile {
        return Ok(memory);
    }
    let Some(mut file) = platform.open(path, &region.name, FileMode::Read, requirement) else {
        if requirement == Requirement::Required {
            return Err(LoadError::RequiredResourceMissing {
                name: region.name.clone(),
            });
        }
        debug!("No backing file for {}, starting from {SENTINEL:#04X} fill", region.name);
        return Ok(memory);
    };
    let len = size.min(file.size() as usize);
    file.read(&mut memory.as_mut_slice()[..len])
        .map_err(|source| LoadError::Io {
            name: region.name.clone(),
            source,
        })?;
    Ok(memory)
}

/// Reject an RTC region that is present but too small for the board's clock.
fn require_rtc_size(board: &BoardSection, rtc: &Memory, needed: usize) -> Result<(), LoadError> {
    if !rtc.is_empty() && rtc.size() < needed {
        return Err(LoadError::Configuration(format!(
            "{} needs an RTC region of at least {needed} bytes, found {}",
            board.id,
            rtc.size()
        )));
    }
    Ok(())
}
