//! The reference machine: one CPU, a raster counter, work RAM and a cartridge
//! on a 16-bit bus, each in its own clock domain.
//!
//! | Range           | Device                          |
//! |-----------------|---------------------------------|
//! | `0x0000-0x7FFF` | cartridge ROM (boot overlay)    |
//! | `0xA000-0xBFFF` | cartridge RAM / registers       |
//! | `0xC000-0xDFFF` | work RAM                        |
//! | `0xFF00-0xFF03` | video counters and raster IRQ   |
//! | `0xFF10-0xFF13` | timer and interrupt controller  |
//! | `0xFF50`        | boot overlay disable            |

use log::{debug, info};

use crate::bus::{Bus, Devices, Io};
use crate::cartridge::{self, Cartridge};
use crate::cpu::{CLOCKS_PER_CYCLE, Core, Cpu, CpuBus, Interrupts};
use crate::debug::Debugger;
use crate::error::{LoadError, SaveError, StateError};
use crate::platform::{PathId, Platform};
use crate::scheduler::{DomainId, Domains, Scheduler, synchronize};
use crate::state::{Serializable, Serializer};
use crate::video::{self, Video};

pub const CPU_FREQUENCY: u32 = 21_477_270;
pub const BUS_WIDTH: u32 = 16;
pub const WORK_RAM_SIZE: usize = 0x2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    Cartridge,
    WorkRam,
    Video,
    Interrupts,
}

#[derive(Debug, Clone)]
pub struct WorkRam {
    data: Vec<u8>,
}

impl WorkRam {
    fn new() -> Self {
        Self {
            data: vec![0; WORK_RAM_SIZE],
        }
    }

    fn power(&mut self) {
        self.data.fill(0);
    }
}

impl Serializable for WorkRam {
    fn serialize(&mut self, s: &mut Serializer) {
        s.bytes(&mut self.data);
    }
}

impl Io for WorkRam {
    fn peek(&self, address: u32) -> u8 {
        self.data[address as usize % WORK_RAM_SIZE]
    }

    fn write(&mut self, address: u32, value: u8) {
        self.data[address as usize % WORK_RAM_SIZE] = value;
    }
}

/// Every bus-mapped device of the machine.
#[derive(Debug)]
pub struct Board {
    pub cartridge: Cartridge,
    pub work_ram: WorkRam,
    pub video: Video,
    pub interrupts: Interrupts,
}

impl Devices<Handler> for Board {
    fn device(&mut self, handler: Handler) -> &mut dyn Io {
        match handler {
            Handler::Cartridge => &mut self.cartridge,
            Handler::WorkRam => &mut self.work_ram,
            Handler::Video => &mut self.video,
            Handler::Interrupts => &mut self.interrupts,
        }
    }

    fn device_ref(&self, handler: Handler) -> &dyn Io {
        match handler {
            Handler::Cartridge => &self.cartridge,
            Handler::WorkRam => &self.work_ram,
            Handler::Video => &self.video,
            Handler::Interrupts => &self.interrupts,
        }
    }
}

/// The CPU's view of the bus for one turn.
struct CpuView<'a> {
    bus: &'a Bus<Handler>,
    board: &'a mut Board,
}

impl CpuBus for CpuView<'_> {
    fn read(&mut self, address: u16) -> u8 {
        self.bus.read(&mut *self.board, address as u32)
    }

    fn write(&mut self, address: u16, value: u8) {
        self.bus.write(&mut *self.board, address as u32, value);
    }

    fn peek(&self, address: u16) -> u8 {
        self.bus.peek(&*self.board, address as u32)
    }

    fn physical(&self, address: u16) -> u32 {
        if address < 0x8000 {
            self.board.cartridge.bank(address) << 16 | address as u32
        } else {
            address as u32
        }
    }

    fn counters(&self) -> Vec<String> {
        self.board.video.counters().to_vec()
    }
}

#[derive(Debug, Clone, Copy)]
struct DomainIds {
    cpu: DomainId,
    video: DomainId,
    cartridge: DomainId,
}

impl DomainIds {
    /// Domains are created in a fixed order so ids stay stable across power
    /// cycles.
    fn create(scheduler: &mut Scheduler) -> Self {
        scheduler.reset();
        Self {
            cpu: scheduler.create("cpu", CPU_FREQUENCY as u64),
            video: scheduler.create("video", video::FREQUENCY as u64),
            cartridge: scheduler.create("cartridge", cartridge::FREQUENCY as u64),
        }
    }
}

pub struct System<C> {
    pub cpu: Cpu<C>,
    board: Board,
    bus: Bus<Handler>,
    scheduler: Scheduler,
    domains: DomainIds,
    debugger: Debugger,
    path: PathId,
    external_irq: bool,
}

impl<C: Core> System<C> {
    /// Load the cartridge stored under `path` and build a machine around it.
    /// Call [`System::power`] before running.
    pub fn load(platform: &mut dyn Platform, path: PathId, core: C) -> Result<Self, LoadError> {
        let cartridge = Cartridge::load(platform, path)?;
        Ok(Self::with_cartridge(cartridge, path, core))
    }

    pub fn with_cartridge(cartridge: Cartridge, path: PathId, core: C) -> Self {
        let mut scheduler = Scheduler::new();
        let domains = DomainIds::create(&mut scheduler);
        Self {
            cpu: Cpu::new(core),
            board: Board {
                cartridge,
                work_ram: WorkRam::new(),
                video: Video::new(),
                interrupts: Interrupts::new(),
            },
            bus: Bus::new(BUS_WIDTH),
            scheduler,
            domains,
            debugger: Debugger::new(),
            path,
            external_irq: false,
        }
    }

    pub fn attach_boot_rom(&mut self, image: Vec<u8>) {
        self.board.cartridge.attach_boot_rom(image);
    }

    fn map(&mut self) {
        self.bus.clear();
        for range in Cartridge::ranges() {
            self.bus.register(range, Handler::Cartridge);
        }
        self.bus.register(0xC000..=0xDFFF, Handler::WorkRam);
        self.bus.register(0xFF00..=0xFF03, Handler::Video);
        self.bus.register(0xFF10..=0xFF13, Handler::Interrupts);
    }

    pub fn power(&mut self) {
        self.domains = DomainIds::create(&mut self.scheduler);
        self.map();

        self.board.cartridge.power();
        self.board.work_ram.power();
        self.board.video.power();
        self.board.interrupts.power();
        self.external_irq = false;

        let mut view = CpuView {
            bus: &self.bus,
            board: &mut self.board,
        };
        self.cpu.power(&mut view);
        info!(
            "Powered on '{}', reset vector {:04X}",
            self.board.cartridge.title,
            self.cpu.core.pc()
        );
    }

    /// Run one CPU turn (an instruction or an interrupt entry) and bring the
    /// other domains up to date. Returns the CPU cycles consumed.
    pub fn run_instruction(&mut self) -> u32 {
        let caller = self.scheduler.enter(self.domains.cpu);
        let cycles = self.cpu_turn();
        let cartridge = self.domains.cartridge;
        synchronize(self, cartridge);
        self.scheduler.leave(caller);
        cycles
    }

    /// Run until the CPU domain has advanced by at least `clocks` of its own
    /// cycles.
    pub fn run(&mut self, clocks: u64) {
        let target = self.scheduler.time(self.domains.cpu)
            + self.scheduler.thread(self.domains.cpu).scalar() * clocks as u128;
        while self.scheduler.time(self.domains.cpu) < target {
            self.run_instruction();
        }
    }

    fn cpu_turn(&mut self) -> u32 {
        let pending = self.board.interrupts.next();
        let mut view = CpuView {
            bus: &self.bus,
            board: &mut self.board,
        };
        let cycles = self.cpu.main(pending, &mut view, &mut self.debugger);

        let clocks = cycles * CLOCKS_PER_CYCLE;
        self.board.interrupts.timer.step(clocks);
        self.scheduler.step(self.domains.cpu, clocks);
        let video = self.domains.video;
        synchronize(self, video);

        // Lines are sampled after every source has caught up with the turn.
        self.sample_lines();
        self.board
            .interrupts
            .last_cycle(self.cpu.core.interrupts_masked());
        cycles
    }

    fn sample_lines(&mut self) {
        self.board.interrupts.irq1_input = self.board.video.irq_line();
        self.board.interrupts.irq2_input = self.external_irq;
    }

    /// Drive the expansion IRQ2 input.
    pub fn set_external_irq(&mut self, asserted: bool) {
        self.external_irq = asserted;
    }

    pub fn save(&mut self, platform: &mut dyn Platform) -> Result<(), SaveError> {
        self.board.cartridge.save(platform, self.path)
    }

    /// Identifies the loaded cartridge: ROM size above the board index.
    fn signature(&self) -> u64 {
        let cartridge = &self.board.cartridge;
        (cartridge.memory.rom.size() as u64) << 8 | cartridge.board as u64
    }

    fn serialize_components(&mut self, s: &mut Serializer) {
        self.scheduler.serialize(s);
        self.cpu.serialize(s);
        self.board.interrupts.serialize(s);
        self.board.video.serialize(s);
        self.board.work_ram.serialize(s);
        self.board.cartridge.serialize(s);
        s.boolean(&mut self.external_irq);
    }

    /// Capture the machine between two turns. ROM contents are not included.
    pub fn serialize(&mut self) -> Vec<u8> {
        let mut s = Serializer::saving();
        let mut signature = self.signature();
        s.integer(&mut signature);
        self.serialize_components(&mut s);
        s.into_bytes()
    }

    /// Restore a state taken with [`System::serialize`] from a system holding
    /// the same cartridge. Nothing is modified unless the header, length and
    /// cartridge signature all match.
    pub fn unserialize(&mut self, data: &[u8]) -> Result<(), StateError> {
        let mut s = Serializer::loading(data)?;
        let expected = self.serialize().len();
        if data.len() != expected {
            return Err(StateError::Size {
                expected,
                found: data.len(),
            });
        }
        let mut signature = 0u64;
        s.integer(&mut signature);
        if signature != self.signature() {
            return Err(StateError::Mismatch);
        }

        self.domains = DomainIds::create(&mut self.scheduler);
        self.map();
        self.serialize_components(&mut s);
        s.finish()?;
        debug!("Restored {} byte save state", data.len());
        Ok(())
    }

    /// Side-effect-free bus read.
    pub fn peek(&self, address: u16) -> u8 {
        self.bus.peek(&self.board, address as u32)
    }

    pub fn read(&mut self, address: u16) -> u8 {
        self.bus.read(&mut self.board, address as u32)
    }

    pub fn write(&mut self, address: u16, value: u8) {
        self.bus.write(&mut self.board, address as u32, value);
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn cpu_domain(&self) -> DomainId {
        self.domains.cpu
    }

    pub fn video_domain(&self) -> DomainId {
        self.domains.video
    }

    pub fn cartridge_domain(&self) -> DomainId {
        self.domains.cartridge
    }

    pub fn cartridge(&self) -> &Cartridge {
        &self.board.cartridge
    }

    pub fn cartridge_mut(&mut self) -> &mut Cartridge {
        &mut self.board.cartridge
    }

    pub fn interrupts(&self) -> &Interrupts {
        &self.board.interrupts
    }

    pub fn video(&self) -> &Video {
        &self.board.video
    }

    pub fn debugger(&self) -> &Debugger {
        &self.debugger
    }

    pub fn debugger_mut(&mut self) -> &mut Debugger {
        &mut self.debugger
    }
}

impl<C: Core> Domains for System<C> {
    fn scheduler(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    fn main(&mut self, id: DomainId) {
        if id == self.domains.video {
            let clocks = self.board.video.main();
            self.scheduler.step(id, clocks);
        } else if id == self.domains.cartridge {
            let clocks = self.board.cartridge.main();
            self.scheduler.step(id, clocks);
        } else {
            self.cpu_turn();
        }
    }
}
