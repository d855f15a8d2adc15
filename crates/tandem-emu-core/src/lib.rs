//! Deterministic emulation core built from cooperating clock domains.
//!
//! This crate holds the platform-agnostic machine logic: the scheduler, the
//! CPU's interrupt and timer unit, bus dispatch and the cartridge mapper
//! family. Frontends drive it through the [`system`] facade and supply file
//! access through [`platform::Platform`].

/// Address-to-handler dispatch table and the `Io` port capability.
pub mod bus;

/// Cartridge loading, persistence and bank-switching mappers.
pub mod cartridge;

/// Interrupt arbitration, the interrupt/timer I/O block and the `Core` seam.
pub mod cpu;

/// Opt-in instruction and interrupt notifications.
pub mod debug;

/// Load and save errors.
pub mod error;

/// Cartridge manifest document.
pub mod manifest;

/// File access supplied by the frontend.
pub mod platform;

/// 65C02-family instruction core.
pub mod r65c02;

/// Cooperative clock-domain scheduler.
pub mod scheduler;

/// Save-state encoding shared by every stateful component.
pub mod state;

/// High-level facade that wires every device into a single machine.
pub mod system;

/// Countdown timer behind the TIQ line.
pub mod timer;

/// Raster counters and the IRQ1 raster-compare source.
pub mod video;

pub use error::{LoadError, SaveError, StateError};
pub use r65c02::R65c02;
pub use system::System;
