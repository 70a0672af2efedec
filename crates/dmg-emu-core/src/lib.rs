//! Cycle-stepped emulation of the original monochrome Game Boy (DMG).
//!
//! The crate is headless: hosts feed it cartridge bytes and per-frame button
//! state through the [`gameboy`] facade and read back a 160x144 frame.

/// Cartridge header decoding, bank controllers and save RAM.
pub mod cartridge;

/// SM83 processor core.
pub mod cpu;

/// Errors surfaced by the processor core.
pub mod error;

/// Frame driver that wires every component into one machine.
pub mod gameboy;

/// Joypad latch and button flags.
pub mod input;

/// Memory map and hardware registers.
pub mod mmu;

/// Primary and CB-prefixed dispatch tables.
pub mod opcodes;

/// Named display palettes.
pub mod palette;

/// Scanline picture generation.
pub mod ppu;

/// Divider and programmable timer.
pub mod timer;

pub use error::EmuError;
pub use gameboy::GameBoy;
