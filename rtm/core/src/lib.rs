#![no_std]
extern crate alloc;

pub mod audio;
pub mod backend;
pub mod color;
pub mod config;
pub mod coordinator;
pub mod engine;
pub mod link;
pub mod mux;
pub mod render;
pub mod timing;

pub use rtm_ring as ring;

/// Widest source image the engine accepts, in pixels.
pub const MAX_SOURCE_WIDTH: usize = 320;
/// Tallest source image the engine accepts, in lines.
pub const MAX_SOURCE_HEIGHT: usize = 240;

/// Queued audio islands between the I/O core and the scanline interrupt.
pub const ISLAND_SLOTS: usize = 256;
/// Queued samples for the DAC/PWM output path.
pub const DAC_SLOTS: usize = 1024;
/// Source lines in flight for the streaming deployment.
pub const LINE_SLOTS: usize = 4;
/// Control commands and reclaimed buffers in flight between the cores.
pub const COMMAND_SLOTS: usize = 8;
