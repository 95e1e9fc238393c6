//! Intel 8080 CPU core.
//!
//! This crate is deliberately free of dependencies: it is pure compute over
//! a caller-supplied bus. The machine crates (`retro80_invaders`,
//! `retro80_cpm`) provide the concrete memory maps and IO port handlers.

pub mod cpu;
pub mod frame;
pub mod opcode;

pub use cpu::{Bus8080, Cpu8080, Flags};
pub use frame::{FrameClock, FrameEvent};
