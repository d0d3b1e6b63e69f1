//! A terminal front end for a CHIP-8 interpreter.
//!
//! ## Design
//!
//! * the interpreter hides behind the `Machine` trait; nothing else knows
//!   how CHIP-8 works
//! * one thread runs everything that touches the machine, so a ROM switch
//!   is atomic with respect to ticks without any locking
//! * ticks run a batch of cycles then draw exactly one frame
//! * timing is a pluggable `Scheduler`: fixed interval, or frame paced and
//!   paused while the terminal is out of focus
//! * abstract display and input so can plug alternatives; TUI in-console
//!   for now
//! * ROMs are fetched off-thread, newest request wins
//!
//! Model
//!
//! ```text
//! Session
//!  |-- machine (Chip8Interpreter)
//!  |-- loop controller(scheduler, batch, palette)
//!  |-- key bridge(keymap)
//!  |-- rom loader(source)  -- worker threads --> channel
//!  |-- display, input
//!  `-- pump()
//!       |-- input events -> key bridge / commands
//!       |-- fetched ROM -> reset + load
//!       `-- due tick -> cycle x batch -> decode -> draw
//! ```
pub mod config;
pub mod controller;
pub mod display;
pub mod input;
pub mod interpreter;
pub mod keys;
pub mod machine;
pub mod memory;
pub mod rom;
pub mod scheduler;
pub mod session;
pub mod video;

pub use controller::{LoopController, LoopError, RunState};
pub use interpreter::Chip8Interpreter;
pub use keys::{KeyBridge, KeyMap};
pub use machine::{Machine, MachineError, PixelState, HEIGHT, WIDTH};
pub use rom::{DirRomSource, MemoryRomSource, Rom, RomError, RomLoader, RomSource};
pub use session::{Session, SessionError};
pub use video::{decode, Framebuffer, Palette, Rgb};
