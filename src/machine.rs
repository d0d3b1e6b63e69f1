//! The contract between the front end and whatever executes CHIP-8 code.
//!
//! The loop controller, the key bridge and the ROM installer only ever talk
//! to a machine through this trait, so they can be driven by the real
//! interpreter or by a fake in tests.

use thiserror::Error;

/// width of the CHIP-8 display in pixels
pub const WIDTH: usize = 64;
/// height of the CHIP-8 display in pixels
pub const HEIGHT: usize = 32;
/// number of keys on the hex keypad
pub const KEYPAD_SIZE: u8 = 16;

/// one byte per pixel, row-major, 0 = off and 1 = on
pub type PixelState = [u8; WIDTH * HEIGHT];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MachineError {
    #[error("program is {size} bytes, only {max} fit in memory")]
    ProgramTooLarge { size: usize, max: usize },

    #[error("unknown opcode {opcode:#06x} at {pc:#05x}")]
    UnknownOpcode { opcode: u16, pc: u16 },

    #[error("call stack overflow at {pc:#05x}")]
    StackOverflow { pc: u16 },

    #[error("return with empty call stack at {pc:#05x}")]
    StackUnderflow { pc: u16 },

    #[error("memory access out of range at {addr:#06x}")]
    AddressOutOfRange { addr: usize },
}

pub trait Machine {
    /// put everything back to the post-construction state, discarding any
    /// loaded program
    fn reset(&mut self);

    /// copy a program to the entry address; only valid straight after reset
    fn load(&mut self, program: &[u8]) -> Result<(), MachineError>;

    /// execute exactly one instruction
    fn cycle(&mut self) -> Result<(), MachineError>;

    /// current video memory
    fn pixels(&self) -> &PixelState;

    /// mark a key as held; holding an already held key changes nothing
    fn key_down(&mut self, key: u8);

    /// mark a key as released
    fn key_up(&mut self, key: u8);
}
