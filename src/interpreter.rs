/// # interpreter
///
/// A CHIP-8 machine as modern interpreters present it:
///  * 16 8bit registers V0-VF; VF doubles as the carry/borrow/collision flag
///  * a 12bit index register I
///  * a program counter starting at 0x200
///  * a 16 level call stack kept outside of addressable memory
///  * delay and sound timers, counted down at 60Hz
///  * a 64x32 monochrome display, one byte per pixel
///  * a 16 key hex keypad
///
/// Timers are derived from the cycle count rather than the wall clock: they
/// decrement once every `timer_divider` cycles, so when the front end runs a
/// fixed number of cycles per 60th of a second the timers run at 60Hz.
use crate::machine::{Machine, MachineError, PixelState, HEIGHT, KEYPAD_SIZE, WIDTH};
use crate::memory::{Chip8MemoryMap, MemoryMap};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const STACK_DEPTH: usize = 16;

pub struct Chip8Interpreter {
    memory: Chip8MemoryMap,
    v: [u8; 16],
    i: u16,
    program_counter: u16,
    stack: [u16; STACK_DEPTH],
    stack_pointer: usize,
    delay_timer: u8,
    sound_timer: u8,
    timer_divider: u32,
    ticker: u32,
    keys: [bool; KEYPAD_SIZE as usize],
    display: PixelState,
    rng: StdRng,
}

/// what to do with the program counter once an instruction has run
enum ProgramCounter {
    Next,
    Skip,
    Jump(u16),
    Wait,
}

impl ProgramCounter {
    fn skip_if(cond: bool) -> Self {
        if cond {
            ProgramCounter::Skip
        } else {
            ProgramCounter::Next
        }
    }
}

/// Break u16 instruction into its 4 nibbles
fn nibbles(opcode: u16) -> (u8, u8, u8, u8) {
    (
        (opcode >> 12) as u8,
        ((opcode >> 8) & 0xf) as u8,
        ((opcode >> 4) & 0xf) as u8,
        (opcode & 0xf) as u8,
    )
}

impl Chip8Interpreter {
    /// timers tick once per cycle unless told otherwise
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// reproducible CXKK results, for tests
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        let memory = Chip8MemoryMap::new();
        let program_counter = memory.program_addr;
        Chip8Interpreter {
            memory,
            v: [0; 16],
            i: 0,
            program_counter,
            stack: [0; STACK_DEPTH],
            stack_pointer: 0,
            delay_timer: 0,
            sound_timer: 0,
            timer_divider: 1,
            ticker: 0,
            keys: [false; KEYPAD_SIZE as usize],
            display: [0; WIDTH * HEIGHT],
            rng,
        }
    }

    /// count the timers down once every `divider` cycles (zero is treated as one)
    pub fn set_timer_divider(&mut self, divider: u32) {
        self.timer_divider = divider.max(1);
        self.ticker = 0;
    }

    pub fn program_counter(&self) -> u16 {
        self.program_counter
    }

    pub fn register(&self, x: usize) -> u8 {
        self.v[x & 0xf]
    }

    pub fn index(&self) -> u16 {
        self.i
    }

    pub fn delay_timer(&self) -> u8 {
        self.delay_timer
    }

    pub fn sound_timer(&self) -> u8 {
        self.sound_timer
    }

    fn tick_timers(&mut self) {
        self.ticker += 1;
        if self.ticker >= self.timer_divider {
            self.ticker = 0;
            self.delay_timer = self.delay_timer.saturating_sub(1);
            self.sound_timer = self.sound_timer.saturating_sub(1);
        }
    }

    fn execute(&mut self, opcode: u16) -> Result<ProgramCounter, MachineError> {
        let nnn = opcode & 0x0fff;
        let kk = (opcode & 0x00ff) as u8;
        let pc = self.program_counter;

        let next = match nibbles(opcode) {
            // 00E0 CLS
            (0x0, 0x0, 0xE, 0x0) => {
                self.display = [0; WIDTH * HEIGHT];
                ProgramCounter::Next
            }
            // 00EE RET
            (0x0, 0x0, 0xE, 0xE) => {
                if self.stack_pointer == 0 {
                    return Err(MachineError::StackUnderflow { pc });
                }
                self.stack_pointer -= 1;
                ProgramCounter::Jump(self.stack[self.stack_pointer])
            }
            // 0nnn SYS addr: machine code routines are not emulated
            (0x0, _, _, _) => ProgramCounter::Next,
            // 1nnn JP addr
            (0x1, _, _, _) => ProgramCounter::Jump(nnn),
            // 2nnn CALL addr
            (0x2, _, _, _) => {
                if self.stack_pointer == STACK_DEPTH {
                    return Err(MachineError::StackOverflow { pc });
                }
                self.stack[self.stack_pointer] = pc + 2;
                self.stack_pointer += 1;
                ProgramCounter::Jump(nnn)
            }
            // 3xkk SE Vx, byte
            (0x3, x, _, _) => ProgramCounter::skip_if(self.v[x as usize] == kk),
            // 4xkk SNE Vx, byte
            (0x4, x, _, _) => ProgramCounter::skip_if(self.v[x as usize] != kk),
            // 5xy0 SE Vx, Vy
            (0x5, x, y, 0x0) => ProgramCounter::skip_if(self.v[x as usize] == self.v[y as usize]),
            // 6xkk LD Vx, byte
            (0x6, x, _, _) => {
                self.v[x as usize] = kk;
                ProgramCounter::Next
            }
            // 7xkk ADD Vx, byte (no carry)
            (0x7, x, _, _) => {
                self.v[x as usize] = self.v[x as usize].wrapping_add(kk);
                ProgramCounter::Next
            }
            (0x8, x, y, op) => {
                self.alu(x as usize, y as usize, op, opcode)?;
                ProgramCounter::Next
            }
            // 9xy0 SNE Vx, Vy
            (0x9, x, y, 0x0) => ProgramCounter::skip_if(self.v[x as usize] != self.v[y as usize]),
            // Annn LD I, addr
            (0xA, _, _, _) => {
                self.i = nnn;
                ProgramCounter::Next
            }
            // Bnnn JP V0, addr
            (0xB, _, _, _) => ProgramCounter::Jump((nnn + self.v[0] as u16) & 0x0fff),
            // Cxkk RND Vx, byte
            (0xC, x, _, _) => {
                self.v[x as usize] = self.rng.gen::<u8>() & kk;
                ProgramCounter::Next
            }
            // Dxyn DRW Vx, Vy, nibble
            (0xD, x, y, n) => {
                let collision = self.draw_sprite(self.v[x as usize], self.v[y as usize], n)?;
                self.v[0xF] = collision as u8;
                ProgramCounter::Next
            }
            // Ex9E SKP Vx
            (0xE, x, 0x9, 0xE) => ProgramCounter::skip_if(self.is_held(self.v[x as usize])),
            // ExA1 SKNP Vx
            (0xE, x, 0xA, 0x1) => ProgramCounter::skip_if(!self.is_held(self.v[x as usize])),
            // Fx07 LD Vx, DT
            (0xF, x, 0x0, 0x7) => {
                self.v[x as usize] = self.delay_timer;
                ProgramCounter::Next
            }
            // Fx0A LD Vx, K: run this instruction again until a key is held
            (0xF, x, 0x0, 0xA) => match self.keys.iter().position(|held| *held) {
                Some(key) => {
                    self.v[x as usize] = key as u8;
                    ProgramCounter::Next
                }
                None => ProgramCounter::Wait,
            },
            // Fx15 LD DT, Vx
            (0xF, x, 0x1, 0x5) => {
                self.delay_timer = self.v[x as usize];
                ProgramCounter::Next
            }
            // Fx18 LD ST, Vx
            (0xF, x, 0x1, 0x8) => {
                self.sound_timer = self.v[x as usize];
                ProgramCounter::Next
            }
            // Fx1E ADD I, Vx
            (0xF, x, 0x1, 0xE) => {
                self.i = (self.i + self.v[x as usize] as u16) & 0x0fff;
                ProgramCounter::Next
            }
            // Fx29 LD F, Vx
            (0xF, x, 0x2, 0x9) => {
                self.i = self.memory.glyph_addr(self.v[x as usize]);
                ProgramCounter::Next
            }
            // Fx33 LD B, Vx
            (0xF, x, 0x3, 0x3) => {
                let val = self.v[x as usize];
                self.memory.write(&[val / 100, (val / 10) % 10, val % 10], self.i)?;
                ProgramCounter::Next
            }
            // Fx55 LD [I], Vx
            (0xF, x, 0x5, 0x5) => {
                let regs = self.v;
                self.memory.write(&regs[..=x as usize], self.i)?;
                ProgramCounter::Next
            }
            // Fx65 LD Vx, [I]
            (0xF, x, 0x6, 0x5) => {
                let len = x as usize + 1;
                let bytes = self.memory.get_ro_slice(self.i, len)?;
                self.v[..len].copy_from_slice(bytes);
                ProgramCounter::Next
            }
            _ => return Err(MachineError::UnknownOpcode { opcode, pc }),
        };
        Ok(next)
    }

    /// 8xyN register to register arithmetic
    fn alu(&mut self, x: usize, y: usize, op: u8, opcode: u16) -> Result<(), MachineError> {
        let (vx, vy) = (self.v[x], self.v[y]);
        match op {
            // LD Vx, Vy
            0x0 => self.v[x] = vy,
            // OR Vx, Vy
            0x1 => self.v[x] |= vy,
            // AND Vx, Vy
            0x2 => self.v[x] &= vy,
            // XOR Vx, Vy
            0x3 => self.v[x] ^= vy,
            // ADD Vx, Vy; VF = carry
            0x4 => {
                let (sum, carry) = vx.overflowing_add(vy);
                self.v[x] = sum;
                self.v[0xF] = carry as u8;
            }
            // SUB Vx, Vy; VF = NOT borrow
            0x5 => {
                let (diff, borrow) = vx.overflowing_sub(vy);
                self.v[x] = diff;
                self.v[0xF] = !borrow as u8;
            }
            // SHR Vx; VF = bit shifted out
            0x6 => {
                self.v[x] = vx >> 1;
                self.v[0xF] = vx & 0x1;
            }
            // SUBN Vx, Vy; VF = NOT borrow
            0x7 => {
                let (diff, borrow) = vy.overflowing_sub(vx);
                self.v[x] = diff;
                self.v[0xF] = !borrow as u8;
            }
            // SHL Vx; VF = bit shifted out
            0xE => {
                self.v[x] = vx << 1;
                self.v[0xF] = vx >> 7;
            }
            _ => {
                return Err(MachineError::UnknownOpcode {
                    opcode,
                    pc: self.program_counter,
                })
            }
        }
        Ok(())
    }

    /// XOR an n-row sprite from I onto the display, wrapping at the edges;
    /// true if any lit pixel was switched off
    fn draw_sprite(&mut self, x: u8, y: u8, rows: u8) -> Result<bool, MachineError> {
        let sprite = self.memory.get_ro_slice(self.i, rows as usize)?;
        let mut collision = false;
        for (j, row) in sprite.iter().enumerate() {
            for bit in 0..8 {
                if (row >> (7 - bit)) & 0x1 == 0 {
                    continue;
                }
                let px = (x as usize + bit) % WIDTH;
                let py = (y as usize + j) % HEIGHT;
                let cell = &mut self.display[px + py * WIDTH];
                collision |= *cell == 1;
                *cell ^= 1;
            }
        }
        Ok(collision)
    }

    fn is_held(&self, key: u8) -> bool {
        self.keys[(key & 0xf) as usize]
    }
}

impl Default for Chip8Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Machine for Chip8Interpreter {
    fn reset(&mut self) {
        self.memory.reset();
        self.v = [0; 16];
        self.i = 0;
        self.program_counter = self.memory.program_addr;
        self.stack = [0; STACK_DEPTH];
        self.stack_pointer = 0;
        self.delay_timer = 0;
        self.sound_timer = 0;
        self.ticker = 0;
        self.keys = [false; KEYPAD_SIZE as usize];
        self.display = [0; WIDTH * HEIGHT];
    }

    fn load(&mut self, program: &[u8]) -> Result<(), MachineError> {
        self.memory.load_program(program)
    }

    fn cycle(&mut self) -> Result<(), MachineError> {
        let pc = self.program_counter;
        let opcode = self.memory.get_word(pc)?;
        self.tick_timers();
        match self.execute(opcode)? {
            ProgramCounter::Next => self.program_counter = pc + 2,
            ProgramCounter::Skip => self.program_counter = pc + 4,
            ProgramCounter::Jump(addr) => self.program_counter = addr,
            ProgramCounter::Wait => {}
        }
        Ok(())
    }

    fn pixels(&self) -> &PixelState {
        &self.display
    }

    fn key_down(&mut self, key: u8) {
        match self.keys.get_mut(key as usize) {
            Some(held) => *held = true,
            None => log::warn!("ignoring press of key {:#x}, keypad has 16 keys", key),
        }
    }

    fn key_up(&mut self, key: u8) {
        match self.keys.get_mut(key as usize) {
            Some(held) => *held = false,
            None => log::warn!("ignoring release of key {:#x}, keypad has 16 keys", key),
        }
    }
}
