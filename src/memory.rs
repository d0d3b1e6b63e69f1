use crate::machine::MachineError;

// NB. addresses are u16 as per the chip-8; lengths are usize to stop endless casting

/// Represents the addressable memory of the machine
pub trait MemoryMap {
    /// write a chunk of bytes into "RAM"
    fn write(&mut self, data: &[u8], addr: u16) -> Result<(), MachineError> {
        self.get_rw_slice(addr, data.len())?.copy_from_slice(data);
        Ok(())
    }

    /// get a two-byte big-endian word (opcodes)
    fn get_word(&self, addr: u16) -> Result<u16, MachineError> {
        let word = self.get_ro_slice(addr, 2)?;
        Ok(((word[0] as u16) << 8) + (word[1] as u16))
    }

    /// get a r/w slice of the underlying memory
    fn get_rw_slice(&mut self, addr: u16, len: usize) -> Result<&mut [u8], MachineError>;

    /// get a r/o slice of the underlying memory
    fn get_ro_slice(&self, addr: u16, len: usize) -> Result<&[u8], MachineError>;
}

/// Defines the CHIP-8 memory map as seen by modern interpreters
///   0x0000-0x01ff  interpreter (font lives at 0x050)
///   0x0200-0x0fff  program
pub struct Chip8MemoryMap {
    bytes: Box<[u8]>,
    pub program_addr: u16,
    pub font_addr: u16,
}

impl MemoryMap for Chip8MemoryMap {
    fn get_rw_slice(&mut self, addr: u16, len: usize) -> Result<&mut [u8], MachineError> {
        let a = addr as usize;
        self.bytes
            .get_mut(a..a + len)
            .ok_or(MachineError::AddressOutOfRange { addr: (a + len).saturating_sub(1) })
    }

    fn get_ro_slice(&self, addr: u16, len: usize) -> Result<&[u8], MachineError> {
        let a = addr as usize;
        self.bytes
            .get(a..a + len)
            .ok_or(MachineError::AddressOutOfRange { addr: (a + len).saturating_sub(1) })
    }
}

/// how much RAM we have
pub const CHIP8_RAM_SIZE_BYTES: usize = 4096;

/// where the program is loaded
pub const CHIP8_PROGRAM_ADDR: u16 = 0x0200;

/// largest program that fits between the entry address and the top of RAM
pub const CHIP8_MAX_PROGRAM_BYTES: usize = CHIP8_RAM_SIZE_BYTES - CHIP8_PROGRAM_ADDR as usize;

/// bytes per glyph in the font
pub const CHIP8_FONT_GLYPH_BYTES: u16 = 5;

impl Chip8MemoryMap {
    /// initialises CHIP-8 with contemporary memory contents
    pub fn new() -> Self {
        let mut mm = Chip8MemoryMap {
            bytes: vec![0u8; CHIP8_RAM_SIZE_BYTES].into_boxed_slice(),
            program_addr: CHIP8_PROGRAM_ADDR,
            font_addr: CHIP8_CONTEMPORARY_FONT_ADDR,
        };
        mm.install_font();
        mm
    }

    /// zero everything and put the font back
    pub fn reset(&mut self) {
        self.bytes.fill(0);
        self.install_font();
    }

    /// load a CHIP-8 program at 0x200
    pub fn load_program(&mut self, program: &[u8]) -> Result<(), MachineError> {
        if program.len() > CHIP8_MAX_PROGRAM_BYTES {
            return Err(MachineError::ProgramTooLarge {
                size: program.len(),
                max: CHIP8_MAX_PROGRAM_BYTES,
            });
        }
        self.write(program, self.program_addr)
    }

    /// address of the glyph for a hex digit (only the low nibble counts)
    pub fn glyph_addr(&self, digit: u8) -> u16 {
        self.font_addr + (digit & 0x0f) as u16 * CHIP8_FONT_GLYPH_BYTES
    }

    fn install_font(&mut self) {
        let a = CHIP8_CONTEMPORARY_FONT_ADDR as usize;
        self.bytes[a..a + CHIP8_CONTEMPORARY_FONT.len()].copy_from_slice(&CHIP8_CONTEMPORARY_FONT);
    }
}

impl Default for Chip8MemoryMap {
    fn default() -> Self {
        Self::new()
    }
}

const CHIP8_CONTEMPORARY_FONT_ADDR: u16 = 0x050;
const CHIP8_CONTEMPORARY_FONT: [u8; 80] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];
