use crate::{
    Chip8Error, Chip8Result, DISPLAY_X, DISPLAY_Y, Display, Opcode,
    font::{FONT, FONT_END_ADDRESS, FONT_START_ADDRESS},
    u4,
};
use rand::{SeedableRng, rngs::StdRng};

// The constants are specified by the CHIP-8 specification
const ROM_START_ADDRESS: usize = 0x200;
pub(crate) const MEMORY_SIZE: usize = 4096;
pub(crate) const STACK_SIZE: usize = 16;

/// CHIP-8 virtual machine state
pub struct Chip8 {
    /// 4KB memory array
    pub(crate) memory: [u8; MEMORY_SIZE],
    /// Display buffer: 64x32 monochrome pixels
    pub(crate) display: Display,

    /// Program counter: address of the next instruction to execute
    pub(crate) pc: u16,
    /// Index register: used for memory operations
    pub(crate) i: u16,
    /// General-purpose registers V0-VF (VF doubles as the flag register)
    pub(crate) v: [u8; 16],
    /// Call stack holding subroutine return addresses, at most `STACK_SIZE` deep
    pub(crate) stack: Vec<u16>,

    /// Delay timer: decrements at 60Hz until it reaches 0
    pub(crate) delay_timer: u8,
    /// Sound timer: decrements at 60Hz until it reaches 0
    pub(crate) sound_timer: u8,

    /// Keypad state: 16 keys mapped as booleans (true = pressed)
    pub(crate) keypad: [bool; 16],

    /// Set on an unrecoverable fault; the machine refuses further cycles
    pub(crate) halted: bool,

    /// Random number source for the Cxnn instruction
    pub(crate) rng: StdRng,
}

impl Chip8 {
    pub fn new() -> Self {
        let mut chip8 = Chip8 {
            memory: [0; MEMORY_SIZE],
            display: [[false; DISPLAY_X]; DISPLAY_Y],
            pc: ROM_START_ADDRESS as u16,
            i: 0,
            v: [0; 16],
            stack: Vec::new(),
            delay_timer: 0,
            sound_timer: 0,
            keypad: [false; 16],
            halted: false,
            rng: StdRng::from_os_rng(),
        };

        chip8.memory[FONT_START_ADDRESS..FONT_END_ADDRESS].copy_from_slice(&FONT);

        chip8
    }

    /// Loads a ROM into memory starting at 0x200.
    ///
    /// A ROM that does not fit in memory is rejected without modifying any state.
    pub fn load(&mut self, rom: &[u8]) -> Result<(), Chip8Error> {
        let rom_end = ROM_START_ADDRESS + rom.len();
        self.memory
            .get_mut(ROM_START_ADDRESS..rom_end)
            .ok_or(Chip8Error::RomTooLarge {
                size: rom.len(),
                max_size: MEMORY_SIZE - ROM_START_ADDRESS,
            })?
            .copy_from_slice(rom);

        // Set program counter to start of ROM
        self.pc = ROM_START_ADDRESS as u16;

        Ok(())
    }

    /// Executes a single CPU cycle (fetch, decode, execute).
    ///
    /// A fault (stack overflow/underflow, memory access out of bounds) halts the
    /// machine permanently; every later call returns `Chip8Error::Halted`.
    pub fn cpu_cycle(&mut self) -> Result<Chip8Result, Chip8Error> {
        if self.halted {
            return Err(Chip8Error::Halted);
        }

        let result = self.try_cycle();
        if result.is_err() {
            self.halted = true;
        }

        result
    }

    fn try_cycle(&mut self) -> Result<Chip8Result, Chip8Error> {
        let opcode = self.fetch()?;
        let decoded_opcode = Opcode::decode(opcode);
        self.execute(decoded_opcode)
    }

    /// Updates the delay and sound timers. Should be called at 60Hz.
    ///
    /// Returns true exactly when the sound timer transitions from 1 to 0 on this
    /// call, signaling the caller to start playing a sound.
    pub fn timers_cycle(&mut self) -> bool {
        if self.delay_timer > 0 {
            self.delay_timer -= 1;
        }

        let sound_elapsed = self.sound_timer == 1;
        if self.sound_timer > 0 {
            self.sound_timer -= 1;
        }

        sound_elapsed
    }

    /// Set the state of a key on the keypad.
    pub fn set_key(&mut self, key: u4, pressed: bool) {
        self.keypad[key] = pressed;
    }

    /// Get the state of a pixel on the display (true = on, false = off).
    pub fn get_display_pixel(&self, y: usize, x: usize) -> bool {
        self.display[y][x]
    }

    pub fn delay_timer(&self) -> u8 {
        self.delay_timer
    }

    pub fn sound_timer(&self) -> u8 {
        self.sound_timer
    }

    /// Returns true once the machine has hit an unrecoverable fault.
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Replace the random number source with one seeded from `seed`,
    /// for reproducible runs.
    pub fn seed_rng(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Fetches the next 16-bit opcode from memory.
    fn fetch(&mut self) -> Result<u16, Chip8Error> {
        let high = *self.mem_get(self.pc)?;
        let low = *self.mem_get(self.pc.wrapping_add(1))?;

        Ok(u16::from_be_bytes([high, low]))
    }

    /// Helper to get a mutable reference to a memory location with bounds checking.
    pub(crate) fn mem_get(&mut self, addr: u16) -> Result<&mut u8, Chip8Error> {
        self.memory
            .get_mut(addr as usize)
            .ok_or(Chip8Error::MemoryOutOfBounds { address: addr })
    }
}

impl Default for Chip8 {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_zeroed_with_font_loaded() {
        let chip8 = Chip8::new();

        assert_eq!(chip8.pc, 0x200);
        assert_eq!(chip8.i, 0);
        assert_eq!(chip8.v, [0; 16]);
        assert!(chip8.stack.is_empty());
        assert_eq!(chip8.delay_timer, 0);
        assert_eq!(chip8.sound_timer, 0);
        assert!(!chip8.is_halted());

        assert_eq!(chip8.memory[FONT_START_ADDRESS..FONT_END_ADDRESS], FONT);
        // Everything past the reserved area is still zero
        assert_eq!(chip8.memory[ROM_START_ADDRESS..], [0; MEMORY_SIZE - ROM_START_ADDRESS]);
    }

    #[test]
    fn load_copies_rom_to_0x200() {
        let mut chip8 = Chip8::new();
        let rom = [0x60, 0x2A, 0xA1, 0x23, 0xD0, 0x15];

        chip8.load(&rom).unwrap();

        assert_eq!(chip8.memory[0x200..0x200 + rom.len()], rom);
        assert_eq!(chip8.pc, 0x200);
    }

    #[test]
    fn load_accepts_rom_filling_all_available_memory() {
        let mut chip8 = Chip8::new();
        let rom = vec![0xAB; MEMORY_SIZE - ROM_START_ADDRESS];

        chip8.load(&rom).unwrap();

        assert_eq!(chip8.memory[MEMORY_SIZE - 1], 0xAB);
    }

    #[test]
    fn load_rejects_oversized_rom_without_touching_memory() {
        let mut chip8 = Chip8::new();
        let rom = vec![0xAB; MEMORY_SIZE - ROM_START_ADDRESS + 1];

        let result = chip8.load(&rom);

        assert!(matches!(
            result,
            Err(Chip8Error::RomTooLarge { size, max_size })
                if size == rom.len() && max_size == MEMORY_SIZE - ROM_START_ADDRESS
        ));
        assert_eq!(chip8.memory[ROM_START_ADDRESS..], [0; MEMORY_SIZE - ROM_START_ADDRESS]);
        assert!(!chip8.is_halted());
    }

    #[test]
    fn fetch_combines_bytes_big_endian() {
        let mut chip8 = Chip8::new();
        chip8.load(&[0xAA, 0xBB]).unwrap();

        assert_eq!(chip8.fetch().unwrap(), 0xAABB);
    }

    #[test]
    fn fetch_at_end_of_memory_is_a_fault() {
        let mut chip8 = Chip8::new();
        chip8.pc = (MEMORY_SIZE - 1) as u16;

        let result = chip8.cpu_cycle();

        assert!(matches!(
            result,
            Err(Chip8Error::MemoryOutOfBounds { address }) if address == MEMORY_SIZE as u16
        ));
        assert!(chip8.is_halted());
    }

    #[test]
    fn halted_machine_refuses_further_cycles() {
        let mut chip8 = Chip8::new();
        chip8.load(&[0x00, 0xEE]).unwrap(); // return with empty stack

        assert!(matches!(chip8.cpu_cycle(), Err(Chip8Error::StackUnderflow)));

        let pc_after_fault = chip8.pc;
        assert!(matches!(chip8.cpu_cycle(), Err(Chip8Error::Halted)));
        assert_eq!(chip8.pc, pc_after_fault);
    }

    #[test]
    fn timers_decrement_and_clamp_at_zero() {
        let mut chip8 = Chip8::new();
        chip8.delay_timer = 2;

        assert!(!chip8.timers_cycle());
        assert_eq!(chip8.delay_timer, 1);
        assert!(!chip8.timers_cycle());
        assert_eq!(chip8.delay_timer, 0);
        assert!(!chip8.timers_cycle());
        assert_eq!(chip8.delay_timer, 0);
    }

    #[test]
    fn sound_timer_reaching_zero_signals_once() {
        let mut chip8 = Chip8::new();
        chip8.sound_timer = 2;

        assert!(!chip8.timers_cycle());
        assert!(chip8.timers_cycle());
        assert_eq!(chip8.sound_timer, 0);
        assert!(!chip8.timers_cycle());
    }
}
