mod chip8;
mod execute;
mod font;
mod nibble;
mod opcode;
mod runner;
mod types;

pub use chip8::Chip8;
pub use nibble::u4;
pub use opcode::{Opcode, OpcodeALU};
pub use runner::Chip8Runner;
pub use types::{Chip8Error, Chip8Result, DISPLAY_X, DISPLAY_Y, Display};
