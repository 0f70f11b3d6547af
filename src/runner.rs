use crate::{Chip8, Chip8Error, Chip8Result, u4};

const CPU_HZ: f32 = 700.0;
const TIMER_HZ: f32 = 60.0;

const CPU_TIME_STEP: f32 = 1.0 / CPU_HZ;
const TIMER_TIME_STEP: f32 = 1.0 / TIMER_HZ;

/// High-level emulator runner that manages timing internally.
pub struct Chip8Runner {
    chip8: Chip8,
    cpu_dt_accumulator: f32,
    timer_dt_accumulator: f32,
    sound_pending: bool,
}

impl Chip8Runner {
    pub fn new(chip8: Chip8) -> Self {
        Self {
            chip8,
            cpu_dt_accumulator: 0.0,
            timer_dt_accumulator: 0.0,
            sound_pending: false,
        }
    }

    /// Update emulator by delta time, handles both CPU and timer cycles.
    ///
    /// Runs as many CPU cycles and timer updates as needed based on the elapsed time `dt`.
    /// Returns early if a frame has to be rendered before the next CPU cycle (Chip8Result::WaitForNextFrame).
    pub fn update(&mut self, dt: f32) -> Result<Chip8Result, Chip8Error> {
        self.cpu_dt_accumulator += dt;
        self.timer_dt_accumulator += dt;

        while self.timer_dt_accumulator >= TIMER_TIME_STEP {
            self.timer_dt_accumulator -= TIMER_TIME_STEP;
            if self.chip8.timers_cycle() {
                self.sound_pending = true;
            }
        }

        while self.cpu_dt_accumulator >= CPU_TIME_STEP {
            self.cpu_dt_accumulator -= CPU_TIME_STEP;
            match self.chip8.cpu_cycle()? {
                Chip8Result::WaitForNextFrame => {
                    // If we need to wait for the next frame we stop executing cycles.
                    // We also clear the accumulator to avoid "catching up" too fast in the next frame.
                    self.cpu_dt_accumulator = 0.0;
                    return Ok(Chip8Result::WaitForNextFrame);
                }
                Chip8Result::Continue => {}
            }
        }

        Ok(Chip8Result::Continue)
    }

    /// Returns true if a sound timer expiry happened since the last call.
    /// The pending event is cleared on read.
    pub fn take_sound_event(&mut self) -> bool {
        std::mem::take(&mut self.sound_pending)
    }

    /// Set the state of a key on the keypad.
    pub fn set_key(&mut self, key: u4, pressed: bool) {
        self.chip8.set_key(key, pressed)
    }

    /// Get the state of a pixel on the display (true = on, false = off).
    pub fn get_display_pixel(&self, y: usize, x: usize) -> bool {
        self.chip8.get_display_pixel(y, x)
    }

    /// Returns true once the machine has hit an unrecoverable fault.
    pub fn is_halted(&self) -> bool {
        self.chip8.is_halted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner_with(rom: &[u8]) -> Chip8Runner {
        let mut chip8 = Chip8::new();
        chip8.load(rom).unwrap();
        Chip8Runner::new(chip8)
    }

    #[test]
    fn update_runs_cycles_proportional_to_elapsed_time() {
        // 7101 increments V1, 1200 jumps back to it; V1 counts executed adds
        let mut runner = runner_with(&[0x71, 0x01, 0x12, 0x00]);

        runner.update(CPU_TIME_STEP).unwrap();
        assert_eq!(runner.chip8.v[1], 1);

        // The half step absorbs accumulated floating point error
        runner.update(CPU_TIME_STEP * 4.5).unwrap();
        assert_eq!(runner.chip8.v[1], 3);
    }

    #[test]
    fn update_latches_sound_events_for_the_shell() {
        let mut runner = runner_with(&[0x12, 0x00]);
        runner.chip8.sound_timer = 1;

        runner.update(TIMER_TIME_STEP).unwrap();

        assert!(runner.take_sound_event());
        // The flag clears on read
        assert!(!runner.take_sound_event());
    }

    #[test]
    fn update_surfaces_engine_faults() {
        let mut runner = runner_with(&[0x00, 0xEE]);

        let result = runner.update(CPU_TIME_STEP);

        assert!(matches!(result, Err(Chip8Error::StackUnderflow)));
        assert!(runner.is_halted());
    }
}
