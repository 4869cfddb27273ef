//! PIO-based step/dir pulse generator
//!
//! Uses the RP2040's Programmable I/O to emit step bursts without CPU
//! involvement. Each channel gets its own state machine; the program is
//! loaded once per PIO block. A command is three FIFO words matching the
//! exported [`StepperCommand`]: half-period dwell in ticks, step count,
//! direction bit. The program raises IRQ 0 once it has latched a command so
//! the CPU can refill the channel's free slot
//! ([`MotorManager::mark_command_executed`]).
//!
//! [`MotorManager::mark_command_executed`]: octostep_core::motion::MotorManager::mark_command_executed

use embassy_rp::pio::{Common, Config, Direction as PioDirection, Instance, PioPin, StateMachine};
use embassy_rp::Peri;
use fixed::types::U24F8;

use octostep_core::motion::StepperCommand;

/// PIO block clock (RP2040 default system clock)
pub const PIO_CLOCK_HZ: u32 = 125_000_000;

/// Largest dwell the 24-bit pace counter can hold
pub const MAX_DELAY_TICKS: u32 = 0x00FF_FFFF;

/// Source listing of the step/dir program
pub const STEP_DIR_PROGRAM_SOURCE: &str = r#"
.program step_dir
.wrap_target
pull block            ; half-period dwell (ticks)
mov y, osr
pull block            ; step count
mov x, osr
pull block            ; direction bit
out pins, 1
irq 0                 ; command latched
step:
set pins, 1 [7]       ; STEP high
set pins, 0 [7]       ; STEP low
jmp x--, step
pace:
jmp y--, pace         ; stretch to the commanded half-period
.wrap
"#;

/// Convert a half-period in microseconds to pace-counter ticks
///
/// Returns 0 for a zero input; otherwise the tick count is clamped into
/// `[1, MAX_DELAY_TICKS]`.
pub fn delay_ticks_from_micros(half_period_us: u32, clock_hz: u32) -> u32 {
    if half_period_us == 0 || clock_hz == 0 {
        return 0;
    }
    let ticks = u64::from(clock_hz) * u64::from(half_period_us) / 1_000_000;
    ticks.clamp(1, u64::from(MAX_DELAY_TICKS)) as u32
}

/// One step generator channel
///
/// Owns a PIO state machine running the step/dir program with the channel's
/// STEP and DIR pins.
pub struct StepDirChannel<'d, PIO: Instance, const SM: usize> {
    sm: StateMachine<'d, PIO, SM>,
}

impl<'d, PIO: Instance, const SM: usize> StepDirChannel<'d, PIO, SM> {
    /// Create a channel on `sm` driving `step_pin` / `dir_pin`
    pub fn new<STEP: PioPin, DIR: PioPin>(
        common: &mut Common<'d, PIO>,
        mut sm: StateMachine<'d, PIO, SM>,
        step_pin: Peri<'d, STEP>,
        dir_pin: Peri<'d, DIR>,
    ) -> Self {
        let prg = pio::pio_asm!(
            ".wrap_target",
            "pull block",
            "mov y, osr",
            "pull block",
            "mov x, osr",
            "pull block",
            "out pins, 1",
            "irq 0",
            "step:",
            "set pins, 1 [7]",
            "set pins, 0 [7]",
            "jmp x--, step",
            "pace:",
            "jmp y--, pace",
            ".wrap",
        );

        let installed = common.load_program(&prg.program);
        let step = common.make_pio_pin(step_pin);
        let dir = common.make_pio_pin(dir_pin);

        let mut cfg = Config::default();
        cfg.use_program(&installed, &[]);
        cfg.set_set_pins(&[&step]);
        cfg.set_out_pins(&[&dir]);
        cfg.clock_divider = U24F8::from_num(1);

        sm.set_config(&cfg);
        sm.set_pin_dirs(PioDirection::Out, &[&step, &dir]);
        sm.set_enable(true);

        Self { sm }
    }

    /// Queue one exported command, waiting for FIFO space
    pub async fn push(&mut self, command: &StepperCommand) {
        let ticks = delay_ticks_from_micros(command.delay_ticks, PIO_CLOCK_HZ);
        self.sm.tx().wait_push(ticks).await;
        self.sm.tx().wait_push(command.step_count).await;
        self.sm.tx().wait_push(u32::from(command.direction_high)).await;
    }

    /// Stop emitting pulses and drain pending FIFO words
    pub fn stop(&mut self) {
        self.sm.set_enable(false);
        self.sm.clear_fifos();
        self.sm.restart();
    }
}
