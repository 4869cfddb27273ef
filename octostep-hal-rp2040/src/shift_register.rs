//! SN74HC595 sleep register driver
//!
//! Bit-bangs the assembled sleep pattern out over (data, clock, latch):
//! latch low, eight bits MSB-first, latch high. The register output pins
//! drive the DRV8825 nSLEEP lines.

use embassy_rp::gpio::{Level, Output};

use octostep_core::sleep::SleepWire;

/// Three-wire SN74HC595 driver
pub struct Sn74hc595<'d> {
    data: Output<'d>,
    clock: Output<'d>,
    latch: Output<'d>,
}

impl<'d> Sn74hc595<'d> {
    /// Create a driver from the three configured output lines
    ///
    /// See [`crate::pins::SHIFT_REGISTER_PINS`] for the board wiring.
    pub fn new(data: Output<'d>, clock: Output<'d>, latch: Output<'d>) -> Self {
        Self { data, clock, latch }
    }
}

impl SleepWire for Sn74hc595<'_> {
    fn shift_out(&mut self, pattern: u8) {
        self.latch.set_low();
        for bit in (0..8).rev() {
            let level = Level::from(pattern & (1 << bit) != 0);
            self.data.set_level(level);
            self.clock.set_high();
            self.clock.set_low();
        }
        self.latch.set_high();
    }
}
