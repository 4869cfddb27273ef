//! Board pin assignments
//!
//! STEP/DIR wiring for the eight DRV8825 channels plus the SN74HC595 sleep
//! register control lines. The firmware binary takes the concrete pin
//! peripherals matching these numbers.

use octostep_core::CHANNEL_COUNT;

/// STEP line per DRV8825 channel
pub const STEP_PINS: [u8; CHANNEL_COUNT] = [15, 17, 21, 22, 23, 24, 25, 26];

/// DIR line per DRV8825 channel
pub const DIR_PINS: [u8; CHANNEL_COUNT] = [14, 18, 20, 4, 6, 27, 12, 13];

/// SN74HC595 control lines
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ShiftRegisterPins {
    /// Serial data (SER)
    pub data: u8,
    /// Shift clock (SRCLK)
    pub clock: u8,
    /// Storage latch (RCLK)
    pub latch: u8,
}

/// Shift register wiring on the reference board
pub const SHIFT_REGISTER_PINS: ShiftRegisterPins = ShiftRegisterPins {
    data: 18,
    clock: 19,
    latch: 20,
};
