//! Shift-register sleep control
//!
//! All eight DRV8825 sleep lines hang off one 8-bit shift register, so the
//! register is republished as a whole whenever any channel's sleep state
//! changes. This module keeps the per-channel state and the output polarity;
//! the physical (data, clock, latch) bit-banging lives behind [`SleepWire`]
//! in the HAL.

use crate::CHANNEL_COUNT;

/// Physical transport for the assembled sleep pattern
///
/// Implementations shift the 8-bit pattern out MSB-first between a
/// latch-low/latch-high pair (SN74HC595 style).
pub trait SleepWire {
    /// Publish one assembled pattern to the register
    fn shift_out(&mut self, pattern: u8);
}

/// Wire stub used before hardware is attached and in host tests
pub struct NullWire;

impl SleepWire for NullWire {
    fn shift_out(&mut self, _pattern: u8) {}
}

/// Per-channel sleep state plus the output polarity
///
/// Holds one *asleep* bit per channel. Bit `i` of the published pattern is
/// `asleep[i]` when the register is active-high, `!asleep[i]` otherwise
/// (the DRV8825 nSLEEP line is active-low: high keeps the driver awake).
pub struct SleepRegister<W> {
    states: [bool; CHANNEL_COUNT],
    active_high: bool,
    wire: Option<W>,
}

impl<W: SleepWire> SleepRegister<W> {
    /// Create an unconfigured register with every channel marked asleep
    pub fn new() -> Self {
        Self {
            states: [true; CHANNEL_COUNT],
            active_high: false,
            wire: None,
        }
    }

    /// Attach the physical wire and set the output polarity
    pub fn configure(&mut self, wire: W, active_high: bool) {
        self.wire = Some(wire);
        self.active_high = active_high;
    }

    /// Check whether a wire is attached
    pub fn is_configured(&self) -> bool {
        self.wire.is_some()
    }

    /// Record one channel's sleep state without publishing
    pub fn set_channel(&mut self, channel: usize, asleep: bool) {
        if channel < CHANNEL_COUNT {
            self.states[channel] = asleep;
        }
    }

    /// Read back one channel's recorded sleep state
    pub fn channel(&self, channel: usize) -> bool {
        self.states.get(channel).copied().unwrap_or(true)
    }

    /// Assemble the 8-bit output pattern for the current states
    pub fn pattern(&self) -> u8 {
        let mut pattern = 0u8;
        for (channel, &asleep) in self.states.iter().enumerate() {
            let output = if self.active_high { asleep } else { !asleep };
            if output {
                pattern |= 1 << channel;
            }
        }
        pattern
    }

    /// Publish the current pattern; a no-op while unconfigured
    pub fn apply(&mut self) {
        let pattern = self.pattern();
        if let Some(wire) = self.wire.as_mut() {
            wire.shift_out(pattern);
        }
    }
}

impl<W: SleepWire> Default for SleepRegister<W> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Captures the most recent publishes for assertions
    struct RecordingWire {
        last: Option<u8>,
        publishes: usize,
    }

    impl RecordingWire {
        fn new() -> Self {
            Self {
                last: None,
                publishes: 0,
            }
        }
    }

    impl SleepWire for &mut RecordingWire {
        fn shift_out(&mut self, pattern: u8) {
            self.last = Some(pattern);
            self.publishes += 1;
        }
    }

    #[test]
    fn test_all_asleep_pattern_active_low() {
        // Active-low register: asleep channels drive nSLEEP low (bit clear)
        let register: SleepRegister<NullWire> = SleepRegister::new();
        assert_eq!(register.pattern(), 0x00);
    }

    #[test]
    fn test_awake_channel_sets_bit() {
        let mut register: SleepRegister<NullWire> = SleepRegister::new();
        register.set_channel(0, false);
        register.set_channel(3, false);
        assert_eq!(register.pattern(), 0b0000_1001);
    }

    #[test]
    fn test_active_high_inverts_pattern() {
        let mut register: SleepRegister<NullWire> = SleepRegister::new();
        register.configure(NullWire, true);
        assert_eq!(register.pattern(), 0xFF);

        register.set_channel(7, false);
        assert_eq!(register.pattern(), 0x7F);
    }

    #[test]
    fn test_apply_publishes_once_configured() {
        let mut wire = RecordingWire::new();
        {
            let mut register: SleepRegister<&mut RecordingWire> = SleepRegister::new();
            register.apply();

            register.configure(&mut wire, false);
            register.set_channel(2, false);
            register.apply();
        }

        assert_eq!(wire.publishes, 1);
        assert_eq!(wire.last, Some(0b0000_0100));
    }

    #[test]
    fn test_out_of_range_channel_is_ignored() {
        let mut register: SleepRegister<NullWire> = SleepRegister::new();
        register.set_channel(CHANNEL_COUNT, false);
        assert_eq!(register.pattern(), 0x00);
        assert!(register.channel(CHANNEL_COUNT));
    }
}
