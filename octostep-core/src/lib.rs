//! Board-agnostic motion engine for the Octostep stepper controller
//!
//! This crate contains all planning and sequencing logic that does not
//! depend on specific hardware implementations:
//!
//! - Trapezoidal timing calculator
//! - Per-channel motion state machines (absolute moves, three-phase homing)
//! - Double-buffered command slots toward the step generator
//! - Shift-register sleep model with the autosleep policy
//!
//! The firmware crate drives this engine with a periodic service tick and
//! routes serial commands through `octostep-protocol`.

#![no_std]
#![deny(unsafe_code)]

pub mod motion;
pub mod sleep;

/// Number of motor channels driven by the controller
pub const CHANNEL_COUNT: usize = 8;
