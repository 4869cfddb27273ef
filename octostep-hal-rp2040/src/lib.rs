//! RP2040-specific HAL for the Octostep controller
//!
//! This crate provides the hardware pieces behind the board-agnostic core:
//!
//! - PIO-based step/dir pulse generation fed by exported command buffers
//! - SN74HC595 shift-register driver for the per-channel sleep lines
//! - Board pin assignments

#![no_std]

pub mod pins;
pub mod pio;
pub mod shift_register;
