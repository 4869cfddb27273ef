//! Octostep serial command protocol
//!
//! This crate defines the line-oriented text protocol between a host and the
//! controller, and the processor that binds it to the motion engine.
//!
//! # Protocol overview
//!
//! Commands are single `\n`-terminated lines:
//!
//! ```text
//! VERB[:PAYLOAD]
//! ```
//!
//! Verbs are case-insensitive; payloads are comma-separated fields. The
//! first line of every reply is `CTRL:<code>` where `<code>` is `OK` or an
//! `ERR_*` identifier; further lines carry `KEY=value` payload data.
//!
//! ```text
//! > MOVE:0,300
//! < CTRL:OK
//! < MOVE:CH=0 POS=0 TARGET=300 STATE=MOVING
//! < MOVE:SPEED=4000 ACC=16000 PLAN_US=273861 STEPS=300
//! ```

#![no_std]
#![deny(unsafe_code)]

pub mod parse;
pub mod processor;
pub mod response;

pub use processor::{CommandProcessor, MAX_COMMAND_LEN, MAX_VERB_LEN};
pub use response::{Response, ResponseCode, MAX_RESPONSE_LINES, MAX_RESPONSE_LINE_LEN};
