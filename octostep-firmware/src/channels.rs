//! Inter-task communication channels
//!
//! Static embassy-sync channels between the console tasks and the
//! controller.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use heapless::String;

use octostep_protocol::{MAX_COMMAND_LEN, MAX_RESPONSE_LINE_LEN};

/// One received command line
pub type CommandLine = String<MAX_COMMAND_LEN>;

/// One reply line ready for the serial port
pub type ResponseLine = String<MAX_RESPONSE_LINE_LEN>;

/// Channel capacity for complete command lines
const LINE_CHANNEL_SIZE: usize = 4;

/// Channel capacity for outgoing reply lines
const RESPONSE_CHANNEL_SIZE: usize = 16;

/// Outcome of accumulating one serial line
pub enum LineEvent {
    /// A complete line within the length budget
    Line(CommandLine),
    /// The line overran the buffer and was discarded
    Overflow,
}

/// Complete lines from the console RX task to the controller
pub static LINE_CHANNEL: Channel<CriticalSectionRawMutex, LineEvent, LINE_CHANNEL_SIZE> =
    Channel::new();

/// Reply lines from the controller to the console TX task
pub static RESPONSE_CHANNEL: Channel<CriticalSectionRawMutex, ResponseLine, RESPONSE_CHANNEL_SIZE> =
    Channel::new();
