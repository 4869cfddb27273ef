//! Console UART receive task
//!
//! Accumulates raw bytes into complete command lines: `\r` is stripped,
//! `\n` terminates a line. A line that overruns the buffer is discarded and
//! reported so the controller can answer with the length error.

use defmt::*;
use embassy_rp::uart::BufferedUartRx;
use embedded_io_async::Read;

use crate::channels::{CommandLine, LineEvent, LINE_CHANNEL};

/// Buffer size for UART reads
const RX_BUF_SIZE: usize = 64;

/// Console RX task - builds command lines from the serial stream
#[embassy_executor::task]
pub async fn console_rx_task(mut rx: BufferedUartRx) {
    info!("Console RX task started");

    let mut line = CommandLine::new();
    let mut overflow = false;
    let mut buf = [0u8; RX_BUF_SIZE];

    loop {
        match rx.read(&mut buf).await {
            Ok(n) if n > 0 => {
                for &byte in &buf[..n] {
                    match byte {
                        b'\r' => {}
                        b'\n' => {
                            let event = if overflow {
                                LineEvent::Overflow
                            } else {
                                LineEvent::Line(line.clone())
                            };
                            LINE_CHANNEL.send(event).await;
                            line.clear();
                            overflow = false;
                        }
                        _ => {
                            if line.push(byte as char).is_err() {
                                overflow = true;
                            }
                        }
                    }
                }
            }
            Ok(_) => {
                // No bytes read, continue
            }
            Err(e) => {
                warn!("UART read error: {:?}", e);
            }
        }
    }
}
