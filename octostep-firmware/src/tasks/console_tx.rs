//! Console UART transmit task
//!
//! Drains reply lines and writes them out with CRLF endings.

use defmt::*;
use embassy_rp::uart::BufferedUartTx;
use embedded_io_async::Write;

use crate::channels::RESPONSE_CHANNEL;

/// Console TX task - writes reply lines to the serial port
#[embassy_executor::task]
pub async fn console_tx_task(mut tx: BufferedUartTx) {
    info!("Console TX task started");

    loop {
        let line = RESPONSE_CHANNEL.receive().await;
        if tx.write_all(line.as_bytes()).await.is_err() {
            warn!("UART write error");
            continue;
        }
        let _ = tx.write_all(b"\r\n").await;
    }
}
