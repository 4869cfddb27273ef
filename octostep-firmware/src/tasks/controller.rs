//! Controller task
//!
//! Owns the command processor and interleaves command handling with the
//! periodic motion service tick. The tick feeds the engine the measured
//! wall-clock delta in microseconds, so plan progress follows real time
//! even when ticks jitter.

use defmt::*;
use embassy_futures::select::{select, Either};
use embassy_time::{Duration, Instant, Ticker};

use octostep_hal_rp2040::shift_register::Sn74hc595;
use octostep_protocol::{CommandProcessor, Response};

use crate::channels::{LineEvent, ResponseLine, LINE_CHANNEL, RESPONSE_CHANNEL};

/// Service tick interval in milliseconds
const SERVICE_INTERVAL_MS: u64 = 1;

type Processor = CommandProcessor<Sn74hc595<'static>>;

/// Controller task - command processing plus the motion service tick
#[embassy_executor::task]
pub async fn controller_task(shift_register: Sn74hc595<'static>) {
    info!("Controller task started");

    let mut processor: Processor = CommandProcessor::new();
    processor
        .manager_mut()
        .configure_shift_register(shift_register, false);

    send_line("CTRL:READY").await;
    info!("Controller ready");

    let mut response = Response::new();
    let mut ticker = Ticker::every(Duration::from_millis(SERVICE_INTERVAL_MS));
    let mut last_service = Instant::now();

    loop {
        match select(LINE_CHANNEL.receive(), ticker.next()).await {
            Either::First(event) => {
                service_elapsed(&mut processor, &mut last_service);
                match event {
                    LineEvent::Line(line) => {
                        trace!("Command: {}", line.as_str());
                        processor.process_line(line.as_str(), &mut response);
                        for reply in response.lines() {
                            send_line(reply).await;
                        }
                    }
                    LineEvent::Overflow => {
                        warn!("Command line overflow");
                        send_line("CTRL:ERR_PAYLOAD_TOO_LONG").await;
                    }
                }
            }
            Either::Second(()) => {
                service_elapsed(&mut processor, &mut last_service);
            }
        }
    }
}

/// Advance the engine by the wall-clock microseconds since the last call
fn service_elapsed(processor: &mut Processor, last: &mut Instant) {
    let now = Instant::now();
    let elapsed_us = now.duration_since(*last).as_micros() as u32;
    *last = now;
    if elapsed_us > 0 {
        processor.service(elapsed_us);
    }
}

/// Queue one reply line for the console TX task
async fn send_line(text: &str) {
    let mut line = ResponseLine::new();
    let _ = line.push_str(text);
    RESPONSE_CHANNEL.send(line).await;
}
