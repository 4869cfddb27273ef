//! Octostep - eight-channel stepper controller firmware
//!
//! RP2040 firmware exposing a line-oriented serial console on UART0 and
//! driving eight DRV8825 channels: trapezoidal motion planning in
//! `octostep-core`, the command grammar in `octostep-protocol`, and the
//! SN74HC595 sleep register plus PIO step generation in
//! `octostep-hal-rp2040`.

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::{Level, Output};
use embassy_rp::peripherals::UART0;
use embassy_rp::uart::{BufferedInterruptHandler, Config as UartConfig, Uart};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use octostep_hal_rp2040::shift_register::Sn74hc595;

mod channels;
mod tasks;

bind_interrupts!(struct Irqs {
    UART0_IRQ => BufferedInterruptHandler<UART0>;
});

// Static cells for UART buffers (must live forever)
static TX_BUF: StaticCell<[u8; 256]> = StaticCell::new();
static RX_BUF: StaticCell<[u8; 256]> = StaticCell::new();

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Octostep firmware starting...");

    let p = embassy_rp::init(Default::default());
    info!("Peripherals initialized");

    // Console UART, 115200 8N1 default
    let uart_config = UartConfig::default();
    let tx_buf = TX_BUF.init([0u8; 256]);
    let rx_buf = RX_BUF.init([0u8; 256]);
    let uart = Uart::new_blocking(p.UART0, p.PIN_0, p.PIN_1, uart_config);
    let uart = uart.into_buffered(Irqs, tx_buf, rx_buf);
    let (tx, rx) = uart.split();
    info!("Console UART initialized");

    // SN74HC595 sleep register lines, numbering per
    // octostep_hal_rp2040::pins::SHIFT_REGISTER_PINS
    let shift_register = Sn74hc595::new(
        Output::new(p.PIN_18, Level::Low),  // SER
        Output::new(p.PIN_19, Level::Low),  // SRCLK
        Output::new(p.PIN_20, Level::High), // RCLK
    );
    info!("Sleep shift register initialized");

    spawner.spawn(tasks::console_rx_task(rx)).unwrap();
    spawner.spawn(tasks::console_tx_task(tx)).unwrap();
    spawner.spawn(tasks::controller_task(shift_register)).unwrap();

    info!("All tasks spawned, firmware running");

    // Main task has nothing else to do - all work happens in spawned tasks
    loop {
        embassy_time::Timer::after_secs(60).await;
        trace!("Main loop heartbeat");
    }
}
