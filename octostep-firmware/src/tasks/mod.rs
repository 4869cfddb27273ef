//! Embassy tasks

mod console_rx;
mod console_tx;
mod controller;

pub use console_rx::console_rx_task;
pub use console_tx::console_tx_task;
pub use controller::controller_task;
