//! Embassy async tasks
//!
//! These own the peripherals. The node's periodic work runs on the kernel
//! in `main`; the tasks here only move bytes for it.

pub mod display_tx;
pub mod endpoint;
pub mod sensor_bus;

pub use display_tx::display_tx_task;
pub use endpoint::endpoint_task;
pub use sensor_bus::{sensor_bus_task, BusSensor};
