//! Task bodies
//!
//! The three periodic tasks of the node. Each holds references to the
//! channels it uses and, for the counter, the handle of the task it
//! controls, so every dependency is explicit at creation time.

pub mod counter;
pub mod display;
pub mod sensor;

pub use counter::{CounterAction, CounterTask, DutyCycle};
pub use display::{draw_static_labels, DisplayTask, COUNT_LABEL, TEMPERATURE_LABEL};
pub use sensor::{SensorPhase, SensorTask};
