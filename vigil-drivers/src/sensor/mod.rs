//! Temperature sensors

pub mod tmp100;

pub use tmp100::{status_from_kind, Resolution, Tmp100};
