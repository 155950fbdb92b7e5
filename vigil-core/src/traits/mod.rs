//! Collaborator traits
//!
//! These traits define the interface between the concurrency core and
//! the board-specific collaborators it drives.

pub mod display;
pub mod sensor;

pub use display::TextRenderer;
pub use sensor::SensorDriver;
