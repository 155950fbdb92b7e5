//! Board-agnostic core logic for the monitoring node firmware
//!
//! This crate contains the concurrency core and everything else that does
//! not depend on a specific board:
//!
//! - Latest-value channels for sample hand-off
//! - Completion bridge from interrupt-delivered events to task code
//! - Priority-based periodic task kernel with suspend/resume
//! - Counter, sensor and display task bodies
//! - Node assembly (task creation in dependency order)
//! - Value formatting, the query endpoint and the idle status panel
//! - Configuration type definitions and parser
//! - Collaborator traits (renderer, sensor driver)

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod bridge;
pub mod channel;
pub mod config;
pub mod endpoint;
pub mod format;
pub mod node;
pub mod scheduler;
pub mod status;
pub mod tasks;
pub mod traits;
