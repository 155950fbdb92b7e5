//! Hardware driver implementations
//!
//! This crate provides concrete drivers for the parts the monitoring node
//! talks to:
//!
//! - Temperature sensors (TMP100 over I2C)

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod sensor;
