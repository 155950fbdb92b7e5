//! Display Link Protocol
//!
//! This crate defines the UART protocol the node uses to push draw
//! commands to its remote display terminal. The terminal owns the glyphs
//! and the framebuffer; the node only says what text goes where.
//!
//! # Protocol Overview
//!
//! All messages use a simple binary frame format:
//! ```text
//! ┌───────┬────────┬──────┬─────────────┬──────────┐
//! │ START │ LENGTH │ TYPE │ PAYLOAD     │ CHECKSUM │
//! │ 1B    │ 1B     │ 1B   │ 0–250B      │ 1B       │
//! └───────┴────────┴──────┴─────────────┴──────────┘
//! ```
//!
//! The link is one-way: a lost or corrupt frame just means one stale
//! field on screen until the next periodic redraw.
//!
//! # Sides
//!
//! The node firmware only encodes ([`LinkMessage::to_frame`],
//! [`Frame::encode`]). The decode half ([`FrameDecoder`],
//! [`LinkMessage::from_frame`]) is the terminal-side API: display
//! terminal firmware and host tools that tap the link use it to turn the
//! byte stream back into draw commands. It lives here so both sides share
//! one definition of the format.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod frame;
pub mod messages;

pub use frame::{checksum, Frame, FrameDecoder, FrameError, FRAME_START, MAX_PAYLOAD_SIZE};
pub use messages::{LinkMessage, MAX_TEXT_LEN};
