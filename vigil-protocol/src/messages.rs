//! Message types for the display link
//!
//! Every message travels node → terminal. Coordinates are pixels,
//! little-endian on the wire.

use heapless::Vec;

use crate::frame::{Frame, FrameError, MAX_PAYLOAD_SIZE};

// Message type IDs
pub const MSG_CLEAR: u8 = 0x20;
pub const MSG_TITLE: u8 = 0x21;
pub const MSG_TEXT: u8 = 0x22;
pub const MSG_BANNER: u8 = 0x23;

/// Longest text carried by one message; longer text is truncated
pub const MAX_TEXT_LEN: usize = 64;

const FLAG_OPAQUE: u8 = 0x01;
const FLAG_ALERT: u8 = 0x01;

/// Messages from the node to the display terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkMessage<'a> {
    /// Clear the entire screen
    Clear,
    /// Draw the application frame with a title bar
    Title { text: &'a str },
    /// Draw text with its left edge at `x`, centred on `y`
    Text {
        x: u16,
        y: u16,
        /// Fill the glyph background
        opaque: bool,
        text: &'a str,
    },
    /// Draw text centred on screen
    Banner {
        text: &'a str,
        /// Use the alert colour
        alert: bool,
    },
}

/// Longest prefix of `text` that fits and ends on a char boundary
fn clip(text: &str) -> &[u8] {
    if text.len() <= MAX_TEXT_LEN {
        return text.as_bytes();
    }
    let mut end = MAX_TEXT_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text.as_bytes()[..end]
}

/// Append `[len][bytes...]`
fn push_text(payload: &mut Vec<u8, MAX_PAYLOAD_SIZE>, text: &str) -> Result<(), FrameError> {
    let bytes = clip(text);
    payload
        .push(bytes.len() as u8)
        .map_err(|_| FrameError::PayloadTooLarge)?;
    payload
        .extend_from_slice(bytes)
        .map_err(|_| FrameError::PayloadTooLarge)
}

/// Read `[len][bytes...]` starting at `at`
fn read_text(payload: &[u8], at: usize) -> Result<&str, FrameError> {
    let len = usize::from(*payload.get(at).ok_or(FrameError::InvalidPayload)?);
    let bytes = payload
        .get(at + 1..at + 1 + len)
        .ok_or(FrameError::InvalidPayload)?;
    if at + 1 + len != payload.len() {
        return Err(FrameError::InvalidPayload);
    }
    core::str::from_utf8(bytes).map_err(|_| FrameError::InvalidPayload)
}

impl<'a> LinkMessage<'a> {
    /// Encode this message into a frame
    pub fn to_frame(&self) -> Result<Frame, FrameError> {
        let mut payload = Vec::<u8, MAX_PAYLOAD_SIZE>::new();
        let kind = match *self {
            LinkMessage::Clear => return Ok(Frame::empty(MSG_CLEAR)),
            LinkMessage::Title { text } => {
                push_text(&mut payload, text)?;
                MSG_TITLE
            }
            LinkMessage::Text {
                x,
                y,
                opaque,
                text,
            } => {
                // Payload: [x lo][x hi][y lo][y hi][flags][len][chars...]
                payload
                    .extend_from_slice(&x.to_le_bytes())
                    .map_err(|_| FrameError::PayloadTooLarge)?;
                payload
                    .extend_from_slice(&y.to_le_bytes())
                    .map_err(|_| FrameError::PayloadTooLarge)?;
                let flags = if opaque { FLAG_OPAQUE } else { 0 };
                payload.push(flags).map_err(|_| FrameError::PayloadTooLarge)?;
                push_text(&mut payload, text)?;
                MSG_TEXT
            }
            LinkMessage::Banner { text, alert } => {
                let flags = if alert { FLAG_ALERT } else { 0 };
                payload.push(flags).map_err(|_| FrameError::PayloadTooLarge)?;
                push_text(&mut payload, text)?;
                MSG_BANNER
            }
        };
        Frame::new(kind, &payload)
    }

    /// Decode a message from a frame (terminal side)
    pub fn from_frame(frame: &'a Frame) -> Result<Self, FrameError> {
        let p = frame.payload.as_slice();
        match frame.kind {
            MSG_CLEAR => Ok(LinkMessage::Clear),
            MSG_TITLE => Ok(LinkMessage::Title {
                text: read_text(p, 0)?,
            }),
            MSG_TEXT => {
                if p.len() < 6 {
                    return Err(FrameError::InvalidPayload);
                }
                Ok(LinkMessage::Text {
                    x: u16::from_le_bytes([p[0], p[1]]),
                    y: u16::from_le_bytes([p[2], p[3]]),
                    opaque: p[4] & FLAG_OPAQUE != 0,
                    text: read_text(p, 5)?,
                })
            }
            MSG_BANNER => {
                let flags = *p.first().ok_or(FrameError::InvalidPayload)?;
                Ok(LinkMessage::Banner {
                    text: read_text(p, 1)?,
                    alert: flags & FLAG_ALERT != 0,
                })
            }
            other => Err(FrameError::UnknownType(other)),
        }
    }
}
