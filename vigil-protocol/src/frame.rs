//! Frame encoding and decoding for the display link.
//!
//! Frame format:
//! - START (1 byte): 0xAA synchronization byte
//! - LENGTH (1 byte): payload length (0-250)
//! - TYPE (1 byte): message type identifier
//! - PAYLOAD (0-250 bytes): type-specific data
//! - CHECKSUM (1 byte): XOR of LENGTH, TYPE, and all PAYLOAD bytes

use heapless::Vec;

/// Frame synchronization byte
pub const FRAME_START: u8 = 0xAA;

/// Maximum payload size in bytes
pub const MAX_PAYLOAD_SIZE: usize = 250;

/// Bytes a frame adds around its payload
pub const FRAME_OVERHEAD: usize = 4;

/// Maximum complete frame size
pub const MAX_FRAME_SIZE: usize = MAX_PAYLOAD_SIZE + FRAME_OVERHEAD;

/// Errors that can occur during frame decoding or encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Payload exceeds maximum allowed size
    PayloadTooLarge,
    /// Checksum mismatch
    InvalidChecksum,
    /// LENGTH byte out of range
    InvalidLength,
    /// Payload does not match its message type
    InvalidPayload,
    /// Unknown message type
    UnknownType(u8),
}

/// XOR checksum over LENGTH, TYPE and payload
pub fn checksum(length: u8, kind: u8, payload: &[u8]) -> u8 {
    payload.iter().fold(length ^ kind, |acc, &b| acc ^ b)
}

/// A decoded or constructed frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Message type identifier
    pub kind: u8,
    /// Payload data
    pub payload: Vec<u8, MAX_PAYLOAD_SIZE>,
}

impl Frame {
    /// Create a frame with the given message type and payload
    pub fn new(kind: u8, payload: &[u8]) -> Result<Self, FrameError> {
        let payload = Vec::from_slice(payload).map_err(|_| FrameError::PayloadTooLarge)?;
        Ok(Self { kind, payload })
    }

    /// Create a frame with no payload
    pub fn empty(kind: u8) -> Self {
        Self {
            kind,
            payload: Vec::new(),
        }
    }

    /// Size of the encoded frame
    pub fn encoded_len(&self) -> usize {
        self.payload.len() + FRAME_OVERHEAD
    }

    /// Encode into wire bytes
    pub fn encode(&self) -> Vec<u8, MAX_FRAME_SIZE> {
        // Payload length is bounded by MAX_PAYLOAD_SIZE, which fits a u8
        let length = self.payload.len() as u8;

        let mut out = Vec::new();
        // Capacity covers the largest frame, so these cannot fail
        let _ = out.push(FRAME_START);
        let _ = out.push(length);
        let _ = out.push(self.kind);
        let _ = out.extend_from_slice(&self.payload);
        let _ = out.push(checksum(length, self.kind, &self.payload));
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    /// Hunting for START
    Sync,
    /// Got START, next is LENGTH
    Length,
    /// Got LENGTH, next is TYPE
    Kind,
    /// Collecting payload bytes
    Payload,
    /// Next is CHECKSUM
    Checksum,
}

/// Byte-at-a-time frame decoder (terminal side)
///
/// Garbage before a START byte is skipped. After any error the decoder
/// goes back to hunting for START, so it resynchronises on its own.
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    state: DecodeState,
    length: u8,
    kind: u8,
    payload: Vec<u8, MAX_PAYLOAD_SIZE>,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    /// Create an idle decoder
    pub fn new() -> Self {
        Self {
            state: DecodeState::Sync,
            length: 0,
            kind: 0,
            payload: Vec::new(),
        }
    }

    /// Drop any partial frame
    pub fn reset(&mut self) {
        self.state = DecodeState::Sync;
        self.payload.clear();
    }

    /// Feed one byte
    ///
    /// Returns `Some(Ok(frame))` when a frame completes, `Some(Err(_))`
    /// when one is rejected, and `None` while more bytes are needed.
    pub fn push(&mut self, byte: u8) -> Option<Result<Frame, FrameError>> {
        match self.state {
            DecodeState::Sync => {
                if byte == FRAME_START {
                    self.state = DecodeState::Length;
                }
                None
            }
            DecodeState::Length => {
                if usize::from(byte) > MAX_PAYLOAD_SIZE {
                    self.reset();
                    return Some(Err(FrameError::InvalidLength));
                }
                self.length = byte;
                self.state = DecodeState::Kind;
                None
            }
            DecodeState::Kind => {
                self.kind = byte;
                self.payload.clear();
                self.state = if self.length == 0 {
                    DecodeState::Checksum
                } else {
                    DecodeState::Payload
                };
                None
            }
            DecodeState::Payload => {
                // Length was checked against capacity on entry
                let _ = self.payload.push(byte);
                if self.payload.len() == usize::from(self.length) {
                    self.state = DecodeState::Checksum;
                }
                None
            }
            DecodeState::Checksum => {
                let expected = checksum(self.length, self.kind, &self.payload);
                let result = if byte == expected {
                    Ok(Frame {
                        kind: self.kind,
                        payload: self.payload.clone(),
                    })
                } else {
                    Err(FrameError::InvalidChecksum)
                };
                self.reset();
                Some(result)
            }
        }
    }

    /// Feed bytes until the first frame completes or is rejected
    ///
    /// Returns the outcome and how many bytes were consumed.
    pub fn push_slice(&mut self, bytes: &[u8]) -> (Option<Result<Frame, FrameError>>, usize) {
        for (i, &byte) in bytes.iter().enumerate() {
            if let Some(result) = self.push(byte) {
                return (Some(result), i + 1);
            }
        }
        (None, bytes.len())
    }
}
