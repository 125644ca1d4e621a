//! Incremental frame decoder.
//!
//! Socket reads arrive in arbitrary chunks. The decoder buffers them and
//! yields frames only once the header and every declared payload byte are
//! present. When the stream ends, [`Decoder::finish`] tells a clean close
//! apart from a frame cut off mid-flight.

use crate::error::ProtocolError;
use crate::frame::{peek_header, Frame, FRAME_HEADER_SIZE};
use crate::DEFAULT_MAX_FRAME_SIZE;
use bytes::BytesMut;

/// Framing state of one connection.
///
/// Transitions are driven only by byte counts:
/// `Idle -> HeaderPending -> PayloadPending -> FrameComplete -> HeaderPending | Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePhase {
    /// No bytes received yet.
    Idle,
    /// Some, but fewer than 8, header bytes buffered.
    HeaderPending { received: usize },
    /// Header decoded, payload incomplete.
    PayloadPending { expected: u64, received: u64 },
    /// The last frame was delivered and nothing further is buffered.
    FrameComplete,
    /// Terminal. The decoder accepts no more input.
    Closed,
}

/// Decodes length-prefixed frames from a byte stream.
pub struct Decoder {
    buffer: BytesMut,
    max_frame_size: u64,
    phase: FramePhase,
}

impl Decoder {
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Creates a decoder that rejects frames declaring more than `max` bytes.
    pub fn with_max_frame_size(max: u64) -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
            max_frame_size: max,
            phase: FramePhase::Idle,
        }
    }

    /// Appends data to the internal buffer.
    pub fn extend(&mut self, data: &[u8]) -> Result<(), ProtocolError> {
        if self.phase == FramePhase::Closed {
            return Err(ProtocolError::Closed);
        }
        self.buffer.extend_from_slice(data);
        if !self.buffer.is_empty() {
            self.phase = self.pending_phase();
        }
        Ok(())
    }

    /// Attempts to decode the next frame from the buffer.
    ///
    /// An oversized header closes the decoder.
    pub fn decode_frame(&mut self) -> Result<Option<Frame>, ProtocolError> {
        if self.phase == FramePhase::Closed {
            return Err(ProtocolError::Closed);
        }

        match Frame::decode(&mut self.buffer, self.max_frame_size) {
            Ok(Some(frame)) => {
                self.phase = if self.buffer.is_empty() {
                    FramePhase::FrameComplete
                } else {
                    self.pending_phase()
                };
                Ok(Some(frame))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                self.close();
                Err(e)
            }
        }
    }

    /// Signals end of stream and closes the decoder.
    ///
    /// Call after draining every complete frame with [`Decoder::decode_frame`].
    /// Leftover bytes mean the peer hung up inside a frame; they are dropped
    /// and reported as a truncation error.
    pub fn finish(&mut self) -> Result<(), ProtocolError> {
        let phase = self.pending_phase();
        let buffered = self.buffer.len();
        self.close();

        if buffered == 0 {
            return Ok(());
        }

        match phase {
            FramePhase::HeaderPending { received } => {
                Err(ProtocolError::TruncatedHeader { received })
            }
            FramePhase::PayloadPending { expected, received } => {
                Err(ProtocolError::TruncatedFrame { expected, received })
            }
            _ => Ok(()),
        }
    }

    /// Returns the current framing phase.
    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    /// Returns the number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn max_frame_size(&self) -> u64 {
        self.max_frame_size
    }

    fn close(&mut self) {
        self.buffer.clear();
        self.phase = FramePhase::Closed;
    }

    fn pending_phase(&self) -> FramePhase {
        if self.buffer.len() < FRAME_HEADER_SIZE {
            FramePhase::HeaderPending {
                received: self.buffer.len(),
            }
        } else {
            FramePhase::PayloadPending {
                expected: peek_header(&self.buffer),
                received: (self.buffer.len() - FRAME_HEADER_SIZE) as u64,
            }
        }
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}
