//! Binary frame format.
//!
//! Frame layout (8 bytes header + payload):
//!
//! ```text
//! +----------------------+---------------------------+
//! | payload_len (u64 BE) | payload                   |
//! |       8 bytes        | payload_len bytes         |
//! +----------------------+---------------------------+
//! ```
//!
//! Frames are self-delimiting and repeat until the connection closes. There is
//! no magic, version or checksum. Both ends use network byte order for the
//! length.

use crate::error::ProtocolError;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Size of the length header in bytes.
pub const FRAME_HEADER_SIZE: usize = 8;

/// Encodes a payload length as a frame header.
pub fn encode_header(len: u64) -> [u8; FRAME_HEADER_SIZE] {
    len.to_be_bytes()
}

/// Decodes a frame header into the declared payload length.
pub fn decode_header(header: [u8; FRAME_HEADER_SIZE]) -> u64 {
    u64::from_be_bytes(header)
}

/// Reads the declared length from the front of `buf` without consuming it.
///
/// The caller must ensure at least [`FRAME_HEADER_SIZE`] bytes are present.
pub(crate) fn peek_header(buf: &[u8]) -> u64 {
    let mut header = [0u8; FRAME_HEADER_SIZE];
    header.copy_from_slice(&buf[..FRAME_HEADER_SIZE]);
    decode_header(header)
}

/// A complete frame.
///
/// The declared length is always the payload length; a frame is only built
/// once every payload byte has arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame payload (opaque bytes).
    pub payload: Bytes,
}

impl Frame {
    /// Creates a new frame with the given payload.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// Returns the declared payload length.
    pub fn len(&self) -> u64 {
        self.payload.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Returns the encoded length header for this frame.
    pub fn header(&self) -> [u8; FRAME_HEADER_SIZE] {
        encode_header(self.len())
    }

    /// Encodes the frame (header followed by payload) into one buffer.
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + self.payload.len());
        buf.put_u64(self.len());
        buf.put_slice(&self.payload);
        buf
    }

    /// Decodes a frame from the front of `buf`.
    ///
    /// Returns `Ok(Some(frame))` if a complete frame was decoded and consumed,
    /// `Ok(None)` if more data is needed, or `Err` if the declared length
    /// exceeds `max_size`. Nothing is consumed unless a whole frame is present.
    pub fn decode(buf: &mut BytesMut, max_size: u64) -> Result<Option<Self>, ProtocolError> {
        if buf.len() < FRAME_HEADER_SIZE {
            return Ok(None);
        }

        let declared = peek_header(buf);
        if declared > max_size {
            return Err(ProtocolError::FrameTooLarge {
                size: declared,
                max: max_size,
            });
        }

        // Only reachable on targets where usize is narrower than u64.
        let payload_len = usize::try_from(declared).map_err(|_| ProtocolError::FrameTooLarge {
            size: declared,
            max: usize::MAX as u64,
        })?;

        if buf.len() - FRAME_HEADER_SIZE < payload_len {
            return Ok(None);
        }

        buf.advance(FRAME_HEADER_SIZE);
        let payload = buf.split_to(payload_len).freeze();

        Ok(Some(Self { payload }))
    }
}
