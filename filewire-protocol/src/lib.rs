//! # filewire-protocol
//!
//! Wire format for filewire.
//!
//! This crate provides:
//! - Length-prefixed framing (8-byte big-endian length, then payload)
//! - An incremental decoder that tracks per-connection framing state
//! - Error types for oversized and truncated frames

pub mod codec;
pub mod error;
pub mod frame;

pub use codec::{Decoder, FramePhase};
pub use error::ProtocolError;
pub use frame::{decode_header, encode_header, Frame, FRAME_HEADER_SIZE};

/// Default port for the filewire server.
pub const DEFAULT_PORT: u16 = 3000;

/// Default maximum frame payload size (1 GiB).
pub const DEFAULT_MAX_FRAME_SIZE: u64 = 1024 * 1024 * 1024;
