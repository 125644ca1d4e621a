//! # filewire-client
//!
//! Client library for filewire.
//!
//! This crate provides:
//! - Async TCP connection that writes length-prefixed frames
//! - Short-write detection on every frame
//! - Payload sources (random bytes, files on disk)
//! - A one-shot client for connect, send, close

pub mod client;
pub mod connection;
pub mod error;
pub mod payload;

pub use client::Client;
pub use connection::{write_frame, Connection, ConnectionConfig};
pub use error::ClientError;
