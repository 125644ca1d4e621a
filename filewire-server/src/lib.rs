//! # filewire-server
//!
//! TCP server for filewire.
//!
//! This crate provides:
//! - A listener that binds a configured address and accepts connections
//! - One independent task per connection running the frame read loop
//! - Pluggable consumers for completed frames
//! - YAML and environment configuration

pub mod config;
pub mod error;
pub mod server;
pub mod sink;

pub use config::{Config, ConfigError, LimitsConfig, NetworkConfig};
pub use error::ServerError;
pub use server::{Server, ServerConfig, ServerStats};
pub use sink::{ChannelSink, FrameSink, LogSink, ReceivedFrame};
