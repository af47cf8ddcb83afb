//! Error handling module
//!
//! This module defines the error types and result type aliases used in the application.

use thiserror::Error;
use std::io;

/// Debug proxy error type
///
/// Session-scoped failures (`Io`, `Ssl`, `Handshake`, `Mux`) are contained in
/// the session that produced them. `DeviceLink` means the device link itself
/// is unusable and the whole proxy must stop.
#[derive(Error, Debug)]
pub enum ProxyError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// OpenSSL error
    #[error("OpenSSL error: {0}")]
    Ssl(#[from] openssl::error::ErrorStack),

    /// Session TLS handshake error
    #[error("TLS handshake error: {0}")]
    Handshake(String),

    /// The device-side multiplexer link is broken
    #[error("device link error: {0}")]
    DeviceLink(String),

    /// Malformed multiplexer control message
    #[error("mux protocol error: {0}")]
    Mux(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pair record error
    #[error("Pair record error: {0}")]
    PairRecord(String),
}

impl ProxyError {
    /// Whether this error must abort the whole proxy process rather than
    /// just the session it occurred in.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ProxyError::DeviceLink(_))
    }
}

/// Result type alias
///
/// This is a `Result` type alias that uses our custom `ProxyError`.
pub type Result<T> = std::result::Result<T, ProxyError>;
