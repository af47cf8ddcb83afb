//! Intercepting usbmux proxy with per-service traffic decoding
//!
//! This library implements a transparent proxy that sits between a host-side
//! device multiplexer client and a physical device. Control-channel traffic
//! is relayed verbatim; once a service connection is negotiated, the proxy
//! forwards the service's byte streams in both directions while an
//! observational decoder records everything to per-session capture files.
//!
//! # Main Features
//!
//! - Per-service transport policy: decoder selection and secure-upgrade
//!   behavior keyed by service name, with a binary-dump fallback for
//!   services it has never seen
//! - In-place session TLS upgrades on already-established connections,
//!   including the handshake-only mode DTX based services use
//! - Byte-exact bidirectional forwarding with idempotent session teardown
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use usbmux_debug_proxy::config::ProxyConfig;
//! use usbmux_debug_proxy::proxy::DebugProxy;
//! use usbmux_debug_proxy::tls::PairRecord;
//! use usbmux_debug_proxy::Result;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = ProxyConfig::default();
//!     config.validate()?;
//!
//!     let pair_record = PairRecord::load(&config.pair_record_path)?;
//!
//!     let proxy = DebugProxy::new(Arc::new(config), pair_record);
//!     proxy.run().await?;
//!
//!     Ok(())
//! }
//! ```

// Public modules
pub mod common;
pub mod config;
pub mod decode;
pub mod mux;
pub mod proxy;
pub mod tls;
pub mod transport;

// Re-export commonly used structures and functions for convenience
pub use common::{parse_socket_addr, ProxyError, Result};
pub use proxy::DebugProxy;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// Bounded read size of the forwarding loops. Chunks are transport
/// artifacts; decoders reassemble messages across chunk boundaries.
pub const CHUNK_SIZE: usize = 1024;
