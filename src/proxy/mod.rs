//! Proxy module
//!
//! The service-routing and forwarding engine: per-service transport policy,
//! connection establishment, the bidirectional forwarding loops, and the
//! server that drives them.

pub mod connection;
pub mod establish;
pub mod forwarder;
pub mod registry;
pub mod server;
pub mod session;

pub use connection::ForwardingConnection;
pub use establish::handle_connect_to_service;
pub use registry::{ServiceConfig, ServiceRegistry, DEFAULT_SERVICE};
pub use server::DebugProxy;
pub use session::{ProxySession, ServiceInfo};
