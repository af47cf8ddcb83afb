//! Multiplexer control channel
//!
//! Framed messages exchanged with the host-side client and the device-side
//! multiplexer before a service connection is negotiated. The proxy relays
//! these verbatim; the only payload it ever interprets is the connect
//! request that starts a forwarding session.

pub mod connection;
pub mod message;

pub use connection::MuxConnection;
pub use message::{ConnectRequest, MuxHeader, MuxMessage};
