//! Session security module
//!
//! Service connections are optionally upgraded to TLS after they are already
//! established, authenticated by the pairing credential both endpoints share
//! rather than a CA chain. This module provides the pairing-credential record
//! and the per-upgrade `Ssl` construction used by the transport layer.

pub mod pair;
pub mod session;

pub use pair::PairRecord;
pub use session::{session_ssl, SslRole};
