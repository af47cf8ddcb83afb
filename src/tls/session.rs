//! Per-upgrade `Ssl` construction
//!
//! Every secure upgrade builds a fresh `Ssl` from the session's pair record.
//! Peer verification is disabled: the endpoints trust each other through the
//! pairing credential, and device-side certificates do not chain to a public
//! CA.

use log::debug;
use openssl::pkey::PKey;
use openssl::ssl::{Ssl, SslContext, SslMethod, SslVerifyMode, SslVersion};
use openssl::x509::X509;

use crate::common::Result;
use super::pair::PairRecord;

/// Role this endpoint takes in a secure handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SslRole {
    /// Initiating side, used on the device-facing connection
    Client,
    /// Accepting side, used on the host-facing connection
    Server,
}

/// Build an `Ssl` for one session upgrade
///
/// # Parameters
///
/// * `pair_record` - Pairing credential supplying certificate and key
/// * `role` - Handshake role of this endpoint
///
/// # Returns
///
/// An `Ssl` ready to handshake over an established stream.
pub fn session_ssl(pair_record: &PairRecord, role: SslRole) -> Result<Ssl> {
    let mut builder = SslContext::builder(SslMethod::tls())?;

    let certificate = X509::from_pem(pair_record.host_certificate.as_bytes())?;
    let private_key = PKey::private_key_from_pem(pair_record.host_private_key.as_bytes())?;

    builder.set_certificate(&certificate)?;
    builder.set_private_key(&private_key)?;
    builder.check_private_key()?;
    builder.set_verify(SslVerifyMode::NONE);

    // Handshake-only upgrades drop the TLS wrapper right after negotiation,
    // so the session must not produce post-handshake records. TLS 1.3
    // servers send session tickets after the handshake completes; cap at
    // 1.2, where tickets are part of the handshake flight.
    builder.set_max_proto_version(Some(SslVersion::TLS1_2))?;

    let context = builder.build();
    let mut ssl = Ssl::new(&context)?;

    match role {
        SslRole::Client => ssl.set_connect_state(),
        SslRole::Server => ssl.set_accept_state(),
    }

    debug!("Prepared session TLS ({:?} role) for host {}", role, pair_record.host_id);
    Ok(ssl)
}
