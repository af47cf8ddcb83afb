//! Transport module
//!
//! The raw byte channel a proxied session runs over. A [`Stream`] starts as
//! plaintext TCP and can be upgraded in place to session TLS; the
//! [`SecureChannel`] trait is the seam the connection establisher works
//! against, so engine tests can substitute an in-memory transport.

pub mod stream;

use std::net::SocketAddr;

use tokio::net::TcpStream;

use crate::common::Result;
use crate::tls::PairRecord;

pub use stream::Stream;

/// A byte channel that supports pair-record keyed secure upgrades
///
/// `into_secure_*` perform a full upgrade: the handshake completes and all
/// further traffic stays encrypted. `handshake_only_*` complete the
/// cryptographic negotiation and then revert to plaintext byte exchange,
/// which some protocols use to secure connection setup only.
#[allow(async_fn_in_trait)]
pub trait SecureChannel:
    tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + Sized
{
    /// Upgrade to persistent TLS, taking the client role
    async fn into_secure_client(self, pair_record: &PairRecord) -> Result<Self>;

    /// Upgrade to persistent TLS, taking the server role
    async fn into_secure_server(self, pair_record: &PairRecord) -> Result<Self>;

    /// Run a client-role handshake, then continue in plaintext
    async fn handshake_only_client(&mut self, pair_record: &PairRecord) -> Result<()>;

    /// Run a server-role handshake, then continue in plaintext
    async fn handshake_only_server(&mut self, pair_record: &PairRecord) -> Result<()>;
}

/// Connect to the device-side multiplexer endpoint
pub async fn connect(addr: SocketAddr) -> Result<Stream> {
    let tcp = TcpStream::connect(addr).await?;
    Ok(Stream::Tcp(tcp))
}
