//! Raw connection stream
//!
//! This module implements the plaintext/TLS stream used for both the
//! host-facing and device-facing side of a session, including the in-place
//! secure upgrades performed after the connection is already carrying traffic.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use log::debug;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_openssl::SslStream;

use crate::common::{ProxyError, Result};
use crate::tls::{session_ssl, PairRecord, SslRole};

use super::SecureChannel;

/// One endpoint of a proxied connection
///
/// Starts out as plaintext TCP; a full secure upgrade replaces the variant
/// with a TLS session over the same socket.
pub enum Stream {
    /// Plaintext TCP
    Tcp(TcpStream),
    /// TLS session established by a full secure upgrade
    Ssl(SslStream<TcpStream>),
}

impl Stream {
    fn name(&self) -> &'static str {
        match self {
            Stream::Tcp(_) => "tcp",
            Stream::Ssl(_) => "ssl",
        }
    }
}

impl std::fmt::Debug for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Stream({})", self.name())
    }
}

impl AsyncRead for Stream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Stream::Tcp(s) => Pin::new(s).poll_read(cx, buf),
            Stream::Ssl(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Stream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Stream::Tcp(s) => Pin::new(s).poll_write(cx, buf),
            Stream::Ssl(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Stream::Tcp(s) => Pin::new(s).poll_flush(cx),
            Stream::Ssl(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Stream::Tcp(s) => Pin::new(s).poll_shutdown(cx),
            Stream::Ssl(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}

/// Run the prepared handshake on a stream borrowed for its duration.
///
/// The TLS wrapper is discarded afterwards, so the peer must not send
/// application data before its own handshake side completes; anything the
/// wrapper buffered past the handshake would be lost.
async fn handshake_only(tcp: &mut TcpStream, pair_record: &PairRecord, role: SslRole) -> Result<()> {
    let ssl = session_ssl(pair_record, role)?;
    let mut shake = SslStream::new(ssl, tcp)?;

    Pin::new(&mut shake)
        .do_handshake()
        .await
        .map_err(|e| ProxyError::Handshake(e.to_string()))?;

    debug!("Handshake-only upgrade complete ({:?} role), reverting to plaintext", role);
    Ok(())
}

/// Run the prepared handshake and keep the TLS session for all further traffic.
async fn full_upgrade(tcp: TcpStream, pair_record: &PairRecord, role: SslRole) -> Result<Stream> {
    let ssl = session_ssl(pair_record, role)?;
    let mut stream = SslStream::new(ssl, tcp)?;

    Pin::new(&mut stream)
        .do_handshake()
        .await
        .map_err(|e| ProxyError::Handshake(e.to_string()))?;

    debug!("Full secure upgrade complete ({:?} role)", role);
    Ok(Stream::Ssl(stream))
}

impl SecureChannel for Stream {
    async fn into_secure_client(self, pair_record: &PairRecord) -> Result<Self> {
        match self {
            Stream::Tcp(tcp) => full_upgrade(tcp, pair_record, SslRole::Client).await,
            Stream::Ssl(_) => Err(ProxyError::Handshake(
                "connection is already secured".to_string(),
            )),
        }
    }

    async fn into_secure_server(self, pair_record: &PairRecord) -> Result<Self> {
        match self {
            Stream::Tcp(tcp) => full_upgrade(tcp, pair_record, SslRole::Server).await,
            Stream::Ssl(_) => Err(ProxyError::Handshake(
                "connection is already secured".to_string(),
            )),
        }
    }

    async fn handshake_only_client(&mut self, pair_record: &PairRecord) -> Result<()> {
        match self {
            Stream::Tcp(tcp) => handshake_only(tcp, pair_record, SslRole::Client).await,
            Stream::Ssl(_) => Err(ProxyError::Handshake(
                "connection is already secured".to_string(),
            )),
        }
    }

    async fn handshake_only_server(&mut self, pair_record: &PairRecord) -> Result<()> {
        match self {
            Stream::Tcp(tcp) => handshake_only(tcp, pair_record, SslRole::Server).await,
            Stream::Ssl(_) => Err(ProxyError::Handshake(
                "connection is already secured".to_string(),
            )),
        }
    }
}
