//! Framed control-channel connection
//!
//! Reads and writes [`MuxMessage`]s over any byte stream. Once the control
//! phase of a session is over, [`MuxConnection::into_inner`] releases the
//! raw stream for byte forwarding.

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::common::Result;

use super::message::{MuxHeader, MuxMessage, MUX_HEADER_LEN};

/// A control-channel connection over a raw stream
#[derive(Debug)]
pub struct MuxConnection<S> {
    stream: S,
}

impl<S: AsyncRead + AsyncWrite + Unpin + Send> MuxConnection<S> {
    /// Wrap a raw stream in a control-channel connection
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    /// Read one framed message
    pub async fn read_message(&mut self) -> Result<MuxMessage> {
        let mut header_bytes = [0u8; MUX_HEADER_LEN];
        self.stream.read_exact(&mut header_bytes).await?;
        let header = MuxHeader::decode(&header_bytes)?;

        let mut payload = vec![0u8; header.length as usize - MUX_HEADER_LEN];
        self.stream.read_exact(&mut payload).await?;

        Ok(MuxMessage { header, payload: Bytes::from(payload) })
    }

    /// Write one framed message
    pub async fn send_message(&mut self, message: &MuxMessage) -> Result<()> {
        self.stream.write_all(&message.header.encode()).await?;
        self.stream.write_all(&message.payload).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Release the underlying raw stream
    ///
    /// The control phase is over after the connect exchange; everything from
    /// here on is forwarded bytes.
    pub fn into_inner(self) -> S {
        self.stream
    }
}
