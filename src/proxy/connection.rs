//! Forwarding connection
//!
//! One endpoint of a running session: the raw stream released by the control
//! channel, paired with the decoder observing the bytes read from it. Both
//! forwarding loops of a session address both of its connections (one as
//! read source, one as write sink), so every operation works through a
//! shared reference and close is guarded to be idempotent.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex as StdMutex;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::Mutex;

use crate::decode::Decoder;
use crate::CHUNK_SIZE;

/// A raw session endpoint paired with its traffic decoder
pub struct ForwardingConnection<S> {
    reader: Mutex<ReadHalf<S>>,
    writer: Mutex<WriteHalf<S>>,
    // Sync mutex: decode never crosses an await and only the loop reading
    // this connection takes it.
    decoder: StdMutex<Box<dyn Decoder>>,
    closed: AtomicBool,
}

impl<S: AsyncRead + AsyncWrite + Send + Unpin> ForwardingConnection<S> {
    /// Pair a raw stream with a freshly constructed decoder
    pub fn new(stream: S, decoder: Box<dyn Decoder>) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            decoder: StdMutex::new(decoder),
            closed: AtomicBool::new(false),
        }
    }

    /// Read the next chunk of bytes
    ///
    /// A bounded buffer read: chunk boundaries are transport artifacts, not
    /// message boundaries. Returns an empty chunk on end-of-stream and after
    /// this connection was closed.
    pub async fn read_chunk(&self) -> io::Result<Bytes> {
        if self.closed.load(Ordering::Acquire) {
            return Ok(Bytes::new());
        }

        let mut buffer = vec![0u8; CHUNK_SIZE];
        let n = self.reader.lock().await.read(&mut buffer).await?;
        buffer.truncate(n);
        Ok(Bytes::from(buffer))
    }

    /// Feed a chunk to this connection's decoder
    ///
    /// Best effort: decoders handle their own failures and never abort
    /// forwarding.
    pub fn decode(&self, bytes: &[u8]) {
        if let Ok(mut decoder) = self.decoder.lock() {
            decoder.decode(bytes);
        }
    }

    /// Write a chunk to the underlying stream
    pub async fn send(&self, bytes: &[u8]) -> io::Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(bytes).await?;
        writer.flush().await
    }

    /// Close this connection
    ///
    /// Idempotent: both forwarding loops may attempt to close on failure;
    /// only the first call shuts the stream down, later and concurrent calls
    /// are no-ops.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let mut writer = self.writer.lock().await;
        let _ = writer.shutdown().await;
    }

    /// Whether close has been invoked
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
