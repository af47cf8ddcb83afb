//! Bidirectional forwarding
//!
//! Runs the two forwarding loops of one session. The device-to-host
//! direction is spawned as its own task; host-to-device runs in the calling
//! task. The directions are independent byte streams: each loop reads one
//! connection, feeds that connection's decoder, and writes the identical
//! bytes to the other connection. The first end-of-stream or read error on
//! either side closes both connections; the peer loop observes that on its
//! own next read.

use std::sync::Arc;

use log::{debug, trace};
use tokio::io::{AsyncRead, AsyncWrite};

use super::connection::ForwardingConnection;
use super::session::ProxySession;

/// Forward traffic in both directions until the session ends
///
/// Returns when the host-to-device direction has terminated; the spawned
/// device-to-host loop drains on its own next read once the connections are
/// closed.
pub async fn proxy_connection<S>(
    session: Arc<ProxySession>,
    host: ForwardingConnection<S>,
    device: ForwardingConnection<S>,
) where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let host = Arc::new(host);
    let device = Arc::new(device);

    {
        let session = Arc::clone(&session);
        let host = Arc::clone(&host);
        let device = Arc::clone(&device);
        tokio::spawn(async move {
            forward(session, device, host, "device2host").await;
        });
    }

    forward(session, host, device, "host2device").await;
}

/// One forwarding direction: read, decode, relay
async fn forward<S>(
    session: Arc<ProxySession>,
    source: Arc<ForwardingConnection<S>>,
    dest: Arc<ForwardingConnection<S>>,
    direction: &'static str,
) where
    S: AsyncRead + AsyncWrite + Send + Unpin,
{
    loop {
        let chunk = match source.read_chunk().await {
            Ok(chunk) => chunk,
            Err(e) => {
                source.close().await;
                dest.close().await;
                debug!("[{}] Failed reading bytes ({}): {}", session.label(), direction, e);
                return;
            }
        };

        if chunk.is_empty() {
            // End of stream is a normal session end, not a fault.
            source.close().await;
            dest.close().await;
            session.log_closed();
            return;
        }

        source.decode(&chunk);
        trace!("[{}] {} {:02X?}", session.label(), direction, &chunk[..]);

        // Write results are not checked; a dead destination surfaces as a
        // read error in the opposite loop on its next iteration.
        let _ = dest.send(&chunk).await;
    }
}
