//! Service connection establishment
//!
//! Relays the connect exchange between host and device, resolves the
//! service's transport policy, downgrades both control connections to raw
//! forwarding connections, performs the policy's secure upgrade, and hands
//! the pair to the bidirectional forwarder.

use std::sync::Arc;

use log::{debug, info};

use crate::common::{ProxyError, Result};
use crate::mux::{MuxConnection, MuxMessage};
use crate::transport::SecureChannel;

use super::connection::ForwardingConnection;
use super::forwarder;
use super::registry::ServiceRegistry;
use super::session::ProxySession;

/// Establish a service connection and run it to completion
///
/// # Parameters
///
/// * `connect_request` - The connect message received from the host, relayed verbatim
/// * `host_mux` - Control connection towards the host-side client
/// * `device_mux` - Control connection towards the device
/// * `session` - Identity of the session being established
/// * `registry` - Service transport policies
///
/// # Errors
///
/// Failure to relay the connect request to the device returns
/// [`ProxyError::DeviceLink`], which is fatal for the whole proxy: the
/// device link itself is broken, and that is not a recoverable per-session
/// fault. Later forwarding errors are contained in the session and do not
/// surface here.
pub async fn handle_connect_to_service<S>(
    connect_request: MuxMessage,
    host_mux: MuxConnection<S>,
    device_mux: MuxConnection<S>,
    session: Arc<ProxySession>,
    registry: &ServiceRegistry,
) -> Result<()>
where
    S: SecureChannel + 'static,
{
    let mut host_mux = host_mux;
    let mut device_mux = device_mux;

    device_mux
        .send_message(&connect_request)
        .await
        .map_err(|e| ProxyError::DeviceLink(format!("failed sending connect request: {}", e)))?;

    let connect_response = device_mux.read_message().await?;
    host_mux.send_message(&connect_response).await?;

    let service_config = registry.lookup(&session.service.service_name);
    info!(
        "[{}] connecting service on port {} (ssl: {}, handshake-only: {})",
        session.label(),
        session.service.port,
        session.service.use_ssl,
        service_config.handshake_only_ssl,
    );

    // The control phase is over; both sides continue as raw byte streams.
    let mut device_raw = device_mux.into_inner();
    let mut host_raw = host_mux.into_inner();

    if session.service.use_ssl {
        let pair_record = session.pair_record.as_ref();
        if service_config.handshake_only_ssl {
            device_raw.handshake_only_client(pair_record).await?;
            host_raw.handshake_only_server(pair_record).await?;
            debug!("[{}] handshake-only upgrade done, traffic stays plaintext", session.label());
        } else {
            device_raw = device_raw.into_secure_client(pair_record).await?;
            host_raw = host_raw.into_secure_server(pair_record).await?;
            debug!("[{}] full secure upgrade done", session.label());
        }
    }

    // Decoders are per direction and never shared across sessions.
    let device_conn = ForwardingConnection::new(
        device_raw,
        (service_config.decoder)(
            session.dump_path("from-device.json"),
            session.dump_path("from-device.bin"),
            session.label(),
        ),
    );
    let host_conn = ForwardingConnection::new(
        host_raw,
        (service_config.decoder)(
            session.dump_path("to-device.json"),
            session.dump_path("to-device.bin"),
            session.label(),
        ),
    );

    forwarder::proxy_connection(session, host_conn, device_conn).await;
    Ok(())
}
