//! Proxy server module
//!
//! Owns the host-facing listener. Each accepted connection gets its own
//! session task that relays control messages between host and device until a
//! connect request appears, then hands the pair of connections to the
//! establisher. Session faults are contained per task; a broken device link
//! aborts the whole server.

use std::sync::Arc;

use log::{debug, error, info};
use tokio::net::TcpStream;
use tokio::task::JoinSet;

use crate::common::{ProxyError, Result};
use crate::config::ProxyConfig;
use crate::mux::{ConnectRequest, MuxConnection};
use crate::tls::PairRecord;
use crate::transport::{self, Stream};

use super::establish::handle_connect_to_service;
use super::registry::ServiceRegistry;
use super::session::{ProxySession, ServiceInfo};

/// Intercepting proxy server
///
/// Handles host connections and forwards traffic to the device-side
/// multiplexer, recording every proxied service session.
pub struct DebugProxy {
    /// Proxy configuration
    config: Arc<ProxyConfig>,
    /// Service transport policies
    registry: Arc<ServiceRegistry>,
    /// Pairing credential shared by all sessions
    pair_record: Arc<PairRecord>,
}

impl DebugProxy {
    /// Create a new proxy instance
    ///
    /// # Parameters
    ///
    /// * `config` - Proxy configuration
    /// * `pair_record` - Pairing credential for secure upgrades
    pub fn new(config: Arc<ProxyConfig>, pair_record: PairRecord) -> Self {
        Self {
            config,
            registry: Arc::new(ServiceRegistry::builtin()),
            pair_record: Arc::new(pair_record),
        }
    }

    /// Start the proxy service
    ///
    /// This is a blocking method that runs until the listener fails or the
    /// device link breaks.
    pub async fn run(&self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(self.config.listen).await?;

        info!("Proxy service started, listening on {}", self.config.listen);
        info!("Forwarding to device multiplexer at {}", self.config.device);

        let mut tasks: JoinSet<Result<()>> = JoinSet::new();

        loop {
            // Reap finished sessions; only a broken device link is fatal.
            while let Some(result) = tasks.try_join_next() {
                match result {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) if e.is_fatal() => {
                        error!("Device link failure: {}", e);
                        return Err(e);
                    }
                    Ok(Err(e)) => debug!("Session ended with error: {}", e),
                    Err(e) => error!("Task error: {}", e),
                }
            }

            match listener.accept().await {
                Ok((host_stream, host_addr)) => {
                    info!("Accepted connection from {}", host_addr);

                    let config = Arc::clone(&self.config);
                    let registry = Arc::clone(&self.registry);
                    let pair_record = Arc::clone(&self.pair_record);

                    tasks.spawn(async move {
                        handle_host_connection(host_stream, config, registry, pair_record).await
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                }
            }
        }
    }
}

/// Drive one host connection through its control phase
///
/// Non-connect control messages are relayed to the device and their replies
/// relayed back. The first connect request promotes the pair of connections
/// into a forwarding session, which runs to completion inside this task.
async fn handle_host_connection(
    host_stream: TcpStream,
    config: Arc<ProxyConfig>,
    registry: Arc<ServiceRegistry>,
    pair_record: Arc<PairRecord>,
) -> Result<()> {
    let device_stream = transport::connect(config.device)
        .await
        .map_err(|e| ProxyError::DeviceLink(format!("cannot reach device at {}: {}", config.device, e)))?;

    let mut host_mux = MuxConnection::new(Stream::Tcp(host_stream));
    let mut device_mux = MuxConnection::new(device_stream);

    loop {
        let request = host_mux.read_message().await?;

        if let Some(connect) = ConnectRequest::parse(&request.payload) {
            let service = resolve_service(&config, connect.port);
            let session =
                Arc::new(ProxySession::new(&config.dump_dir, service, Arc::clone(&pair_record))?);

            return handle_connect_to_service(request, host_mux, device_mux, session, &registry)
                .await;
        }

        // Not a connect request: relay it and its reply unmodified.
        device_mux
            .send_message(&request)
            .await
            .map_err(|e| ProxyError::DeviceLink(format!("failed relaying control message: {}", e)))?;
        let reply = device_mux
            .read_message()
            .await
            .map_err(|e| ProxyError::DeviceLink(format!("failed reading control reply: {}", e)))?;
        host_mux.send_message(&reply).await?;
    }
}

/// Label a connect request with service information
///
/// Ports missing from the configured table get the catch-all policy; the
/// port number stands in for the unknown name.
fn resolve_service(config: &ProxyConfig, port: u16) -> ServiceInfo {
    match config.service_for_port(port) {
        Some(entry) => ServiceInfo {
            service_name: entry.service_name.clone(),
            port,
            use_ssl: entry.use_ssl,
        },
        None => {
            debug!("No service entry for port {}, using binary dump", port);
            ServiceInfo { service_name: format!("port-{}", port), port, use_ssl: false }
        }
    }
}
