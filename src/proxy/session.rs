//! Proxied session identity
//!
//! One [`ProxySession`] exists per negotiated service connection, from the
//! moment the connect request is accepted until both forwarding directions
//! have closed. It owns the session's capture directory and the pairing
//! credential used for secure upgrades.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use log::{debug, info};
use uuid::Uuid;

use crate::common::Result;
use crate::tls::PairRecord;

/// What is known about the service a session was opened for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    /// Service name used for policy lookup
    pub service_name: String,
    /// Device port the service listens on
    pub port: u16,
    /// Whether the connection is upgraded to session TLS
    pub use_ssl: bool,
}

/// Per-session identity and resources
#[derive(Debug)]
pub struct ProxySession {
    /// Unique session id
    pub id: Uuid,
    /// Service this session proxies
    pub service: ServiceInfo,
    /// Pairing credential for secure upgrades
    pub pair_record: Arc<PairRecord>,
    /// Directory all capture sidecars of this session live in
    connection_path: PathBuf,
}

impl ProxySession {
    /// Create a session and its capture directory
    ///
    /// The directory is `<dump_root>/<timestamp>-<port>-<short id>` so
    /// concurrent sessions never collide.
    pub fn new(dump_root: &Path, service: ServiceInfo, pair_record: Arc<PairRecord>) -> Result<Self> {
        let id = Uuid::new_v4();
        let dir_name = format!(
            "{}-{}-{}",
            Utc::now().format("%Y%m%d-%H%M%S"),
            service.port,
            &id.to_string()[..8],
        );
        let connection_path = dump_root.join(dir_name);
        std::fs::create_dir_all(&connection_path)?;

        debug!(
            "Session {} for {} capturing to {}",
            id, service.service_name, connection_path.display()
        );

        Ok(Self { id, service, pair_record, connection_path })
    }

    /// Path of one capture sidecar inside the session directory
    pub fn dump_path(&self, file_name: &str) -> PathBuf {
        self.connection_path.join(file_name)
    }

    /// Label used to attribute log lines to this session
    pub fn label(&self) -> String {
        format!("{}/{}", &self.id.to_string()[..8], self.service.service_name)
    }

    /// Log the graceful end of this session
    pub fn log_closed(&self) {
        info!("[{}] connection closed", self.label());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tls::PairRecord;

    fn dummy_pair_record() -> Arc<PairRecord> {
        Arc::new(PairRecord {
            host_id: "host".into(),
            system_buid: "buid".into(),
            host_certificate: String::new(),
            host_private_key: String::new(),
            root_certificate: None,
            device_certificate: None,
        })
    }

    #[test]
    fn test_session_creates_capture_dir() {
        let dir = tempfile::tempdir().unwrap();
        let service = ServiceInfo {
            service_name: "com.apple.debugserver".into(),
            port: 1234,
            use_ssl: false,
        };

        let session = ProxySession::new(dir.path(), service, dummy_pair_record()).unwrap();

        let json_path = session.dump_path("to-device.json");
        assert!(json_path.parent().unwrap().exists());
        assert!(json_path.to_string_lossy().contains("1234"));
    }

    #[test]
    fn test_concurrent_sessions_get_distinct_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let service = ServiceInfo {
            service_name: "com.apple.debugserver".into(),
            port: 1234,
            use_ssl: false,
        };

        let a = ProxySession::new(dir.path(), service.clone(), dummy_pair_record()).unwrap();
        let b = ProxySession::new(dir.path(), service, dummy_pair_record()).unwrap();

        assert_ne!(a.dump_path("x"), b.dump_path("x"));
    }
}
