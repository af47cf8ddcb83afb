//! Configuration module
//!
//! Process configuration for the debug proxy. Values are assembled in layers:
//! built-in defaults, then an optional JSON configuration file, then
//! environment variables with the `DEBUGPROXY_` prefix, then command line
//! arguments. Later layers override earlier ones via [`ProxyConfig::merge`].

use std::collections::HashMap;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::common::{parse_socket_addr, ProxyError, Result};

/// Prefix for environment variable configuration
pub const ENV_PREFIX: &str = "DEBUGPROXY_";

/// What the session manager knows about a service reachable on a device port.
///
/// The original multiplexer learns this by watching the service-startup
/// channel; here it is part of the static configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceEntry {
    /// Service name, e.g. `com.apple.instruments.remoteserver`
    pub service_name: String,
    /// Whether the service connection is upgraded to session TLS
    #[serde(default)]
    pub use_ssl: bool,
}

/// Proxy configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Listen address for the host-facing control channel
    pub listen: SocketAddr,

    /// Address of the real device-side multiplexer endpoint
    pub device: SocketAddr,

    /// Root directory for per-session capture output
    pub dump_dir: PathBuf,

    /// Path to the pairing-credential JSON file
    pub pair_record_path: PathBuf,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Environment name (development, testing, production)
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Device port to service mapping used to label connect requests
    #[serde(default)]
    pub services: HashMap<u16, ServiceEntry>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_environment() -> String {
    "production".to_string()
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:27015".parse().unwrap(),
            device: "127.0.0.1:27016".parse().unwrap(),
            dump_dir: PathBuf::from("dumps"),
            pair_record_path: PathBuf::from("pair_record.json"),
            log_level: default_log_level(),
            environment: default_environment(),
            services: HashMap::new(),
        }
    }
}

impl ProxyConfig {
    /// Create a configuration from command line argument strings
    ///
    /// # Parameters
    ///
    /// * `listen` - Listen address string
    /// * `device` - Device multiplexer address string
    /// * `dump_dir` - Capture output directory
    /// * `pair_record_path` - Pairing credential file
    /// * `log_level` - Log level string
    pub fn from_args(
        listen: &str,
        device: &str,
        dump_dir: &str,
        pair_record_path: &str,
        log_level: &str,
    ) -> Result<Self> {
        Ok(Self {
            listen: parse_socket_addr(listen)?,
            device: parse_socket_addr(device)?,
            dump_dir: PathBuf::from(dump_dir),
            pair_record_path: PathBuf::from(pair_record_path),
            log_level: log_level.to_string(),
            ..Self::default()
        })
    }

    /// Load a configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| ProxyError::Config(format!("Failed to read configuration file: {}", e)))?;

        serde_json::from_str(&content)
            .map_err(|e| ProxyError::Config(format!("Failed to parse configuration file: {}", e)))
    }

    /// Merge another configuration into this one
    ///
    /// Fields of `other` that differ from the built-in defaults take
    /// precedence; everything else is kept from `self`. Service tables are
    /// merged entry-wise with `other` winning on conflicting ports.
    pub fn merge(mut self, other: ProxyConfig) -> Self {
        let defaults = ProxyConfig::default();

        if other.listen != defaults.listen {
            self.listen = other.listen;
        }
        if other.device != defaults.device {
            self.device = other.device;
        }
        if other.dump_dir != defaults.dump_dir {
            self.dump_dir = other.dump_dir;
        }
        if other.pair_record_path != defaults.pair_record_path {
            self.pair_record_path = other.pair_record_path;
        }
        if other.log_level != defaults.log_level {
            self.log_level = other.log_level;
        }
        if other.environment != defaults.environment {
            self.environment = other.environment;
        }
        self.services.extend(other.services);

        self
    }

    /// Validate the configuration
    ///
    /// # Returns
    ///
    /// Returns `Ok(())` if the configuration is usable, otherwise a
    /// `ProxyError::Config` describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.listen == self.device {
            return Err(ProxyError::Config(format!(
                "listen and device addresses must differ, both are {}",
                self.listen
            )));
        }

        if self.dump_dir.as_os_str().is_empty() {
            return Err(ProxyError::Config("dump_dir must not be empty".to_string()));
        }

        Ok(())
    }

    /// Look up the service entry for a device port
    pub fn service_for_port(&self, port: u16) -> Option<&ServiceEntry> {
        self.services.get(&port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = ProxyConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_args() {
        let config = ProxyConfig::from_args(
            "127.0.0.1:8080",
            "127.0.0.1:9090",
            "captures",
            "pair.json",
            "debug",
        )
        .unwrap();

        assert_eq!(config.listen.port(), 8080);
        assert_eq!(config.device.port(), 9090);
        assert_eq!(config.dump_dir, PathBuf::from("captures"));
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_merge_overrides_non_default_fields() {
        let base = ProxyConfig::from_args(
            "127.0.0.1:8080",
            "127.0.0.1:9090",
            "captures",
            "pair.json",
            "debug",
        )
        .unwrap();

        let mut overlay = ProxyConfig::default();
        overlay.dump_dir = PathBuf::from("elsewhere");

        let merged = base.merge(overlay);

        // Overridden by the overlay
        assert_eq!(merged.dump_dir, PathBuf::from("elsewhere"));
        // Kept from the base because the overlay left them at defaults
        assert_eq!(merged.listen.port(), 8080);
        assert_eq!(merged.log_level, "debug");
    }

    #[test]
    fn test_merge_extends_service_table() {
        let mut base = ProxyConfig::default();
        base.services.insert(
            1234,
            ServiceEntry { service_name: "com.apple.debugserver".into(), use_ssl: true },
        );

        let mut overlay = ProxyConfig::default();
        overlay.services.insert(
            5678,
            ServiceEntry { service_name: "com.apple.testmanagerd.lockdown".into(), use_ssl: false },
        );

        let merged = base.merge(overlay);
        assert_eq!(merged.services.len(), 2);
        assert!(merged.service_for_port(1234).is_some());
        assert!(merged.service_for_port(5678).is_some());
    }

    #[test]
    fn test_validate_rejects_same_endpoints() {
        let mut config = ProxyConfig::default();
        config.device = config.listen;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_file_round_trip() {
        let mut config = ProxyConfig::default();
        config.services.insert(
            62078,
            ServiceEntry { service_name: "com.apple.instruments.remoteserver".into(), use_ssl: true },
        );

        let json = serde_json::to_string(&config).unwrap();
        let parsed: ProxyConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
