//! Per-service transport policy
//!
//! Maps service names to the decoder used to observe their traffic and the
//! way their secure upgrade behaves. DTX based services only execute a TLS
//! handshake and then go back to sending unencrypted data right after the
//! handshake; their entries carry `handshake_only_ssl`.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::decode::{new_bin_dump_decoder, new_dtx_decoder, DecoderFactory};

/// Name of the catch-all entry used for unrecognized services
pub const DEFAULT_SERVICE: &str = "bindumper";

/// Transport policy for one service name
#[derive(Clone, Copy)]
pub struct ServiceConfig {
    /// Constructor for the decoder observing each direction
    pub decoder: DecoderFactory,
    /// Secure upgrades only run the handshake, then revert to plaintext
    pub handshake_only_ssl: bool,
}

static SERVICE_CONFIGURATIONS: Lazy<HashMap<&'static str, ServiceConfig>> = Lazy::new(|| {
    let mut table: HashMap<&'static str, ServiceConfig> = HashMap::new();
    table.insert(
        "com.apple.instruments.remoteserver",
        ServiceConfig { decoder: new_dtx_decoder, handshake_only_ssl: true },
    );
    table.insert(
        "com.apple.accessibility.axAuditDaemon.remoteserver",
        ServiceConfig { decoder: new_dtx_decoder, handshake_only_ssl: true },
    );
    table.insert(
        "com.apple.testmanagerd.lockdown",
        ServiceConfig { decoder: new_dtx_decoder, handshake_only_ssl: true },
    );
    table.insert(
        "com.apple.debugserver",
        ServiceConfig { decoder: new_bin_dump_decoder, handshake_only_ssl: true },
    );
    table.insert(
        "com.apple.instruments.remoteserver.DVTSecureSocketProxy",
        ServiceConfig { decoder: new_dtx_decoder, handshake_only_ssl: false },
    );
    table.insert(
        "com.apple.testmanagerd.lockdown.secure",
        ServiceConfig { decoder: new_dtx_decoder, handshake_only_ssl: false },
    );
    table.insert(
        DEFAULT_SERVICE,
        ServiceConfig { decoder: new_bin_dump_decoder, handshake_only_ssl: false },
    );
    table
});

/// Read-only registry of service transport policies
///
/// Built once at startup and injected into the connection establisher.
#[derive(Clone)]
pub struct ServiceRegistry {
    table: HashMap<&'static str, ServiceConfig>,
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ServiceRegistry {
    /// Registry holding the compiled-in service table
    pub fn builtin() -> Self {
        Self { table: SERVICE_CONFIGURATIONS.clone() }
    }

    /// Resolve the policy for a service name
    ///
    /// Unrecognized names get the [`DEFAULT_SERVICE`] policy: raw binary
    /// dump, regular secure upgrade. Lookup never fails.
    pub fn lookup(&self, service_name: &str) -> ServiceConfig {
        if let Some(config) = self.table.get(service_name) {
            return *config;
        }
        self.table[DEFAULT_SERVICE]
    }
}
