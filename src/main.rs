//! Debug Proxy Command Line Tool
//!
//! This binary is the command-line interface for the intercepting usbmux
//! proxy.

use clap::Parser;
use log::{info, warn};

use usbmux_debug_proxy::common::{init_logger, parse_socket_addr, Result};
use usbmux_debug_proxy::config::{ProxyConfig, ENV_PREFIX};
use usbmux_debug_proxy::proxy::DebugProxy;
use usbmux_debug_proxy::tls::PairRecord;
use usbmux_debug_proxy::{APP_NAME, VERSION};

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Intercepting usbmux proxy with per-service traffic decoding
#[derive(Parser, Debug)]
#[clap(author, version = VERSION, about, long_about = None)]
struct Args {
    /// Listen address for the host-facing control channel
    #[clap(short, long, default_value = "127.0.0.1:27015")]
    listen: String,

    /// Address of the real device-side multiplexer
    #[clap(short, long, default_value = "127.0.0.1:27016")]
    device: String,

    /// Directory for per-session capture output
    #[clap(long, default_value = "dumps")]
    dump_dir: String,

    /// Path to the pairing-credential JSON file
    #[clap(long, default_value = "pair_record.json")]
    pair_record: String,

    /// Log level
    #[clap(long, default_value = "info")]
    log_level: String,

    /// Load configuration from environment variables
    #[clap(long)]
    from_env: bool,

    /// Load configuration from a file
    #[clap(long)]
    config_file: Option<String>,

    /// Environment (development, testing, production)
    #[clap(long, default_value = "production")]
    environment: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logger
    init_logger(&args.log_level);

    info!("Starting {} v{}", APP_NAME, VERSION);

    // Create default configuration
    let mut config = ProxyConfig::default();

    // Load environment-specific configuration if it exists
    let env_config_path = format!("config.{}.json", args.environment);
    if Path::new(&env_config_path).exists() {
        info!("Loading environment-specific configuration from {}", env_config_path);
        config = config.merge(ProxyConfig::from_file(Path::new(&env_config_path))?);
    }

    // Load from configuration file if specified
    if let Some(config_file) = args.config_file.clone() {
        if Path::new(&config_file).exists() {
            info!("Loading configuration from file: {}", config_file);
            config = config.merge(ProxyConfig::from_file(Path::new(&config_file))?);
        } else {
            warn!("Configuration file not found: {}", config_file);
        }
    }

    if args.from_env {
        info!("Loading configuration from environment variables");
        let get_env = |name: &str| -> Option<String> {
            let full_name = format!("{}{}", ENV_PREFIX, name);
            env::var(&full_name).ok()
        };

        let mut env_config = ProxyConfig::default();

        if let Some(listen) = get_env("LISTEN") {
            env_config.listen = parse_socket_addr(&listen)?;
        }

        if let Some(device) = get_env("DEVICE") {
            env_config.device = parse_socket_addr(&device)?;
        }

        if let Some(dump_dir) = get_env("DUMP_DIR") {
            env_config.dump_dir = PathBuf::from(dump_dir);
        }

        if let Some(pair_record) = get_env("PAIR_RECORD") {
            env_config.pair_record_path = PathBuf::from(pair_record);
        }

        if let Some(log_level) = get_env("LOG_LEVEL") {
            env_config.log_level = log_level;
        }

        config = config.merge(env_config);
    } else {
        // Load from command line arguments
        info!("Loading configuration from command line arguments");
        let cmd_config = ProxyConfig::from_args(
            &args.listen,
            &args.device,
            &args.dump_dir,
            &args.pair_record,
            &args.log_level,
        )?;

        config = config.merge(cmd_config);
    }

    // Validate the final configuration
    config.validate()?;

    info!("Listen address: {}", config.listen);
    info!("Device multiplexer: {}", config.device);
    info!("Capture directory: {:?}", config.dump_dir);

    // Load the pairing credential used for secure upgrades
    let pair_record = PairRecord::load(&config.pair_record_path)?;
    info!("Loaded pair record for host {}", pair_record.host_id);

    // Create and start proxy
    let proxy = DebugProxy::new(Arc::new(config), pair_record);

    info!("Proxy service ready, press Ctrl+C to stop");

    // Run proxy service
    proxy.run().await?;

    Ok(())
}
