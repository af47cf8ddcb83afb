//! Logging setup
//!
//! This module provides the logging initialization used by the binary.

/// Initialize the logging system
///
/// # Parameters
///
/// * `level` - Default log level, overridden by `RUST_LOG` if set
pub fn init_logger(level: &str) {
    let env = env_logger::Env::default()
        .filter_or("RUST_LOG", level);

    let _ = env_logger::Builder::from_env(env).try_init();
}
