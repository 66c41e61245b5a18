//! Logging setup

use env_logger::Env;

/// Install the `env_logger` backend.
///
/// `RUST_LOG` wins over `default_filter`. Returns `false` if a logger was
/// already installed.
pub fn init_logging(default_filter: &str) -> bool {
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter))
        .format_timestamp_millis()
        .try_init()
        .is_ok()
}
