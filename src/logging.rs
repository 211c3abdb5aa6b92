use tracing_subscriber::EnvFilter;

use crate::config;

/// Install the global `tracing` subscriber.
///
/// Honours `RUST_LOG`; falls back to [`config::default_log_filter`].
/// Safe to call more than once: later calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter()));

    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_ok()
    {
        tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);
    }
}
