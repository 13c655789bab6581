//! Tracing initialization helper.

use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize an env-filtered tracing subscriber once per process.
///
/// Respects `RUST_LOG`; defaults to `info`. Safe to call from multiple entry
/// points — later calls (and an already-installed subscriber) are no-ops.
pub fn init_tracing() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init();
    });
}
