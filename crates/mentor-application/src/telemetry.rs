//! Tracing initialization.

use tracing_subscriber::EnvFilter;

/// Installs the global tracing subscriber.
///
/// The filter comes from `MENTOR_LOG` (same syntax as `RUST_LOG`), falling
/// back to `info`. Calling this more than once is harmless; later calls
/// leave the existing subscriber in place.
pub fn init_telemetry() {
    let filter = EnvFilter::try_from_env("MENTOR_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}
