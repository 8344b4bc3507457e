// Logging setup
// The subscriber is built explicitly from configuration at startup instead of lazily on first use

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global tracing subscriber.
///
/// Falls back to `default_filter` when the directive cannot be parsed so a typo in
/// `RUST_LOG` never silences the server entirely.
pub fn init(filter: &str, default_filter: &str) {
    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new(default_filter));

    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false).with_level(true))
        .try_init();

    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
