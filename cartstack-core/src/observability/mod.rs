//! Logging setup.
//!
//! Library code only emits `tracing` events; the binary installs the
//! subscriber once at startup.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter directive for a verbosity level.
///
/// `RUST_LOG`, when set, takes precedence.
pub fn default_directive(verbose: bool, configured: &str) -> String {
    if verbose {
        "debug".to_string()
    } else if configured.trim().is_empty() {
        "info".to_string()
    } else {
        configured.to_string()
    }
}

/// Install the global subscriber.
///
/// Fails if a subscriber is already installed.
pub fn init(
    verbose: bool,
    configured: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(value) if !value.is_empty() => EnvFilter::try_new(value)?,
        _ => EnvFilter::try_new(default_directive(verbose, configured))?,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(verbose)
                .with_level(true)
                .with_writer(std::io::stderr),
        )
        .try_init()?;

    tracing::debug!("Logging initialized");
    Ok(())
}
