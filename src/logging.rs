//! Global log subscriber setup for embedding applications.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Install the process-wide log subscriber.
///
/// Directives from `RUST_LOG` are honored, with `default_directive` (for
/// example `"chronocast=info"`) layered in as the baseline. Returns an
/// error instead of panicking when a subscriber is already installed, so an
/// embedding application that configured logging itself stays in control.
pub fn configure_logging(default_directive: &str) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(default_directive.parse()?))
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install log subscriber: {}", e))?;

    Ok(())
}
