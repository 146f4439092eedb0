// Logging setup shared by the server and the probe

use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the filter: RUST_LOG when set, otherwise `default_level` for this
/// crate and warnings for everything else
pub fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,armdrift={level},armdrift_lib={level},drift_probe={level},tower_http={level}",
            level = default_level.to_lowercase()
        ))
    })
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(default_level: &str) -> Result<()> {
    tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(fmt::layer().with_target(true))
        .try_init()?;
    Ok(())
}
