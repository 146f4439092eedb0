use anyhow::{anyhow, Context, Result};
use armdrift_lib::core::config::Config;
use armdrift_lib::core::geometry::Normalizer;
use armdrift_lib::core::thresholds::ThresholdPreset;
use armdrift_lib::models::response::ResponseMode;
use armdrift_lib::{observability, server};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

/// Arm drift scoring service. Serves the drift handler over HTTP.
#[derive(Parser, Debug)]
#[command(name = "armdrift", version, long_about = None)]
struct Args {
    /// Config file (default: ~/.armdrift/config/settings.json, created if missing)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind, e.g. "0.0.0.0:8787"
    #[arg(short, long)]
    bind: Option<String>,

    /// Threshold preset: research, nihss, field or realistic
    #[arg(long)]
    preset: Option<String>,

    /// Arm length normalizer: vertical or euclidean
    #[arg(long)]
    normalizer: Option<String>,

    /// Response mode: envelope or direct
    #[arg(long)]
    mode: Option<String>,

    /// Do not require a 90° starting position for timed holds
    #[arg(long, default_value_t = false)]
    no_positioning: bool,

    /// Enable debug logging
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

impl Args {
    fn apply(&self, config: &mut Config) -> Result<()> {
        if let Some(bind) = &self.bind {
            config.bind_address = bind.clone();
        }
        if let Some(preset) = &self.preset {
            config.threshold_preset = ThresholdPreset::from_string(preset).map_err(|e| anyhow!(e))?;
            config.custom_ladder = None;
        }
        if let Some(normalizer) = &self.normalizer {
            config.normalizer = Normalizer::from_string(normalizer).map_err(|e| anyhow!(e))?;
        }
        if let Some(mode) = &self.mode {
            config.response_mode = ResponseMode::from_string(mode).map_err(|e| anyhow!(e))?;
        }
        if self.no_positioning {
            config.protocol.enforce_positioning = false;
        }
        if self.verbose {
            config.log_level = "debug".to_string();
        }
        config.validate()?;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load().context("Failed to load config")?,
    };
    args.apply(&mut config)?;

    observability::init_logging(&config.log_level)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        preset = config.threshold_preset.to_string(),
        normalizer = config.normalizer.to_string(),
        "Starting armdrift"
    );

    server::serve(&config).await
}
