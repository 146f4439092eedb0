use anyhow::{anyhow, bail, Context, Result};
use armdrift_lib::client::{builtin_scenarios, find_scenario, run_scenarios, DriftClient, ProbeOutcome};
use armdrift_lib::core::config::{Config, ConfigResult};
use armdrift_lib::models::pose::{ArmKeypoints, Keypoint};
use armdrift_lib::models::request::DriftRequest;
use armdrift_lib::observability;
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use tracing::warn;

/// Send drift payloads to an endpoint and compare the answers with what the
/// geometry should produce
#[derive(Parser, Debug)]
#[command(name = "drift-probe", version, long_about = None)]
struct Cli {
    /// Endpoint URL (default from config)
    #[arg(short, long, global = true)]
    endpoint: Option<String>,

    /// Request timeout in seconds, 1-300
    #[arg(short, long, global = true)]
    timeout: Option<u64>,

    /// Config file (default: ~/.armdrift/config/settings.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the built-in scenarios and print expected vs actual
    Scenarios {
        /// Only run the named scenarios
        #[arg(long)]
        only: Vec<String>,

        /// Print the report as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Send a single pose built from flags
    Keypoints(PoseArgs),
    /// POST a JSON file as-is
    Payload {
        file: PathBuf,
    },
    /// Run the scenarios and print only the threshold calibration
    Calibrate,
}

#[derive(Args, Debug)]
struct PoseArgs {
    /// Left wrist as "x,y"
    #[arg(long, value_parser = parse_point, default_value = "0.15,0.30")]
    left_wrist: Keypoint,
    /// Right wrist as "x,y"
    #[arg(long, value_parser = parse_point, default_value = "0.85,0.30")]
    right_wrist: Keypoint,
    /// Left shoulder as "x,y"
    #[arg(long, value_parser = parse_point, default_value = "0.40,0.30")]
    left_shoulder: Keypoint,
    /// Right shoulder as "x,y"
    #[arg(long, value_parser = parse_point, default_value = "0.60,0.30")]
    right_shoulder: Keypoint,
    #[arg(long, default_value_t = false)]
    force_drift: bool,
    #[arg(long, default_value = "drift-probe")]
    user_id: String,
}

fn parse_point(s: &str) -> Result<Keypoint, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected \"x,y\", got \"{}\"", s))?;
    let x: f64 = x.trim().parse().map_err(|e| format!("bad x in \"{}\": {}", s, e))?;
    let y: f64 = y.trim().parse().map_err(|e| format!("bad y in \"{}\": {}", s, e))?;
    Ok(Keypoint::new(x, y))
}

/// The default config file is optional here: when it can't be read the
/// defaults are used, and the failure is returned so it can be logged
fn default_config(loaded: ConfigResult<Config>) -> (Config, Option<String>) {
    match loaded {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e.to_string())),
    }
}

fn load_config(cli: &Cli) -> Result<(Config, Option<String>)> {
    let (mut config, load_error) = match &cli.config {
        Some(path) => (
            Config::load_from(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None,
        ),
        None => default_config(Config::load()),
    };
    if let Some(endpoint) = &cli.endpoint {
        config.endpoint = endpoint.clone();
    }
    if let Some(timeout) = cli.timeout {
        config.timeout_secs = timeout;
    }
    if cli.verbose {
        config.log_level = "debug".to_string();
    }
    config.validate()?;
    Ok((config, load_error))
}

fn print_outcome(outcome: &ProbeOutcome) -> Result<()> {
    println!(
        "HTTP {} / statusCode {}{}",
        outcome.http_status,
        outcome.status,
        if outcome.double_encoded { " (double-encoded body)" } else { "" }
    );
    println!("{}", serde_json::to_string_pretty(&outcome.raw)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (config, load_error) = load_config(&cli)?;
    observability::init_logging(&config.log_level)?;
    if let Some(error) = load_error {
        warn!(error = %error, "Could not load config file, using defaults");
    }

    let client = DriftClient::new(&config.endpoint, config.timeout_secs)?;

    match &cli.command {
        Command::Scenarios { only, json } => {
            let scenarios = if only.is_empty() {
                builtin_scenarios()
            } else {
                only.iter()
                    .map(|name| find_scenario(name).ok_or_else(|| anyhow!("Unknown scenario: {}", name)))
                    .collect::<Result<Vec<_>>>()?
            };

            let report = run_scenarios(&client, &scenarios).await;
            if *json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report);
            }
            if !report.all_passed() {
                bail!("{} of {} scenarios failed", report.results.len() - report.passed(), report.results.len());
            }
        }
        Command::Keypoints(pose) => {
            let arms = ArmKeypoints {
                left_wrist: pose.left_wrist,
                right_wrist: pose.right_wrist,
                left_shoulder: pose.left_shoulder,
                right_shoulder: pose.right_shoulder,
            };
            let request = DriftRequest {
                user_id: Some(pose.user_id.clone()),
                test_mode: true,
                force_drift: pose.force_drift,
                ..DriftRequest::with_keypoints(arms.into_pose())
            };
            print_outcome(&client.analyze(&request).await?)?;
        }
        Command::Payload { file } => {
            let contents = std::fs::read_to_string(file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let payload: Value = serde_json::from_str(&contents)
                .with_context(|| format!("{} is not valid JSON", file.display()))?;
            print_outcome(&client.analyze(&payload).await?)?;
        }
        Command::Calibrate => {
            let report = run_scenarios(&client, &builtin_scenarios()).await;
            println!("{}", serde_json::to_string_pretty(&report.calibration)?);
        }
    }

    Ok(())
}
