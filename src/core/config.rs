use crate::core::asymmetry::{AnalyzerSettings, DriftRule, QualityLimits};
use crate::core::frames::DEFAULT_FRAME_BUFFER_SIZE;
use crate::core::geometry::Normalizer;
use crate::core::temporal::ProtocolLimits;
use crate::core::thresholds::{ThresholdLadder, ThresholdPreset};
use crate::models::assessment::Severity;
use crate::models::response::ResponseMode;
use crate::server::DEFAULT_MAX_BODY_BYTES;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not determine home directory")]
    NoHomeDir,

    #[error("Config IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("{0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result reported when a request sets `force_drift`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForcedDrift {
    pub asymmetry_score: f64,
    pub severity: Severity,
}

impl Default for ForcedDrift {
    fn default() -> Self {
        Self {
            asymmetry_score: 0.08,
            severity: Severity::Severe,
        }
    }
}

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Ladder used for single poses unless `custom_ladder` is set
    pub threshold_preset: ThresholdPreset,
    pub custom_ladder: Option<ThresholdLadder>,
    /// Arm length used to normalize wrist drift
    pub normalizer: Normalizer,
    /// Average arm length at or below which normalization is skipped
    pub min_arm_length: f64,
    pub drift_rule: DriftRule,
    pub quality: QualityLimits,
    /// Keypoints reported below this confidence count as missing
    pub min_visibility: f64,
    pub forced_drift: ForcedDrift,
    /// Frames kept for a sequence summary
    pub frame_buffer_size: usize,
    /// Ladder for frame heuristics, whose scores run much smaller
    pub frame_preset: ThresholdPreset,
    pub protocol: ProtocolLimits,
    /// Address the HTTP server binds to
    pub bind_address: String,
    pub response_mode: ResponseMode,
    /// Largest request body the server accepts
    pub max_body_bytes: usize,
    /// Endpoint the probe sends to
    pub endpoint: String,
    pub timeout_secs: u64,
    /// "trace", "debug", "info", "warn" or "error"; RUST_LOG wins when set
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threshold_preset: ThresholdPreset::Realistic,
            custom_ladder: None,
            normalizer: Normalizer::Euclidean,
            min_arm_length: 0.01,
            drift_rule: DriftRule::AboveNormal,
            quality: QualityLimits::default(),
            min_visibility: 0.5,
            forced_drift: ForcedDrift::default(),
            frame_buffer_size: DEFAULT_FRAME_BUFFER_SIZE,
            frame_preset: ThresholdPreset::Research,
            protocol: ProtocolLimits::default(),
            bind_address: "127.0.0.1:8787".to_string(),
            response_mode: ResponseMode::Envelope,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            endpoint: "http://127.0.0.1:8787/drifttest".to_string(),
            timeout_secs: 30,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file, creating with defaults if it doesn't exist
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Self::default();
            config.save_to(&config_path)?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> ConfigResult<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        self.validate()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(ladder) = &self.custom_ladder {
            ladder.validate().map_err(ConfigError::Invalid)?;
        }

        if !self.min_arm_length.is_finite() || self.min_arm_length <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "Invalid min arm length: {}. Must be positive",
                self.min_arm_length
            )));
        }

        if let DriftRule::Threshold { min_score } = self.drift_rule {
            if !(0.0..=1.0).contains(&min_score) {
                return Err(ConfigError::Invalid(format!(
                    "Invalid drift threshold: {}. Must be between 0.0 and 1.0",
                    min_score
                )));
            }
        }

        if !(0.0..=1.0).contains(&self.min_visibility) {
            return Err(ConfigError::Invalid(format!(
                "Invalid min visibility: {}. Must be between 0.0 and 1.0",
                self.min_visibility
            )));
        }

        let quality = &self.quality;
        if !is_positive(quality.very_small_arm) || quality.very_small_arm >= quality.small_arm {
            return Err(ConfigError::Invalid(format!(
                "Invalid arm size limits: {} / {}. Must be positive and increasing",
                quality.very_small_arm, quality.small_arm
            )));
        }
        if !is_positive(quality.fair_difference)
            || quality.fair_difference >= quality.poor_difference
            || quality.poor_difference >= quality.very_poor_difference
            || quality.very_poor_difference > 1.0
        {
            return Err(ConfigError::Invalid(format!(
                "Invalid arm difference limits: {} / {} / {}. Must be increasing within 0.0..1.0",
                quality.fair_difference, quality.poor_difference, quality.very_poor_difference
            )));
        }

        if !(0.0..=1.0).contains(&self.forced_drift.asymmetry_score) {
            return Err(ConfigError::Invalid(format!(
                "Invalid forced drift score: {}. Must be between 0.0 and 1.0",
                self.forced_drift.asymmetry_score
            )));
        }

        if self.frame_buffer_size < 3 || self.frame_buffer_size > 300 {
            return Err(ConfigError::Invalid(format!(
                "Invalid frame buffer size: {}. Must be between 3 and 300",
                self.frame_buffer_size
            )));
        }

        let protocol = &self.protocol;
        if !is_positive(protocol.estimated_arm_length)
            || !is_positive(protocol.min_test_duration_secs)
            || !is_positive(protocol.min_arm_length)
        {
            return Err(ConfigError::Invalid(
                "Protocol arm lengths and test duration must be positive".to_string(),
            ));
        }
        if !is_positive(protocol.drift_onset)
            || protocol.drift_onset >= protocol.support_contact
            || !protocol.support_contact.is_finite()
        {
            return Err(ConfigError::Invalid(format!(
                "Invalid drift onset / support contact: {} / {}. Must be positive and increasing",
                protocol.drift_onset, protocol.support_contact
            )));
        }
        if !protocol.min_arm_angle.is_finite()
            || !protocol.max_arm_angle.is_finite()
            || protocol.min_arm_angle >= protocol.max_arm_angle
            || protocol.min_arm_angle < 0.0
            || protocol.max_arm_angle > 180.0
        {
            return Err(ConfigError::Invalid(format!(
                "Invalid arm angle range: {}..{}. Must be increasing within 0..180",
                protocol.min_arm_angle, protocol.max_arm_angle
            )));
        }

        if self.bind_address.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "Invalid bind address: {}",
                self.bind_address
            )));
        }

        if self.max_body_bytes < 1024 * 1024 || self.max_body_bytes > 64 * 1024 * 1024 {
            return Err(ConfigError::Invalid(format!(
                "Invalid max body size: {} bytes. Must be between 1 MB and 64 MB",
                self.max_body_bytes
            )));
        }

        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err(ConfigError::Invalid(format!(
                "Invalid endpoint: {}. Must be an http(s) URL",
                self.endpoint
            )));
        }

        if self.timeout_secs == 0 || self.timeout_secs > 300 {
            return Err(ConfigError::Invalid(format!(
                "Invalid timeout: {}. Must be between 1 and 300 seconds",
                self.timeout_secs
            )));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }

        Ok(())
    }

    /// Reset to default configuration
    pub fn reset() -> ConfigResult<Self> {
        let config = Self::default();
        config.save()?;
        Ok(config)
    }

    /// Ladder for single poses
    pub fn ladder(&self) -> ThresholdLadder {
        self.custom_ladder
            .unwrap_or_else(|| self.threshold_preset.ladder())
    }

    pub fn analyzer_settings(&self) -> AnalyzerSettings {
        AnalyzerSettings {
            ladder: self.ladder(),
            normalizer: self.normalizer,
            min_arm_length: self.min_arm_length,
            drift_rule: self.drift_rule,
            quality: self.quality,
            min_visibility: self.min_visibility,
        }
    }

    pub fn config_path() -> ConfigResult<PathBuf> {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .map_err(|_| ConfigError::NoHomeDir)?;

        let mut path = PathBuf::from(home);
        path.push(".armdrift");
        path.push("config");
        path.push("settings.json");

        Ok(path)
    }
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn test_config_path(name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("armdrift_test_config_{}", name));
        path.push("settings.json");
        path
    }

    fn cleanup_test_config(path: &Path) {
        if let Some(parent) = path.parent() {
            let _ = fs::remove_dir_all(parent);
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.threshold_preset, ThresholdPreset::Realistic);
        assert_eq!(config.normalizer, Normalizer::Euclidean);
        assert_eq!(config.drift_rule, DriftRule::AboveNormal);
        assert_eq!(config.frame_buffer_size, 30);
        assert_eq!(config.response_mode, ResponseMode::Envelope);
        assert_eq!(config.forced_drift.severity, Severity::Severe);
        assert_eq!(config.ladder(), ThresholdPreset::Realistic.ladder());
        assert_eq!(config.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
        assert_eq!(config.analyzer_settings().min_visibility, 0.5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.custom_ladder = Some(ThresholdLadder::new(0.3, 0.2, 0.5, 0.7));
        assert!(config.validate().is_err());
        config.custom_ladder = None;

        config.min_arm_length = 0.0;
        assert!(config.validate().is_err());
        config.min_arm_length = 0.01;

        config.drift_rule = DriftRule::Threshold { min_score: 1.5 };
        assert!(config.validate().is_err());
        config.drift_rule = DriftRule::Threshold { min_score: 0.05 };
        assert!(config.validate().is_ok());

        config.frame_buffer_size = 2;
        assert!(config.validate().is_err());
        config.frame_buffer_size = 30;

        config.bind_address = "localhost".to_string();
        assert!(config.validate().is_err());
        config.bind_address = "0.0.0.0:8080".to_string();

        config.endpoint = "ftp://example.com".to_string();
        assert!(config.validate().is_err());
        config.endpoint = "https://example.com/drifttest".to_string();

        config.timeout_secs = 0;
        assert!(config.validate().is_err());
        config.timeout_secs = 301;
        assert!(config.validate().is_err());
        config.timeout_secs = 10;

        config.log_level = "verbose".to_string();
        assert!(config.validate().is_err());
        config.log_level = "DEBUG".to_string();

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_non_finite_and_unordered_limits_are_rejected() {
        let mut config = Config::default();
        config.protocol.min_test_duration_secs = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.protocol.max_arm_angle = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.protocol.drift_onset = 0.6;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.protocol.min_arm_length = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.quality.small_arm = 0.01;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.quality.poor_difference = 0.9;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.quality.fair_difference = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.min_visibility = 1.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.max_body_bytes = 1024;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_custom_ladder_overrides_preset() {
        let config = Config {
            threshold_preset: ThresholdPreset::Nihss,
            custom_ladder: Some(ThresholdLadder::new(0.1, 0.2, 0.3, 0.4)),
            ..Config::default()
        };
        let settings = config.analyzer_settings();
        assert_eq!(settings.ladder, ThresholdLadder::new(0.1, 0.2, 0.3, 0.4));
        assert_eq!(settings.normalizer, Normalizer::Euclidean);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"threshold_preset": "field", "response_mode": "direct"}"#).unwrap();
        assert_eq!(config.threshold_preset, ThresholdPreset::Field);
        assert_eq!(config.response_mode, ResponseMode::Direct);
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let path = test_config_path("round_trip");
        cleanup_test_config(&path);

        let config = Config {
            normalizer: Normalizer::Vertical,
            log_level: "debug".to_string(),
            ..Config::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);

        cleanup_test_config(&path);
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let path = test_config_path("invalid");
        cleanup_test_config(&path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();

        fs::write(&path, r#"{"timeout_secs": 0}"#).unwrap();
        assert!(matches!(Config::load_from(&path), Err(ConfigError::Invalid(_))));

        fs::write(&path, "not json").unwrap();
        assert!(matches!(Config::load_from(&path), Err(ConfigError::Parse(_))));

        cleanup_test_config(&path);
    }
}
