// Severity threshold ladders
//
// A ladder splits an asymmetry score into five buckets. The bounds are
// exclusive upper limits: a score equal to `mild` is already moderate.

use crate::models::assessment::Severity;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Named threshold sets that have been deployed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdPreset {
    /// 1% / 3% / 8% / 15%, used by the image heuristics
    Research,
    /// 5% / 15% / 30% / 50%
    Nihss,
    /// 15% / 25% / 40% / 60%
    Field,
    /// 20% / 35% / 50% / 70%
    Realistic,
}

impl ThresholdPreset {
    pub fn all() -> [ThresholdPreset; 4] {
        [
            ThresholdPreset::Research,
            ThresholdPreset::Nihss,
            ThresholdPreset::Field,
            ThresholdPreset::Realistic,
        ]
    }

    pub fn to_string(&self) -> &'static str {
        match self {
            ThresholdPreset::Research => "research",
            ThresholdPreset::Nihss => "nihss",
            ThresholdPreset::Field => "field",
            ThresholdPreset::Realistic => "realistic",
        }
    }

    pub fn from_string(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "research" => Ok(ThresholdPreset::Research),
            "nihss" => Ok(ThresholdPreset::Nihss),
            "field" => Ok(ThresholdPreset::Field),
            "realistic" => Ok(ThresholdPreset::Realistic),
            _ => Err(format!("Unknown threshold preset: {}", s)),
        }
    }

    pub fn ladder(&self) -> ThresholdLadder {
        match self {
            ThresholdPreset::Research => ThresholdLadder::new(0.01, 0.03, 0.08, 0.15),
            ThresholdPreset::Nihss => ThresholdLadder::new(0.05, 0.15, 0.30, 0.50),
            ThresholdPreset::Field => ThresholdLadder::new(0.15, 0.25, 0.40, 0.60),
            ThresholdPreset::Realistic => ThresholdLadder::new(0.20, 0.35, 0.50, 0.70),
        }
    }
}

/// Upper bounds of the normal, mild, moderate and severe buckets
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdLadder {
    pub normal: f64,
    pub mild: f64,
    pub moderate: f64,
    pub severe: f64,
}

impl Default for ThresholdLadder {
    fn default() -> Self {
        ThresholdPreset::Realistic.ladder()
    }
}

impl ThresholdLadder {
    pub fn new(normal: f64, mild: f64, moderate: f64, severe: f64) -> Self {
        Self {
            normal,
            mild,
            moderate,
            severe,
        }
    }

    /// Bucket a score. Scores above 1.0 are taken to be percentages.
    pub fn classify(&self, score: f64) -> Severity {
        self.classify_ratio(normalize_score(score))
    }

    /// Bucket a score known to be a ratio, even when it exceeds 1.0
    pub fn classify_ratio(&self, score: f64) -> Severity {
        if score < self.normal {
            Severity::Normal
        } else if score < self.mild {
            Severity::Mild
        } else if score < self.moderate {
            Severity::Moderate
        } else if score < self.severe {
            Severity::Severe
        } else {
            Severity::Critical
        }
    }

    pub fn bounds(&self) -> [f64; 4] {
        [self.normal, self.mild, self.moderate, self.severe]
    }

    pub fn validate(&self) -> Result<(), String> {
        let bounds = self.bounds();
        if bounds.iter().any(|b| !b.is_finite() || *b <= 0.0) {
            return Err(format!(
                "Invalid threshold ladder {}: bounds must be finite and positive",
                self
            ));
        }
        if bounds.windows(2).any(|w| w[0] >= w[1]) {
            return Err(format!(
                "Invalid threshold ladder {}: bounds must be strictly increasing",
                self
            ));
        }
        Ok(())
    }
}

impl fmt::Display for ThresholdLadder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "normal<{:.0}% mild<{:.0}% moderate<{:.0}% severe<{:.0}%",
            self.normal * 100.0,
            self.mild * 100.0,
            self.moderate * 100.0,
            self.severe * 100.0
        )
    }
}

/// Convert a percentage (e.g. 22.6) into a ratio (0.226); ratios pass through
pub fn normalize_score(score: f64) -> f64 {
    if score > 1.0 {
        score / 100.0
    } else {
        score
    }
}
