// Data models for drift assessment results and analysis errors

use serde::{Deserialize, Serialize};

// ==============================================================================
// Severity
// ==============================================================================

/// Five-bucket drift severity, one-to-one with the NIHSS motor arm score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Normal,
    Mild,
    Moderate,
    Severe,
    Critical,
}

impl Severity {
    pub fn all() -> [Severity; 5] {
        [
            Severity::Normal,
            Severity::Mild,
            Severity::Moderate,
            Severity::Severe,
            Severity::Critical,
        ]
    }

    pub fn to_string(&self) -> &'static str {
        match self {
            Severity::Normal => "normal",
            Severity::Mild => "mild",
            Severity::Moderate => "moderate",
            Severity::Severe => "severe",
            Severity::Critical => "critical",
        }
    }

    pub fn from_string(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "normal" => Ok(Severity::Normal),
            "mild" => Ok(Severity::Mild),
            "moderate" => Ok(Severity::Moderate),
            "severe" => Ok(Severity::Severe),
            "critical" => Ok(Severity::Critical),
            _ => Err(format!("Unknown severity: {}", s)),
        }
    }

    /// NIHSS Item 5 score (0-4)
    pub fn nihss_score(&self) -> u8 {
        *self as u8
    }

    pub fn from_nihss_score(score: u8) -> Self {
        match score {
            0 => Severity::Normal,
            1 => Severity::Mild,
            2 => Severity::Moderate,
            3 => Severity::Severe,
            _ => Severity::Critical,
        }
    }

    /// Clinical-sounding interpretation for single-pose results
    pub fn interpretation(&self) -> &'static str {
        match self {
            Severity::Normal => "No significant drift detected. Arms held steady within normal variation range.",
            Severity::Mild => "Mild arm variation detected. Arms show slight positioning differences but remain functional.",
            Severity::Moderate => "Moderate arm variation detected. Arms show noticeable positioning differences but maintain some control.",
            Severity::Severe => "Severe arm variation detected. Arms show significant positioning differences with limited control.",
            Severity::Critical => "Critical arm variation detected. Arms show severe positioning differences or inability to maintain position.",
        }
    }

    pub fn one_step_worse(&self) -> Self {
        Self::from_nihss_score(self.nihss_score().saturating_add(1))
    }
}

// ==============================================================================
// Detection Quality & Method
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionQuality {
    VeryPoor,
    Poor,
    Fair,
    Good,
}

impl DetectionQuality {
    pub fn to_string(&self) -> &'static str {
        match self {
            DetectionQuality::VeryPoor => "very_poor",
            DetectionQuality::Poor => "poor",
            DetectionQuality::Fair => "fair",
            DetectionQuality::Good => "good",
        }
    }
}

/// Outcome of checking whether the detected arms are trustworthy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityAssessment {
    pub quality: DetectionQuality,
    pub reason: String,
    pub arm_length_diff: f64,
    pub avg_arm_length: f64,
    pub left_arm_length: f64,
    pub right_arm_length: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMethod {
    NormalizedVerticalDrift,
    AbsoluteVerticalDrift,
    TemporalProgression,
    FrameSequence,
    SingleFrame,
}

impl AnalysisMethod {
    pub fn to_string(&self) -> &'static str {
        match self {
            AnalysisMethod::NormalizedVerticalDrift => "normalized_vertical_drift",
            AnalysisMethod::AbsoluteVerticalDrift => "absolute_vertical_drift",
            AnalysisMethod::TemporalProgression => "temporal_progression",
            AnalysisMethod::FrameSequence => "frame_sequence",
            AnalysisMethod::SingleFrame => "single_frame",
        }
    }
}

// ==============================================================================
// Asymmetry Analysis (single pose)
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AsymmetryAnalysis {
    pub asymmetry_score: f64,
    pub asymmetry_percent: f64,
    pub vertical_drift: f64,
    pub left_arm_length: f64,
    pub right_arm_length: f64,
    pub avg_arm_length: f64,
    pub quality: QualityAssessment,
    pub method: AnalysisMethod,
    pub severity: Severity,
    pub drift_detected: bool,
    pub clinical_interpretation: String,
}

impl AsymmetryAnalysis {
    pub fn nihss_motor_score(&self) -> u8 {
        self.severity.nihss_score()
    }
}

// ==============================================================================
// Error Types
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DriftError {
    #[error("Missing required keypoints: {}", .0.join(", "))]
    MissingKeypoints(Vec<String>),

    #[error("Very poor keypoint detection quality - cannot assess asymmetry ({0})")]
    UnreliableDetection(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("Invalid image data: {0}")]
    InvalidImage(String),

    #[error("Test invalid - {0}")]
    InvalidProtocol(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DriftError {
    /// HTTP status the handler answers with
    pub fn status_code(&self) -> u16 {
        match self {
            DriftError::MissingKeypoints(_)
            | DriftError::UnreliableDetection(_)
            | DriftError::InvalidRequest(_)
            | DriftError::InvalidImage(_)
            | DriftError::InvalidProtocol(_) => 400,
            DriftError::Internal(_) => 500,
        }
    }
}

pub type DriftResult<T> = Result<T, DriftError>;
