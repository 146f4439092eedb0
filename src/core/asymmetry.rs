// Arm drift asymmetry for a single pose
//
// asymmetry = |left_wrist.y - right_wrist.y| / mean arm length
//
// Which arm length is used, and whether the score is normalized at all, depends
// on how trustworthy the detected arms look.

use crate::core::geometry::{self, ArmLengths, Normalizer};
use crate::core::thresholds::ThresholdLadder;
use crate::models::assessment::{
    AnalysisMethod, AsymmetryAnalysis, DetectionQuality, DriftError, DriftResult,
    QualityAssessment, Severity,
};
use crate::models::pose::{ArmKeypoints, PoseKeypoints};
use serde::{Deserialize, Serialize};
use tracing::debug;

// ==============================================================================
// Settings
// ==============================================================================

/// When a result counts as "drift detected"
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum DriftRule {
    /// Any severity above normal
    AboveNormal,
    /// Score strictly above a fixed ratio
    Threshold { min_score: f64 },
}

impl DriftRule {
    pub fn is_drift(&self, score: f64, severity: Severity) -> bool {
        match self {
            DriftRule::AboveNormal => severity > Severity::Normal,
            DriftRule::Threshold { min_score } => score > *min_score,
        }
    }
}

/// Cutoffs for judging keypoint detection quality from Euclidean arm lengths
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityLimits {
    pub very_small_arm: f64,
    pub small_arm: f64,
    pub very_poor_difference: f64,
    pub poor_difference: f64,
    pub fair_difference: f64,
}

impl Default for QualityLimits {
    fn default() -> Self {
        Self {
            very_small_arm: 0.02,
            small_arm: 0.05,
            very_poor_difference: 0.8,
            poor_difference: 0.5,
            fair_difference: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerSettings {
    pub ladder: ThresholdLadder,
    pub normalizer: Normalizer,
    /// Average arm length at or below which normalization is skipped
    pub min_arm_length: f64,
    pub drift_rule: DriftRule,
    pub quality: QualityLimits,
    /// Keypoints reported below this confidence count as missing
    pub min_visibility: f64,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            ladder: ThresholdLadder::default(),
            normalizer: Normalizer::Euclidean,
            min_arm_length: 0.01,
            drift_rule: DriftRule::AboveNormal,
            quality: QualityLimits::default(),
            min_visibility: 0.5,
        }
    }
}

// ==============================================================================
// Detection Quality
// ==============================================================================

/// Judge whether a pose's arms are consistent enough to normalize against
pub fn assess_quality(pose: &PoseKeypoints, limits: &QualityLimits) -> QualityAssessment {
    match pose.arms() {
        Some(arms) => assess_arm_quality(&arms, limits),
        None => QualityAssessment {
            quality: DetectionQuality::Poor,
            reason: "Missing required keypoints".to_string(),
            arm_length_diff: 1.0,
            avg_arm_length: 0.0,
            left_arm_length: 0.0,
            right_arm_length: 0.0,
        },
    }
}

pub fn assess_arm_quality(arms: &ArmKeypoints, limits: &QualityLimits) -> QualityAssessment {
    let lengths = geometry::arm_lengths(arms, Normalizer::Euclidean);
    let diff = lengths.relative_difference();
    let avg = lengths.average;

    let (quality, reason) = if avg < limits.very_small_arm || diff > limits.very_poor_difference {
        (
            DetectionQuality::VeryPoor,
            format!(
                "Very small arm lengths ({:.3}) or large difference ({:.1}%)",
                avg,
                diff * 100.0
            ),
        )
    } else if avg < limits.small_arm || diff > limits.poor_difference {
        (
            DetectionQuality::Poor,
            format!(
                "Small arm lengths ({:.3}) or significant difference ({:.1}%)",
                avg,
                diff * 100.0
            ),
        )
    } else if diff > limits.fair_difference {
        (
            DetectionQuality::Fair,
            format!("Moderate arm length difference ({:.1}%)", diff * 100.0),
        )
    } else {
        (
            DetectionQuality::Good,
            format!("Good arm length consistency ({:.1}%)", diff * 100.0),
        )
    };

    QualityAssessment {
        quality,
        reason,
        arm_length_diff: diff,
        avg_arm_length: avg,
        left_arm_length: lengths.left,
        right_arm_length: lengths.right,
    }
}

// ==============================================================================
// Scoring
// ==============================================================================

/// Raw asymmetry ratio with the given normalizer, 0.0 when the arms are too
/// short to normalize against
pub fn asymmetry_ratio(arms: &ArmKeypoints, normalizer: Normalizer, min_arm_length: f64) -> f64 {
    let lengths = geometry::arm_lengths(arms, normalizer);
    if lengths.average > min_arm_length {
        geometry::wrist_drift(arms) / lengths.average
    } else {
        0.0
    }
}

/// Score a single pose, choosing the method from detection quality
pub fn score_pose(pose: &PoseKeypoints, settings: &AnalyzerSettings) -> DriftResult<AsymmetryAnalysis> {
    let pose = pose.visible(settings.min_visibility);
    let arms = pose.arms().ok_or_else(|| {
        DriftError::MissingKeypoints(
            pose.missing_required()
                .into_iter()
                .map(String::from)
                .collect(),
        )
    })?;

    let quality = assess_arm_quality(&arms, &settings.quality);
    if quality.quality == DetectionQuality::VeryPoor {
        return Err(DriftError::UnreliableDetection(quality.reason));
    }

    let vertical_drift = geometry::wrist_drift(&arms);
    let lengths = geometry::arm_lengths(&arms, settings.normalizer);
    let (asymmetry_score, method) = select_method(vertical_drift, &lengths, &quality, settings);

    debug!(
        left_arm_length = lengths.left,
        right_arm_length = lengths.right,
        avg_arm_length = lengths.average,
        vertical_drift,
        quality = quality.quality.to_string(),
        method = method.to_string(),
        "Arm analysis"
    );

    // Already a ratio, so no percentage guessing here
    let severity = settings.ladder.classify_ratio(asymmetry_score);
    let drift_detected = settings.drift_rule.is_drift(asymmetry_score, severity);

    Ok(AsymmetryAnalysis {
        asymmetry_score,
        asymmetry_percent: asymmetry_score * 100.0,
        vertical_drift,
        left_arm_length: lengths.left,
        right_arm_length: lengths.right,
        avg_arm_length: lengths.average,
        quality,
        method,
        severity,
        drift_detected,
        clinical_interpretation: severity.interpretation().to_string(),
    })
}

fn select_method(
    vertical_drift: f64,
    lengths: &ArmLengths,
    quality: &QualityAssessment,
    settings: &AnalyzerSettings,
) -> (f64, AnalysisMethod) {
    if quality.quality <= DetectionQuality::Poor {
        return (vertical_drift, AnalysisMethod::AbsoluteVerticalDrift);
    }
    if lengths.average > settings.min_arm_length {
        (
            vertical_drift / lengths.average,
            AnalysisMethod::NormalizedVerticalDrift,
        )
    } else {
        (vertical_drift, AnalysisMethod::AbsoluteVerticalDrift)
    }
}
