// Timed arm hold analysis
//
// The phone samples keypoints during an eyes-closed hold of at least ten
// seconds. Drift is tracked across snapshots and scored with the motor arm
// protocol rules rather than a single-pose ladder.

use crate::core::asymmetry::asymmetry_ratio;
use crate::core::geometry::{self, Normalizer};
use crate::models::assessment::{DriftError, DriftResult, Severity};
use crate::models::pose::KeypointSnapshot;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

// ==============================================================================
// Protocol Limits
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProtocolLimits {
    /// Arm length assumed when converting wrist height into an angle
    pub estimated_arm_length: f64,
    pub min_test_duration_secs: f64,
    pub min_arm_angle: f64,
    pub max_arm_angle: f64,
    /// Reject holds whose starting arm angle is outside the range above
    pub enforce_positioning: bool,
    /// Asymmetry marking the onset of drift
    pub drift_onset: f64,
    /// Final asymmetry taken to mean the arm fell to the support
    pub support_contact: f64,
    pub min_arm_length: f64,
}

impl Default for ProtocolLimits {
    fn default() -> Self {
        Self {
            estimated_arm_length: 0.3,
            min_test_duration_secs: 9.5,
            min_arm_angle: 80.0,
            max_arm_angle: 100.0,
            enforce_positioning: true,
            drift_onset: 0.15,
            support_contact: 0.5,
            min_arm_length: 0.01,
        }
    }
}

// ==============================================================================
// Results
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressionPoint {
    pub timestamp: f64,
    pub asymmetry: f64,
    pub vertical_drift: f64,
    pub avg_arm_length: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DriftProgression {
    pub points: Vec<ProgressionPoint>,
    pub initial_asymmetry: f64,
    pub final_asymmetry: f64,
    pub max_drift: f64,
    /// Asymmetry change per second between the first and last snapshot
    pub drift_rate: f64,
    pub hits_support: bool,
    /// Timestamp of the first snapshot past drift onset, 0.0 if none
    pub time_to_drift: f64,
    /// Snapshots dropped for missing keypoints
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArmAngles {
    pub left: f64,
    pub right: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolAssessment {
    pub severity: Severity,
    pub drift_detected: bool,
    pub clinical_interpretation: String,
    pub message: String,
    pub progression: DriftProgression,
    pub angles: ArmAngles,
    pub test_duration: f64,
    pub eye_closed: bool,
    pub snapshots: usize,
}

// ==============================================================================
// Analysis
// ==============================================================================

/// Angle of an arm from hanging straight down (0°) to horizontal (90°),
/// estimated from wrist height alone
pub fn arm_angle(wrist_y: f64, shoulder_y: f64, estimated_arm_length: f64) -> f64 {
    let vertical_distance = (wrist_y - shoulder_y).abs();
    if vertical_distance == 0.0 {
        return 0.0;
    }
    (vertical_distance / estimated_arm_length).min(1.0).asin().to_degrees()
}

/// Asymmetry of every usable snapshot plus summary statistics. With fewer
/// than two usable snapshots there is no progression, and the summary is zero.
pub fn drift_progression(history: &[KeypointSnapshot], limits: &ProtocolLimits) -> DriftProgression {
    let mut points = Vec::with_capacity(history.len());
    let mut skipped = 0;

    for (i, snapshot) in history.iter().enumerate() {
        let Some(arms) = snapshot.keypoints.arms() else {
            warn!(
                snapshot = i,
                missing = ?snapshot.keypoints.missing_required(),
                "Skipping keypoint snapshot"
            );
            skipped += 1;
            continue;
        };

        let lengths = geometry::arm_lengths(&arms, Normalizer::Vertical);
        points.push(ProgressionPoint {
            timestamp: snapshot.timestamp,
            asymmetry: asymmetry_ratio(&arms, Normalizer::Vertical, limits.min_arm_length),
            vertical_drift: geometry::wrist_drift(&arms),
            avg_arm_length: lengths.average,
        });
    }

    if points.len() < 2 {
        return DriftProgression {
            points,
            skipped,
            ..DriftProgression::default()
        };
    }
    let first = points[0];
    let last = points[points.len() - 1];

    let max_drift = points.iter().map(|p| p.asymmetry).fold(0.0, f64::max);
    let time_span = last.timestamp - first.timestamp;
    let drift_rate = if time_span > 0.0 {
        (last.asymmetry - first.asymmetry) / time_span
    } else {
        0.0
    };
    let time_to_drift = points
        .iter()
        .find(|p| p.asymmetry > limits.drift_onset)
        .map(|p| p.timestamp)
        .unwrap_or(0.0);

    DriftProgression {
        initial_asymmetry: first.asymmetry,
        final_asymmetry: last.asymmetry,
        max_drift,
        drift_rate,
        hits_support: last.asymmetry > limits.support_contact,
        time_to_drift,
        skipped,
        points,
    }
}

/// Apply the motor arm protocol rules to a progression
pub fn score_protocol(
    progression: &DriftProgression,
    angles: &ArmAngles,
    eye_closed: bool,
    test_duration: f64,
    limits: &ProtocolLimits,
) -> DriftResult<Severity> {
    if !eye_closed {
        return Err(DriftError::InvalidProtocol(
            "Eyes must be closed for NIHSS test".to_string(),
        ));
    }
    if test_duration < limits.min_test_duration_secs {
        return Err(DriftError::InvalidProtocol(
            "Test must be at least 10 seconds".to_string(),
        ));
    }
    if limits.enforce_positioning {
        let in_range = |angle: f64| (limits.min_arm_angle..=limits.max_arm_angle).contains(&angle);
        if !in_range(angles.left) || !in_range(angles.right) {
            return Err(DriftError::InvalidProtocol(
                "Arms not positioned at 90° (NIHSS requirement)".to_string(),
            ));
        }
    }

    let final_asymmetry = progression.final_asymmetry;
    let severity = if final_asymmetry < 0.05 && progression.max_drift < 0.05 {
        Severity::Normal
    } else if final_asymmetry < 0.30 && !progression.hits_support && progression.time_to_drift > 0.0 {
        Severity::Mild
    } else if progression.hits_support && final_asymmetry < 0.60 {
        Severity::Moderate
    } else if progression.hits_support {
        Severity::Severe
    } else {
        // Drifting but never past onset, or past 30% without reaching support
        Severity::Moderate
    };

    Ok(severity)
}

/// Full analysis of a timed hold
pub fn analyze_hold(
    history: &[KeypointSnapshot],
    test_duration: f64,
    eye_closed: bool,
    limits: &ProtocolLimits,
) -> DriftResult<ProtocolAssessment> {
    let first = history
        .first()
        .ok_or_else(|| DriftError::InvalidRequest("No keypoint data provided".to_string()))?;
    let arms = first.keypoints.arms().ok_or_else(|| {
        DriftError::MissingKeypoints(
            first
                .keypoints
                .missing_required()
                .into_iter()
                .map(String::from)
                .collect(),
        )
    })?;

    let angles = ArmAngles {
        left: arm_angle(arms.left_wrist.y, arms.left_shoulder.y, limits.estimated_arm_length),
        right: arm_angle(arms.right_wrist.y, arms.right_shoulder.y, limits.estimated_arm_length),
    };

    let progression = drift_progression(history, limits);
    debug!(
        snapshots = history.len(),
        skipped = progression.skipped,
        initial = progression.initial_asymmetry,
        final_asymmetry = progression.final_asymmetry,
        max_drift = progression.max_drift,
        time_to_drift = progression.time_to_drift,
        hits_support = progression.hits_support,
        left_angle = angles.left,
        right_angle = angles.right,
        "Drift progression"
    );

    let severity = score_protocol(&progression, &angles, eye_closed, test_duration, limits)?;

    Ok(ProtocolAssessment {
        severity,
        drift_detected: severity > Severity::Normal,
        clinical_interpretation: protocol_interpretation(severity).to_string(),
        message: protocol_message(severity).to_string(),
        progression,
        angles,
        test_duration,
        eye_closed,
        snapshots: history.len(),
    })
}

fn protocol_interpretation(severity: Severity) -> &'static str {
    match severity {
        Severity::Normal => "No drift - Normal motor function",
        Severity::Mild => "Mild drift - Slight weakness, monitor for other symptoms",
        Severity::Moderate => "Moderate drift - Noticeable weakness, medical evaluation recommended",
        Severity::Severe => "Severe drift - Significant weakness, urgent medical evaluation",
        Severity::Critical => "No movement - Severe paralysis, emergency medical care needed",
    }
}

fn protocol_message(severity: Severity) -> &'static str {
    match severity {
        Severity::Normal => "No drift detected - Normal motor function",
        Severity::Mild => "Mild drift detected - Slight weakness, monitor for other symptoms",
        Severity::Moderate => "Moderate drift detected - Noticeable weakness, medical evaluation recommended",
        Severity::Severe => "Severe drift detected - Significant weakness, urgent medical evaluation",
        Severity::Critical => "Critical drift detected - Severe paralysis, emergency medical care needed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::pose::{BodyLandmark, Keypoint, PoseKeypoints};

    /// Shoulders at y=0.30, left wrist at y=0.60 (90° by the height estimate),
    /// right wrist at `right_y`
    fn snapshot(timestamp: f64, right_y: f64) -> KeypointSnapshot {
        KeypointSnapshot {
            timestamp,
            keypoints: PoseKeypoints::new()
                .with(BodyLandmark::LeftWrist, Keypoint::new(0.30, 0.60))
                .with(BodyLandmark::RightWrist, Keypoint::new(0.70, right_y))
                .with(BodyLandmark::LeftShoulder, Keypoint::new(0.40, 0.30))
                .with(BodyLandmark::RightShoulder, Keypoint::new(0.60, 0.30)),
        }
    }

    fn hold(right_ys: &[f64]) -> Vec<KeypointSnapshot> {
        right_ys
            .iter()
            .enumerate()
            .map(|(i, y)| snapshot(i as f64 * 5.0, *y))
            .collect()
    }

    fn assess(history: &[KeypointSnapshot]) -> DriftResult<ProtocolAssessment> {
        analyze_hold(history, 10.0, true, &ProtocolLimits::default())
    }

    #[test]
    fn test_arm_angle() {
        assert_eq!(arm_angle(0.3, 0.3, 0.3), 0.0);
        assert!((arm_angle(0.6, 0.3, 0.3) - 90.0).abs() < 1e-9);
        assert!((arm_angle(0.45, 0.3, 0.3) - 30.0).abs() < 1e-9);
        // Capped at horizontal
        assert!((arm_angle(0.9, 0.3, 0.3) - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_steady_hold_is_normal() {
        let result = assess(&hold(&[0.60, 0.60, 0.60])).unwrap();
        assert_eq!(result.severity, Severity::Normal);
        assert!(!result.drift_detected);
        assert_eq!(result.snapshots, 3);
        assert_eq!(result.progression.time_to_drift, 0.0);
    }

    #[test]
    fn test_gradual_drift_is_mild() {
        let result = assess(&hold(&[0.60, 0.62, 0.66])).unwrap();
        let progression = &result.progression;
        assert!((progression.final_asymmetry - 0.06 / 0.33).abs() < 1e-9);
        assert_eq!(progression.time_to_drift, 10.0);
        assert!(!progression.hits_support);
        assert!((progression.drift_rate - progression.final_asymmetry / 10.0).abs() < 1e-9);
        assert_eq!(result.severity, Severity::Mild);
        assert!(result.drift_detected);
    }

    #[test]
    fn test_support_contact_grades() {
        let moderate = assess(&hold(&[0.60, 0.70, 0.83])).unwrap();
        assert!(moderate.progression.hits_support);
        assert_eq!(moderate.severity, Severity::Moderate);

        let severe = assess(&hold(&[0.60, 0.75, 0.90])).unwrap();
        assert!(severe.progression.final_asymmetry >= 0.60);
        assert_eq!(severe.severity, Severity::Severe);
    }

    #[test]
    fn test_drift_without_onset_defaults_to_moderate() {
        let result = assess(&hold(&[0.60, 0.61, 0.62])).unwrap();
        assert!(result.progression.final_asymmetry > 0.05);
        assert_eq!(result.progression.time_to_drift, 0.0);
        assert_eq!(result.severity, Severity::Moderate);
    }

    #[test]
    fn test_invalid_protocol_conditions() {
        let history = hold(&[0.60, 0.60]);
        let limits = ProtocolLimits::default();

        let eyes_open = analyze_hold(&history, 10.0, false, &limits).unwrap_err();
        assert_eq!(eyes_open.to_string(), "Test invalid - Eyes must be closed for NIHSS test");

        let too_short = analyze_hold(&history, 9.0, true, &limits).unwrap_err();
        assert!(too_short.to_string().contains("at least 10 seconds"));
        assert!(analyze_hold(&history, 9.5, true, &limits).is_ok());
    }

    #[test]
    fn test_positioning_enforcement() {
        // Wrists only 0.1 below the shoulders: roughly 19°
        let history = vec![KeypointSnapshot {
            timestamp: 0.0,
            keypoints: PoseKeypoints::new()
                .with(BodyLandmark::LeftWrist, Keypoint::new(0.30, 0.40))
                .with(BodyLandmark::RightWrist, Keypoint::new(0.70, 0.40))
                .with(BodyLandmark::LeftShoulder, Keypoint::new(0.40, 0.30))
                .with(BodyLandmark::RightShoulder, Keypoint::new(0.60, 0.30)),
        }];

        let err = analyze_hold(&history, 10.0, true, &ProtocolLimits::default()).unwrap_err();
        assert!(matches!(err, DriftError::InvalidProtocol(_)));

        let relaxed = ProtocolLimits {
            enforce_positioning: false,
            ..ProtocolLimits::default()
        };
        let result = analyze_hold(&history, 10.0, true, &relaxed).unwrap();
        assert_eq!(result.severity, Severity::Normal);
        assert!(result.angles.left < 20.0);
    }

    #[test]
    fn test_incomplete_snapshots_are_skipped() {
        let mut history = hold(&[0.60, 0.62, 0.66]);
        history.insert(
            1,
            KeypointSnapshot {
                timestamp: 2.0,
                keypoints: PoseKeypoints::new()
                    .with(BodyLandmark::LeftWrist, Keypoint::new(0.30, 0.60)),
            },
        );
        let progression = drift_progression(&history, &ProtocolLimits::default());
        assert_eq!(progression.skipped, 1);
        assert_eq!(progression.points.len(), 3);
    }

    #[test]
    fn test_empty_history_is_rejected() {
        let err = assess(&[]).unwrap_err();
        assert_eq!(err.to_string(), "No keypoint data provided");
        assert_eq!(err.status_code(), 400);

        let progression = drift_progression(&[], &ProtocolLimits::default());
        assert_eq!(progression, DriftProgression::default());
    }

    #[test]
    fn test_single_snapshot_has_no_progression() {
        // A lone snapshot that has already drifted past onset
        let history = hold(&[0.66]);
        let progression = drift_progression(&history, &ProtocolLimits::default());
        assert_eq!(progression.points.len(), 1);
        assert_eq!(progression.final_asymmetry, 0.0);
        assert_eq!(progression.max_drift, 0.0);
        assert!(!progression.hits_support);

        let result = assess(&history).unwrap();
        assert_eq!(result.severity, Severity::Normal);
        assert_eq!(result.snapshots, 1);
    }

    #[test]
    fn test_first_snapshot_must_be_complete() {
        let history = vec![KeypointSnapshot {
            timestamp: 0.0,
            keypoints: PoseKeypoints::new(),
        }];
        assert!(matches!(assess(&history), Err(DriftError::MissingKeypoints(_))));
    }
}
