// Built-in probe scenarios
//
// Arms held out horizontally with the right wrist dropped by a known amount.
// Expected severities assume a server on default settings (realistic ladder,
// Euclidean arm length).

use crate::models::assessment::Severity;
use crate::models::pose::{ArmKeypoints, BodyLandmark, Keypoint, PoseKeypoints};
use crate::models::request::DriftRequest;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "expect", content = "severity", rename_all = "snake_case")]
pub enum Expectation {
    Severity(Severity),
    /// The endpoint should reject the request
    Failure,
}

impl Expectation {
    pub fn label(&self) -> &'static str {
        match self {
            Expectation::Severity(severity) => severity.to_string(),
            Expectation::Failure => "error",
        }
    }

    /// Some(true) for drift, Some(false) for normal, None for failures
    pub fn expects_drift(&self) -> Option<bool> {
        match self {
            Expectation::Severity(severity) => Some(*severity > Severity::Normal),
            Expectation::Failure => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub name: &'static str,
    pub description: &'static str,
    pub request: DriftRequest,
    pub expected: Expectation,
}

impl Scenario {
    /// Scenarios whose score is real geometry rather than a test override
    pub fn calibrates(&self) -> bool {
        !self.request.force_drift
    }
}

/// Shoulders level at y=0.30, left arm straight out, right wrist dropped
pub fn horizontal_arms(drop: f64) -> ArmKeypoints {
    ArmKeypoints {
        left_wrist: Keypoint::new(0.15, 0.30),
        right_wrist: Keypoint::new(0.85, 0.30 + drop),
        left_shoulder: Keypoint::new(0.40, 0.30),
        right_shoulder: Keypoint::new(0.60, 0.30),
    }
}

fn pose_request(keypoints: PoseKeypoints, user_id: &str) -> DriftRequest {
    DriftRequest {
        user_id: Some(user_id.to_string()),
        test_mode: true,
        ..DriftRequest::with_keypoints(keypoints)
    }
}

fn drop_scenario(
    name: &'static str,
    description: &'static str,
    drop: f64,
    expected: Severity,
) -> Scenario {
    Scenario {
        name,
        description,
        request: pose_request(horizontal_arms(drop).into_pose(), "probe"),
        expected: Expectation::Severity(expected),
    }
}

pub fn builtin_scenarios() -> Vec<Scenario> {
    let mut forced = pose_request(horizontal_arms(0.0).into_pose(), "probe");
    forced.force_drift = true;

    let mut missing = horizontal_arms(0.10).into_pose();
    missing.remove(BodyLandmark::RightWrist);

    // Right forearm foreshortened to ~0.10 against a 0.25 left arm
    let short_right = ArmKeypoints {
        right_wrist: Keypoint::new(0.70, 0.32),
        ..horizontal_arms(0.0)
    };

    vec![
        drop_scenario("steady", "Both arms level", 0.01, Severity::Normal),
        drop_scenario("mild", "Right wrist 0.06 lower", 0.06, Severity::Mild),
        drop_scenario("moderate", "Right wrist 0.10 lower", 0.10, Severity::Moderate),
        drop_scenario("severe", "Right wrist 0.15 lower", 0.15, Severity::Severe),
        drop_scenario("critical", "Right wrist 0.25 lower", 0.25, Severity::Critical),
        Scenario {
            name: "poor_detection",
            description: "Arm lengths disagree, scored on absolute drift",
            request: pose_request(short_right.into_pose(), "probe"),
            expected: Expectation::Severity(Severity::Normal),
        },
        Scenario {
            name: "forced_drift",
            description: "Level arms with force_drift set",
            request: forced,
            expected: Expectation::Severity(Severity::Severe),
        },
        Scenario {
            name: "missing_keypoint",
            description: "Right wrist not detected",
            request: pose_request(missing, "probe"),
            expected: Expectation::Failure,
        },
    ]
}

pub fn find_scenario(name: &str) -> Option<Scenario> {
    builtin_scenarios().into_iter().find(|s| s.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{analyze, DriftService};

    #[test]
    fn test_scenarios_match_default_service() {
        let service = DriftService::default();
        for scenario in builtin_scenarios() {
            let result = analyze(&scenario.request, &service);
            match scenario.expected {
                Expectation::Severity(severity) => {
                    let body = result.unwrap_or_else(|e| panic!("{} failed: {}", scenario.name, e));
                    assert_eq!(
                        body.severity.as_deref(),
                        Some(severity.to_string()),
                        "scenario {}",
                        scenario.name
                    );
                }
                Expectation::Failure => assert!(result.is_err(), "scenario {}", scenario.name),
            }
        }
    }

    #[test]
    fn test_poor_detection_uses_absolute_drift() {
        let scenario = find_scenario("poor_detection").unwrap();
        let body = analyze(&scenario.request, &DriftService::default()).unwrap();
        assert_eq!(body.detection_quality.as_deref(), Some("poor"));
        assert_eq!(body.analysis_method.as_deref(), Some("absolute_vertical_drift"));
    }

    #[test]
    fn test_expectations() {
        assert_eq!(Expectation::Failure.label(), "error");
        assert_eq!(Expectation::Severity(Severity::Normal).expects_drift(), Some(false));
        assert_eq!(Expectation::Severity(Severity::Mild).expects_drift(), Some(true));
        assert!(!find_scenario("forced_drift").unwrap().calibrates());
        assert!(find_scenario("nope").is_none());
    }
}
