// Data models for pose keypoints as they arrive from the phone-side pose detector

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==============================================================================
// Body Landmarks
// ==============================================================================

/// MediaPipe Pose Landmark indices (33 total)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BodyLandmark {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

impl BodyLandmark {
    /// Landmarks the drift formula cannot run without
    pub const REQUIRED: [BodyLandmark; 4] = [
        BodyLandmark::LeftWrist,
        BodyLandmark::RightWrist,
        BodyLandmark::LeftShoulder,
        BodyLandmark::RightShoulder,
    ];

    const ALL: [BodyLandmark; 33] = [
        BodyLandmark::Nose,
        BodyLandmark::LeftEyeInner,
        BodyLandmark::LeftEye,
        BodyLandmark::LeftEyeOuter,
        BodyLandmark::RightEyeInner,
        BodyLandmark::RightEye,
        BodyLandmark::RightEyeOuter,
        BodyLandmark::LeftEar,
        BodyLandmark::RightEar,
        BodyLandmark::MouthLeft,
        BodyLandmark::MouthRight,
        BodyLandmark::LeftShoulder,
        BodyLandmark::RightShoulder,
        BodyLandmark::LeftElbow,
        BodyLandmark::RightElbow,
        BodyLandmark::LeftWrist,
        BodyLandmark::RightWrist,
        BodyLandmark::LeftPinky,
        BodyLandmark::RightPinky,
        BodyLandmark::LeftIndex,
        BodyLandmark::RightIndex,
        BodyLandmark::LeftThumb,
        BodyLandmark::RightThumb,
        BodyLandmark::LeftHip,
        BodyLandmark::RightHip,
        BodyLandmark::LeftKnee,
        BodyLandmark::RightKnee,
        BodyLandmark::LeftAnkle,
        BodyLandmark::RightAnkle,
        BodyLandmark::LeftHeel,
        BodyLandmark::RightHeel,
        BodyLandmark::LeftFootIndex,
        BodyLandmark::RightFootIndex,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Key used for this landmark in request JSON
    pub fn name(&self) -> &'static str {
        match self {
            BodyLandmark::Nose => "nose",
            BodyLandmark::LeftEyeInner => "left_eye_inner",
            BodyLandmark::LeftEye => "left_eye",
            BodyLandmark::LeftEyeOuter => "left_eye_outer",
            BodyLandmark::RightEyeInner => "right_eye_inner",
            BodyLandmark::RightEye => "right_eye",
            BodyLandmark::RightEyeOuter => "right_eye_outer",
            BodyLandmark::LeftEar => "left_ear",
            BodyLandmark::RightEar => "right_ear",
            BodyLandmark::MouthLeft => "mouth_left",
            BodyLandmark::MouthRight => "mouth_right",
            BodyLandmark::LeftShoulder => "left_shoulder",
            BodyLandmark::RightShoulder => "right_shoulder",
            BodyLandmark::LeftElbow => "left_elbow",
            BodyLandmark::RightElbow => "right_elbow",
            BodyLandmark::LeftWrist => "left_wrist",
            BodyLandmark::RightWrist => "right_wrist",
            BodyLandmark::LeftPinky => "left_pinky",
            BodyLandmark::RightPinky => "right_pinky",
            BodyLandmark::LeftIndex => "left_index",
            BodyLandmark::RightIndex => "right_index",
            BodyLandmark::LeftThumb => "left_thumb",
            BodyLandmark::RightThumb => "right_thumb",
            BodyLandmark::LeftHip => "left_hip",
            BodyLandmark::RightHip => "right_hip",
            BodyLandmark::LeftKnee => "left_knee",
            BodyLandmark::RightKnee => "right_knee",
            BodyLandmark::LeftAnkle => "left_ankle",
            BodyLandmark::RightAnkle => "right_ankle",
            BodyLandmark::LeftHeel => "left_heel",
            BodyLandmark::RightHeel => "right_heel",
            BodyLandmark::LeftFootIndex => "left_foot_index",
            BodyLandmark::RightFootIndex => "right_foot_index",
        }
    }
}

// ==============================================================================
// Keypoint
// ==============================================================================

/// A 2D keypoint in normalized image coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f64, // Normalized [0, 1]
    pub y: f64, // Normalized [0, 1], grows downwards
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl Keypoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            confidence: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn is_visible(&self, threshold: f64) -> bool {
        self.confidence.map_or(true, |c| c >= threshold)
    }
}

/// Keypoint as sent on the wire: either coordinate may be missing or null
#[derive(Debug, Clone, Default, Deserialize)]
struct KeypointWire {
    #[serde(default)]
    x: Option<f64>,
    #[serde(default)]
    y: Option<f64>,
    #[serde(default, alias = "visibility")]
    confidence: Option<f64>,
}

impl KeypointWire {
    fn complete(&self) -> Option<Keypoint> {
        let keypoint = Keypoint::new(self.x?, self.y?);
        Some(match self.confidence {
            Some(confidence) => keypoint.with_confidence(confidence),
            None => keypoint,
        })
    }
}

// ==============================================================================
// Pose Keypoints
// ==============================================================================

/// Accepted request shapes for a single pose
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum PoseWire {
    /// `{"left_wrist": {"x": .., "y": ..}, ...}`, null for undetected
    Named(BTreeMap<String, Option<KeypointWire>>),
    /// 33 MediaPipe landmarks in index order
    Indexed(Vec<Option<KeypointWire>>),
}

/// A pose: named keypoints, with incomplete entries remembered separately
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "PoseWire", into = "BTreeMap<String, Keypoint>")]
pub struct PoseKeypoints {
    points: BTreeMap<String, Keypoint>,
    incomplete: Vec<String>,
}

impl From<PoseWire> for PoseKeypoints {
    fn from(wire: PoseWire) -> Self {
        let named: Vec<(String, Option<KeypointWire>)> = match wire {
            PoseWire::Named(map) => map.into_iter().collect(),
            PoseWire::Indexed(list) => list
                .into_iter()
                .enumerate()
                .filter_map(|(i, kp)| {
                    BodyLandmark::from_index(i).map(|lm| (lm.name().to_string(), kp))
                })
                .collect(),
        };

        let mut pose = PoseKeypoints::default();
        for (name, kp) in named {
            match kp.as_ref().and_then(KeypointWire::complete) {
                Some(point) => {
                    pose.points.insert(name, point);
                }
                None => pose.incomplete.push(name),
            }
        }
        pose
    }
}

impl From<PoseKeypoints> for BTreeMap<String, Keypoint> {
    fn from(pose: PoseKeypoints) -> Self {
        pose.points
    }
}

impl PoseKeypoints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder used by tests and probe scenarios
    pub fn with(mut self, landmark: BodyLandmark, keypoint: Keypoint) -> Self {
        self.insert(landmark, keypoint);
        self
    }

    pub fn insert(&mut self, landmark: BodyLandmark, keypoint: Keypoint) {
        self.points.insert(landmark.name().to_string(), keypoint);
    }

    pub fn remove(&mut self, landmark: BodyLandmark) -> Option<Keypoint> {
        self.points.remove(landmark.name())
    }

    pub fn get(&self, landmark: BodyLandmark) -> Option<&Keypoint> {
        self.points.get(landmark.name())
    }

    /// Number of complete keypoints
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty() && self.incomplete.is_empty()
    }

    /// Copy of the pose with keypoints below `min_confidence` moved to the
    /// incomplete list. Keypoints without a confidence are kept.
    pub fn visible(&self, min_confidence: f64) -> PoseKeypoints {
        let mut pose = PoseKeypoints {
            points: BTreeMap::new(),
            incomplete: self.incomplete.clone(),
        };
        for (name, keypoint) in &self.points {
            if keypoint.is_visible(min_confidence) {
                pose.points.insert(name.clone(), *keypoint);
            } else {
                pose.incomplete.push(name.clone());
            }
        }
        pose
    }

    /// Required landmarks that are absent or lack a coordinate
    pub fn missing_required(&self) -> Vec<&'static str> {
        BodyLandmark::REQUIRED
            .iter()
            .filter(|lm| self.get(**lm).is_none())
            .map(|lm| lm.name())
            .collect()
    }

    /// The four landmarks the drift formula works on
    pub fn arms(&self) -> Option<ArmKeypoints> {
        Some(ArmKeypoints {
            left_wrist: *self.get(BodyLandmark::LeftWrist)?,
            right_wrist: *self.get(BodyLandmark::RightWrist)?,
            left_shoulder: *self.get(BodyLandmark::LeftShoulder)?,
            right_shoulder: *self.get(BodyLandmark::RightShoulder)?,
        })
    }
}

/// Wrists and shoulders of a pose with all four present
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArmKeypoints {
    pub left_wrist: Keypoint,
    pub right_wrist: Keypoint,
    pub left_shoulder: Keypoint,
    pub right_shoulder: Keypoint,
}

impl ArmKeypoints {
    pub fn into_pose(self) -> PoseKeypoints {
        PoseKeypoints::new()
            .with(BodyLandmark::LeftWrist, self.left_wrist)
            .with(BodyLandmark::RightWrist, self.right_wrist)
            .with(BodyLandmark::LeftShoulder, self.left_shoulder)
            .with(BodyLandmark::RightShoulder, self.right_shoulder)
    }
}

// ==============================================================================
// Time Series
// ==============================================================================

/// One pose sampled during a timed hold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeypointSnapshot {
    /// Seconds since the start of the hold
    pub timestamp: f64,
    pub keypoints: PoseKeypoints,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_pose_parsing() {
        let json = r#"{
            "left_wrist": {"x": 0.3, "y": 0.5},
            "right_wrist": {"x": 0.7, "y": 0.52, "confidence": 0.9},
            "left_shoulder": {"x": 0.35, "y": 0.3},
            "right_shoulder": {"x": 0.65, "y": 0.3},
            "left_elbow": {"x": 0.32, "y": 0.4}
        }"#;
        let pose: PoseKeypoints = serde_json::from_str(json).unwrap();
        assert_eq!(pose.len(), 5);
        assert!(pose.missing_required().is_empty());
        let arms = pose.arms().unwrap();
        assert_eq!(arms.right_wrist.confidence, Some(0.9));
        assert_eq!(arms.left_shoulder.y, 0.3);
    }

    #[test]
    fn test_incomplete_keypoint_is_missing() {
        let json = r#"{
            "left_wrist": {"x": 0.3},
            "right_wrist": {"x": 0.7, "y": 0.5},
            "left_shoulder": {"x": 0.35, "y": null},
            "right_shoulder": {"x": 0.65, "y": 0.3}
        }"#;
        let pose: PoseKeypoints = serde_json::from_str(json).unwrap();
        assert_eq!(pose.len(), 2);
        assert_eq!(pose.missing_required(), vec!["left_wrist", "left_shoulder"]);
        assert!(pose.arms().is_none());
        assert!(!pose.is_empty());
    }

    #[test]
    fn test_indexed_pose_parsing() {
        let mut landmarks = vec![serde_json::json!({"x": 0.5, "y": 0.1}); 17];
        landmarks[11] = serde_json::json!({"x": 0.4, "y": 0.3});
        landmarks[12] = serde_json::json!({"x": 0.6, "y": 0.3});
        landmarks[15] = serde_json::json!({"x": 0.2, "y": 0.31, "visibility": 0.8});
        landmarks[16] = serde_json::json!({"x": 0.8, "y": 0.33});

        let pose: PoseKeypoints = serde_json::from_value(serde_json::Value::Array(landmarks)).unwrap();
        let arms = pose.arms().unwrap();
        assert_eq!(arms.left_wrist.y, 0.31);
        assert_eq!(arms.left_wrist.confidence, Some(0.8));
        assert_eq!(arms.right_shoulder.x, 0.6);
        assert_eq!(pose.get(BodyLandmark::Nose).map(|k| k.y), Some(0.1));
    }

    #[test]
    fn test_pose_serializes_as_map() {
        let pose = PoseKeypoints::new().with(BodyLandmark::LeftWrist, Keypoint::new(0.1, 0.2));
        let value = serde_json::to_value(&pose).unwrap();
        assert_eq!(value, serde_json::json!({"left_wrist": {"x": 0.1, "y": 0.2}}));
    }

    #[test]
    fn test_null_keypoint_is_missing() {
        let json = r#"{
            "left_wrist": null,
            "right_wrist": {"x": 0.7, "y": 0.5},
            "left_shoulder": {"x": 0.35, "y": 0.3},
            "right_shoulder": {"x": 0.65, "y": 0.3}
        }"#;
        let pose: PoseKeypoints = serde_json::from_str(json).unwrap();
        assert_eq!(pose.len(), 3);
        assert_eq!(pose.missing_required(), vec!["left_wrist"]);

        let indexed: PoseKeypoints =
            serde_json::from_value(serde_json::json!([null, {"x": 0.5, "y": 0.1}])).unwrap();
        assert!(indexed.get(BodyLandmark::Nose).is_none());
        assert!(indexed.get(BodyLandmark::LeftEyeInner).is_some());
    }

    #[test]
    fn test_low_confidence_keypoints_are_hidden() {
        let pose = PoseKeypoints::new()
            .with(BodyLandmark::LeftWrist, Keypoint::new(0.3, 0.5).with_confidence(0.2))
            .with(BodyLandmark::RightWrist, Keypoint::new(0.7, 0.5).with_confidence(0.9))
            .with(BodyLandmark::LeftShoulder, Keypoint::new(0.35, 0.3));

        let visible = pose.visible(0.5);
        assert_eq!(visible.len(), 2);
        assert!(visible.get(BodyLandmark::LeftWrist).is_none());
        assert!(!visible.is_empty());
        assert_eq!(pose.visible(0.0), pose);
    }

    #[test]
    fn test_keypoint_visibility() {
        let keypoint = Keypoint::new(0.5, 0.5).with_confidence(0.8);
        assert!(keypoint.is_visible(0.5));
        assert!(!keypoint.is_visible(0.9));
        assert!(Keypoint::new(0.5, 0.5).is_visible(0.9));
    }

    #[test]
    fn test_landmark_index_lookup() {
        assert_eq!(BodyLandmark::from_index(15), Some(BodyLandmark::LeftWrist));
        assert_eq!(BodyLandmark::from_index(12), Some(BodyLandmark::RightShoulder));
        assert_eq!(BodyLandmark::from_index(33), None);
        assert_eq!(BodyLandmark::RightWrist as u8, 16);
    }
}
