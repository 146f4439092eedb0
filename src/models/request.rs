// Request payloads accepted by the drift endpoint

use super::pose::{KeypointSnapshot, PoseKeypoints};
use serde::{Deserialize, Serialize};

/// Body of a drift analysis request.
///
/// Every field is optional on the wire; which analysis runs depends on which
/// payload is present (see [`DriftRequest::payload`]).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keypoints: Option<PoseKeypoints>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keypoints_history: Option<Vec<KeypointSnapshot>>,
    /// Base64-encoded frames of a recorded hold
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frames: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_base64: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub test_mode: bool,
    pub force_drift: bool,
    pub user_intentionally_drifting: bool,
    pub calibration_mode: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_feedback: Option<String>,

    /// Keypoint count reported by the phone, used for quality labels
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keypoints_detected: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eye_closed: Option<bool>,
}

/// The analysis a request asks for, in dispatch priority order
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RequestPayload<'a> {
    KeypointHistory(&'a [KeypointSnapshot]),
    Keypoints(&'a PoseKeypoints),
    Frames(&'a [String]),
    Image(&'a str),
}

impl DriftRequest {
    pub fn with_keypoints(keypoints: PoseKeypoints) -> Self {
        Self {
            keypoints: Some(keypoints),
            ..Self::default()
        }
    }

    pub fn user_id(&self) -> &str {
        self.user_id.as_deref().unwrap_or("unknown")
    }

    /// Pick the payload to analyze. Empty collections count as absent so
    /// that a request carrying `"keypoints": {}` next to real frames still
    /// reaches the frame analysis.
    pub fn payload(&self) -> Option<RequestPayload<'_>> {
        if let Some(history) = self.keypoints_history.as_deref().filter(|h| !h.is_empty()) {
            return Some(RequestPayload::KeypointHistory(history));
        }
        if let Some(keypoints) = self.keypoints.as_ref().filter(|k| !k.is_empty()) {
            return Some(RequestPayload::Keypoints(keypoints));
        }
        if let Some(frames) = self.frames.as_deref().filter(|f| !f.is_empty()) {
            return Some(RequestPayload::Frames(frames));
        }
        if let Some(image) = self.image_base64.as_deref().filter(|i| !i.is_empty()) {
            return Some(RequestPayload::Image(image));
        }
        None
    }
}
