// Response bodies and the Lambda proxy envelope

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==============================================================================
// Response Body
// ==============================================================================

/// JSON body returned by the drift endpoint.
///
/// The deployed Lambda variants never agreed on a field set, so every field is
/// optional: the server fills what its analysis produced and the probe reads
/// whatever a given deployment sends back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftResponseBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub drift_detected: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asymmetry_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asymmetry_percent: Option<f64>,
    /// Legacy alias of `asymmetry_score`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y_difference: Option<f64>,
    /// Legacy alias of `nihss_motor_score`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clinical_score: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nihss_motor_score: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nihss_total: Option<u8>,
    /// A severity name, or "error" on failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clinical_interpretation: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_quality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub research_based: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clinical_standards: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_time_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analyzed_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_mode: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keypoints_detected: Option<u32>,

    // Single pose
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detection_quality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vertical_drift: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left_arm_length: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right_arm_length: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_arm_length: Option<f64>,

    // Timed hold
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eye_closed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keypoints_snapshots: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left_arm_angle: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right_arm_angle: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_asymmetry: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_asymmetry: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_drift: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drift_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_to_drift: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hits_support: Option<bool>,

    // Frames
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frames_analyzed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drift_trend: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_quality: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brightness_asymmetry: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub texture_asymmetry: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_size_bytes: Option<u64>,
}

impl DriftResponseBody {
    /// Body sent alongside a 400/500
    pub fn error(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            drift_detected: Some(false),
            asymmetry_score: Some(0.0),
            nihss_motor_score: Some(0),
            severity: Some("error".to_string()),
            message: Some(format!("Analysis failed: {}", message)),
            error: Some(message),
            ..Self::default()
        }
    }

    /// Score to compare across deployments: `asymmetry_score`, falling back
    /// to the legacy `y_difference`
    pub fn effective_score(&self) -> Option<f64> {
        self.asymmetry_score.or(self.y_difference)
    }

    pub fn effective_nihss(&self) -> Option<u8> {
        self.nihss_motor_score.or(self.clinical_score)
    }
}

// ==============================================================================
// Lambda Proxy Envelope
// ==============================================================================

/// AWS Lambda proxy integration response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LambdaProxyResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    /// JSON-encoded [`DriftResponseBody`]
    pub body: String,
}

impl LambdaProxyResponse {
    pub fn new(status_code: u16, body: &DriftResponseBody) -> Self {
        // A body made of strings, numbers and bools always serializes; keep a
        // valid fallback anyway so the handler has no panicking path.
        let body = serde_json::to_string(body)
            .unwrap_or_else(|e| format!("{{\"error\":\"response serialization failed: {}\"}}", e));
        Self {
            status_code,
            headers: default_headers(),
            body,
        }
    }

    pub fn ok(body: &DriftResponseBody) -> Self {
        Self::new(200, body)
    }

    pub fn parse_body(&self) -> serde_json::Result<DriftResponseBody> {
        serde_json::from_str(&self.body)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// How the HTTP server hands an envelope to its caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    /// HTTP 200 carrying the whole envelope, as API Gateway does without
    /// proxy integration. Clients see `body` as a JSON string.
    #[default]
    Envelope,
    /// HTTP status from `statusCode`, inner body as the response
    Direct,
}

impl ResponseMode {
    pub fn to_string(&self) -> &'static str {
        match self {
            ResponseMode::Envelope => "envelope",
            ResponseMode::Direct => "direct",
        }
    }

    pub fn from_string(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "envelope" => Ok(ResponseMode::Envelope),
            "direct" => Ok(ResponseMode::Direct),
            _ => Err(format!("Unknown response mode: {}", s)),
        }
    }
}

fn default_headers() -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();
    headers.insert("Content-Type".to_string(), "application/json".to_string());
    headers.insert("Access-Control-Allow-Origin".to_string(), "*".to_string());
    headers
}
