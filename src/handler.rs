// Drift analysis request handler
//
// Takes a Lambda proxy event (or a bare request body), runs whichever analysis
// the payload asks for, and always answers with a proxy envelope. Failures
// become 400/500 envelopes; nothing here returns an error to the caller.

use crate::core::asymmetry::{score_pose, AnalyzerSettings};
use crate::core::config::{Config, ForcedDrift};
use crate::core::frames::{self, FrameSequenceAnalyzer, FrameSummary, SingleFrameAssessment};
use crate::core::temporal::{analyze_hold, ProtocolAssessment, ProtocolLimits};
use crate::core::thresholds::ThresholdLadder;
use crate::models::assessment::{AsymmetryAnalysis, DriftError, DriftResult, Severity};
use crate::models::request::{DriftRequest, RequestPayload};
use crate::models::response::{DriftResponseBody, LambdaProxyResponse};
use serde_json::Value;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub const CLINICAL_STANDARDS: &str = "NIHSS_Motor_Arm_Item5";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const MISSING_PAYLOAD: &str =
    "Request body must contain 'keypoints', 'keypoints_history', 'frames' or 'image_base64'";
const FORCED_INTERPRETATION: &str = "FORCED DRIFT for testing purposes";

// ==============================================================================
// Service
// ==============================================================================

/// Immutable analysis settings shared by every request
#[derive(Debug, Clone, PartialEq)]
pub struct DriftService {
    pub analyzer: AnalyzerSettings,
    pub protocol: ProtocolLimits,
    pub frame_buffer_size: usize,
    pub frame_ladder: ThresholdLadder,
    pub forced_drift: ForcedDrift,
}

impl Default for DriftService {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl DriftService {
    pub fn from_config(config: &Config) -> Self {
        Self {
            analyzer: config.analyzer_settings(),
            protocol: config.protocol,
            frame_buffer_size: config.frame_buffer_size,
            frame_ladder: config.frame_preset.ladder(),
            forced_drift: config.forced_drift,
        }
    }
}

// ==============================================================================
// Entry Point
// ==============================================================================

pub fn handle_event(event: &Value, service: &DriftService) -> LambdaProxyResponse {
    let started = Instant::now();
    let request_id = Uuid::new_v4().to_string();

    let result = parse_request(event).and_then(|request| {
        let body = catch_panic(|| analyze(&request, service))?;
        Ok((request, body))
    });

    match result {
        Ok((request, mut body)) => {
            body.request_id = Some(request_id);
            body.user_id = Some(request.user_id().to_string());
            body.test_mode = Some(request.test_mode);
            body.keypoints_detected = body.keypoints_detected.or(request.keypoints_detected);
            body.research_based = Some(true);
            body.clinical_standards = Some(CLINICAL_STANDARDS.to_string());
            body.version = Some(VERSION.to_string());
            body.analyzed_at = Some(chrono::Utc::now().to_rfc3339());
            body.analysis_time_seconds = Some(started.elapsed().as_secs_f64());

            info!(
                request_id = body.request_id.as_deref().unwrap_or_default(),
                user_id = request.user_id(),
                method = body.analysis_method.as_deref().unwrap_or_default(),
                severity = body.severity.as_deref().unwrap_or_default(),
                score = body.asymmetry_score.unwrap_or_default(),
                drift_detected = body.drift_detected.unwrap_or_default(),
                "Drift analysis complete"
            );
            LambdaProxyResponse::ok(&body)
        }
        Err(e) => {
            let status = e.status_code();
            if status >= 500 {
                error!(request_id = %request_id, error = %e, "Drift analysis failed");
            } else {
                warn!(request_id = %request_id, error = %e, "Drift request rejected");
            }
            LambdaProxyResponse::new(status, &DriftResponseBody::error(e.to_string()))
        }
    }
}

/// Run an analysis, turning a panic into an internal error
fn catch_panic<T>(f: impl FnOnce() -> DriftResult<T>) -> DriftResult<T> {
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(DriftError::Internal(reason))
    })
}

/// Pull the request out of an event: a JSON string `body`, an object `body`,
/// or the event itself when there is no `body`
pub fn parse_request(event: &Value) -> DriftResult<DriftRequest> {
    let body = match event.get("body") {
        Some(Value::String(raw)) => serde_json::from_str::<Value>(raw)
            .map_err(|e| DriftError::InvalidRequest(format!("Invalid JSON body: {}", e)))?,
        Some(body @ Value::Object(_)) => body.clone(),
        None | Some(Value::Null) => event.clone(),
        Some(_) => {
            return Err(DriftError::InvalidRequest(
                "Request body must be a JSON object".to_string(),
            ))
        }
    };

    serde_json::from_value(body)
        .map_err(|e| DriftError::InvalidRequest(format!("Invalid request body: {}", e)))
}

pub fn analyze(request: &DriftRequest, service: &DriftService) -> DriftResult<DriftResponseBody> {
    debug!(
        user_id = request.user_id(),
        test_mode = request.test_mode,
        force_drift = request.force_drift,
        intentionally_drifting = request.user_intentionally_drifting,
        calibration_mode = request.calibration_mode,
        user_feedback = request.user_feedback.as_deref().unwrap_or_default(),
        "Drift request"
    );

    let payload = request
        .payload()
        .ok_or_else(|| DriftError::InvalidRequest(MISSING_PAYLOAD.to_string()))?;

    let mut body = match payload {
        RequestPayload::KeypointHistory(history) => {
            let assessment = analyze_hold(
                history,
                request.test_duration.unwrap_or(0.0),
                request.eye_closed.unwrap_or(false),
                &service.protocol,
            )?;
            protocol_body(&assessment)
        }
        RequestPayload::Keypoints(keypoints) => {
            let analysis = score_pose(keypoints, &service.analyzer)?;
            let detected = request
                .keypoints_detected
                .unwrap_or(keypoints.len() as u32);
            pose_body(&analysis, detected)
        }
        RequestPayload::Frames(encoded) => {
            let mut analyzer = FrameSequenceAnalyzer::new(service.frame_buffer_size)
                .with_ladder(service.frame_ladder);
            analyzer.add_encoded_frames(encoded)?;
            frame_sequence_body(&analyzer.temporal_summary()?)
        }
        RequestPayload::Image(encoded) => {
            let bytes = frames::decode_frame(encoded)?;
            let assessment = frames::assess_single_frame(&bytes, &service.frame_ladder)?;
            let mut body = single_frame_body(&assessment);
            body.image_size_bytes = request.image_size_bytes.or(Some(bytes.len() as u64));
            body
        }
    };

    if request.force_drift {
        apply_forced_drift(&mut body, &service.forced_drift);
    }

    Ok(body)
}

// ==============================================================================
// Response Builders
// ==============================================================================

fn scored_body(score: f64, severity: Severity, drift_detected: bool) -> DriftResponseBody {
    let nihss = severity.nihss_score();
    DriftResponseBody {
        drift_detected: Some(drift_detected),
        asymmetry_score: Some(score),
        asymmetry_percent: Some(score * 100.0),
        y_difference: Some(score),
        nihss_motor_score: Some(nihss),
        clinical_score: Some(nihss),
        nihss_total: Some(nihss),
        severity: Some(severity.to_string().to_string()),
        ..DriftResponseBody::default()
    }
}

/// Quality label for a single-pose result, from how many keypoints the phone saw
pub fn keypoint_test_quality(keypoints_detected: u32) -> &'static str {
    match keypoints_detected {
        0..=3 => "poor_calibration_analysis",
        4..=7 => "good_calibration_analysis",
        _ => "excellent_calibration_analysis",
    }
}

fn pose_body(analysis: &AsymmetryAnalysis, keypoints_detected: u32) -> DriftResponseBody {
    DriftResponseBody {
        message: Some(analysis.clinical_interpretation.clone()),
        clinical_interpretation: Some(analysis.clinical_interpretation.clone()),
        test_quality: Some(keypoint_test_quality(keypoints_detected).to_string()),
        keypoints_detected: Some(keypoints_detected),
        analysis_method: Some(analysis.method.to_string().to_string()),
        detection_quality: Some(analysis.quality.quality.to_string().to_string()),
        quality_reason: Some(analysis.quality.reason.clone()),
        vertical_drift: Some(analysis.vertical_drift),
        left_arm_length: Some(analysis.left_arm_length),
        right_arm_length: Some(analysis.right_arm_length),
        avg_arm_length: Some(analysis.avg_arm_length),
        ..scored_body(analysis.asymmetry_score, analysis.severity, analysis.drift_detected)
    }
}

fn protocol_body(assessment: &ProtocolAssessment) -> DriftResponseBody {
    let progression = &assessment.progression;
    DriftResponseBody {
        message: Some(assessment.message.clone()),
        clinical_interpretation: Some(assessment.clinical_interpretation.clone()),
        test_quality: Some("nihss_compliant_analysis".to_string()),
        analysis_method: Some("temporal_progression".to_string()),
        test_duration: Some(assessment.test_duration),
        eye_closed: Some(assessment.eye_closed),
        keypoints_snapshots: Some(assessment.snapshots),
        left_arm_angle: Some(assessment.angles.left),
        right_arm_angle: Some(assessment.angles.right),
        initial_asymmetry: Some(progression.initial_asymmetry),
        final_asymmetry: Some(progression.final_asymmetry),
        max_drift: Some(progression.max_drift),
        drift_rate: Some(progression.drift_rate),
        time_to_drift: Some(progression.time_to_drift),
        hits_support: Some(progression.hits_support),
        ..scored_body(
            progression.final_asymmetry,
            assessment.severity,
            assessment.drift_detected,
        )
    }
}

fn frame_sequence_body(summary: &FrameSummary) -> DriftResponseBody {
    DriftResponseBody {
        message: Some(summary.clinical_interpretation.clone()),
        clinical_interpretation: Some(summary.clinical_interpretation.clone()),
        test_quality: Some("frame_by_frame_analysis".to_string()),
        analysis_method: Some("frame_sequence".to_string()),
        frames_analyzed: Some(summary.frames),
        drift_trend: Some(summary.trend),
        frame_quality: Some(summary.mean_quality),
        brightness_asymmetry: Some(summary.mean_brightness_asymmetry),
        texture_asymmetry: Some(summary.mean_texture_asymmetry),
        max_drift: Some(summary.max_asymmetry),
        ..scored_body(summary.mean_asymmetry, summary.severity, summary.drift_detected)
    }
}

fn single_frame_body(assessment: &SingleFrameAssessment) -> DriftResponseBody {
    let analysis = &assessment.analysis;
    DriftResponseBody {
        message: Some(assessment.message.clone()),
        clinical_interpretation: Some(assessment.severity.interpretation().to_string()),
        test_quality: Some("single_frame_analysis".to_string()),
        analysis_method: Some("single_frame".to_string()),
        frames_analyzed: Some(1),
        frame_quality: Some(analysis.quality),
        brightness_asymmetry: Some(analysis.brightness_asymmetry),
        texture_asymmetry: Some(analysis.texture_asymmetry),
        ..scored_body(analysis.asymmetry_score, assessment.severity, assessment.drift_detected)
    }
}

fn apply_forced_drift(body: &mut DriftResponseBody, forced: &ForcedDrift) {
    let nihss = forced.severity.nihss_score();
    warn!(severity = forced.severity.to_string(), "Forcing drift result");

    body.drift_detected = Some(true);
    body.asymmetry_score = Some(forced.asymmetry_score);
    body.asymmetry_percent = Some(forced.asymmetry_score * 100.0);
    body.y_difference = Some(forced.asymmetry_score);
    body.nihss_motor_score = Some(nihss);
    body.clinical_score = Some(nihss);
    body.nihss_total = Some(nihss);
    body.severity = Some(forced.severity.to_string().to_string());
    body.message = Some(FORCED_INTERPRETATION.to_string());
    body.clinical_interpretation = Some(FORCED_INTERPRETATION.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde_json::json;

    fn horizontal_arms(drop: f64) -> Value {
        json!({
            "left_shoulder": {"x": 0.40, "y": 0.30},
            "right_shoulder": {"x": 0.60, "y": 0.30},
            "left_wrist": {"x": 0.15, "y": 0.30},
            "right_wrist": {"x": 0.85, "y": 0.30 + drop}
        })
    }

    fn hold_snapshot(timestamp: f64, right_y: f64) -> Value {
        json!({
            "timestamp": timestamp,
            "keypoints": {
                "left_shoulder": {"x": 0.40, "y": 0.30},
                "right_shoulder": {"x": 0.60, "y": 0.30},
                "left_wrist": {"x": 0.30, "y": 0.60},
                "right_wrist": {"x": 0.70, "y": right_y}
            }
        })
    }

    fn respond(event: Value) -> (u16, Value) {
        let response = handle_event(&event, &DriftService::default());
        assert_eq!(response.headers["Content-Type"], "application/json");
        assert_eq!(response.headers["Access-Control-Allow-Origin"], "*");
        let body: Value = serde_json::from_str(&response.body).unwrap();
        (response.status_code, body)
    }

    #[test]
    fn test_keypoints_in_string_body() {
        let body = json!({"keypoints": horizontal_arms(0.10), "user_id": "ios-demo"}).to_string();
        let (status, body) = respond(json!({ "body": body }));

        assert_eq!(status, 200);
        assert_eq!(body["severity"], "moderate");
        assert_eq!(body["nihss_motor_score"], 2);
        assert_eq!(body["clinical_score"], 2);
        assert_eq!(body["drift_detected"], true);
        assert_eq!(body["user_id"], "ios-demo");
        assert_eq!(body["analysis_method"], "normalized_vertical_drift");
        assert_eq!(body["research_based"], true);
        assert_eq!(body["clinical_standards"], CLINICAL_STANDARDS);
        assert_eq!(body["asymmetry_score"], body["y_difference"]);
        assert!(body["request_id"].is_string());
        assert!(body.get("error").is_none());
        assert!(body.get("final_asymmetry").is_none());
    }

    #[test]
    fn test_event_shapes_agree() {
        let request = json!({"keypoints": horizontal_arms(0.01)});
        let (direct_status, direct) = respond(request.clone());
        let (object_status, object) = respond(json!({ "body": request }));

        assert_eq!(direct_status, 200);
        assert_eq!(object_status, 200);
        assert_eq!(direct["severity"], "normal");
        assert_eq!(direct["asymmetry_score"], object["asymmetry_score"]);
        assert_eq!(direct["user_id"], "unknown");
    }

    #[test]
    fn test_missing_payload_is_400() {
        let (status, body) = respond(json!({"user_id": "x"}));
        assert_eq!(status, 400);
        assert_eq!(body["error"], MISSING_PAYLOAD);
        assert_eq!(body["severity"], "error");
        assert_eq!(body["drift_detected"], false);
        assert_eq!(body["nihss_motor_score"], 0);
    }

    #[test]
    fn test_malformed_json_body_is_400() {
        let (status, body) = respond(json!({"body": "{not json"}));
        assert_eq!(status, 400);
        assert!(body["error"].as_str().unwrap().starts_with("Invalid JSON body"));
        assert!(body["message"].as_str().unwrap().starts_with("Analysis failed: "));
    }

    #[test]
    fn test_missing_keypoint_is_400() {
        let mut keypoints = horizontal_arms(0.10);
        keypoints.as_object_mut().unwrap().remove("right_wrist");
        let (status, body) = respond(json!({ "keypoints": keypoints }));
        assert_eq!(status, 400);
        assert_eq!(body["error"], "Missing required keypoints: right_wrist");
    }

    #[test]
    fn test_null_keypoint_is_400() {
        let mut keypoints = horizontal_arms(0.10);
        keypoints["left_wrist"] = Value::Null;
        let (status, body) = respond(json!({ "keypoints": keypoints }));
        assert_eq!(status, 400);
        assert_eq!(body["error"], "Missing required keypoints: left_wrist");
    }

    #[test]
    fn test_keypoint_count_sets_test_quality() {
        let (status, body) = respond(json!({"keypoints": horizontal_arms(0.01)}));
        assert_eq!(status, 200);
        assert_eq!(body["keypoints_detected"], 4);
        assert_eq!(body["test_quality"], "good_calibration_analysis");

        let (_, body) = respond(json!({"keypoints": horizontal_arms(0.01), "keypoints_detected": 12}));
        assert_eq!(body["keypoints_detected"], 12);
        assert_eq!(body["test_quality"], "excellent_calibration_analysis");

        let (_, body) = respond(json!({"keypoints": horizontal_arms(0.01), "keypoints_detected": 3}));
        assert_eq!(body["test_quality"], "poor_calibration_analysis");
    }

    #[test]
    fn test_panicking_analysis_is_internal_error() {
        let result: DriftResult<()> = catch_panic(|| panic!("index out of bounds"));
        match result {
            Err(e @ DriftError::Internal(_)) => {
                assert_eq!(e.status_code(), 500);
                assert_eq!(e.to_string(), "Internal error: index out of bounds");
            }
            other => panic!("expected internal error, got {:?}", other),
        }
        assert_eq!(catch_panic(|| Ok(7)).unwrap(), 7);
    }

    #[test]
    fn test_low_confidence_wrist_is_missing() {
        let mut keypoints = horizontal_arms(0.10);
        keypoints["right_wrist"]["visibility"] = json!(0.1);
        let (status, body) = respond(json!({ "keypoints": keypoints }));
        assert_eq!(status, 400);
        assert_eq!(body["error"], "Missing required keypoints: right_wrist");
    }

    #[test]
    fn test_force_drift_overrides_result() {
        let (status, body) = respond(json!({"keypoints": horizontal_arms(0.0), "force_drift": true}));
        assert_eq!(status, 200);
        assert_eq!(body["drift_detected"], true);
        assert_eq!(body["asymmetry_score"], 0.08);
        assert_eq!(body["nihss_motor_score"], 3);
        assert_eq!(body["severity"], "severe");
        assert_eq!(body["clinical_interpretation"], FORCED_INTERPRETATION);
    }

    #[test]
    fn test_keypoint_history_takes_priority() {
        let request = json!({
            "keypoints": horizontal_arms(0.25),
            "keypoints_history": [
                hold_snapshot(0.0, 0.60),
                hold_snapshot(5.0, 0.62),
                hold_snapshot(10.0, 0.66)
            ],
            "test_duration": 10.0,
            "eye_closed": true
        });
        let (status, body) = respond(request);
        assert_eq!(status, 200);
        assert_eq!(body["analysis_method"], "temporal_progression");
        assert_eq!(body["severity"], "mild");
        assert_eq!(body["time_to_drift"], 10.0);
        assert_eq!(body["keypoints_snapshots"], 3);
        assert_eq!(body["test_quality"], "nihss_compliant_analysis");
    }

    #[test]
    fn test_hold_with_eyes_open_is_invalid() {
        let request = json!({
            "keypoints_history": [hold_snapshot(0.0, 0.60), hold_snapshot(10.0, 0.60)],
            "test_duration": 10.0
        });
        let (status, body) = respond(request);
        assert_eq!(status, 400);
        assert_eq!(body["error"], "Test invalid - Eyes must be closed for NIHSS test");
    }

    #[test]
    fn test_frame_sequence() {
        let steady = STANDARD.encode([90u8; 400]);
        let request = json!({"frames": [steady, steady, steady, "%%%"]});
        let (status, body) = respond(request);
        assert_eq!(status, 200);
        assert_eq!(body["analysis_method"], "frame_sequence");
        assert_eq!(body["frames_analyzed"], 3);
        assert_eq!(body["severity"], "normal");

        let (status, _) = respond(json!({"frames": [steady]}));
        assert_eq!(status, 400);
    }

    #[test]
    fn test_single_image() {
        let mut bytes = vec![0u8; 100];
        bytes.extend(vec![255u8; 100]);
        let (status, body) = respond(json!({"image_base64": STANDARD.encode(&bytes)}));
        assert_eq!(status, 200);
        assert_eq!(body["analysis_method"], "single_frame");
        assert_eq!(body["severity"], "critical");
        assert_eq!(body["image_size_bytes"], 200);

        let (status, body) = respond(json!({"image_base64": "@@@"}));
        assert_eq!(status, 400);
        assert!(body["error"].as_str().unwrap().starts_with("Invalid image data"));
    }

    #[test]
    fn test_service_follows_config() {
        let config = Config {
            threshold_preset: crate::core::thresholds::ThresholdPreset::Research,
            ..Config::default()
        };
        let service = DriftService::from_config(&config);
        let event = json!({"keypoints": horizontal_arms(0.01)});
        let body = handle_event(&event, &service).parse_body().unwrap();
        // ≈4% is normal on the default ladder but moderate on the research one
        assert_eq!(body.severity.as_deref(), Some("moderate"));
        assert_eq!(body.drift_detected, Some(true));
    }
}
