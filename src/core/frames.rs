// Frame heuristics for recorded holds
//
// No pose model runs on frames. Each frame's raw bytes are split into a left
// and a right half and compared: a body drifting to one side shifts the byte
// statistics of that half. Scores are small, so the research ladder is used.

use crate::core::thresholds::{ThresholdLadder, ThresholdPreset};
use crate::models::assessment::{DriftError, DriftResult, Severity};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, warn};

pub const DEFAULT_FRAME_BUFFER_SIZE: usize = 30;
pub const MIN_FRAMES_FOR_SUMMARY: usize = 3;

/// Trend above which drift counts as increasing over the hold
const INCREASING_TREND: f64 = 0.01;
/// Frame size treated as full quality
const FULL_QUALITY_BYTES: f64 = 500_000.0;

// ==============================================================================
// Single Frame
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameAnalysis {
    pub asymmetry_score: f64,
    pub brightness_asymmetry: f64,
    pub texture_asymmetry: f64,
    /// 0.0 - 1.0, grows with frame size
    pub quality: f64,
    pub size_bytes: usize,
}

pub fn decode_frame(encoded: &str) -> DriftResult<Vec<u8>> {
    STANDARD
        .decode(encoded.trim())
        .map_err(|e| DriftError::InvalidImage(e.to_string()))
}

pub fn analyze_frame_bytes(bytes: &[u8]) -> DriftResult<FrameAnalysis> {
    if bytes.len() < 2 {
        return Err(DriftError::InvalidImage(format!(
            "frame too small to analyze ({} bytes)",
            bytes.len()
        )));
    }

    let (left, right) = bytes.split_at(bytes.len() / 2);
    let (left_mean, left_var) = mean_and_variance(left);
    let (right_mean, right_var) = mean_and_variance(right);

    let brightness_asymmetry = (left_mean - right_mean).abs() / 255.0;
    let texture_asymmetry = (left_var - right_var).abs() / (255.0 * 255.0);

    Ok(FrameAnalysis {
        asymmetry_score: (brightness_asymmetry + texture_asymmetry) / 2.0,
        brightness_asymmetry,
        texture_asymmetry,
        quality: (bytes.len() as f64 / FULL_QUALITY_BYTES).min(1.0),
        size_bytes: bytes.len(),
    })
}

fn mean_and_variance(bytes: &[u8]) -> (f64, f64) {
    let n = bytes.len() as f64;
    let mean = bytes.iter().map(|b| *b as f64).sum::<f64>() / n;
    let variance = bytes
        .iter()
        .map(|b| (*b as f64 - mean).powi(2))
        .sum::<f64>()
        / n;
    (mean, variance)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleFrameAssessment {
    pub analysis: FrameAnalysis,
    pub severity: Severity,
    pub drift_detected: bool,
    pub message: String,
}

pub fn assess_single_frame(bytes: &[u8], ladder: &ThresholdLadder) -> DriftResult<SingleFrameAssessment> {
    let analysis = analyze_frame_bytes(bytes)?;
    let severity = ladder.classify_ratio(analysis.asymmetry_score);
    let message = match severity {
        Severity::Normal => "No drift detected in current frame",
        Severity::Mild => "Mild drift detected in current frame",
        Severity::Moderate => "Moderate drift detected in current frame",
        Severity::Severe => "Severe drift detected in current frame",
        Severity::Critical => "Critical drift or no movement detected",
    };

    Ok(SingleFrameAssessment {
        analysis,
        severity,
        drift_detected: severity > Severity::Normal,
        message: message.to_string(),
    })
}

// ==============================================================================
// Frame Sequence
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameSummary {
    pub frames: usize,
    pub mean_asymmetry: f64,
    pub max_asymmetry: f64,
    pub min_asymmetry: f64,
    /// Mean of the second half minus mean of the first half
    pub trend: f64,
    pub mean_brightness_asymmetry: f64,
    pub mean_texture_asymmetry: f64,
    pub mean_quality: f64,
    pub severity: Severity,
    pub drift_detected: bool,
    pub clinical_interpretation: String,
}

/// Rolling window over the most recent frames of a hold
pub struct FrameSequenceAnalyzer {
    buffer: VecDeque<FrameAnalysis>,
    capacity: usize,
    ladder: ThresholdLadder,
}

impl Default for FrameSequenceAnalyzer {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_BUFFER_SIZE)
    }
}

impl FrameSequenceAnalyzer {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            ladder: ThresholdPreset::Research.ladder(),
        }
    }

    pub fn with_ladder(mut self, ladder: ThresholdLadder) -> Self {
        self.ladder = ladder;
        self
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn frames(&self) -> impl Iterator<Item = &FrameAnalysis> {
        self.buffer.iter()
    }

    /// Analyze a frame and push it, evicting the oldest when full
    pub fn add_frame(&mut self, bytes: &[u8]) -> DriftResult<FrameAnalysis> {
        let analysis = analyze_frame_bytes(bytes)?;
        if self.buffer.len() == self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(analysis);
        Ok(analysis)
    }

    /// Decode and add every frame, skipping the ones that fail. Errors only
    /// when no frame could be used.
    pub fn add_encoded_frames(&mut self, frames: &[String]) -> DriftResult<usize> {
        let mut added = 0;
        let mut last_error = None;

        for (i, encoded) in frames.iter().enumerate() {
            match decode_frame(encoded).and_then(|bytes| self.add_frame(&bytes)) {
                Ok(analysis) => {
                    debug!(frame = i + 1, asymmetry = analysis.asymmetry_score, "Frame analyzed");
                    added += 1;
                }
                Err(e) => {
                    warn!(frame = i + 1, error = %e, "Skipping frame");
                    last_error = Some(e);
                }
            }
        }

        match (added, last_error) {
            (0, Some(e)) => Err(e),
            _ => Ok(added),
        }
    }

    pub fn temporal_summary(&self) -> DriftResult<FrameSummary> {
        if self.buffer.len() < MIN_FRAMES_FOR_SUMMARY {
            return Err(DriftError::InvalidRequest(format!(
                "Insufficient frames for temporal analysis: {} of {} required",
                self.buffer.len(),
                MIN_FRAMES_FOR_SUMMARY
            )));
        }

        let scores: Vec<f64> = self.buffer.iter().map(|f| f.asymmetry_score).collect();
        let mean_asymmetry = mean(&scores);
        let (first_half, second_half) = scores.split_at(scores.len() / 2);
        let trend = mean(second_half) - mean(first_half);

        let mut severity = self.ladder.classify_ratio(mean_asymmetry);
        let mut interpretation = temporal_interpretation(severity).to_string();
        if trend > INCREASING_TREND {
            severity = severity.one_step_worse();
            interpretation.push_str(" Drift increased over time.");
        }

        let frames = self.buffer.len() as f64;
        Ok(FrameSummary {
            frames: self.buffer.len(),
            mean_asymmetry,
            max_asymmetry: scores.iter().copied().fold(f64::MIN, f64::max),
            min_asymmetry: scores.iter().copied().fold(f64::MAX, f64::min),
            trend,
            mean_brightness_asymmetry: self.buffer.iter().map(|f| f.brightness_asymmetry).sum::<f64>() / frames,
            mean_texture_asymmetry: self.buffer.iter().map(|f| f.texture_asymmetry).sum::<f64>() / frames,
            mean_quality: self.buffer.iter().map(|f| f.quality).sum::<f64>() / frames,
            severity,
            drift_detected: severity > Severity::Normal,
            clinical_interpretation: interpretation,
        })
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn temporal_interpretation(severity: Severity) -> &'static str {
    match severity {
        Severity::Normal => "No drift detected over test duration. Arms maintained stable position.",
        Severity::Mild => "Mild drift detected. Arms showed slight movement but maintained position.",
        Severity::Moderate => "Moderate drift detected. Arms showed noticeable movement.",
        Severity::Severe => "Severe drift detected. Arms showed significant movement or falling.",
        Severity::Critical => "No movement detected or complete paralysis.",
    }
}
