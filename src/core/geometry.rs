// Keypoint geometry - distances and arm lengths in normalized image space

use crate::models::pose::{ArmKeypoints, Keypoint};
use serde::{Deserialize, Serialize};

/// How an arm's length is measured when normalizing wrist drift
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalizer {
    /// |wrist.y - shoulder.y|
    Vertical,
    /// Straight-line wrist to shoulder distance
    Euclidean,
}

impl Normalizer {
    pub fn to_string(&self) -> &'static str {
        match self {
            Normalizer::Vertical => "vertical",
            Normalizer::Euclidean => "euclidean",
        }
    }

    pub fn from_string(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "vertical" => Ok(Normalizer::Vertical),
            "euclidean" => Ok(Normalizer::Euclidean),
            _ => Err(format!("Unknown normalizer: {}", s)),
        }
    }

    pub fn arm_length(&self, wrist: &Keypoint, shoulder: &Keypoint) -> f64 {
        match self {
            Normalizer::Vertical => vertical_distance(wrist, shoulder),
            Normalizer::Euclidean => euclidean_distance(wrist, shoulder),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArmLengths {
    pub left: f64,
    pub right: f64,
    pub average: f64,
}

impl ArmLengths {
    /// |left - right| relative to the longer arm; 1.0 when both are zero
    pub fn relative_difference(&self) -> f64 {
        let longest = self.left.max(self.right);
        if longest > 0.0 {
            (self.left - self.right).abs() / longest
        } else {
            1.0
        }
    }
}

pub fn vertical_distance(a: &Keypoint, b: &Keypoint) -> f64 {
    (a.y - b.y).abs()
}

pub fn euclidean_distance(a: &Keypoint, b: &Keypoint) -> f64 {
    ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt()
}

pub fn arm_lengths(arms: &ArmKeypoints, normalizer: Normalizer) -> ArmLengths {
    let left = normalizer.arm_length(&arms.left_wrist, &arms.left_shoulder);
    let right = normalizer.arm_length(&arms.right_wrist, &arms.right_shoulder);
    ArmLengths {
        left,
        right,
        average: (left + right) / 2.0,
    }
}

/// Height difference between the two wrists
pub fn wrist_drift(arms: &ArmKeypoints) -> f64 {
    vertical_distance(&arms.left_wrist, &arms.right_wrist)
}
