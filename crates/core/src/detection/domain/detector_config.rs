use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::constants::{
    CENTER_VARIANCE, CONFIDENCE_FLOOR, DEFAULT_NMS_IOU_THRESHOLD, INPUT_HEIGHT, INPUT_WIDTH,
    NORM_MEAN, NORM_STD, SIZE_VARIANCE,
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("input resolution must be non-zero, got {width}x{height}")]
    ZeroResolution { width: u32, height: u32 },
    #[error("confidence_floor must be within 0.0-1.0, got {0}")]
    ConfidenceFloor(f64),
    #[error("norm_std must be positive, got {0:?}")]
    NormStd([f32; 3]),
    #[error("max_faces must be >= 1")]
    MaxFaces,
    #[error("nms_iou_threshold must be within 0.0-1.0, got {0}")]
    NmsIouThreshold(f64),
    #[error(
        "anchor grid is {grid_width}x{grid_height} but the configured input is \
         {input_width}x{input_height}"
    )]
    GridMismatch {
        grid_width: u32,
        grid_height: u32,
        input_width: u32,
        input_height: u32,
    },
}

/// What to report when no anchor clears the confidence floor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoCandidatePolicy {
    /// Zero box, but the score is still the frame's maximum face confidence.
    #[default]
    ReportMaxScore,
    /// Zero box and a zero score.
    ZeroScore,
}

/// Tunables for preprocessing and decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub input_width: u32,
    pub input_height: u32,
    pub confidence_floor: f64,
    pub center_variance: f64,
    pub size_variance: f64,
    pub norm_mean: [f32; 3],
    pub norm_std: [f32; 3],
    pub no_candidate: NoCandidatePolicy,
    /// Upper bound for multi-face decoding. Single-face decoding ignores it.
    pub max_faces: usize,
    pub nms_iou_threshold: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            input_width: INPUT_WIDTH,
            input_height: INPUT_HEIGHT,
            confidence_floor: CONFIDENCE_FLOOR,
            center_variance: CENTER_VARIANCE,
            size_variance: SIZE_VARIANCE,
            norm_mean: NORM_MEAN,
            norm_std: NORM_STD,
            no_candidate: NoCandidatePolicy::default(),
            max_faces: 1,
            nms_iou_threshold: DEFAULT_NMS_IOU_THRESHOLD,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.input_width == 0 || self.input_height == 0 {
            return Err(ConfigError::ZeroResolution {
                width: self.input_width,
                height: self.input_height,
            });
        }
        if !(0.0..=1.0).contains(&self.confidence_floor) {
            return Err(ConfigError::ConfidenceFloor(self.confidence_floor));
        }
        if self.norm_std.iter().any(|&s| s <= 0.0) {
            return Err(ConfigError::NormStd(self.norm_std));
        }
        if self.max_faces == 0 {
            return Err(ConfigError::MaxFaces);
        }
        if !(0.0..=1.0).contains(&self.nms_iou_threshold) {
            return Err(ConfigError::NmsIouThreshold(self.nms_iou_threshold));
        }
        Ok(())
    }
}
