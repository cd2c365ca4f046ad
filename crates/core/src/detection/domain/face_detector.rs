use ndarray::Array4;
use thiserror::Error;

use crate::detection::domain::anchor_grid::AnchorGridError;
use crate::detection::domain::decoder::DecodeError;
use crate::detection::domain::detector_config::ConfigError;
use crate::detection::domain::raw_detection_output::RawDetectionOutput;
use crate::shared::frame::Frame;
use crate::shared::prediction::Prediction;

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    AnchorGrid(#[from] AnchorGridError),
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("frame is {actual_width}x{actual_height}, detector expects {expected_width}x{expected_height}")]
    FrameSize {
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },
    #[error("invalid detector configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Runs the network on one `(1, 3, H, W)` tensor.
///
/// Implementations are synchronous and opaque; the caller times them.
pub trait InferenceRunner: Send {
    fn run(&mut self, input: Array4<f32>) -> Result<RawDetectionOutput, DetectionError>;
}

/// Produces one prediction per frame.
///
/// `&mut self` because inference sessions need exclusive access.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Prediction, DetectionError>;
}
