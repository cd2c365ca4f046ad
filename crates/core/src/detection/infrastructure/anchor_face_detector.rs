use std::sync::Arc;
use std::time::Instant;

use crate::detection::domain::anchor_grid::AnchorGrid;
use crate::detection::domain::decoder::Decoder;
use crate::detection::domain::detector_config::DetectorConfig;
use crate::detection::domain::face_detector::{DetectionError, FaceDetector, InferenceRunner};
use crate::detection::domain::raw_detection_output::RawDetectionOutput;
use crate::shared::constants::{INPUT_HEIGHT, INPUT_WIDTH};
use crate::shared::frame::Frame;
use crate::shared::prediction::{FaceDetection, Prediction};

use super::preprocess::to_input_tensor;

/// Single-shot face detector: normalizes the frame, runs the model once,
/// and decodes the output against a fixed anchor grid.
///
/// Frames must already be at the model's input resolution; see
/// [`FramePreparer`](super::preprocess::FramePreparer).
pub struct AnchorFaceDetector<R> {
    runner: R,
    decoder: Decoder,
}

impl<R: InferenceRunner> AnchorFaceDetector<R> {
    /// Builds the anchor grid for `config`'s resolution, sharing the
    /// process-wide grid when it is the reference one.
    pub fn new(runner: R, config: DetectorConfig) -> Result<Self, DetectionError> {
        config.validate()?;
        let anchors = if (config.input_width, config.input_height) == (INPUT_WIDTH, INPUT_HEIGHT) {
            AnchorGrid::reference()
        } else {
            Arc::new(AnchorGrid::generate(config.input_width, config.input_height)?)
        };
        log::info!(
            "Face detector ready: {}x{} input, {} anchors, floor {}",
            config.input_width,
            config.input_height,
            anchors.len(),
            config.confidence_floor
        );
        let decoder = Decoder::new(anchors, config)?;
        Ok(Self { runner, decoder })
    }

    pub fn config(&self) -> &DetectorConfig {
        self.decoder.config()
    }

    /// Detects up to `max_faces` faces with overlap suppression.
    pub fn detect_faces(&mut self, frame: &Frame) -> Result<Vec<FaceDetection>, DetectionError> {
        let (raw, _) = self.infer(frame)?;
        Ok(self.decoder.decode_faces(&raw)?)
    }

    fn infer(&mut self, frame: &Frame) -> Result<(RawDetectionOutput, u64), DetectionError> {
        let config = self.decoder.config();
        if frame.width() != config.input_width || frame.height() != config.input_height {
            return Err(DetectionError::FrameSize {
                expected_width: config.input_width,
                expected_height: config.input_height,
                actual_width: frame.width(),
                actual_height: frame.height(),
            });
        }

        let tensor = to_input_tensor(frame, config.norm_mean, config.norm_std);

        let start = Instant::now();
        let raw = self.runner.run(tensor)?;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        Ok((raw, elapsed_ms))
    }
}

impl<R: InferenceRunner> FaceDetector for AnchorFaceDetector<R> {
    fn detect(&mut self, frame: &Frame) -> Result<Prediction, DetectionError> {
        let (raw, elapsed_ms) = self.infer(frame)?;
        let prediction = self.decoder.decode(&raw, elapsed_ms)?;
        log::debug!(
            "Frame {}: {} in {} ms",
            frame.index(),
            prediction.status_line(),
            elapsed_ms
        );
        Ok(prediction)
    }
}
