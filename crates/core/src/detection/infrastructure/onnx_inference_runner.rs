//! Anchor-based face model executed with ONNX Runtime via `ort`.
//!
//! The exported graph returns three tensors in order: box regression
//! deltas `[1, N, 4]`, class scores `[1, N, 2]`, and landmarks `[1, N, d]`.
use std::path::Path;

use ndarray::Array4;

use crate::detection::domain::face_detector::{DetectionError, InferenceRunner};
use crate::detection::domain::raw_detection_output::RawDetectionOutput;

use ort::execution_providers::ExecutionProviderDispatch;

pub struct OnnxInferenceRunner {
    session: ort::session::Session,
}

impl OnnxInferenceRunner {
    pub fn new(model_path: &Path) -> Result<Self, DetectionError> {
        let session = ort::session::Session::builder()
            .map_err(inference_error)?
            .with_execution_providers(accelerators())
            .map_err(inference_error)?
            .commit_from_file(model_path)
            .map_err(inference_error)?;
        log::info!("Loaded face model {}", model_path.display());
        Ok(Self { session })
    }
}

impl InferenceRunner for OnnxInferenceRunner {
    fn run(&mut self, input: Array4<f32>) -> Result<RawDetectionOutput, DetectionError> {
        let input_value = ort::value::Tensor::from_array(input).map_err(inference_error)?;
        let outputs = self
            .session
            .run(ort::inputs![input_value])
            .map_err(inference_error)?;

        if outputs.len() < 2 {
            return Err(DetectionError::Inference(format!(
                "face model expected at least 2 outputs, got {}",
                outputs.len()
            )));
        }

        let flatten = |i: usize| -> Result<Vec<f32>, DetectionError> {
            let array = outputs[i]
                .try_extract_array::<f32>()
                .map_err(inference_error)?;
            Ok(array.iter().copied().collect())
        };

        let box_deltas = flatten(0)?;
        let class_scores = flatten(1)?;
        let landmarks = if outputs.len() > 2 {
            flatten(2)?
        } else {
            Vec::new()
        };

        Ok(RawDetectionOutput::new(box_deltas, class_scores, landmarks))
    }
}

/// Platform accelerator for the face model. An empty list runs on CPU,
/// which is also where ONNX Runtime falls back if registration fails.
fn accelerators() -> Vec<ExecutionProviderDispatch> {
    let mut providers = Vec::new();
    #[cfg(target_os = "macos")]
    providers.push(ort::execution_providers::CoreMLExecutionProvider::default().build());
    #[cfg(target_os = "windows")]
    providers.push(ort::execution_providers::DirectMLExecutionProvider::default().build());
    if providers.is_empty() {
        log::debug!("No accelerated execution provider for this platform, using CPU");
    }
    providers
}

fn inference_error(e: impl std::fmt::Display) -> DetectionError {
    DetectionError::Inference(e.to_string())
}
