use serde::Serialize;

use crate::shared::geometry::PixelBox;

/// Per-frame detection result handed to the presentation layer.
///
/// `score` is the highest face confidence seen in the frame. `bounds` is the
/// selected face in input-resolution pixels, or [`PixelBox::ZERO`] when no
/// anchor cleared the confidence floor.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Prediction {
    pub score: f32,
    pub elapsed_ms: u64,
    pub bounds: PixelBox,
}

impl Prediction {
    pub fn new(score: f32, elapsed_ms: u64, bounds: PixelBox) -> Self {
        Self {
            score,
            elapsed_ms,
            bounds,
        }
    }

    pub fn has_face(&self) -> bool {
        !self.bounds.is_empty()
    }

    /// Inference throughput implied by `elapsed_ms`. A zero duration reads
    /// as 1000 fps.
    pub fn fps(&self) -> f32 {
        if self.elapsed_ms > 0 {
            1000.0 / self.elapsed_ms as f32
        } else {
            1000.0
        }
    }

    /// One-line summary: `"0.912, 23.8 fps, 42 ms"`.
    pub fn status_line(&self) -> String {
        format!(
            "{:.3}, {:.1} fps, {} ms",
            self.score,
            self.fps(),
            self.elapsed_ms
        )
    }
}

/// One face from multi-face decoding.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct FaceDetection {
    pub score: f32,
    pub anchor_index: usize,
    pub bounds: PixelBox,
}
