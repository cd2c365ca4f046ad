use crate::detection::domain::decoder::DecodeError;

/// Flat network outputs for one frame, aligned positionally to the anchor grid.
///
/// - `box_deltas`: `[dx, dy, dw, dh]` per anchor
/// - `class_scores`: `[background, face]` per anchor
/// - `landmarks`: carried through, not interpreted
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawDetectionOutput {
    pub box_deltas: Vec<f32>,
    pub class_scores: Vec<f32>,
    pub landmarks: Vec<f32>,
}

impl RawDetectionOutput {
    pub const BOX_STRIDE: usize = 4;
    pub const CLASS_STRIDE: usize = 2;

    pub fn new(box_deltas: Vec<f32>, class_scores: Vec<f32>, landmarks: Vec<f32>) -> Self {
        Self {
            box_deltas,
            class_scores,
            landmarks,
        }
    }

    pub fn check_shape(&self, anchor_count: usize) -> Result<(), DecodeError> {
        let expected_deltas = anchor_count * Self::BOX_STRIDE;
        let expected_scores = anchor_count * Self::CLASS_STRIDE;
        if self.box_deltas.len() != expected_deltas || self.class_scores.len() != expected_scores {
            return Err(DecodeError::ShapeMismatch {
                anchors: anchor_count,
                box_deltas: self.box_deltas.len(),
                class_scores: self.class_scores.len(),
            });
        }
        Ok(())
    }

    /// Face-channel confidence for anchor `index`.
    pub fn face_score(&self, index: usize) -> f32 {
        self.class_scores[index * Self::CLASS_STRIDE + 1]
    }

    pub fn delta(&self, index: usize) -> [f32; 4] {
        let o = index * Self::BOX_STRIDE;
        [
            self.box_deltas[o],
            self.box_deltas[o + 1],
            self.box_deltas[o + 2],
            self.box_deltas[o + 3],
        ]
    }
}
