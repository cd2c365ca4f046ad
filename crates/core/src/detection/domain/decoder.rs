//! Turns raw per-anchor network output into a face box.
//!
//! Selection is top-1: candidates above the confidence floor are ranked by
//! face confidence (stable, earliest anchor wins ties) and only the winner is
//! decoded. `decode_faces` adds greedy IoU suppression for callers that want
//! more than one face; `decode` never suppresses.

use std::cmp::Ordering;
use std::sync::Arc;

use thiserror::Error;

use crate::detection::domain::anchor_grid::AnchorGrid;
use crate::detection::domain::detector_config::{ConfigError, DetectorConfig, NoCandidatePolicy};
use crate::detection::domain::raw_detection_output::RawDetectionOutput;
use crate::shared::geometry::{CenterSizeBox, PixelBox};
use crate::shared::prediction::{FaceDetection, Prediction};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error(
        "model output does not match anchor grid of {anchors}: \
         got {box_deltas} box deltas and {class_scores} class scores"
    )]
    ShapeMismatch {
        anchors: usize,
        box_deltas: usize,
        class_scores: usize,
    },
}

/// An anchor that cleared the confidence floor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Candidate {
    pub index: usize,
    pub score: f32,
}

pub struct Decoder {
    anchors: Arc<AnchorGrid>,
    config: DetectorConfig,
}

impl Decoder {
    /// Fails when the grid was generated for a different input size than
    /// `config` describes, since boxes are scaled to the grid's resolution.
    pub fn new(anchors: Arc<AnchorGrid>, config: DetectorConfig) -> Result<Self, ConfigError> {
        let grid = (anchors.input_width(), anchors.input_height());
        if grid != (config.input_width, config.input_height) {
            return Err(ConfigError::GridMismatch {
                grid_width: grid.0,
                grid_height: grid.1,
                input_width: config.input_width,
                input_height: config.input_height,
            });
        }
        Ok(Self { anchors, config })
    }

    pub fn anchors(&self) -> &AnchorGrid {
        &self.anchors
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Decodes the single best face of a frame.
    ///
    /// `score` is the frame's maximum face confidence whether or not any
    /// anchor cleared the floor; with no candidate the box is all zeros.
    pub fn decode(
        &self,
        raw: &RawDetectionOutput,
        elapsed_ms: u64,
    ) -> Result<Prediction, DecodeError> {
        let (candidates, max_score) = self.scan(raw)?;

        let Some(best) = candidates.first() else {
            log::debug!("No anchor above floor {}", self.config.confidence_floor);
            let score = match self.config.no_candidate {
                NoCandidatePolicy::ReportMaxScore => max_score,
                NoCandidatePolicy::ZeroScore => 0.0,
            };
            return Ok(Prediction::new(score, elapsed_ms, PixelBox::ZERO));
        };

        let bounds = self.decode_box(raw, best.index);
        log::debug!(
            "Selected anchor {} of {} candidates (score {:.3}) → {:?}",
            best.index,
            candidates.len(),
            best.score,
            bounds
        );
        Ok(Prediction::new(max_score, elapsed_ms, bounds))
    }

    /// Decodes up to `config.max_faces` faces, suppressing any candidate whose
    /// IoU with an already kept face exceeds `config.nms_iou_threshold`.
    pub fn decode_faces(&self, raw: &RawDetectionOutput) -> Result<Vec<FaceDetection>, DecodeError> {
        let (candidates, _) = self.scan(raw)?;

        let mut kept: Vec<FaceDetection> = Vec::with_capacity(self.config.max_faces);
        for c in &candidates {
            if kept.len() == self.config.max_faces {
                break;
            }
            let bounds = self.decode_box(raw, c.index);
            let suppressed = kept
                .iter()
                .any(|k| k.bounds.iou(&bounds) > self.config.nms_iou_threshold);
            if !suppressed {
                kept.push(FaceDetection {
                    score: c.score,
                    anchor_index: c.index,
                    bounds,
                });
            }
        }
        Ok(kept)
    }

    /// Candidates above the floor, best first. Ties keep anchor order.
    pub fn ranked_candidates(&self, raw: &RawDetectionOutput) -> Result<Vec<Candidate>, DecodeError> {
        self.scan(raw).map(|(candidates, _)| candidates)
    }

    /// One pass over the face channel: collects candidates above the floor and
    /// the unfiltered maximum, then ranks the candidates.
    fn scan(&self, raw: &RawDetectionOutput) -> Result<(Vec<Candidate>, f32), DecodeError> {
        let n = self.anchors.len();
        raw.check_shape(n)?;

        let mut candidates = Vec::new();
        let mut max_score = 0.0f32;
        for index in 0..n {
            let score = raw.face_score(index);
            // Floor is compared at double precision: a score of exactly 0.2f32
            // widens to just above 0.2 and is kept.
            if f64::from(score) > self.config.confidence_floor {
                candidates.push(Candidate { index, score });
            }
            if score > max_score {
                max_score = score;
            }
        }

        candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        Ok((candidates, max_score))
    }

    fn decode_box(&self, raw: &RawDetectionOutput, index: usize) -> PixelBox {
        let anchor = &self.anchors.as_slice()[index];
        apply_delta(
            anchor,
            raw.delta(index),
            self.config.center_variance,
            self.config.size_variance,
        )
        .to_corners()
        .to_pixels(self.anchors.input_width(), self.anchors.input_height())
    }
}

/// Shifts an anchor by a regression delta `[dx, dy, dw, dh]`.
///
/// Center offsets are linear in anchor size; size deltas are log-space.
pub fn apply_delta(
    anchor: &CenterSizeBox,
    delta: [f32; 4],
    center_variance: f64,
    size_variance: f64,
) -> CenterSizeBox {
    let [dx, dy, dw, dh] = delta.map(f64::from);
    CenterSizeBox::new(
        anchor.cx + dx * center_variance * anchor.width,
        anchor.cy + dy * center_variance * anchor.height,
        anchor.width * (dw * size_variance).exp(),
        anchor.height * (dh * size_variance).exp(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn reference_decoder() -> Decoder {
        Decoder::new(AnchorGrid::reference(), DetectorConfig::default()).unwrap()
    }

    fn decoder_with(config: DetectorConfig) -> Decoder {
        let grid = AnchorGrid::generate(config.input_width, config.input_height).unwrap();
        Decoder::new(Arc::new(grid), config).unwrap()
    }

    /// All-zero output for `n` anchors with the given face scores set.
    fn raw_with_scores(n: usize, scores: &[(usize, f32)]) -> RawDetectionOutput {
        let mut class_scores = vec![0.0f32; n * 2];
        for &(i, s) in scores {
            class_scores[2 * i + 1] = s;
            class_scores[2 * i] = 1.0 - s;
        }
        RawDetectionOutput::new(vec![0.0; n * 4], class_scores, vec![0.0; n * 10])
    }

    fn set_delta(raw: &mut RawDetectionOutput, index: usize, delta: [f32; 4]) {
        raw.box_deltas[index * 4..index * 4 + 4].copy_from_slice(&delta);
    }

    // ── Box regression ───────────────────────────────────────────────

    #[test]
    fn test_zero_delta_is_identity() {
        let anchor = CenterSizeBox::new(0.5, 0.5, 0.1, 0.1);
        let decoded = apply_delta(&anchor, [0.0; 4], 0.1, 0.2);
        assert_eq!(decoded, anchor);

        let corners = decoded.to_corners();
        assert_relative_eq!(corners.x1, 0.45);
        assert_relative_eq!(corners.x2, 0.55);
    }

    #[test]
    fn test_delta_shifts_center_by_scaled_anchor_size() {
        let anchor = CenterSizeBox::new(0.5, 0.5, 0.2, 0.4);
        let decoded = apply_delta(&anchor, [1.0, -2.0, 0.0, 0.0], 0.1, 0.2);
        assert_relative_eq!(decoded.cx, 0.5 + 0.1 * 0.2);
        assert_relative_eq!(decoded.cy, 0.5 - 2.0 * 0.1 * 0.4);
    }

    #[test]
    fn test_delta_scales_size_exponentially() {
        let anchor = CenterSizeBox::new(0.5, 0.5, 0.2, 0.4);
        let decoded = apply_delta(&anchor, [0.0, 0.0, 5.0, -5.0], 0.1, 0.2);
        assert_relative_eq!(decoded.width, 0.2 * 1f64.exp());
        assert_relative_eq!(decoded.height, 0.4 * (-1f64).exp());
    }

    // ── Selection ────────────────────────────────────────────────────

    #[test]
    fn test_single_hit_decodes_its_anchor() {
        let decoder = reference_decoder();
        let n = decoder.anchors().len();
        assert_eq!(n, 4200);

        // Stride 32 block, cell (row 3, col 5), second size (128 px)
        let index = 3200 + (3 * 20 + 5) * 2 + 1;
        let raw = raw_with_scores(n, &[(index, 0.9)]);
        let p = decoder.decode(&raw, 17).unwrap();

        assert_relative_eq!(p.score, 0.9);
        assert_eq!(p.elapsed_ms, 17);
        // center (5.5*32, 3.5*32) = (176, 112), half-size 64
        assert_eq!(p.bounds, PixelBox::new(112, 48, 240, 176));
    }

    #[test]
    fn test_applies_winning_delta() {
        let decoder = reference_decoder();
        let n = decoder.anchors().len();
        let index = 4000; // stride 64, cell (0, 0), 256 px, center (32, 32)
        let mut raw = raw_with_scores(n, &[(index, 0.8)]);
        set_delta(&mut raw, index, [1.0, 0.5, 0.0, 0.0]);

        let p = decoder.decode(&raw, 0).unwrap();
        // dx = 1 → +0.1*256 = 25.6 px; dy = 0.5 → +12.8 px
        // x1 = 32 + 25.6 - 128 = -70.4, y1 = 32 + 12.8 - 128 = -83.2
        assert_eq!(p.bounds, PixelBox::new(-70, -83, 186, 173));
    }

    #[test]
    fn test_highest_candidate_wins() {
        let decoder = reference_decoder();
        let n = decoder.anchors().len();
        let raw = raw_with_scores(n, &[(10, 0.4), (500, 0.95), (4100, 0.6)]);
        let candidates = decoder.ranked_candidates(&raw).unwrap();
        let order: Vec<usize> = candidates.iter().map(|c| c.index).collect();
        assert_eq!(order, vec![500, 4100, 10]);

        let p = decoder.decode(&raw, 0).unwrap();
        let expected = decoder.decode(&raw_with_scores(n, &[(500, 0.95)]), 0).unwrap();
        assert_eq!(p.bounds, expected.bounds);
        assert_relative_eq!(p.score, 0.95);
    }

    #[test]
    fn test_tie_goes_to_lower_index() {
        let decoder = reference_decoder();
        let n = decoder.anchors().len();
        let raw = raw_with_scores(n, &[(4001, 0.7), (2, 0.7)]);
        let candidates = decoder.ranked_candidates(&raw).unwrap();
        assert_eq!(candidates[0].index, 2);
        assert_eq!(candidates[1].index, 4001);

        let p = decoder.decode(&raw, 0).unwrap();
        let only_low = decoder.decode(&raw_with_scores(n, &[(2, 0.7)]), 0).unwrap();
        assert_eq!(p.bounds, only_low.bounds);
    }

    #[test]
    fn test_below_floor_reports_max_score_with_zero_box() {
        let decoder = reference_decoder();
        let n = decoder.anchors().len();
        let raw = raw_with_scores(n, &[(7, 0.15), (900, 0.19), (3000, 0.05)]);
        let p = decoder.decode(&raw, 3).unwrap();
        assert_relative_eq!(p.score, 0.19);
        assert_eq!(p.bounds, PixelBox::ZERO);
        assert!(!p.has_face());
    }

    #[test]
    fn test_zero_score_policy_clears_score() {
        let config = DetectorConfig {
            no_candidate: NoCandidatePolicy::ZeroScore,
            ..Default::default()
        };
        let decoder = decoder_with(config);
        let n = decoder.anchors().len();
        let p = decoder.decode(&raw_with_scores(n, &[(7, 0.15)]), 3).unwrap();
        assert_eq!(p.score, 0.0);
        assert_eq!(p.bounds, PixelBox::ZERO);
    }

    #[test]
    fn test_max_score_never_below_zero() {
        let decoder = reference_decoder();
        let n = decoder.anchors().len();
        let mut raw = raw_with_scores(n, &[]);
        for i in 0..n {
            raw.class_scores[2 * i + 1] = -1.0;
        }
        let p = decoder.decode(&raw, 0).unwrap();
        assert_eq!(p.score, 0.0);
    }

    #[rstest]
    #[case::exactly_floor_f32(0.2, true)]
    #[case::just_below(0.199_99, false)]
    #[case::above(0.21, true)]
    fn test_floor_compared_at_double_precision(#[case] score: f32, #[case] kept: bool) {
        let decoder = reference_decoder();
        let n = decoder.anchors().len();
        let raw = raw_with_scores(n, &[(42, score)]);
        let candidates = decoder.ranked_candidates(&raw).unwrap();
        assert_eq!(!candidates.is_empty(), kept);
    }

    #[test]
    fn test_shape_mismatch_is_an_error() {
        let decoder = reference_decoder();
        let raw = RawDetectionOutput::new(vec![0.0; 16], vec![0.0; 8], Vec::new());
        assert_eq!(
            decoder.decode(&raw, 0),
            Err(DecodeError::ShapeMismatch {
                anchors: 4200,
                box_deltas: 16,
                class_scores: 8
            })
        );
    }

    #[test]
    fn test_pixel_scale_follows_grid_resolution() {
        let decoder = decoder_with(DetectorConfig {
            input_width: 320,
            input_height: 256,
            ..Default::default()
        });
        let n = decoder.anchors().len();
        // First anchor: center (8, 8) px, 16 px square
        let p = decoder.decode(&raw_with_scores(n, &[(0, 0.5)]), 0).unwrap();
        assert_eq!(p.bounds, PixelBox::new(0, 0, 16, 16));
    }

    #[test]
    fn test_decode_is_deterministic() {
        let decoder = reference_decoder();
        let n = decoder.anchors().len();
        let mut raw = raw_with_scores(n, &[(1234, 0.66), (77, 0.5)]);
        set_delta(&mut raw, 1234, [0.3, -0.7, 0.9, -0.4]);
        assert_eq!(decoder.decode(&raw, 5), decoder.decode(&raw, 5));
    }

    // ── Multi-face ───────────────────────────────────────────────────

    #[test]
    fn test_decode_faces_single_matches_decode() {
        let decoder = reference_decoder();
        let n = decoder.anchors().len();
        let raw = raw_with_scores(n, &[(300, 0.5), (3900, 0.8)]);
        let faces = decoder.decode_faces(&raw).unwrap();
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].anchor_index, 3900);
        assert_eq!(faces[0].bounds, decoder.decode(&raw, 0).unwrap().bounds);
    }

    #[test]
    fn test_decode_faces_suppresses_overlap() {
        let decoder = decoder_with(DetectorConfig {
            max_faces: 5,
            ..Default::default()
        });
        let n = decoder.anchors().len();
        // Anchors 0 and 2 are neighbouring 16 px cells (no overlap);
        // anchor 1 is the 32 px anchor sharing anchor 0's center.
        let raw = raw_with_scores(n, &[(0, 0.9), (1, 0.8), (200, 0.7)]);
        let faces = decoder.decode_faces(&raw).unwrap();
        let indices: Vec<usize> = faces.iter().map(|f| f.anchor_index).collect();
        // 16 px box inside 32 px box: IoU 0.25, below 0.3, so both survive
        assert_eq!(indices, vec![0, 1, 200]);

        let strict = decoder_with(DetectorConfig {
            max_faces: 5,
            nms_iou_threshold: 0.2,
            ..Default::default()
        });
        let faces = strict.decode_faces(&raw).unwrap();
        let indices: Vec<usize> = faces.iter().map(|f| f.anchor_index).collect();
        assert_eq!(indices, vec![0, 200]);
    }

    #[test]
    fn test_decode_faces_respects_limit() {
        let decoder = decoder_with(DetectorConfig {
            max_faces: 2,
            ..Default::default()
        });
        let n = decoder.anchors().len();
        let raw = raw_with_scores(n, &[(0, 0.9), (400, 0.8), (800, 0.7)]);
        assert_eq!(decoder.decode_faces(&raw).unwrap().len(), 2);
    }

    #[test]
    fn test_decode_faces_survives_saturated_box() {
        let decoder = decoder_with(DetectorConfig {
            max_faces: 5,
            ..Default::default()
        });
        let n = decoder.anchors().len();
        // 4000 is the 256 px anchor of the first stride-64 cell, 4001 its 512 px twin
        let mut raw = raw_with_scores(n, &[(4000, 0.9), (4001, 0.8)]);
        set_delta(&mut raw, 4000, [0.0, 0.0, 500.0, 500.0]);

        let full = PixelBox::new(i32::MIN, i32::MIN, i32::MAX, i32::MAX);
        assert_eq!(decoder.decode(&raw, 0).unwrap().bounds, full);

        let faces = decoder.decode_faces(&raw).unwrap();
        let indices: Vec<usize> = faces.iter().map(|f| f.anchor_index).collect();
        assert_eq!(indices, vec![4000, 4001]);
        assert_eq!(faces[0].bounds, full);
        assert_eq!(faces[1].bounds, PixelBox::new(-224, -224, 288, 288));
    }

    #[test]
    fn test_new_rejects_grid_of_other_resolution() {
        let config = DetectorConfig {
            input_width: 320,
            input_height: 320,
            ..Default::default()
        };
        let result = Decoder::new(AnchorGrid::reference(), config);
        assert_eq!(
            result.err(),
            Some(ConfigError::GridMismatch {
                grid_width: 640,
                grid_height: 640,
                input_width: 320,
                input_height: 320,
            })
        );
    }

    #[test]
    fn test_decode_faces_empty_without_candidates() {
        let decoder = reference_decoder();
        let n = decoder.anchors().len();
        assert!(decoder.decode_faces(&raw_with_scores(n, &[])).unwrap().is_empty());
    }
}
