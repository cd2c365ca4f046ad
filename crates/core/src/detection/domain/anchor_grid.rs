//! Multi-scale anchor grid the detector's regression output is aligned to.
//!
//! Anchors are laid out stride by stride (16, 32, 64), row-major within each
//! feature map, two sizes per cell. Output channel `i` of the network refers
//! to anchor `i`, so this order is part of the model contract.

use std::sync::{Arc, OnceLock};

use thiserror::Error;

use crate::shared::constants::{ANCHOR_SIZES, ANCHOR_STRIDES, INPUT_HEIGHT, INPUT_WIDTH};
use crate::shared::geometry::CenterSizeBox;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnchorGridError {
    #[error("input resolution {width}x{height} produces no feature-map cells")]
    Degenerate { width: u32, height: u32 },
}

/// Ordered anchors for one input resolution. Immutable after construction.
#[derive(Clone, Debug, PartialEq)]
pub struct AnchorGrid {
    anchors: Vec<CenterSizeBox>,
    input_width: u32,
    input_height: u32,
}

impl AnchorGrid {
    pub fn generate(input_width: u32, input_height: u32) -> Result<Self, AnchorGridError> {
        let total = Self::expected_len(input_width, input_height);
        if total == 0 {
            return Err(AnchorGridError::Degenerate {
                width: input_width,
                height: input_height,
            });
        }

        let imw = f64::from(input_width);
        let imh = f64::from(input_height);
        let mut anchors = Vec::with_capacity(total);

        for (&stride, sizes) in ANCHOR_STRIDES.iter().zip(ANCHOR_SIZES.iter()) {
            let (fw, fh) = feature_map_size(input_width, input_height, stride);
            let s = f64::from(stride);
            for k in 0..fh {
                for j in 0..fw {
                    let cx = single((j as f64 + 0.5) * s / imw);
                    let cy = single((k as f64 + 0.5) * s / imh);
                    for &size in sizes {
                        let size = f64::from(size);
                        anchors.push(CenterSizeBox::new(
                            cx,
                            cy,
                            single(size / imw),
                            single(size / imh),
                        ));
                    }
                }
            }
        }

        debug_assert_eq!(anchors.len(), total);
        log::debug!(
            "Generated {} anchors for {input_width}x{input_height}",
            anchors.len()
        );

        Ok(Self {
            anchors,
            input_width,
            input_height,
        })
    }

    /// Process-wide grid for the reference 640×640 input, built on first use.
    pub fn reference() -> Arc<AnchorGrid> {
        static REFERENCE: OnceLock<Arc<AnchorGrid>> = OnceLock::new();
        REFERENCE
            .get_or_init(|| {
                Arc::new(
                    AnchorGrid::generate(INPUT_WIDTH, INPUT_HEIGHT)
                        .expect("reference resolution is non-degenerate"),
                )
            })
            .clone()
    }

    /// Number of anchors `generate` emits for this resolution.
    pub fn expected_len(input_width: u32, input_height: u32) -> usize {
        ANCHOR_STRIDES
            .iter()
            .zip(ANCHOR_SIZES.iter())
            .map(|(&stride, sizes)| {
                let (fw, fh) = feature_map_size(input_width, input_height, stride);
                fw * fh * sizes.len()
            })
            .sum()
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&CenterSizeBox> {
        self.anchors.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CenterSizeBox> {
        self.anchors.iter()
    }

    pub fn as_slice(&self) -> &[CenterSizeBox] {
        &self.anchors
    }

    pub fn input_width(&self) -> u32 {
        self.input_width
    }

    pub fn input_height(&self) -> u32 {
        self.input_height
    }
}

/// `(ceil(w / stride), ceil(h / stride))`, dividing as reals.
fn feature_map_size(width: u32, height: u32, stride: u32) -> (usize, usize) {
    let s = f64::from(stride);
    let fw = (f64::from(width) / s).ceil() as usize;
    let fh = (f64::from(height) / s).ceil() as usize;
    (fw, fh)
}

/// Anchors are stored at single precision, as the model was trained with.
fn single(v: f64) -> f64 {
    f64::from(v as f32)
}
