//! Frame preparation ahead of inference.
//!
//! `FramePreparer` orients and letterboxes camera frames onto the model's
//! fixed canvas; `to_input_tensor` normalizes the result into NCHW floats.

use image::imageops::{self, FilterType};
use ndarray::Array4;

use crate::shared::frame::{Frame, FrameError};

/// Clockwise rotation applied before letterboxing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Rotation {
    #[default]
    None,
    Cw90,
    Cw180,
    Cw270,
}

impl Rotation {
    pub fn from_degrees(degrees: u32) -> Option<Self> {
        match degrees % 360 {
            0 => Some(Rotation::None),
            90 => Some(Rotation::Cw90),
            180 => Some(Rotation::Cw180),
            270 => Some(Rotation::Cw270),
            _ => None,
        }
    }
}

/// Rotates, optionally mirrors, and letterboxes frames to a fixed canvas.
///
/// The longer side is scaled to fit and the image is centered, with black
/// bars filling the remainder.
#[derive(Debug, Clone, Copy, Default)]
pub struct FramePreparer {
    rotation: Rotation,
    mirror: bool,
}

impl FramePreparer {
    pub fn new(rotation: Rotation, mirror: bool) -> Self {
        Self { rotation, mirror }
    }

    pub fn prepare(&self, frame: &Frame, width: u32, height: u32) -> Result<Frame, FrameError> {
        if self.rotation == Rotation::None
            && !self.mirror
            && frame.width() == width
            && frame.height() == height
        {
            return Ok(frame.clone());
        }

        let img = frame.to_rgb_image();
        let img = match self.rotation {
            Rotation::None => img,
            Rotation::Cw90 => imageops::rotate90(&img),
            Rotation::Cw180 => imageops::rotate180(&img),
            Rotation::Cw270 => imageops::rotate270(&img),
        };
        let img = if self.mirror {
            imageops::flip_horizontal(&img)
        } else {
            img
        };

        let (src_w, src_h) = img.dimensions();
        let scale = (f64::from(width) / f64::from(src_w)).min(f64::from(height) / f64::from(src_h));
        let new_w = ((f64::from(src_w) * scale).round() as u32).clamp(1, width);
        let new_h = ((f64::from(src_h) * scale).round() as u32).clamp(1, height);

        let resized = if (new_w, new_h) == (src_w, src_h) {
            img
        } else {
            imageops::resize(&img, new_w, new_h, FilterType::Triangle)
        };

        let mut canvas = image::RgbImage::new(width, height);
        let pad_x = (width - new_w) / 2;
        let pad_y = (height - new_h) / 2;
        imageops::overlay(&mut canvas, &resized, i64::from(pad_x), i64::from(pad_y));

        log::trace!(
            "Prepared frame {} from {src_w}x{src_h}: scale {scale:.3}, pad ({pad_x}, {pad_y})",
            frame.index()
        );
        Frame::from_rgb_image(canvas, frame.index())
    }
}

/// Converts an RGB frame into a `(1, 3, H, W)` tensor, normalizing each
/// channel as `(pixel - mean[c]) / std[c]`.
pub fn to_input_tensor(frame: &Frame, mean: [f32; 3], std: [f32; 3]) -> Array4<f32> {
    let src = frame.as_ndarray();
    let h = frame.height() as usize;
    let w = frame.width() as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, h, w));

    for y in 0..h {
        for x in 0..w {
            for c in 0..3 {
                tensor[[0, c, y, x]] = (f32::from(src[[y, x, c]]) - mean[c]) / std[c];
            }
        }
    }

    tensor
}
