//! Box types for the two coordinate conventions used during decoding.
//!
//! Anchors and regressed boxes live in normalized center/size form; the
//! final detection is expressed as integer pixel corners.

use serde::{Deserialize, Serialize};

/// Normalized box given by its center and extent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CenterSizeBox {
    pub cx: f64,
    pub cy: f64,
    pub width: f64,
    pub height: f64,
}

impl CenterSizeBox {
    pub fn new(cx: f64, cy: f64, width: f64, height: f64) -> Self {
        Self {
            cx,
            cy,
            width,
            height,
        }
    }

    /// Converts to corner form.
    ///
    /// The far corner is derived from the already-shifted near corner
    /// (`x2 = x1 + width`), not from the center. Pixel outputs depend on
    /// this rounding order.
    pub fn to_corners(&self) -> CornerBox {
        let x1 = self.cx - self.width / 2.0;
        let y1 = self.cy - self.height / 2.0;
        CornerBox {
            x1,
            y1,
            x2: self.width + x1,
            y2: self.height + y1,
        }
    }
}

/// Normalized box given by its top-left and bottom-right corners.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CornerBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl CornerBox {
    /// Scales to a `width × height` pixel canvas, rounding half-up.
    pub fn to_pixels(&self, width: u32, height: u32) -> PixelBox {
        let w = f64::from(width);
        let h = f64::from(height);
        PixelBox {
            x1: round_half_up(self.x1 * w),
            y1: round_half_up(self.y1 * h),
            x2: round_half_up(self.x2 * w),
            y2: round_half_up(self.y2 * h),
        }
    }
}

/// Integer pixel box: `(x1, y1)` top-left, `(x2, y2)` bottom-right.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl PixelBox {
    pub const ZERO: PixelBox = PixelBox {
        x1: 0,
        y1: 0,
        x2: 0,
        y2: 0,
    };

    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Widened to `i64`: a saturated box spans the full `i32` range.
    pub fn width(&self) -> i64 {
        i64::from(self.x2) - i64::from(self.x1)
    }

    pub fn height(&self) -> i64 {
        i64::from(self.y2) - i64::from(self.y1)
    }

    /// True for the all-zero box reported when nothing was selected.
    pub fn is_empty(&self) -> bool {
        *self == Self::ZERO
    }

    /// Intersection over union in `[0, 1]`.
    ///
    /// Boxes that only touch, or do not meet at all, score exactly 0.
    pub fn iou(&self, other: &PixelBox) -> f64 {
        let left = self.x1.max(other.x1);
        let right = self.x2.min(other.x2);
        let top = self.y1.max(other.y1);
        let bottom = self.y2.min(other.y2);

        if left >= right || bottom <= top {
            return 0.0;
        }

        // Areas in f64: two full-range extents multiply past i64::MAX.
        let area_a = self.width() as f64 * self.height() as f64;
        let area_b = other.width() as f64 * other.height() as f64;
        let inter = (i64::from(bottom) - i64::from(top)) as f64
            * (i64::from(right) - i64::from(left)) as f64;
        inter / (area_a + area_b - inter)
    }
}

/// Rounds to the nearest integer with ties toward positive infinity.
///
/// `f64::round` sends negative ties away from zero, which would move boxes
/// hanging off the left or top edge by one pixel.
fn round_half_up(v: f64) -> i32 {
    let floor = v.floor();
    if v - floor >= 0.5 {
        (floor as i32).saturating_add(1)
    } else {
        floor as i32
    }
}
