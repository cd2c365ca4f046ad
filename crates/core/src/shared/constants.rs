pub const MODEL_NAME: &str = "mbv2_retinaface.onnx";

/// Square input resolution the reference model was trained on.
pub const INPUT_WIDTH: u32 = 640;
pub const INPUT_HEIGHT: u32 = 640;

/// Feature-map strides, finest first. Anchors are emitted in this order.
pub const ANCHOR_STRIDES: [u32; 3] = [16, 32, 64];

/// Anchor edge lengths in pixels per stride, two per grid cell.
pub const ANCHOR_SIZES: [[u32; 2]; 3] = [[16, 32], [64, 128], [256, 512]];

/// Minimum face-channel confidence for an anchor to be ranked.
pub const CONFIDENCE_FLOOR: f64 = 0.2;

/// Regression variances applied to center offsets and log-size deltas.
pub const CENTER_VARIANCE: f64 = 0.1;
pub const SIZE_VARIANCE: f64 = 0.2;

/// Per-channel RGB normalization used when the model was exported.
pub const NORM_MEAN: [f32; 3] = [116.0, 117.0, 111.0];
pub const NORM_STD: [f32; 3] = [1.0, 1.0, 1.0];

pub const DEFAULT_NMS_IOU_THRESHOLD: f64 = 0.3;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
