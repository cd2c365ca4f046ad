use ndarray::ArrayView3;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame dimensions are zero ({width}x{height})")]
    ZeroDimensions { width: u32, height: u32 },
    #[error("expected {expected} RGB bytes for {width}x{height}, got {actual}")]
    DataLength {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

/// One RGB frame in row-major order, tagged with its position in the
/// source sequence.
#[derive(Clone, Debug)]
pub struct Frame {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
    index: usize,
}

impl Frame {
    pub const CHANNELS: usize = 3;

    pub fn new(pixels: Vec<u8>, width: u32, height: u32, index: usize) -> Result<Self, FrameError> {
        if width == 0 || height == 0 {
            return Err(FrameError::ZeroDimensions { width, height });
        }
        let expected = width as usize * height as usize * Self::CHANNELS;
        if pixels.len() != expected {
            return Err(FrameError::DataLength {
                width,
                height,
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            pixels,
            width,
            height,
            index,
        })
    }

    pub fn from_rgb_image(image: image::RgbImage, index: usize) -> Result<Self, FrameError> {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, index)
    }

    pub fn to_rgb_image(&self) -> image::RgbImage {
        image::RgbImage::from_raw(self.width, self.height, self.pixels.clone())
            .expect("frame length is validated at construction")
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// `[height, width, channel]` view over the pixel bytes.
    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(
            (self.height as usize, self.width as usize, Self::CHANNELS),
            &self.pixels,
        )
        .expect("frame length is validated at construction")
    }
}
