use std::path::PathBuf;

use thiserror::Error;

use crate::shared::frame::{Frame, FrameError};

#[derive(Error, Debug)]
pub enum FrameSourceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("invalid frame from {path}: {source}")]
    Frame {
        path: PathBuf,
        #[source]
        source: FrameError,
    },
}

/// Supplies RGB frames in capture order.
///
/// Implementations own decoding and any format conversion; detection only
/// sees [`Frame`]s.
pub trait FrameSource: Send {
    /// Next frame, or `None` when the source is exhausted.
    fn next_frame(&mut self) -> Option<Result<Frame, FrameSourceError>>;

    /// Total frame count if known up front.
    fn len_hint(&self) -> Option<usize> {
        None
    }
}
