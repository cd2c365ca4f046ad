use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::frame::Frame;
use crate::video::domain::frame_source::{FrameSource, FrameSourceError};

/// Reads still images as a frame sequence using the `image` crate.
///
/// Directories expand to their image files in name order. Frames are
/// numbered in the order they are read.
pub struct ImageSequenceReader {
    paths: VecDeque<PathBuf>,
    total: usize,
    next_index: usize,
}

impl ImageSequenceReader {
    pub fn from_paths(inputs: &[PathBuf]) -> Result<Self, FrameSourceError> {
        let mut paths = VecDeque::new();
        for input in inputs {
            if input.is_dir() {
                let mut entries = list_images(input)?;
                entries.sort();
                paths.extend(entries);
            } else {
                paths.push_back(input.clone());
            }
        }
        let total = paths.len();
        log::debug!("Image sequence with {total} frames");
        Ok(Self {
            paths,
            total,
            next_index: 0,
        })
    }

    fn read(&self, path: &Path) -> Result<Frame, FrameSourceError> {
        let img = image::open(path)
            .map_err(|e| FrameSourceError::Decode {
                path: path.to_path_buf(),
                source: e,
            })?
            .to_rgb8();
        Frame::from_rgb_image(img, self.next_index).map_err(|e| FrameSourceError::Frame {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

impl FrameSource for ImageSequenceReader {
    fn next_frame(&mut self) -> Option<Result<Frame, FrameSourceError>> {
        let path = self.paths.pop_front()?;
        let frame = self.read(&path);
        self.next_index += 1;
        Some(frame)
    }

    fn len_hint(&self) -> Option<usize> {
        Some(self.total)
    }
}

pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
}

fn list_images(dir: &Path) -> Result<Vec<PathBuf>, FrameSourceError> {
    let io_err = |e| FrameSourceError::Io {
        path: dir.to_path_buf(),
        source: e,
    };
    let mut images = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file() && is_image(&path) {
            images.push(path);
        }
    }
    Ok(images)
}
