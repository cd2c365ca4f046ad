//! Anchor-grid face detection: turns a single-shot detector's raw output
//! into the best-scoring face rectangle of each frame.

pub mod detection;
pub mod pipeline;
pub mod shared;
pub mod video;
