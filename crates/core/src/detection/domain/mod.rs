pub mod anchor_grid;
pub mod decoder;
pub mod detector_config;
pub mod face_detector;
pub mod raw_detection_output;
