pub mod latest_frame_analyzer;
