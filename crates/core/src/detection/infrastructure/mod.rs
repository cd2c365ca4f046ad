pub mod anchor_face_detector;
pub mod onnx_inference_runner;
pub mod preprocess;
