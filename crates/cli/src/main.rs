mod settings;

use std::path::PathBuf;
use std::process;

use clap::Parser;
use serde::Serialize;

use facebox_core::detection::domain::face_detector::FaceDetector;
use facebox_core::detection::infrastructure::anchor_face_detector::AnchorFaceDetector;
use facebox_core::detection::infrastructure::onnx_inference_runner::OnnxInferenceRunner;
use facebox_core::detection::infrastructure::preprocess::{FramePreparer, Rotation};
use facebox_core::pipeline::latest_frame_analyzer::{AnalyzedFrame, LatestFrameAnalyzer};
use facebox_core::shared::constants::MODEL_NAME;
use facebox_core::shared::model_resolver;
use facebox_core::shared::prediction::{FaceDetection, Prediction};
use facebox_core::video::domain::frame_source::FrameSource;
use facebox_core::video::infrastructure::image_sequence_reader::ImageSequenceReader;

use settings::Settings;

type Detector = AnchorFaceDetector<OnnxInferenceRunner>;

/// Single-face detection on images and frame sequences.
#[derive(Parser)]
#[command(name = "facebox")]
struct Cli {
    /// Image files or directories of frames (processed in name order).
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// ONNX model file. Resolved from the model cache when omitted.
    #[arg(long)]
    model: Option<PathBuf>,

    /// URL to download the model from when it is not cached.
    #[arg(long)]
    model_url: Option<String>,

    /// Settings JSON file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Face confidence floor (0.0-1.0).
    #[arg(long)]
    confidence: Option<f64>,

    /// Clockwise rotation applied to frames: 0, 90, 180 or 270.
    #[arg(long)]
    rotation: Option<u32>,

    /// Mirror frames horizontally (front-facing camera).
    #[arg(long)]
    mirror: bool,

    /// Report up to N faces per frame with overlap suppression.
    #[arg(long)]
    max_faces: Option<usize>,

    /// Analyze on a worker thread, skipping frames the detector cannot keep up with.
    #[arg(long)]
    drop_stale: bool,

    /// Print one JSON object per frame.
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct FrameReport<'a> {
    frame: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    prediction: Option<&'a Prediction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    faces: Option<&'a [FaceDetection]>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = apply_overrides(Settings::load(cli.config.as_deref())?, &cli);
    settings.detector.validate()?;

    let rotation = Rotation::from_degrees(settings.rotation)
        .ok_or("rotation must be one of 0, 90, 180, 270")?;
    let preparer = FramePreparer::new(rotation, settings.mirror);

    let model_path = match settings.model_path.clone() {
        Some(path) => path,
        None => model_resolver::resolve(
            MODEL_NAME,
            settings.model_url.as_deref(),
            settings.bundled_model_dir.as_deref(),
        )?,
    };
    let runner = OnnxInferenceRunner::new(&model_path)?;
    let detector = AnchorFaceDetector::new(runner, settings.detector.clone())?;
    let source = ImageSequenceReader::from_paths(&cli.inputs)?;

    if cli.drop_stale {
        run_latest_only(source, preparer, detector, cli.json)
    } else {
        run_every_frame(source, preparer, detector, cli.json)
    }
}

fn apply_overrides(mut settings: Settings, cli: &Cli) -> Settings {
    if let Some(confidence) = cli.confidence {
        settings.detector.confidence_floor = confidence;
    }
    if let Some(rotation) = cli.rotation {
        settings.rotation = rotation;
    }
    if cli.mirror {
        settings.mirror = true;
    }
    if let Some(max_faces) = cli.max_faces {
        settings.detector.max_faces = max_faces;
    }
    if cli.model.is_some() {
        settings.model_path = cli.model.clone();
    }
    if cli.model_url.is_some() {
        settings.model_url = cli.model_url.clone();
    }
    settings
}

fn run_every_frame(
    mut source: ImageSequenceReader,
    preparer: FramePreparer,
    mut detector: Detector,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let (width, height) = {
        let c = detector.config();
        (c.input_width, c.input_height)
    };
    let multi = detector.config().max_faces > 1;

    while let Some(next) = source.next_frame() {
        let frame = match next {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("Skipping unreadable frame: {e}");
                continue;
            }
        };
        let prepared = preparer.prepare(&frame, width, height)?;
        if multi {
            let faces = detector.detect_faces(&prepared)?;
            report_faces(frame.index(), &faces, json)?;
        } else {
            let prediction = detector.detect(&prepared)?;
            report_prediction(frame.index(), &prediction, json)?;
        }
    }
    Ok(())
}

fn run_latest_only(
    mut source: ImageSequenceReader,
    preparer: FramePreparer,
    detector: Detector,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let (width, height) = {
        let c = detector.config();
        (c.input_width, c.input_height)
    };
    let analyzer = LatestFrameAnalyzer::spawn(Box::new(detector));

    while let Some(next) = source.next_frame() {
        match next {
            Ok(frame) => analyzer.submit(preparer.prepare(&frame, width, height)?)?,
            Err(e) => log::warn!("Skipping unreadable frame: {e}"),
        }
        for analyzed in analyzer.results().try_iter() {
            report_analyzed(analyzed, json)?;
        }
    }

    let dropped = analyzer.dropped_frames();
    for analyzed in analyzer.finish() {
        report_analyzed(analyzed, json)?;
    }
    log::info!("Dropped {dropped} stale frames");
    Ok(())
}

fn report_analyzed(analyzed: AnalyzedFrame, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    match analyzed.result {
        Ok(prediction) => report_prediction(analyzed.frame_index, &prediction, json),
        Err(e) => {
            log::warn!("Frame {} failed: {e}", analyzed.frame_index);
            Ok(())
        }
    }
}

fn report_prediction(
    frame: usize,
    prediction: &Prediction,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        let report = FrameReport {
            frame,
            prediction: Some(prediction),
            faces: None,
        };
        println!("{}", serde_json::to_string(&report)?);
    } else {
        let b = prediction.bounds;
        println!(
            "frame {frame}: {} box ({}, {}, {}, {})",
            prediction.status_line(),
            b.x1,
            b.y1,
            b.x2,
            b.y2
        );
    }
    Ok(())
}

fn report_faces(
    frame: usize,
    faces: &[FaceDetection],
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        let report = FrameReport {
            frame,
            prediction: None,
            faces: Some(faces),
        };
        println!("{}", serde_json::to_string(&report)?);
    } else {
        println!("frame {frame}: {} faces", faces.len());
        for f in faces {
            let b = f.bounds;
            println!(
                "  {:.3} box ({}, {}, {}, {})",
                f.score, b.x1, b.y1, b.x2, b.y2
            );
        }
    }
    Ok(())
}
