use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use thiserror::Error;

use crate::detection::domain::face_detector::{DetectionError, FaceDetector};
use crate::shared::frame::Frame;
use crate::shared::prediction::Prediction;

#[derive(Error, Debug, PartialEq, Eq)]
#[error("analyzer worker has stopped")]
pub struct AnalyzerClosed;

/// Outcome of analyzing one submitted frame.
#[derive(Debug)]
pub struct AnalyzedFrame {
    pub frame_index: usize,
    pub result: Result<Prediction, DetectionError>,
}

/// Runs detection on a dedicated worker thread with keep-only-latest
/// backpressure.
///
/// At most one frame waits for the worker. Submitting while a frame is
/// still waiting replaces it, so a slow detector never falls behind the
/// source; replaced frames are counted in [`dropped_frames`](Self::dropped_frames).
///
/// Layout: `submit → [slot of 1] → worker (detect) → results`
pub struct LatestFrameAnalyzer {
    frame_tx: Option<Sender<Frame>>,
    evict_rx: Receiver<Frame>,
    result_rx: Receiver<AnalyzedFrame>,
    dropped: Arc<AtomicUsize>,
    handle: Option<JoinHandle<()>>,
}

impl LatestFrameAnalyzer {
    pub fn spawn(detector: Box<dyn FaceDetector>) -> Self {
        let (frame_tx, frame_rx) = crossbeam_channel::bounded::<Frame>(1);
        let (result_tx, result_rx) = crossbeam_channel::unbounded::<AnalyzedFrame>();
        let evict_rx = frame_rx.clone();
        let handle = spawn_worker(detector, frame_rx, result_tx);

        Self {
            frame_tx: Some(frame_tx),
            evict_rx,
            result_rx,
            dropped: Arc::new(AtomicUsize::new(0)),
            handle: Some(handle),
        }
    }

    /// Queues `frame`, discarding any frame the worker has not picked up yet.
    pub fn submit(&self, frame: Frame) -> Result<(), AnalyzerClosed> {
        let tx = self.frame_tx.as_ref().ok_or(AnalyzerClosed)?;
        let mut frame = frame;
        loop {
            match tx.try_send(frame) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Full(returned)) => {
                    if let Ok(stale) = self.evict_rx.try_recv() {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        log::debug!(
                            "Dropped frame {} in favour of frame {}",
                            stale.index(),
                            returned.index()
                        );
                    }
                    frame = returned;
                }
                Err(TrySendError::Disconnected(_)) => return Err(AnalyzerClosed),
            }
        }
    }

    /// Completed analyses, in submission order.
    pub fn results(&self) -> &Receiver<AnalyzedFrame> {
        &self.result_rx
    }

    pub fn dropped_frames(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Stops accepting frames, lets the worker finish the waiting frame, and
    /// returns every result not yet taken from [`results`](Self::results).
    pub fn finish(mut self) -> Vec<AnalyzedFrame> {
        self.shutdown();
        self.result_rx.try_iter().collect()
    }

    fn shutdown(&mut self) {
        drop(self.frame_tx.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Face analyzer worker panicked");
            }
        }
        let dropped = self.dropped_frames();
        if dropped > 0 {
            log::warn!("Analyzer dropped {dropped} stale frames");
        }
    }
}

impl Drop for LatestFrameAnalyzer {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.shutdown();
        }
    }
}

fn spawn_worker(
    mut detector: Box<dyn FaceDetector>,
    frame_rx: Receiver<Frame>,
    result_tx: Sender<AnalyzedFrame>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        for frame in frame_rx {
            let result = detector.detect(&frame);
            if let Err(ref e) = result {
                log::warn!("Detection failed on frame {}: {e}", frame.index());
            }
            let analyzed = AnalyzedFrame {
                frame_index: frame.index(),
                result,
            };
            if result_tx.send(analyzed).is_err() {
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::geometry::PixelBox;

    fn frame(index: usize) -> Frame {
        Frame::new(vec![0u8; 3], 1, 1, index).unwrap()
    }

    /// Echoes the frame index as the score.
    struct EchoDetector;

    impl FaceDetector for EchoDetector {
        fn detect(&mut self, frame: &Frame) -> Result<Prediction, DetectionError> {
            Ok(Prediction::new(frame.index() as f32, 0, PixelBox::ZERO))
        }
    }

    /// Announces each call on `started`, then blocks until `release` yields
    /// or is dropped.
    struct GatedDetector {
        started: Sender<usize>,
        release: Receiver<()>,
    }

    impl FaceDetector for GatedDetector {
        fn detect(&mut self, frame: &Frame) -> Result<Prediction, DetectionError> {
            let _ = self.started.send(frame.index());
            let _ = self.release.recv();
            Ok(Prediction::new(frame.index() as f32, 1, PixelBox::ZERO))
        }
    }

    struct FailingDetector;

    impl FaceDetector for FailingDetector {
        fn detect(&mut self, _frame: &Frame) -> Result<Prediction, DetectionError> {
            Err(DetectionError::Inference("boom".into()))
        }
    }

    #[test]
    fn test_single_frame_is_analyzed() {
        let analyzer = LatestFrameAnalyzer::spawn(Box::new(EchoDetector));
        analyzer.submit(frame(4)).unwrap();
        let result = analyzer.results().recv().unwrap();
        assert_eq!(result.frame_index, 4);
        assert_eq!(result.result.unwrap().score, 4.0);
        assert!(analyzer.finish().is_empty());
    }

    #[test]
    fn test_busy_worker_keeps_only_latest_frame() {
        let (started_tx, started_rx) = crossbeam_channel::unbounded();
        let (release_tx, release_rx) = crossbeam_channel::unbounded();
        let analyzer = LatestFrameAnalyzer::spawn(Box::new(GatedDetector {
            started: started_tx,
            release: release_rx,
        }));

        analyzer.submit(frame(0)).unwrap();
        assert_eq!(started_rx.recv().unwrap(), 0);

        // Worker is blocked on frame 0; each submit replaces the waiting one
        analyzer.submit(frame(1)).unwrap();
        analyzer.submit(frame(2)).unwrap();
        analyzer.submit(frame(3)).unwrap();
        assert_eq!(analyzer.dropped_frames(), 2);

        drop(release_tx);
        let results = analyzer.finish();
        let indices: Vec<usize> = results.iter().map(|r| r.frame_index).collect();
        assert_eq!(indices, vec![0, 3]);
    }

    #[test]
    fn test_errors_are_reported_per_frame() {
        let analyzer = LatestFrameAnalyzer::spawn(Box::new(FailingDetector));
        analyzer.submit(frame(1)).unwrap();
        let result = analyzer.results().recv().unwrap();
        assert_eq!(result.frame_index, 1);
        assert!(matches!(result.result, Err(DetectionError::Inference(_))));
    }

    #[test]
    fn test_finish_drains_pending_frame() {
        let analyzer = LatestFrameAnalyzer::spawn(Box::new(EchoDetector));
        analyzer.submit(frame(0)).unwrap();
        let results = analyzer.finish();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].frame_index, 0);
    }
}
