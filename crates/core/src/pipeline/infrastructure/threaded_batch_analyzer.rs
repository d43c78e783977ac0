use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;

use crate::imaging::infrastructure::image_codec::{read_image_file, DecodeError};
use crate::pipeline::face_emotion_pipeline::{DetectionBatch, FaceEmotionPipeline, PipelineError};
use crate::pipeline::pipeline_logger::PipelineLogger;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// Outcome for one input file, delivered in input order.
#[derive(Debug)]
pub struct BatchItem {
    pub index: usize,
    pub path: PathBuf,
    pub outcome: Result<DetectionBatch, BatchError>,
}

struct Finished {
    item: BatchItem,
    elapsed_ms: f64,
}

/// Decodes and analyses many files on worker threads.
///
/// Layout: `main [jobs] → N workers [decode → pipeline] → main [reorder → callback]`
///
/// Workers share one pipeline. The callback runs on the calling thread, so
/// whatever it touches (the result store, stdout) stays single-threaded.
pub struct ThreadedBatchAnalyzer {
    pipeline: Arc<FaceEmotionPipeline>,
    workers: usize,
    max_bytes: usize,
}

impl ThreadedBatchAnalyzer {
    pub fn new(pipeline: Arc<FaceEmotionPipeline>, max_bytes: usize) -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            pipeline,
            workers,
            max_bytes,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn run<F>(&self, paths: &[PathBuf], logger: &mut dyn PipelineLogger, mut on_item: F)
    where
        F: FnMut(BatchItem),
    {
        let total = paths.len();
        if total == 0 {
            return;
        }

        let (job_tx, job_rx) = crossbeam_channel::unbounded::<(usize, PathBuf)>();
        let (done_tx, done_rx) = crossbeam_channel::unbounded::<Finished>();
        for job in paths.iter().cloned().enumerate() {
            // Receiver is alive until the workers below exit.
            let _ = job_tx.send(job);
        }
        drop(job_tx);

        let handles: Vec<_> = (0..self.workers.min(total))
            .map(|_| {
                let jobs = job_rx.clone();
                let done = done_tx.clone();
                let pipeline = Arc::clone(&self.pipeline);
                let max_bytes = self.max_bytes;
                std::thread::spawn(move || {
                    for (index, path) in jobs {
                        let started = Instant::now();
                        let outcome = analyze_file(&pipeline, &path, max_bytes);
                        let finished = Finished {
                            item: BatchItem {
                                index,
                                path,
                                outcome,
                            },
                            elapsed_ms: started.elapsed().as_secs_f64() * 1000.0,
                        };
                        if done.send(finished).is_err() {
                            break;
                        }
                    }
                })
            })
            .collect();
        drop(done_tx);

        let mut pending = BTreeMap::new();
        let mut next = 0;
        for finished in done_rx {
            pending.insert(finished.item.index, finished);
            while let Some(ready) = pending.remove(&next) {
                logger.timing("image", ready.elapsed_ms);
                if let Ok(batch) = &ready.item.outcome {
                    logger.metric("faces", batch.faces_located as f64);
                }
                next += 1;
                logger.progress(next, total);
                on_item(ready.item);
            }
        }

        for handle in handles {
            if handle.join().is_err() {
                log::error!("Batch worker panicked");
            }
        }
    }
}

fn analyze_file(
    pipeline: &FaceEmotionPipeline,
    path: &std::path::Path,
    max_bytes: usize,
) -> Result<DetectionBatch, BatchError> {
    let frame = read_image_file(path, max_bytes)?;
    Ok(pipeline.process(&frame)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::domain::frame_annotator::FrameAnnotator;
    use crate::detection::domain::face_localizer::FaceLocalizer;
    use crate::emotion::domain::face_result::FaceResult;
    use crate::emotion::infrastructure::random_emotion_classifier::RandomEmotionClassifier;
    use crate::imaging::infrastructure::image_codec::encode_image;
    use crate::pipeline::pipeline_logger::{NullPipelineLogger, StdoutPipelineLogger};
    use crate::shared::bounding_box::BoundingBox;
    use crate::shared::frame::Frame;
    use image::{ImageFormat, Rgb, RgbImage};

    /// One face per 10 px of image width, so each file is recognisable.
    struct WidthLocalizer;

    impl FaceLocalizer for WidthLocalizer {
        fn locate(&self, frame: &Frame) -> Result<Vec<BoundingBox>, Box<dyn std::error::Error>> {
            Ok((0..frame.width() / 10)
                .map(|i| BoundingBox::new(i * 10, 0, 10, 10))
                .collect())
        }
    }

    struct PassThrough;

    impl FrameAnnotator for PassThrough {
        fn annotate(&self, frame: &Frame, _results: &[FaceResult]) -> Frame {
            frame.clone()
        }
    }

    fn analyzer(workers: usize) -> ThreadedBatchAnalyzer {
        let pipeline = FaceEmotionPipeline::new(
            Arc::new(WidthLocalizer),
            Arc::new(RandomEmotionClassifier::seeded(1)),
            Arc::new(PassThrough),
        );
        ThreadedBatchAnalyzer::new(Arc::new(pipeline), 1 << 20).with_workers(workers)
    }

    fn write_png(dir: &std::path::Path, name: &str, width: u32) -> PathBuf {
        let frame = Frame::from_rgb_image(RgbImage::from_pixel(width, 12, Rgb([1, 2, 3])));
        let path = dir.join(name);
        std::fs::write(&path, encode_image(&frame, ImageFormat::Png).unwrap()).unwrap();
        path
    }

    #[test]
    fn test_results_arrive_in_input_order() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<_> = (1..=8)
            .map(|n| write_png(dir.path(), &format!("img{n}.png"), n * 10))
            .collect();

        let mut seen = Vec::new();
        analyzer(4).run(&paths, &mut NullPipelineLogger, |item| {
            let faces = item.outcome.unwrap().results.len();
            seen.push((item.index, faces));
        });

        let expected: Vec<_> = (0..8).map(|i| (i, i + 1)).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_bad_file_does_not_stop_batch() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("broken.jpg");
        std::fs::write(&bad, b"not a jpeg").unwrap();
        let paths = vec![
            write_png(dir.path(), "a.png", 20),
            bad,
            dir.path().join("notes.txt"),
            write_png(dir.path(), "b.png", 30),
        ];

        let mut outcomes = Vec::new();
        analyzer(2).run(&paths, &mut NullPipelineLogger, |item| outcomes.push(item.outcome));

        assert_eq!(outcomes.len(), 4);
        assert!(outcomes[0].is_ok());
        assert!(matches!(outcomes[1], Err(BatchError::Decode(DecodeError::Raster(_)))));
        assert!(matches!(outcomes[2], Err(BatchError::Decode(DecodeError::Extension(_)))));
        assert_eq!(outcomes[3].as_ref().unwrap().results.len(), 3);
    }

    #[test]
    fn test_logger_sees_progress_and_metrics() {
        let dir = tempfile::tempdir().unwrap();
        let paths = vec![
            write_png(dir.path(), "a.png", 10),
            write_png(dir.path(), "b.png", 20),
        ];
        let mut logger = StdoutPipelineLogger::new(1);
        analyzer(1).run(&paths, &mut logger, |_| {});
        assert_eq!(logger.timings_for("image").unwrap().len(), 2);
        assert_eq!(logger.metrics_for("faces").unwrap(), &[1.0, 2.0]);
    }

    #[test]
    fn test_empty_input_never_calls_back() {
        let mut called = false;
        analyzer(2).run(&[], &mut NullPipelineLogger, |_| called = true);
        assert!(!called);
    }
}
