use std::sync::Arc;
use std::time::Instant;

use image::GrayImage;
use thiserror::Error;

use crate::annotation::domain::frame_annotator::FrameAnnotator;
use crate::detection::domain::face_localizer::FaceLocalizer;
use crate::emotion::domain::emotion_classifier::EmotionClassifier;
use crate::emotion::domain::emotion_distribution::{DistributionError, EmotionDistribution};
use crate::emotion::domain::face_result::FaceResult;
use crate::pipeline::face_normalizer::{crop_gray, normalize_face};
use crate::pipeline::pipeline_logger::{NullPipelineLogger, PipelineLogger};
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

/// Failure confined to one located face. The face is skipped, the rest of
/// the image is still processed.
#[derive(Error, Debug)]
pub enum FaceError {
    #[error("face {index}: box {bounding_box:?} has no pixels inside the image")]
    DegenerateCrop {
        index: usize,
        bounding_box: BoundingBox,
    },
    #[error("face {index}: classifier failed: {message}")]
    Classification { index: usize, message: String },
    #[error("face {index}: classifier output rejected: {source}")]
    Distribution {
        index: usize,
        #[source]
        source: DistributionError,
    },
}

impl FaceError {
    pub fn index(&self) -> usize {
        match self {
            FaceError::DegenerateCrop { index, .. }
            | FaceError::Classification { index, .. }
            | FaceError::Distribution { index, .. } => *index,
        }
    }

    pub fn stage(&self) -> &'static str {
        match self {
            FaceError::DegenerateCrop { .. } => "crop",
            FaceError::Classification { .. } | FaceError::Distribution { .. } => "classify",
        }
    }
}

/// Failure of a whole-image stage.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{stage} stage failed: {message}")]
    Stage { stage: &'static str, message: String },
}

#[derive(Debug)]
pub struct SkippedFace {
    pub index: usize,
    pub bounding_box: BoundingBox,
    pub reason: FaceError,
}

/// Output of one pipeline run.
#[derive(Debug)]
pub struct DetectionBatch {
    pub results: Vec<FaceResult>,
    pub annotated: Frame,
    pub skipped: Vec<SkippedFace>,
    pub faces_located: usize,
}

impl DetectionBatch {
    /// True when the localizer found nothing at all.
    pub fn no_faces(&self) -> bool {
        self.faces_located == 0
    }
}

/// locate → crop → normalise → classify → annotate.
///
/// Collaborators are built once and shared read-only, so one pipeline can
/// serve any number of threads.
pub struct FaceEmotionPipeline {
    localizer: Arc<dyn FaceLocalizer>,
    classifier: Arc<dyn EmotionClassifier>,
    annotator: Arc<dyn FrameAnnotator>,
}

impl FaceEmotionPipeline {
    pub fn new(
        localizer: Arc<dyn FaceLocalizer>,
        classifier: Arc<dyn EmotionClassifier>,
        annotator: Arc<dyn FrameAnnotator>,
    ) -> Self {
        Self {
            localizer,
            classifier,
            annotator,
        }
    }

    pub fn process(&self, frame: &Frame) -> Result<DetectionBatch, PipelineError> {
        self.process_with_logger(frame, &mut NullPipelineLogger)
    }

    pub fn process_with_logger(
        &self,
        frame: &Frame,
        logger: &mut dyn PipelineLogger,
    ) -> Result<DetectionBatch, PipelineError> {
        let started = Instant::now();
        let boxes = self
            .localizer
            .locate(frame)
            .map_err(|e| PipelineError::Stage {
                stage: "locate",
                message: e.to_string(),
            })?;
        logger.timing("locate", elapsed_ms(started));
        logger.metric("faces", boxes.len() as f64);

        if boxes.is_empty() {
            return Ok(DetectionBatch {
                results: Vec::new(),
                annotated: frame.clone(),
                skipped: Vec::new(),
                faces_located: 0,
            });
        }

        let started = Instant::now();
        let gray = frame.to_gray();
        let mut results = Vec::with_capacity(boxes.len());
        let mut skipped = Vec::new();
        for (index, bbox) in boxes.iter().enumerate() {
            match self.classify_face(&gray, index, bbox) {
                Ok(result) => results.push(result),
                Err(reason) => {
                    log::warn!("Skipping face at {} stage: {reason}", reason.stage());
                    skipped.push(SkippedFace {
                        index,
                        bounding_box: *bbox,
                        reason,
                    });
                }
            }
        }
        logger.timing("classify", elapsed_ms(started));

        let started = Instant::now();
        let annotated = self.annotator.annotate(frame, &results);
        logger.timing("annotate", elapsed_ms(started));

        Ok(DetectionBatch {
            results,
            annotated,
            skipped,
            faces_located: boxes.len(),
        })
    }

    fn classify_face(
        &self,
        gray: &GrayImage,
        index: usize,
        bbox: &BoundingBox,
    ) -> Result<FaceResult, FaceError> {
        let degenerate = || FaceError::DegenerateCrop {
            index,
            bounding_box: *bbox,
        };
        let clamped = bbox
            .clamp_to(gray.width(), gray.height())
            .ok_or_else(degenerate)?;
        let crop = crop_gray(gray, &clamped).ok_or_else(degenerate)?;
        let tensor = normalize_face(&crop);

        let scores = self
            .classifier
            .classify(tensor.view())
            .map_err(|e| FaceError::Classification {
                index,
                message: e.to_string(),
            })?;
        let emotions = EmotionDistribution::from_scores(&scores)
            .map_err(|source| FaceError::Distribution { index, source })?;
        Ok(FaceResult::new(clamped, emotions))
    }
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::infrastructure::label_annotator::LabelAnnotator;
    use crate::emotion::domain::emotion::Emotion;
    use crate::emotion::infrastructure::random_emotion_classifier::RandomEmotionClassifier;
    use crate::pipeline::pipeline_logger::StdoutPipelineLogger;
    use approx::assert_relative_eq;
    use image::{Rgb, RgbImage};
    use ndarray::ArrayView4;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type ClassifierResult = Result<Vec<f32>, Box<dyn std::error::Error>>;

    // --- Stubs ---

    struct StubLocalizer {
        boxes: Vec<BoundingBox>,
    }

    impl FaceLocalizer for StubLocalizer {
        fn locate(&self, _frame: &Frame) -> Result<Vec<BoundingBox>, Box<dyn std::error::Error>> {
            Ok(self.boxes.clone())
        }
    }

    struct FailingLocalizer;

    impl FaceLocalizer for FailingLocalizer {
        fn locate(&self, _frame: &Frame) -> Result<Vec<BoundingBox>, Box<dyn std::error::Error>> {
            Err("cascade exploded".into())
        }
    }

    /// Counts calls so tests can assert the annotator was bypassed.
    struct CountingAnnotator {
        calls: AtomicUsize,
    }

    impl FrameAnnotator for CountingAnnotator {
        fn annotate(&self, frame: &Frame, _results: &[FaceResult]) -> Frame {
            self.calls.fetch_add(1, Ordering::SeqCst);
            frame.clone()
        }
    }

    fn happy_scores() -> Vec<f32> {
        let mut scores = vec![0.1 / 6.0; 7];
        scores[Emotion::Happy.index()] = 0.9;
        scores
    }

    fn fixed(scores: Vec<f32>) -> Arc<dyn EmotionClassifier> {
        Arc::new(move |_face: ArrayView4<'_, f32>| -> ClassifierResult { Ok(scores.clone()) })
    }

    fn pipeline_with(
        boxes: Vec<BoundingBox>,
        classifier: Arc<dyn EmotionClassifier>,
    ) -> FaceEmotionPipeline {
        FaceEmotionPipeline::new(
            Arc::new(StubLocalizer { boxes }),
            classifier,
            Arc::new(LabelAnnotator::new().unwrap()),
        )
    }

    fn grey_canvas() -> Frame {
        Frame::from_rgb_image(RgbImage::from_pixel(200, 160, Rgb([90, 90, 90])))
    }

    #[test]
    fn test_single_happy_face() {
        let face = BoundingBox::new(60, 60, 64, 64);
        let pipeline = pipeline_with(vec![face], fixed(happy_scores()));
        let frame = grey_canvas();

        let batch = pipeline.process(&frame).unwrap();

        assert_eq!(batch.results.len(), 1);
        let result = &batch.results[0];
        assert_eq!(result.dominant_emotion(), Emotion::Happy);
        assert_relative_eq!(result.confidence(), 0.9, epsilon = 1e-6);
        assert_eq!(result.bounding_box(), face);
        let img = batch.annotated.to_rgb_image();
        assert_eq!(img.get_pixel(60, 100).0, [255, 255, 0]);
        assert_eq!(img.get_pixel(123, 100).0, [255, 255, 0]);
    }

    #[test]
    fn test_no_faces_returns_input_unchanged() {
        let annotator = Arc::new(CountingAnnotator {
            calls: AtomicUsize::new(0),
        });
        let pipeline = FaceEmotionPipeline::new(
            Arc::new(StubLocalizer { boxes: vec![] }),
            fixed(happy_scores()),
            annotator.clone(),
        );
        let frame = grey_canvas();

        let batch = pipeline.process(&frame).unwrap();

        assert!(batch.results.is_empty());
        assert!(batch.no_faces());
        assert_eq!(batch.annotated, frame);
        assert_eq!(annotator.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_input_frame_is_not_mutated() {
        let pipeline = pipeline_with(vec![BoundingBox::new(10, 50, 40, 40)], fixed(happy_scores()));
        let frame = grey_canvas();
        let before = frame.clone();
        let batch = pipeline.process(&frame).unwrap();
        assert_eq!(frame, before);
        assert_ne!(batch.annotated, frame);
    }

    #[test]
    fn test_degenerate_box_is_skipped() {
        let boxes = vec![
            BoundingBox::new(10, 10, 40, 40),
            BoundingBox::new(500, 500, 40, 40),
            BoundingBox::new(100, 60, 40, 40),
        ];
        let pipeline = pipeline_with(boxes, fixed(happy_scores()));

        let batch = pipeline.process(&grey_canvas()).unwrap();

        assert_eq!(batch.faces_located, 3);
        assert_eq!(batch.results.len(), 2);
        assert_eq!(batch.skipped.len(), 1);
        assert_eq!(batch.skipped[0].index, 1);
        assert!(matches!(
            batch.skipped[0].reason,
            FaceError::DegenerateCrop { index: 1, .. }
        ));
    }

    #[test]
    fn test_classifier_failure_isolated_to_one_face() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let flaky = Arc::new(move |_face: ArrayView4<'_, f32>| -> ClassifierResult {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err("model busy".into())
            } else {
                Ok(happy_scores())
            }
        });
        let boxes = vec![BoundingBox::new(0, 0, 40, 40), BoundingBox::new(50, 50, 40, 40)];
        let pipeline = pipeline_with(boxes, flaky);

        let batch = pipeline.process(&grey_canvas()).unwrap();

        assert_eq!(batch.results.len(), 1);
        assert_eq!(batch.results[0].bounding_box(), BoundingBox::new(50, 50, 40, 40));
        assert_eq!(batch.skipped[0].reason.index(), 0);
        assert_eq!(batch.skipped[0].reason.stage(), "classify");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unnormalised_output_is_rejected_per_face() {
        let pipeline = pipeline_with(vec![BoundingBox::new(0, 0, 40, 40)], fixed(vec![0.5; 7]));
        let batch = pipeline.process(&grey_canvas()).unwrap();
        assert!(batch.results.is_empty());
        assert!(!batch.no_faces());
        assert!(matches!(
            batch.skipped[0].reason,
            FaceError::Distribution {
                source: DistributionError::NotNormalized(_),
                ..
            }
        ));
    }

    #[test]
    fn test_box_partly_outside_is_clamped() {
        let pipeline = pipeline_with(vec![BoundingBox::new(180, 140, 40, 40)], fixed(happy_scores()));
        let batch = pipeline.process(&grey_canvas()).unwrap();
        assert_eq!(batch.results[0].bounding_box(), BoundingBox::new(180, 140, 20, 20));
    }

    #[test]
    fn test_localizer_failure_names_stage() {
        let pipeline = FaceEmotionPipeline::new(
            Arc::new(FailingLocalizer),
            fixed(happy_scores()),
            Arc::new(LabelAnnotator::new().unwrap()),
        );
        let err = pipeline.process(&grey_canvas()).unwrap_err();
        assert!(matches!(err, PipelineError::Stage { stage: "locate", .. }));
        assert!(err.to_string().contains("cascade exploded"));
    }

    #[test]
    fn test_classifier_receives_normalised_tensor() {
        let checked = Arc::new(move |face: ArrayView4<'_, f32>| -> ClassifierResult {
            assert_eq!(face.shape(), &[1, 48, 48, 1]);
            assert!(face.iter().all(|&v| (v - 90.0 / 255.0).abs() < 1e-4));
            Ok(happy_scores())
        });
        let pipeline = pipeline_with(vec![BoundingBox::new(20, 20, 97, 61)], checked);
        assert_eq!(pipeline.process(&grey_canvas()).unwrap().results.len(), 1);
    }

    #[test]
    fn test_results_sum_to_one_with_dominant_at_max() {
        let boxes = vec![BoundingBox::new(0, 0, 50, 50), BoundingBox::new(100, 80, 60, 60)];
        let pipeline = pipeline_with(boxes, Arc::new(RandomEmotionClassifier::new()));
        for result in pipeline.process(&grey_canvas()).unwrap().results {
            let probs = result.emotions().as_array();
            assert_relative_eq!(probs.iter().sum::<f64>(), 1.0, epsilon = 1e-6);
            assert!(probs.iter().all(|&p| p >= 0.0));
            let max = probs.iter().copied().fold(f64::MIN, f64::max);
            assert_eq!(result.confidence(), max);
        }
    }

    #[test]
    fn test_seeded_classifier_is_repeatable() {
        let frame = Frame::from_rgb_image(RgbImage::from_fn(160, 120, |x, y| {
            Rgb([(x * 3 % 256) as u8, (y * 5 % 256) as u8, 40])
        }));
        let boxes = vec![BoundingBox::new(5, 5, 50, 50), BoundingBox::new(70, 40, 60, 60)];
        let pipeline = pipeline_with(boxes, Arc::new(RandomEmotionClassifier::seeded(7)));

        let first = pipeline.process(&frame).unwrap();
        let second = pipeline.process(&frame).unwrap();

        assert_eq!(first.results, second.results);
        assert_eq!(first.annotated, second.annotated);
    }

    #[test]
    fn test_logger_receives_stage_timings() {
        let pipeline = pipeline_with(vec![BoundingBox::new(0, 0, 40, 40)], fixed(happy_scores()));
        let mut logger = StdoutPipelineLogger::new(1);
        pipeline
            .process_with_logger(&grey_canvas(), &mut logger)
            .unwrap();
        for stage in ["locate", "classify", "annotate"] {
            assert_eq!(logger.timings_for(stage).map(<[f64]>::len), Some(1), "{stage}");
        }
        assert_eq!(logger.metrics_for("faces").unwrap(), &[1.0]);
    }
}
