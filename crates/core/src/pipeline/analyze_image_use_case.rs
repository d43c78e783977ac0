use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Local, Utc};
use thiserror::Error;

use crate::emotion::domain::face_result::FaceResult;
use crate::imaging::domain::image_writer::ImageWriter;
use crate::pipeline::face_emotion_pipeline::{
    DetectionBatch, FaceEmotionPipeline, PipelineError, SkippedFace,
};
use crate::pipeline::pipeline_logger::{NullPipelineLogger, PipelineLogger};
use crate::pipeline::upload_policy::{upload_filename, webcam_filename};
use crate::shared::frame::Frame;
use crate::storage::domain::detection_record::{DetectionRecord, SourceType};
use crate::storage::domain::result_store::ResultStore;

#[derive(Error, Debug)]
pub enum AnalyzeError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("failed to write annotated image {path}: {message}")]
    Write { path: PathBuf, message: String },
    #[error("failed to save results: {0}")]
    Store(String),
}

#[derive(Debug)]
pub enum AnalysisOutcome {
    /// Nothing was located; nothing was written or stored.
    NoFaces,
    Analyzed {
        filename: String,
        path: PathBuf,
        results: Vec<FaceResult>,
        skipped: Vec<SkippedFace>,
        annotated: Frame,
    },
}

/// Analyse one decoded image, keep the annotated copy and record every face.
pub struct AnalyzeImageUseCase {
    pipeline: Arc<FaceEmotionPipeline>,
    image_writer: Box<dyn ImageWriter>,
    store: Box<dyn ResultStore>,
    upload_dir: PathBuf,
}

impl AnalyzeImageUseCase {
    pub fn new(
        pipeline: Arc<FaceEmotionPipeline>,
        image_writer: Box<dyn ImageWriter>,
        store: Box<dyn ResultStore>,
        upload_dir: PathBuf,
    ) -> Self {
        Self {
            pipeline,
            image_writer,
            store,
            upload_dir,
        }
    }

    pub fn execute(
        &mut self,
        frame: &Frame,
        original_name: &str,
        source: SourceType,
        received_at: DateTime<Local>,
    ) -> Result<AnalysisOutcome, AnalyzeError> {
        self.execute_with_logger(frame, original_name, source, received_at, &mut NullPipelineLogger)
    }

    pub fn execute_with_logger(
        &mut self,
        frame: &Frame,
        original_name: &str,
        source: SourceType,
        received_at: DateTime<Local>,
        logger: &mut dyn PipelineLogger,
    ) -> Result<AnalysisOutcome, AnalyzeError> {
        let batch = self.pipeline.process_with_logger(frame, logger)?;
        self.record_with_logger(batch, original_name, source, received_at, logger)
    }

    /// Persist a batch that was already computed, e.g. on a worker thread.
    pub fn record(
        &mut self,
        batch: DetectionBatch,
        original_name: &str,
        source: SourceType,
        received_at: DateTime<Local>,
    ) -> Result<AnalysisOutcome, AnalyzeError> {
        self.record_with_logger(batch, original_name, source, received_at, &mut NullPipelineLogger)
    }

    fn record_with_logger(
        &mut self,
        batch: DetectionBatch,
        original_name: &str,
        source: SourceType,
        received_at: DateTime<Local>,
        logger: &mut dyn PipelineLogger,
    ) -> Result<AnalysisOutcome, AnalyzeError> {
        if batch.no_faces() {
            logger.info(&format!("No faces detected in {original_name}"));
            return Ok(AnalysisOutcome::NoFaces);
        }

        let filename = match source {
            SourceType::Upload => upload_filename(&received_at, original_name),
            SourceType::Webcam => webcam_filename(&received_at),
        };
        let path = self.upload_dir.join(&filename);

        let started = Instant::now();
        self.image_writer
            .write(&path, &batch.annotated)
            .map_err(|e| AnalyzeError::Write {
                path: path.clone(),
                message: e.to_string(),
            })?;

        // File names follow the local wall clock; stored rows are UTC.
        let stored_at = received_at.with_timezone(&Utc);
        let records: Vec<DetectionRecord> = batch
            .results
            .iter()
            .map(|r| DetectionRecord::from_result(r, stored_at, &filename, source, batch.results.len()))
            .collect();
        if !records.is_empty() {
            self.store
                .save(&records)
                .map_err(|e| AnalyzeError::Store(e.to_string()))?;
        }
        logger.timing("persist", started.elapsed().as_secs_f64() * 1000.0);
        log::info!(
            "{original_name}: {} face(s) analysed, {} skipped, saved as {filename}",
            batch.results.len(),
            batch.skipped.len()
        );

        Ok(AnalysisOutcome::Analyzed {
            filename,
            path,
            results: batch.results,
            skipped: batch.skipped,
            annotated: batch.annotated,
        })
    }
}
