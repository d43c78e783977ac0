mod settings;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use chrono::Local;
use clap::{Parser, Subcommand};
use image::ImageFormat;
use serde::Serialize;

use moodlens_core::annotation::infrastructure::label_annotator::LabelAnnotator;
use moodlens_core::detection::domain::cascade_params::CascadeParams;
use moodlens_core::detection::domain::face_localizer::FaceLocalizer;
use moodlens_core::detection::infrastructure::haar_face_localizer::HaarFaceLocalizer;
use moodlens_core::detection::infrastructure::model_resolver;
use moodlens_core::emotion::domain::emotion::Emotion;
use moodlens_core::emotion::domain::emotion_classifier::EmotionClassifier;
use moodlens_core::emotion::domain::emotion_distribution::EmotionDistribution;
use moodlens_core::emotion::domain::face_result::FaceResult;
use moodlens_core::emotion::infrastructure::onnx_emotion_classifier::OnnxEmotionClassifier;
use moodlens_core::emotion::infrastructure::random_emotion_classifier::RandomEmotionClassifier;
use moodlens_core::imaging::infrastructure::image_codec::{
    decode_data_url, encode_data_url, read_image_file,
};
use moodlens_core::imaging::infrastructure::image_file_writer::ImageFileWriter;
use moodlens_core::pipeline::analyze_image_use_case::{AnalysisOutcome, AnalyzeImageUseCase};
use moodlens_core::pipeline::emotion_report_use_case::EmotionReportUseCase;
use moodlens_core::pipeline::face_emotion_pipeline::{FaceEmotionPipeline, SkippedFace};
use moodlens_core::pipeline::infrastructure::threaded_batch_analyzer::ThreadedBatchAnalyzer;
use moodlens_core::pipeline::pipeline_logger::{PipelineLogger, StdoutPipelineLogger};
use moodlens_core::storage::domain::detection_record::SourceType;
use moodlens_core::storage::infrastructure::sqlite_result_store::SqliteResultStore;

use settings::Settings;

/// Locate faces in images and classify their emotions.
#[derive(Parser)]
#[command(name = "moodlens")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Settings file (default: the user config directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for annotated images.
    #[arg(long, global = true)]
    upload_dir: Option<PathBuf>,

    /// SQLite database for stored results.
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Haar cascade XML (downloaded on first use when omitted).
    #[arg(long, global = true)]
    cascade: Option<PathBuf>,

    /// ONNX emotion model; without one, random reference scores are used.
    #[arg(long, global = true)]
    emotion_model: Option<PathBuf>,

    /// Seed for the reference classifier, making its output repeatable.
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Pyramid scale step (> 1.0).
    #[arg(long, global = true)]
    scale_factor: Option<f64>,

    /// Overlapping detections required to keep a face.
    #[arg(long, global = true)]
    min_neighbors: Option<u32>,

    /// Smallest face to look for, as WxH or a single side.
    #[arg(long, global = true, value_parser = parse_min_size)]
    min_size: Option<(u32, u32)>,
}

#[derive(Subcommand)]
enum Command {
    /// Analyse uploaded image files.
    Analyze {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Analyse a base64 data URL capture (file, or `-` / nothing for stdin).
    Webcam { input: Option<PathBuf> },
    /// Emotion counts and the most recent detections.
    Dashboard,
    /// Stored detections, newest first.
    History {
        #[arg(long, default_value = "1")]
        page: usize,
    },
    /// JSON map of dominant emotion to count.
    Stats,
    /// Print the effective settings as JSON.
    Config {
        /// Write them to the settings file.
        #[arg(long)]
        save: bool,
    },
}

enum Status {
    Done,
    NoFaces,
}

fn main() {
    env_logger::init();

    match run() {
        Ok(Status::Done) => {}
        Ok(Status::NoFaces) => process::exit(2),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

fn run() -> Result<Status, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = effective_settings(&cli);

    match cli.command {
        Command::Analyze { files } => run_analyze(&settings, &files),
        Command::Webcam { input } => run_webcam(&settings, input.as_deref()),
        Command::Dashboard => run_dashboard(&settings),
        Command::History { page } => run_history(&settings, page),
        Command::Stats => run_stats(&settings),
        Command::Config { save } => run_config(&settings, cli.config.as_deref(), save),
    }
}

fn effective_settings(cli: &Cli) -> Settings {
    let mut settings = Settings::load(cli.config.as_deref());
    if let Some(dir) = &cli.upload_dir {
        settings.upload_dir = dir.clone();
    }
    if let Some(db) = &cli.database {
        settings.database_path = db.clone();
    }
    if cli.cascade.is_some() {
        settings.cascade_path = cli.cascade.clone();
    }
    if cli.emotion_model.is_some() {
        settings.emotion_model_path = cli.emotion_model.clone();
    }
    if cli.seed.is_some() {
        settings.classifier_seed = cli.seed;
    }
    if let Some(scale_factor) = cli.scale_factor {
        settings.scale_factor = scale_factor;
    }
    if let Some(min_neighbors) = cli.min_neighbors {
        settings.min_neighbors = min_neighbors;
    }
    if let Some(min_size) = cli.min_size {
        settings.min_size = min_size;
    }
    settings
}

fn run_analyze(settings: &Settings, files: &[PathBuf]) -> Result<Status, Box<dyn std::error::Error>> {
    let pipeline = Arc::new(build_pipeline(settings)?);
    let mut use_case = analyze_use_case(settings, Arc::clone(&pipeline))?;
    let mut logger = StdoutPipelineLogger::new(10);

    if let [path] = files {
        let frame = read_image_file(path, settings.max_upload_bytes)?;
        let outcome = use_case.execute_with_logger(
            &frame,
            &display_name(path),
            SourceType::Upload,
            Local::now(),
            &mut logger,
        )?;
        return Ok(report_outcome(path, &outcome));
    }

    let mut analyzed = 0;
    let mut failed = 0;
    ThreadedBatchAnalyzer::new(pipeline, settings.max_upload_bytes).run(
        files,
        &mut logger,
        |item| {
            let recorded = item
                .outcome
                .map_err(|e| e.to_string())
                .and_then(|batch| {
                    use_case
                        .record(batch, &display_name(&item.path), SourceType::Upload, Local::now())
                        .map_err(|e| e.to_string())
                });
            match recorded {
                Ok(outcome) => {
                    if let Status::Done = report_outcome(&item.path, &outcome) {
                        analyzed += 1;
                    }
                }
                Err(e) => {
                    log::error!("{}: {e}", item.path.display());
                    failed += 1;
                }
            }
        },
    );
    logger.summary();

    if failed > 0 {
        return Err(format!("{failed} of {} images could not be analysed", files.len()).into());
    }
    Ok(if analyzed == 0 { Status::NoFaces } else { Status::Done })
}

fn report_outcome(path: &Path, outcome: &AnalysisOutcome) -> Status {
    match outcome {
        AnalysisOutcome::NoFaces => {
            log::warn!("No faces detected in {}", path.display());
            Status::NoFaces
        }
        AnalysisOutcome::Analyzed {
            filename,
            path: saved,
            results,
            skipped,
            ..
        } => {
            println!("{} -> {}", path.display(), saved.display());
            for (i, result) in results.iter().enumerate() {
                println!("  {}", face_line(i, result));
            }
            for face in skipped {
                println!("  {}", skipped_line(face));
            }
            log::debug!("Stored as {filename}");
            Status::Done
        }
    }
}

fn face_line(index: usize, result: &FaceResult) -> String {
    let b = result.bounding_box();
    format!(
        "face {index} at ({}, {}) {}x{}: {}",
        b.x,
        b.y,
        b.width,
        b.height,
        result.label_text()
    )
}

fn skipped_line(face: &SkippedFace) -> String {
    let b = face.bounding_box;
    format!(
        "face {} at ({}, {}) {}x{}: skipped ({})",
        face.index, b.x, b.y, b.width, b.height, face.reason
    )
}

#[derive(Serialize)]
struct WebcamFace<'a> {
    dominant_emotion: Emotion,
    confidence: f64,
    emotions: &'a EmotionDistribution,
}

#[derive(Serialize)]
struct WebcamResponse<'a> {
    success: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    results: Vec<WebcamFace<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'static str>,
}

fn run_webcam(settings: &Settings, input: Option<&Path>) -> Result<Status, Box<dyn std::error::Error>> {
    let text = match input {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)?,
        _ => {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };
    let frame = decode_data_url(text.trim(), settings.max_upload_bytes)?;

    let pipeline = Arc::new(build_pipeline(settings)?);
    let mut use_case = analyze_use_case(settings, pipeline)?;
    let outcome = use_case.execute(&frame, "webcam", SourceType::Webcam, Local::now())?;

    let (response, status) = webcam_response(&outcome)?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(status)
}

/// JSON body for a webcam capture; the annotated frame travels back as a JPEG data URL.
fn webcam_response(
    outcome: &AnalysisOutcome,
) -> Result<(WebcamResponse<'_>, Status), image::ImageError> {
    Ok(match outcome {
        AnalysisOutcome::NoFaces => (
            WebcamResponse {
                success: false,
                results: Vec::new(),
                image: None,
                error: Some("No faces detected"),
            },
            Status::NoFaces,
        ),
        AnalysisOutcome::Analyzed {
            results, annotated, ..
        } => (
            WebcamResponse {
                success: true,
                results: results
                    .iter()
                    .map(|r| WebcamFace {
                        dominant_emotion: r.dominant_emotion(),
                        confidence: r.confidence(),
                        emotions: r.emotions(),
                    })
                    .collect(),
                image: Some(encode_data_url(annotated, ImageFormat::Jpeg)?),
                error: None,
            },
            Status::Done,
        ),
    })
}

fn run_dashboard(settings: &Settings) -> Result<Status, Box<dyn std::error::Error>> {
    let dashboard = report_use_case(settings)?.dashboard()?;
    println!("Faces analysed: {}", dashboard.total_faces);
    for (emotion, count) in &dashboard.counts {
        println!("  {:<10}{count}", emotion.label());
    }
    if !dashboard.recent.is_empty() {
        println!("Recent:");
        for record in &dashboard.recent {
            println!(
                "  {}  {:<7} {}  {}: {:.2}",
                record.timestamp.format("%Y-%m-%d %H:%M:%S"),
                record.source_type,
                record.filename,
                record.dominant_emotion.label(),
                record.confidence
            );
        }
    }
    Ok(Status::Done)
}

fn run_history(settings: &Settings, page: usize) -> Result<Status, Box<dyn std::error::Error>> {
    let page = report_use_case(settings)?.history(page)?;
    for record in &page.items {
        println!(
            "{:>6}  {}  {:<7} {:<40} {}: {:.2} ({} face(s))",
            record.id.unwrap_or_default(),
            record.timestamp.format("%Y-%m-%d %H:%M:%S"),
            record.source_type,
            record.filename,
            record.dominant_emotion.label(),
            record.confidence,
            record.faces_detected
        );
    }
    println!(
        "Page {} of {} ({} records)",
        page.page,
        page.total_pages().max(1),
        page.total
    );
    Ok(Status::Done)
}

fn run_stats(settings: &Settings) -> Result<Status, Box<dyn std::error::Error>> {
    let stats = report_use_case(settings)?.stats()?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(Status::Done)
}

fn run_config(
    settings: &Settings,
    config: Option<&Path>,
    save: bool,
) -> Result<Status, Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(settings)?);
    if save {
        let path = config
            .map(Path::to_path_buf)
            .or_else(Settings::config_path)
            .ok_or("Could not determine config directory")?;
        settings.save(&path)?;
        log::info!("Settings written to {}", path.display());
    }
    Ok(Status::Done)
}

fn build_pipeline(settings: &Settings) -> Result<FaceEmotionPipeline, Box<dyn std::error::Error>> {
    let params = CascadeParams::new(
        settings.scale_factor,
        settings.min_neighbors,
        settings.min_size,
    )?;
    let cascade_path = match &settings.cascade_path {
        Some(path) => path.clone(),
        None => {
            let path = model_resolver::resolve_cascade(None, Some(Box::new(download_progress)))?;
            eprintln!();
            path
        }
    };
    let localizer: Arc<dyn FaceLocalizer> =
        Arc::new(HaarFaceLocalizer::from_file(&cascade_path, params)?);

    let classifier: Arc<dyn EmotionClassifier> = match (&settings.emotion_model_path, settings.classifier_seed) {
        (Some(model), _) => Arc::new(OnnxEmotionClassifier::new(model)?),
        (None, Some(seed)) => Arc::new(RandomEmotionClassifier::seeded(seed)),
        (None, None) => Arc::new(RandomEmotionClassifier::new()),
    };
    if settings.emotion_model_path.is_none() {
        log::warn!("No emotion model configured; using random reference scores");
    }

    Ok(FaceEmotionPipeline::new(
        localizer,
        classifier,
        Arc::new(LabelAnnotator::new()?),
    ))
}

fn analyze_use_case(
    settings: &Settings,
    pipeline: Arc<FaceEmotionPipeline>,
) -> Result<AnalyzeImageUseCase, Box<dyn std::error::Error>> {
    let store = SqliteResultStore::open(&settings.database_path)?;
    Ok(AnalyzeImageUseCase::new(
        pipeline,
        Box::new(ImageFileWriter::new()),
        Box::new(store),
        settings.upload_dir.clone(),
    ))
}

fn report_use_case(settings: &Settings) -> Result<EmotionReportUseCase, Box<dyn std::error::Error>> {
    let store = SqliteResultStore::open(&settings.database_path)?;
    Ok(EmotionReportUseCase::new(
        Box::new(store),
        settings.history_page_size,
        settings.recent_limit,
    ))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn parse_min_size(value: &str) -> Result<(u32, u32), String> {
    let parse = |s: &str| {
        s.trim()
            .parse::<u32>()
            .map_err(|_| format!("invalid size '{value}', expected WxH or N"))
    };
    match value.split_once(['x', 'X']) {
        Some((w, h)) => Ok((parse(w)?, parse(h)?)),
        None => {
            let side = parse(value)?;
            Ok((side, side))
        }
    }
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading face cascade... {pct}%");
    } else {
        eprint!("\rDownloading face cascade... {downloaded} bytes");
    }
}
