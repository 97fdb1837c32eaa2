use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};

use facesense_core::capture::domain::frame_source::{
    CaptureError, CaptureHandle, FrameSource, VideoSource,
};
use facesense_core::capture::infrastructure::ffmpeg_frame_source::FfmpegFrameSource;
use facesense_core::capture::infrastructure::image_frame_source::ImageFrameSource;
use facesense_core::classification::domain::emotion::EmotionScores;
use facesense_core::classification::domain::emotion_classifier::EmotionClassifier;
use facesense_core::classification::infrastructure::onnx_emotion_classifier::OnnxEmotionClassifier;
use facesense_core::classification::infrastructure::placeholder_classifier::PlaceholderClassifier;
use facesense_core::detection::domain::face_locator::{FaceLocator, FaceSelection};
#[cfg(feature = "opencv")]
use facesense_core::detection::infrastructure::opencv_face_locator::{self, OpenCvFaceLocator};
use facesense_core::insight::domain::insight_scorer::InsightScorer;
use facesense_core::pipeline::analysis_config::AnalysisConfig;
use facesense_core::pipeline::analysis_session::{AnalysisError, AnalysisSession, FaceAnalyzer};
use facesense_core::pipeline::batch_analyzer::BatchAnalyzer;
use facesense_core::preprocessing::normalized_tensor::TensorLayout;
#[cfg(feature = "opencv")]
use facesense_core::shared::constants::{CASCADE_NAME, CASCADE_URL};
use facesense_core::shared::constants::{EMOTION_MODEL_NAME, IMAGE_EXTENSIONS};
use facesense_core::shared::model_resolver::{self, ModelResolveError, ProgressFn};

/// Exit code for a frame in which no face was found.
const EXIT_NO_FACE: i32 = 2;

/// Directory searched for bundled models next to the working directory.
const BUNDLED_MODELS_DIR: &str = "models";

/// Face emotion analysis and interview insight scoring.
#[derive(Parser)]
#[command(name = "facesense")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Capture one frame from a camera index or file and analyze it.
    Analyze {
        /// Camera index (e.g. 0) or path to a video or image.
        source: String,

        #[command(flatten)]
        opts: AnalysisOpts,
    },
    /// Map an emotion distribution (JSON object or file) to insight labels.
    Score {
        /// JSON like {"happy": 0.6, "neutral": 0.2}, or a path to such a file.
        scores_json: String,

        /// JSON config file providing insight thresholds.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Analyze stored frames concurrently.
    Batch {
        /// Image or video files.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Worker threads.
        #[arg(long, default_value = "4")]
        workers: usize,

        #[command(flatten)]
        opts: AnalysisOpts,
    },
}

#[derive(Args, Default)]
struct AnalysisOpts {
    /// JSON config file; flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Emotion model (.onnx). Resolved from the cache when omitted.
    #[arg(long)]
    model: Option<PathBuf>,

    /// URL to download the emotion model from when it is not cached.
    #[arg(long)]
    model_url: Option<String>,

    /// OpenCV Haar cascade (.xml). Looked up in the OpenCV install, then the
    /// cache, and downloaded when omitted.
    #[arg(long)]
    cascade: Option<PathBuf>,

    /// Detector window growth per pyramid level (> 1.0).
    #[arg(long)]
    scale_factor: Option<f64>,

    /// Overlapping detections required to keep a face.
    #[arg(long)]
    min_neighbors: Option<u32>,

    /// Smallest face side in pixels.
    #[arg(long)]
    min_size: Option<u32>,

    /// Face selection when several are found: first, largest, most_centered.
    #[arg(long)]
    selection: Option<FaceSelection>,

    /// Fail instead of returning placeholder scores when no model is available.
    #[arg(long)]
    require_inference: bool,

    /// Model input layout: nhwc or nchw.
    #[arg(long)]
    layout: Option<TensorLayout>,
}

fn main() {
    env_logger::init();

    match run() {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

fn run() -> Result<i32, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Analyze { source, opts } => {
            let config = load_config(&opts)?;
            let analyzer = build_analyzer(&config)?;
            run_analyze(&source, analyzer)
        }
        Command::Score {
            scores_json,
            config,
        } => {
            let config = match config {
                Some(path) => AnalysisConfig::load(&path)?,
                None => AnalysisConfig::default(),
            };
            run_score(&scores_json, InsightScorer::new(config.thresholds))
        }
        Command::Batch {
            paths,
            workers,
            opts,
        } => {
            let config = load_config(&opts)?;
            let analyzer = build_analyzer(&config)?;
            run_batch(&paths, workers, analyzer)
        }
    }
}

fn run_analyze(source: &str, analyzer: FaceAnalyzer) -> Result<i32, Box<dyn std::error::Error>> {
    let video: VideoSource = source.parse()?;
    let session = AnalysisSession::new(Arc::new(MediaFrameSource::new()), analyzer);

    match session.analyze(&video) {
        Ok(analysis) => {
            println!("{}", serde_json::to_string_pretty(&analysis)?);
            Ok(0)
        }
        Err(e @ AnalysisError::NoFaceDetected { .. }) => {
            println!("{}", serde_json::to_string_pretty(&e)?);
            log::info!("No face detected in {video}");
            Ok(EXIT_NO_FACE)
        }
        Err(e) => Err(e.into()),
    }
}

fn run_score(scores_json: &str, scorer: InsightScorer) -> Result<i32, Box<dyn std::error::Error>> {
    let text = if Path::new(scores_json).is_file() {
        std::fs::read_to_string(scores_json)?
    } else {
        scores_json.to_string()
    };
    let scores = parse_scores(&text)?;
    let output = serde_json::json!({
        "labels": scorer.score(&scores),
        "sums": scorer.sums(&scores),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(0)
}

fn run_batch(
    paths: &[PathBuf],
    workers: usize,
    analyzer: FaceAnalyzer,
) -> Result<i32, Box<dyn std::error::Error>> {
    if let Some(missing) = paths.iter().find(|p| !p.exists()) {
        return Err(format!("Input file not found: {}", missing.display()).into());
    }

    let batch = BatchAnalyzer::new(Arc::new(MediaFrameSource::new()), analyzer, workers);
    let results = batch.analyze_all(paths);

    let mut entries = Vec::with_capacity(results.len());
    for (path, result) in paths.iter().zip(&results) {
        let outcome = match result {
            Ok(analysis) => serde_json::to_value(analysis)?,
            Err(e) => serde_json::to_value(e)?,
        };
        entries.push(serde_json::json!({
            "path": path.display().to_string(),
            "result": outcome,
        }));
    }
    let failed = results.iter().filter(|r| r.is_err()).count();
    log::info!("Analyzed {} frames, {failed} without a result", results.len());

    println!("{}", serde_json::to_string_pretty(&entries)?);
    Ok(0)
}

fn parse_scores(text: &str) -> Result<EmotionScores, Box<dyn std::error::Error>> {
    let raw: BTreeMap<String, f64> = serde_json::from_str(text)?;
    Ok(EmotionScores::from_labels(
        raw.iter().map(|(label, p)| (label.as_str(), *p)),
    )?)
}

/// Config file values (or defaults), with command-line flags applied on top.
fn load_config(opts: &AnalysisOpts) -> Result<AnalysisConfig, Box<dyn std::error::Error>> {
    let mut config = match &opts.config {
        Some(path) => AnalysisConfig::load(path)?,
        None => AnalysisConfig::default(),
    };

    if let Some(v) = opts.scale_factor {
        config.detector.scale_factor = v;
    }
    if let Some(v) = opts.min_neighbors {
        config.detector.min_neighbors = v;
    }
    if let Some(v) = opts.min_size {
        config.detector.min_size = v;
    }
    if let Some(v) = opts.selection {
        config.selection = v;
    }
    if let Some(v) = opts.layout {
        config.tensor_layout = v;
    }
    if opts.require_inference {
        config.require_inference = true;
    }
    if opts.model.is_some() {
        config.model_path = opts.model.clone();
    }
    if opts.model_url.is_some() {
        config.model_url = opts.model_url.clone();
    }
    if opts.cascade.is_some() {
        config.cascade_path = opts.cascade.clone();
    }

    config.validate()?;
    Ok(config)
}

fn build_analyzer(config: &AnalysisConfig) -> Result<FaceAnalyzer, Box<dyn std::error::Error>> {
    let locator = build_locator(config)?;
    let classifier = build_classifier(config)?;
    Ok(config.configure(FaceAnalyzer::new(locator, classifier)))
}

#[cfg(feature = "opencv")]
fn build_locator(config: &AnalysisConfig) -> Result<Arc<dyn FaceLocator>, Box<dyn std::error::Error>> {
    let cascade_path = match (&config.cascade_path, opencv_face_locator::system_cascade()) {
        (Some(path), _) => path.clone(),
        (None, Some(path)) => path,
        (None, None) => model_resolver::resolve(
            CASCADE_NAME,
            Some(CASCADE_URL),
            Some(Path::new(BUNDLED_MODELS_DIR)),
            Some(download_progress("face cascade")),
        )?,
    };
    Ok(Arc::new(OpenCvFaceLocator::new(
        &cascade_path,
        config.detector.clone(),
    )?))
}

#[cfg(not(feature = "opencv"))]
fn build_locator(_config: &AnalysisConfig) -> Result<Arc<dyn FaceLocator>, Box<dyn std::error::Error>> {
    Err("face detection needs the `opencv` feature; rebuild with --features opencv".into())
}

fn build_classifier(
    config: &AnalysisConfig,
) -> Result<Arc<dyn EmotionClassifier>, Box<dyn std::error::Error>> {
    let model_path = match &config.model_path {
        Some(path) => path.clone(),
        None => {
            let resolved = model_resolver::resolve(
                EMOTION_MODEL_NAME,
                config.model_url.as_deref(),
                Some(Path::new(BUNDLED_MODELS_DIR)),
                Some(download_progress("emotion model")),
            );
            match resolved {
                Ok(path) => path,
                Err(ModelResolveError::NotFound(name)) => {
                    log::warn!("Emotion model {name} not found; scores will be placeholders");
                    return Ok(Arc::new(PlaceholderClassifier::new()));
                }
                Err(e) => return Err(e.into()),
            }
        }
    };
    Ok(Arc::new(OnnxEmotionClassifier::new(
        &model_path,
        config.tensor_layout,
    )?))
}

/// Decodes still images with `image` and everything else through ffmpeg.
struct MediaFrameSource {
    image: ImageFrameSource,
    ffmpeg: FfmpegFrameSource,
}

impl MediaFrameSource {
    fn new() -> Self {
        Self {
            image: ImageFrameSource::new(),
            ffmpeg: FfmpegFrameSource::new(),
        }
    }
}

impl FrameSource for MediaFrameSource {
    fn open(&self, source: &VideoSource) -> Result<Box<dyn CaptureHandle>, CaptureError> {
        match source {
            VideoSource::File(path) if is_image(path) => self.image.open(source),
            _ => self.ffmpeg.open(source),
        }
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn download_progress(label: &'static str) -> ProgressFn {
    Box::new(move |downloaded, total| {
        if total > 0 {
            let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
            eprint!("\rDownloading {label}... {pct}%");
            if downloaded >= total {
                eprintln!();
            }
        } else {
            eprint!("\rDownloading {label}... {downloaded} bytes");
        }
    })
}
