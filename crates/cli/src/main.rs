use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;

use facefeat_core::pipeline::detector::{Detector, DetectorConfig};
use facefeat_core::results::result_table::ResultTable;
use facefeat_core::shared::constants::{
    DEFAULT_AU_MODEL, DEFAULT_BATCH_SIZE, DEFAULT_EMOTION_MODEL, DEFAULT_FACEPOSE_MODEL, DEFAULT_FACE_MODEL,
    DEFAULT_LANDMARK_MODEL, DEFAULT_N_JOBS, DEFAULT_SKIP_FRAMES, IMAGE_EXTENSIONS,
};
use facefeat_core::video::frame_source::ImageInput;

/// Facial expression analysis for images and videos.
///
/// Writes one CSV row per detected face with box, landmarks, action units,
/// emotions and head pose.
#[derive(Parser)]
#[command(name = "facefeat")]
struct Cli {
    /// Input video or image file(s).
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output CSV file. Prints a summary only when omitted.
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Face detector ("none" disables the stage).
    #[arg(long, default_value = DEFAULT_FACE_MODEL)]
    face_model: String,

    /// Landmark detector.
    #[arg(long, default_value = DEFAULT_LANDMARK_MODEL)]
    landmark_model: String,

    /// Action unit model: jaanet, drml, logistic, svm, rf.
    #[arg(long, default_value = DEFAULT_AU_MODEL)]
    au_model: String,

    /// Emotion model: resmasknet, fer, svm, rf.
    #[arg(long, default_value = DEFAULT_EMOTION_MODEL)]
    emotion_model: String,

    /// Head pose model: pnp, img2pose, img2pose-c.
    #[arg(long, default_value = DEFAULT_FACEPOSE_MODEL)]
    facepose_model: String,

    /// Frames per provider call. Images of different sizes need 1.
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Analyze every Nth video frame.
    #[arg(long, default_value_t = DEFAULT_SKIP_FRAMES)]
    skip_frames: usize,

    /// Parallel workers, each with its own set of models.
    #[arg(long, default_value_t = DEFAULT_N_JOBS)]
    n_jobs: usize,

    /// Directory searched for model files before the cache.
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Report progress and per-stage timings for videos.
    #[arg(long, short)]
    verbose: bool,
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
    validate(&cli)?;

    let detector = Detector::new(detector_config(&cli))?;
    for substitution in &detector.info().substitutions {
        log::warn!(
            "{} model set to {}: {}",
            substitution.stage,
            substitution.resolved,
            substitution.reason
        );
    }

    let output = cli.output.as_deref();
    let table = if is_image(&cli.inputs[0]) {
        let inputs: Vec<ImageInput> = cli.inputs.iter().map(|p| ImageInput::from(p.as_path())).collect();
        detector.detect_image(&inputs, output, None)?
    } else {
        detector.detect_video(&cli.inputs[0], output, cli.skip_frames, cli.verbose)?
    };

    report(&table, output);
    Ok(())
}

fn detector_config(cli: &Cli) -> DetectorConfig {
    DetectorConfig {
        face_model: Some(cli.face_model.clone()),
        landmark_model: Some(cli.landmark_model.clone()),
        au_model: Some(cli.au_model.clone()),
        emotion_model: Some(cli.emotion_model.clone()),
        facepose_model: Some(cli.facepose_model.clone()),
        n_jobs: cli.n_jobs,
        batch_size: cli.batch_size,
        model_dir: cli.model_dir.clone(),
    }
}

fn report(table: &ResultTable, output: Option<&Path>) {
    let (faces, columns) = table.shape();
    let mut inputs = table.inputs();
    inputs.dedup();
    log::info!("{faces} face(s) found in {} input(s), {columns} columns", inputs.len());

    let anomalies = table.anomalies();
    if !anomalies.is_empty() {
        log::warn!("{} value(s) could not be computed (NaN)", anomalies.len());
    }
    match output {
        Some(path) => log::info!("Results written to {}", path.display()),
        None => println!("{faces} rows x {columns} columns"),
    }
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    for input in &cli.inputs {
        if !input.exists() {
            return Err(format!("Input file not found: {}", input.display()).into());
        }
    }
    let images = cli.inputs.iter().filter(|p| is_image(p)).count();
    if images != cli.inputs.len() && cli.inputs.len() > 1 {
        return Err("Only one video can be analyzed at a time, and it cannot be mixed with images".into());
    }
    if cli.batch_size == 0 {
        return Err("Batch size must be at least 1".into());
    }
    if cli.skip_frames == 0 {
        return Err("Skip frames must be at least 1".into());
    }
    if cli.n_jobs == 0 {
        return Err("Number of jobs must be at least 1".into());
    }
    if let Some(dir) = &cli.model_dir {
        if !dir.is_dir() {
            return Err(format!("Model directory not found: {}", dir.display()).into());
        }
    }
    Ok(())
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}
