use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::detection::domain::face_classifier::FaceFeatures;
use crate::detection::domain::face_landmarks::FaceLandmarks;
use crate::detection::domain::head_pose::PosedFace;
use crate::detection::infrastructure::onnx_provider_factory::OnnxProviderFactory;
use crate::features::hog_features::extract_face_features;
use crate::pipeline::batch_executor::{lock, BatchExecutor, SerialBatchExecutor};
use crate::pipeline::batch_planner::plan_batches;
use crate::pipeline::infrastructure::threaded_batch_executor::ThreadedBatchExecutor;
use crate::pipeline::pipeline_logger::{NullPipelineLogger, PipelineLogger, StdoutPipelineLogger};
use crate::pipeline::stage_runner::{classify_faces, detect_faces, estimate_poses, fit_landmarks};
use crate::pipeline::stage_set::{ClassifierStage, PoseStage, ProviderFactory, StageSet};
use crate::registry::resolver::{resolve, ModelNames, ResolvedConfig};
use crate::results::aggregator::{assemble, FaceRecord, FrameRecord};
use crate::results::result_table::ResultTable;
use crate::results::schema::ResultSchema;
use crate::shared::constants::{
    DEFAULT_AU_MODEL, DEFAULT_BATCH_SIZE, DEFAULT_EMOTION_MODEL, DEFAULT_FACEPOSE_MODEL, DEFAULT_FACE_MODEL,
    DEFAULT_LANDMARK_MODEL, DEFAULT_N_JOBS,
};
use crate::shared::error::{ConfigurationError, FeatError, FeatResult, InputError};
use crate::shared::face::Face;
use crate::shared::frame::Frame;
use crate::shared::stage::Stage;
use crate::video::domain::video_reader::VideoReader;
use crate::video::frame_source::{load_frames, ImageInput, StrideSampler, IN_MEMORY_SOURCE};
use crate::video::infrastructure::ffmpeg_reader::FfmpegReader;

/// Frames between progress lines when `verbose` is on.
const PROGRESS_THROTTLE_FRAMES: usize = 50;

/// Provider selection and execution parameters for a [`Detector`].
///
/// `None` disables a stage. [`Default`] is the reference configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectorConfig {
    pub face_model: Option<String>,
    pub landmark_model: Option<String>,
    pub au_model: Option<String>,
    pub emotion_model: Option<String>,
    pub facepose_model: Option<String>,
    /// Independent provider sets; batches run on this many threads.
    pub n_jobs: usize,
    pub batch_size: usize,
    /// Directory searched for model files before the user cache.
    pub model_dir: Option<PathBuf>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            face_model: Some(DEFAULT_FACE_MODEL.to_string()),
            landmark_model: Some(DEFAULT_LANDMARK_MODEL.to_string()),
            au_model: Some(DEFAULT_AU_MODEL.to_string()),
            emotion_model: Some(DEFAULT_EMOTION_MODEL.to_string()),
            facepose_model: Some(DEFAULT_FACEPOSE_MODEL.to_string()),
            n_jobs: DEFAULT_N_JOBS,
            batch_size: DEFAULT_BATCH_SIZE,
            model_dir: None,
        }
    }
}

impl DetectorConfig {
    pub fn model_names(&self) -> ModelNames {
        ModelNames {
            face: self.face_model.clone(),
            landmark: self.landmark_model.clone(),
            au: self.au_model.clone(),
            emotion: self.emotion_model.clone(),
            facepose: self.facepose_model.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        validate_positive("n_jobs", self.n_jobs)?;
        validate_positive("batch_size", self.batch_size)
    }
}

fn validate_positive(name: &'static str, value: usize) -> Result<(), ConfigurationError> {
    if value == 0 {
        return Err(ConfigurationError::InvalidParameter {
            name,
            message: "must be at least 1".to_string(),
        });
    }
    Ok(())
}

/// Facial expression analysis over images, videos and in-memory frames.
///
/// Holds `n_jobs` provider sets, each loaded once at construction and locked
/// by one worker for the duration of a request. Every result table follows
/// the schema fixed at construction.
pub struct Detector {
    config: ResolvedConfig,
    schema: ResultSchema,
    workers: Vec<Mutex<StageSet>>,
    executor: Box<dyn BatchExecutor>,
    batch_size: usize,
}

impl Detector {
    /// Resolves the selection and loads ONNX providers for every enabled stage.
    pub fn new(config: DetectorConfig) -> FeatResult<Self> {
        let factory = OnnxProviderFactory::new(config.model_dir.clone());
        Self::with_factory(config, &factory)
    }

    /// Like [`Detector::new`] with caller-supplied providers.
    pub fn with_factory(config: DetectorConfig, factory: &dyn ProviderFactory) -> FeatResult<Self> {
        config.validate()?;
        let resolved = resolve(&config.model_names())?;
        log::info!(
            "Models: face={} landmark={} au={} emotion={} facepose={}",
            stage_label(&resolved, Stage::Face),
            stage_label(&resolved, Stage::Landmark),
            stage_label(&resolved, Stage::ActionUnit),
            stage_label(&resolved, Stage::Emotion),
            stage_label(&resolved, Stage::FacePose),
        );

        let workers = (0..config.n_jobs)
            .map(|_| factory.build(&resolved).map(Mutex::new))
            .collect::<FeatResult<Vec<_>>>()?;
        let executor: Box<dyn BatchExecutor> = if config.n_jobs > 1 {
            Box::new(ThreadedBatchExecutor::new())
        } else {
            Box::new(SerialBatchExecutor)
        };

        Ok(Self {
            schema: ResultSchema::from_config(&resolved),
            config: resolved,
            workers,
            executor,
            batch_size: config.batch_size,
        })
    }

    /// The provider selection in effect, including any substitutions.
    pub fn info(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn schema(&self) -> &ResultSchema {
        &self.schema
    }

    /// Analyzes images in list order. `batch_size` overrides the configured
    /// one for this call; batched images must share dimensions.
    pub fn detect_image(
        &self,
        inputs: &[ImageInput],
        output_path: Option<&Path>,
        batch_size: Option<usize>,
    ) -> FeatResult<ResultTable> {
        let batch_size = batch_size.unwrap_or(self.batch_size);
        validate_positive("batch_size", batch_size)?;
        let frames = load_frames(inputs)?;
        let table = self.analyze(&frames, batch_size, &mut NullPipelineLogger)?;
        if let Some(path) = output_path {
            table.write_csv(path)?;
        }
        Ok(table)
    }

    /// Analyzes every `skip_frames`-th decoded frame of a video.
    pub fn detect_video(
        &self,
        path: &Path,
        output_path: Option<&Path>,
        skip_frames: usize,
        verbose: bool,
    ) -> FeatResult<ResultTable> {
        validate_positive("skip_frames", skip_frames)?;
        if !path.is_file() {
            return Err(InputError::NotFound(path.to_path_buf()).into());
        }
        let mut reader = FfmpegReader::new();
        let mut logger: Box<dyn PipelineLogger> = if verbose {
            Box::new(StdoutPipelineLogger::new(PROGRESS_THROTTLE_FRAMES))
        } else {
            Box::new(NullPipelineLogger)
        };
        let table = self.analyze_video(&mut reader, path, skip_frames, &mut *logger);
        reader.close();
        let table = table?;
        logger.summary();
        if let Some(output) = output_path {
            table.write_csv(output)?;
        }
        Ok(table)
    }

    /// Decodes lazily and analyzes sampled frames in chunks of
    /// `n_jobs * batch_size`, so memory stays bounded for long videos.
    fn analyze_video(
        &self,
        reader: &mut dyn VideoReader,
        path: &Path,
        skip_frames: usize,
        logger: &mut dyn PipelineLogger,
    ) -> FeatResult<ResultTable> {
        let decode_error = |message: String| InputError::Decode {
            path: path.to_path_buf(),
            message,
        };
        let metadata = reader.open(path).map_err(|e| decode_error(e.to_string()))?;
        let expected = metadata.sampled_frames(skip_frames);
        logger.info(&format!(
            "Analyzing {} ({}x{}, {expected} of {} frames)",
            path.display(),
            metadata.width,
            metadata.height,
            metadata.total_frames
        ));

        let chunk_len = self.workers.len() * self.batch_size;
        let mut table = ResultTable::new(self.schema.clone());
        let mut chunk: Vec<Frame> = Vec::with_capacity(chunk_len);
        let mut progress = ChunkProgress {
            inner: logger,
            offset: 0,
            total: expected,
        };

        for decoded in StrideSampler::new(reader.frames(), skip_frames) {
            chunk.push(decoded.map_err(|e| decode_error(e.to_string()))?);
            if chunk.len() == chunk_len {
                table.append(self.analyze(&chunk, self.batch_size, &mut progress)?)?;
                progress.offset += chunk.len();
                chunk.clear();
            }
        }
        if !chunk.is_empty() {
            table.append(self.analyze(&chunk, self.batch_size, &mut progress)?)?;
        }
        Ok(table)
    }

    /// Analyzes already decoded frames, tagging them `counter, counter + 1, ...`
    /// under `source_name`. Returns the table and the next counter value.
    pub fn process_frame(
        &self,
        frames: &[Frame],
        source_name: &str,
        counter: usize,
    ) -> FeatResult<(ResultTable, usize)> {
        let tagged: Vec<Frame> = frames
            .iter()
            .enumerate()
            .map(|(i, f)| f.with_index(counter + i).with_source(source_name))
            .collect();
        let table = self.analyze(&tagged, self.batch_size, &mut NullPipelineLogger)?;
        Ok((table, counter + frames.len()))
    }

    fn analyze(
        &self,
        frames: &[Frame],
        batch_size: usize,
        logger: &mut dyn PipelineLogger,
    ) -> FeatResult<ResultTable> {
        let batches = plan_batches(frames, batch_size)?;
        let faces = self
            .executor
            .execute(&self.workers, &self.config, frames, &batches, logger)?;
        let records = frames
            .iter()
            .zip(faces)
            .map(|(frame, faces)| FrameRecord {
                input: frame.source().unwrap_or(IN_MEMORY_SOURCE).to_string(),
                frame: frame.index(),
                faces,
            })
            .collect();
        Ok(assemble(&self.schema, records))
    }

    /// Face boxes per frame.
    pub fn detect_faces(&self, frames: &[Frame]) -> FeatResult<Vec<Vec<Face>>> {
        self.per_batch(frames, |stages, batch, _| {
            let stage = stages.face.as_mut().ok_or(ConfigurationError::StageDisabled(Stage::Face))?;
            let records = detect_faces(stage, batch)?;
            Ok(records
                .into_iter()
                .map(|faces| faces.into_iter().map(|r| r.face).collect())
                .collect())
        })
    }

    /// Landmarks for given faces; the result mirrors `faces` exactly.
    pub fn detect_landmarks(
        &self,
        frames: &[Frame],
        faces: &[Vec<Face>],
    ) -> FeatResult<Vec<Vec<Option<FaceLandmarks>>>> {
        check_nesting("faces", frames.len(), faces.len())?;
        self.per_batch(frames, |stages, batch, range| {
            let detector = stages
                .landmark
                .as_mut()
                .ok_or(ConfigurationError::StageDisabled(Stage::Landmark))?;
            let mut records = face_records(&faces[range], None)?;
            fit_landmarks(&mut **detector, batch, &mut records)?;
            Ok(records
                .into_iter()
                .map(|faces| faces.into_iter().map(|r| r.landmarks).collect())
                .collect())
        })
    }

    /// Head poses. An integrated provider detects its own faces and ignores
    /// `faces` and `landmarks`; otherwise poses are solved from `landmarks`
    /// and paired with `faces`.
    pub fn detect_facepose(
        &self,
        frames: &[Frame],
        faces: &[Vec<Face>],
        landmarks: &[Vec<Option<FaceLandmarks>>],
    ) -> FeatResult<Vec<Vec<PosedFace>>> {
        if !self.config.uses_integrated_pose() {
            check_nesting("faces", frames.len(), faces.len())?;
        }
        self.per_batch(frames, |stages, batch, range| {
            let records = match stages.pose.as_mut() {
                None => return Err(ConfigurationError::StageDisabled(Stage::FacePose).into()),
                Some(PoseStage::Integrated) => {
                    let stage = stages.face.as_mut().ok_or(ConfigurationError::StageDisabled(Stage::Face))?;
                    detect_faces(stage, batch)?
                }
                Some(PoseStage::FromLandmarks(estimator)) => {
                    let mut records = face_records(&faces[range.clone()], Some(landmarks_for(landmarks, range)?))?;
                    estimate_poses(&mut **estimator, batch, &mut records)?;
                    records
                }
            };
            Ok(records
                .into_iter()
                .map(|faces| {
                    faces
                        .into_iter()
                        .map(|r| PosedFace {
                            face: r.face,
                            pose: r.pose,
                        })
                        .collect()
                })
                .collect())
        })
    }

    /// One AU vector per face, `None` where the face could not be scored.
    pub fn detect_aus(
        &self,
        frames: &[Frame],
        faces: &[Vec<Face>],
        landmarks: &[Vec<Option<FaceLandmarks>>],
    ) -> FeatResult<Vec<Vec<Option<Vec<f32>>>>> {
        let width = self.config.au.map_or(0, |m| m.column_names().len());
        self.classify_stage(Stage::ActionUnit, width, frames, faces, landmarks, |s| s.au.as_mut())
    }

    /// One emotion probability vector per face.
    pub fn detect_emotions(
        &self,
        frames: &[Frame],
        faces: &[Vec<Face>],
        landmarks: &[Vec<Option<FaceLandmarks>>],
    ) -> FeatResult<Vec<Vec<Option<Vec<f32>>>>> {
        let width = self.config.emotion.map_or(0, |m| m.column_names().len());
        self.classify_stage(Stage::Emotion, width, frames, faces, landmarks, |s| s.emotion.as_mut())
    }

    /// Aligned HOG features per face, as fed to the HOG classifiers. Needs
    /// no provider.
    pub fn extract_features(
        &self,
        frames: &[Frame],
        faces: &[Vec<Face>],
        landmarks: &[Vec<Option<FaceLandmarks>>],
    ) -> FeatResult<Vec<Vec<Option<FaceFeatures>>>> {
        check_nesting("faces", frames.len(), faces.len())?;
        let records = face_records(faces, Some(landmarks))?;
        frames
            .iter()
            .zip(&records)
            .map(|(frame, records)| {
                let image = frame.to_rgb_image();
                records
                    .iter()
                    .map(|r| match (image.as_ref(), r.landmarks.as_ref()) {
                        (Some(image), Some(lm)) => {
                            extract_face_features(image, lm).map_err(|e| FeatError::provider(Stage::ActionUnit, e))
                        }
                        _ => Ok(None),
                    })
                    .collect()
            })
            .collect()
    }

    fn classify_stage(
        &self,
        stage: Stage,
        width: usize,
        frames: &[Frame],
        faces: &[Vec<Face>],
        landmarks: &[Vec<Option<FaceLandmarks>>],
        select: impl Fn(&mut StageSet) -> Option<&mut ClassifierStage>,
    ) -> FeatResult<Vec<Vec<Option<Vec<f32>>>>> {
        check_nesting("faces", frames.len(), faces.len())?;
        self.per_batch(frames, |stages, batch, range| {
            let classifier = select(stages).ok_or(ConfigurationError::StageDisabled(stage))?;
            let records = face_records(&faces[range.clone()], Some(landmarks_for(landmarks, range)?))?;
            classify_faces(stage, classifier, width, batch, &records)
        })
    }

    /// Runs `run` on each planned batch with the first provider set, passing
    /// the batch's frames and their positions, and concatenates the results.
    fn per_batch<T>(
        &self,
        frames: &[Frame],
        mut run: impl FnMut(&mut StageSet, &[Frame], Range<usize>) -> FeatResult<Vec<T>>,
    ) -> FeatResult<Vec<T>> {
        let batches = plan_batches(frames, self.batch_size)?;
        let mut stages = match self.workers.first() {
            Some(set) => lock(set)?,
            None => return Ok(Vec::new()),
        };
        let mut out = Vec::with_capacity(frames.len());
        for batch in &batches {
            out.extend(run(&mut *stages, batch.frames(frames), batch.positions.clone())?);
        }
        Ok(out)
    }
}

/// Reports chunk-local progress against the whole video.
struct ChunkProgress<'a> {
    inner: &'a mut dyn PipelineLogger,
    offset: usize,
    total: usize,
}

impl PipelineLogger for ChunkProgress<'_> {
    fn progress(&mut self, current: usize, _total: usize) {
        let done = self.offset + current;
        self.inner.progress(done, self.total.max(done));
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.inner.timing(stage, duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.inner.metric(name, value);
    }

    fn info(&mut self, message: &str) {
        self.inner.info(message);
    }
}

fn stage_label(config: &ResolvedConfig, stage: Stage) -> &'static str {
    config.model_key(stage).unwrap_or("none")
}

fn check_nesting(name: &'static str, frames: usize, given: usize) -> Result<(), ConfigurationError> {
    if frames != given {
        return Err(ConfigurationError::InvalidParameter {
            name,
            message: format!("expected one entry per frame ({frames}), got {given}"),
        });
    }
    Ok(())
}

fn landmarks_for(
    landmarks: &[Vec<Option<FaceLandmarks>>],
    range: Range<usize>,
) -> Result<&[Vec<Option<FaceLandmarks>>], ConfigurationError> {
    landmarks
        .get(range)
        .ok_or_else(|| ConfigurationError::InvalidParameter {
            name: "landmarks",
            message: "fewer entries than frames".to_string(),
        })
}

/// Pairs faces with optional landmarks, which must share their nesting.
fn face_records(
    faces: &[Vec<Face>],
    landmarks: Option<&[Vec<Option<FaceLandmarks>>]>,
) -> Result<Vec<Vec<FaceRecord>>, ConfigurationError> {
    let mut records: Vec<Vec<FaceRecord>> = faces
        .iter()
        .map(|faces| faces.iter().copied().map(FaceRecord::new).collect())
        .collect();
    if let Some(landmarks) = landmarks {
        if landmarks.len() != faces.len() || landmarks.iter().zip(faces).any(|(l, f)| l.len() != f.len()) {
            return Err(ConfigurationError::InvalidParameter {
                name: "landmarks",
                message: "must have one entry per face".to_string(),
            });
        }
        for (frame_records, frame_landmarks) in records.iter_mut().zip(landmarks) {
            for (record, lm) in frame_records.iter_mut().zip(frame_landmarks) {
                record.landmarks = lm.clone();
            }
        }
    }
    Ok(records)
}
