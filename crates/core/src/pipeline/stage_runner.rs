use std::time::Instant;

use image::RgbImage;

use crate::detection::domain::face_classifier::{CropKind, CropSpec, FaceCrop};
use crate::detection::domain::face_landmarks::FaceLandmarks;
use crate::detection::domain::head_pose::LandmarkPoseEstimator;
use crate::detection::domain::landmark_detector::LandmarkDetector;
use crate::features::face_aligner::align_face;
use crate::features::face_crop::square_face_crop;
use crate::features::hog_features::extract_face_features;
use crate::pipeline::stage_set::{ClassifierStage, FaceStage, PoseStage, StageSet};
use crate::registry::resolver::ResolvedConfig;
use crate::results::aggregator::FaceRecord;
use crate::shared::error::{FeatError, FeatResult};
use crate::shared::face::Face;
use crate::shared::frame::Frame;
use crate::shared::stage::Stage;

/// Per-frame face records for one batch, plus how long each stage took.
#[derive(Debug, Default)]
pub struct BatchOutput {
    pub faces: Vec<Vec<FaceRecord>>,
    pub timings: Vec<(Stage, f64)>,
}

/// Runs every enabled stage over one batch, in dependency order:
/// face, landmark, pose, action units, emotions.
///
/// Provider output is checked for cardinality (one entry per frame and per
/// face) and classifier width before it reaches the records; a violation is
/// a [`FeatError::Provider`].
pub fn run_batch(stages: &mut StageSet, config: &ResolvedConfig, frames: &[Frame]) -> FeatResult<BatchOutput> {
    let mut output = BatchOutput {
        faces: vec![Vec::new(); frames.len()],
        timings: Vec::new(),
    };

    let Some(face_stage) = stages.face.as_mut() else {
        return Ok(output);
    };
    let start = Instant::now();
    output.faces = detect_faces(face_stage, frames)?;
    output.timings.push((Stage::Face, elapsed_ms(start)));

    if let Some(detector) = stages.landmark.as_mut() {
        let start = Instant::now();
        fit_landmarks(&mut **detector, frames, &mut output.faces)?;
        output.timings.push((Stage::Landmark, elapsed_ms(start)));
    }

    if let Some(PoseStage::FromLandmarks(estimator)) = stages.pose.as_mut() {
        let start = Instant::now();
        estimate_poses(&mut **estimator, frames, &mut output.faces)?;
        output.timings.push((Stage::FacePose, elapsed_ms(start)));
    }

    if let Some(stage) = stages.au.as_mut() {
        let start = Instant::now();
        let width = config.au.map_or(0, |m| m.column_names().len());
        let scores = classify_faces(Stage::ActionUnit, stage, width, frames, &output.faces)?;
        for (records, frame_scores) in output.faces.iter_mut().zip(scores) {
            for (record, values) in records.iter_mut().zip(frame_scores) {
                record.aus = values;
            }
        }
        output.timings.push((Stage::ActionUnit, elapsed_ms(start)));
    }

    if let Some(stage) = stages.emotion.as_mut() {
        let start = Instant::now();
        let width = config.emotion.map_or(0, |m| m.column_names().len());
        let scores = classify_faces(Stage::Emotion, stage, width, frames, &output.faces)?;
        for (records, frame_scores) in output.faces.iter_mut().zip(scores) {
            for (record, values) in records.iter_mut().zip(frame_scores) {
                record.emotions = values;
            }
        }
        output.timings.push((Stage::Emotion, elapsed_ms(start)));
    }

    Ok(output)
}

/// Fills `landmarks` on every record from one provider call.
pub(crate) fn fit_landmarks(
    detector: &mut dyn LandmarkDetector,
    frames: &[Frame],
    records: &mut [Vec<FaceRecord>],
) -> FeatResult<()> {
    let boxes: Vec<Vec<Face>> = records
        .iter()
        .map(|faces| faces.iter().map(|r| r.face).collect())
        .collect();
    let landmarks = detector
        .detect(frames, &boxes)
        .map_err(|e| FeatError::provider(Stage::Landmark, e))?;
    check_cardinality(Stage::Landmark, &landmarks, records)?;
    for (frame_records, frame_landmarks) in records.iter_mut().zip(landmarks) {
        for (record, lm) in frame_records.iter_mut().zip(frame_landmarks) {
            record.landmarks = lm;
        }
    }
    Ok(())
}

/// Fills `pose` on every record from its landmarks.
pub(crate) fn estimate_poses(
    estimator: &mut dyn LandmarkPoseEstimator,
    frames: &[Frame],
    records: &mut [Vec<FaceRecord>],
) -> FeatResult<()> {
    let landmarks: Vec<Vec<Option<FaceLandmarks>>> = records
        .iter()
        .map(|faces| faces.iter().map(|r| r.landmarks.clone()).collect())
        .collect();
    let poses = estimator
        .estimate(frames, &landmarks)
        .map_err(|e| FeatError::provider(Stage::FacePose, e))?;
    check_cardinality(Stage::FacePose, &poses, records)?;
    for (frame_records, frame_poses) in records.iter_mut().zip(poses) {
        for (record, pose) in frame_records.iter_mut().zip(frame_poses) {
            record.pose = pose;
        }
    }
    Ok(())
}

pub(crate) fn detect_faces(stage: &mut FaceStage, frames: &[Frame]) -> FeatResult<Vec<Vec<FaceRecord>>> {
    let records: Vec<Vec<FaceRecord>> = match stage {
        FaceStage::Standalone(detector) => detector
            .detect(frames)
            .map_err(|e| FeatError::provider(Stage::Face, e))?
            .into_iter()
            .map(|faces| faces.into_iter().map(FaceRecord::new).collect())
            .collect(),
        FaceStage::Integrated(detector) => detector
            .detect(frames)
            .map_err(|e| FeatError::provider(Stage::Face, e))?
            .into_iter()
            .map(|faces| {
                faces
                    .into_iter()
                    .map(|posed| FaceRecord {
                        pose: posed.pose,
                        ..FaceRecord::new(posed.face)
                    })
                    .collect()
            })
            .collect(),
    };
    if records.len() != frames.len() {
        return Err(FeatError::provider(
            Stage::Face,
            format!("returned {} results for {} frames", records.len(), frames.len()),
        ));
    }
    Ok(records)
}

fn check_cardinality<T>(stage: Stage, output: &[Vec<T>], faces: &[Vec<FaceRecord>]) -> FeatResult<()> {
    if output.len() != faces.len() {
        return Err(FeatError::provider(
            stage,
            format!("returned {} results for {} frames", output.len(), faces.len()),
        ));
    }
    for (frame, (out, expected)) in output.iter().zip(faces).enumerate() {
        if out.len() != expected.len() {
            return Err(FeatError::provider(
                stage,
                format!(
                    "returned {} results for {} faces in batch frame {frame}",
                    out.len(),
                    expected.len()
                ),
            ));
        }
    }
    Ok(())
}

/// Lazily decoded `image` buffers for the frames of a batch.
struct FrameImages<'a> {
    frames: &'a [Frame],
    images: Vec<Option<Option<RgbImage>>>,
}

impl<'a> FrameImages<'a> {
    fn new(frames: &'a [Frame]) -> Self {
        Self {
            frames,
            images: vec![None; frames.len()],
        }
    }

    fn get(&mut self, position: usize) -> Option<&RgbImage> {
        let frames = self.frames;
        self.images[position]
            .get_or_insert_with(|| frames[position].to_rgb_image())
            .as_ref()
    }
}

/// Scores every face that has the inputs the classifier needs, mirroring
/// the frame/face nesting of `faces`. Faces without them get `None`.
pub(crate) fn classify_faces(
    stage: Stage,
    classifier: &mut ClassifierStage,
    width: usize,
    frames: &[Frame],
    faces: &[Vec<FaceRecord>],
) -> FeatResult<Vec<Vec<Option<Vec<f32>>>>> {
    let mut images = FrameImages::new(frames);
    let (slots, scores) = match classifier {
        ClassifierStage::Features(model) => {
            let mut slots = Vec::new();
            let mut features = Vec::new();
            for (fi, records) in faces.iter().enumerate() {
                for (k, record) in records.iter().enumerate() {
                    let (Some(lm), Some(image)) = (record.landmarks.as_ref(), images.get(fi)) else {
                        continue;
                    };
                    if let Some(f) = extract_face_features(image, lm).map_err(|e| FeatError::provider(stage, e))? {
                        slots.push((fi, k));
                        features.push(f);
                    }
                }
            }
            let scores = model
                .classify(&features)
                .map_err(|e| FeatError::provider(stage, e))?;
            (slots, scores)
        }
        ClassifierStage::Crops { classifier, crop } => {
            let mut slots = Vec::new();
            let mut crops = Vec::new();
            for (fi, records) in faces.iter().enumerate() {
                for (k, record) in records.iter().enumerate() {
                    if let Some(image) = face_crop(*crop, &frames[fi], &mut images, fi, record) {
                        slots.push((fi, k));
                        crops.push(FaceCrop { image });
                    }
                }
            }
            let scores = classifier
                .classify(&crops)
                .map_err(|e| FeatError::provider(stage, e))?;
            (slots, scores)
        }
    };

    if scores.len() != slots.len() {
        return Err(FeatError::provider(
            stage,
            format!("returned {} results for {} faces", scores.len(), slots.len()),
        ));
    }
    if let Some(bad) = scores.iter().flatten().find(|s| s.len() != width) {
        return Err(FeatError::provider(
            stage,
            format!("returned {} values per face, expected {width}", bad.len()),
        ));
    }

    let mut out: Vec<Vec<Option<Vec<f32>>>> = faces.iter().map(|f| vec![None; f.len()]).collect();
    for ((fi, k), values) in slots.into_iter().zip(scores) {
        out[fi][k] = values;
    }
    Ok(out)
}

fn face_crop(
    spec: CropSpec,
    frame: &Frame,
    images: &mut FrameImages<'_>,
    position: usize,
    record: &FaceRecord,
) -> Option<RgbImage> {
    match spec.kind {
        CropKind::Aligned => {
            let lm = record.landmarks.as_ref()?;
            align_face(images.get(position)?, lm, spec.size).map(|a| a.image)
        }
        CropKind::FaceBox => square_face_crop(frame, &record.face, spec.size).map(|c| c.image),
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::{fake_stage_set, frames, reference_config, FakeFaces};

    #[test]
    fn test_faces_flow_through_every_stage() {
        let config = reference_config("rf");
        let mut stages = fake_stage_set(&config, FakeFaces::PerFrame(vec![1, 2]));
        let frames = frames(2, 64, 48);
        let out = run_batch(&mut stages, &config, &frames).unwrap();

        assert_eq!(out.faces.len(), 2);
        assert_eq!(out.faces[0].len(), 1);
        assert_eq!(out.faces[1].len(), 2);
        let record = &out.faces[1][1];
        assert!(record.landmarks.is_some());
        assert!(record.pose.is_some());
        assert_eq!(record.aus.as_ref().unwrap().len(), 20);
        assert_eq!(record.emotions.as_ref().unwrap().len(), 7);
        let stages_timed: Vec<Stage> = out.timings.iter().map(|(s, _)| *s).collect();
        assert_eq!(
            stages_timed,
            vec![Stage::Face, Stage::Landmark, Stage::FacePose, Stage::ActionUnit, Stage::Emotion]
        );
    }

    #[test]
    fn test_network_au_width_checked() {
        let config = reference_config("jaanet");
        let mut stages = fake_stage_set(&config, FakeFaces::PerFrame(vec![1]));
        let out = run_batch(&mut stages, &config, &frames(1, 64, 48)).unwrap();
        assert_eq!(out.faces[0][0].aus.as_ref().unwrap().len(), 12);
    }

    #[test]
    fn test_face_count_mismatch_is_provider_error() {
        let config = reference_config("rf");
        let mut stages = fake_stage_set(&config, FakeFaces::Broken);
        let err = run_batch(&mut stages, &config, &frames(2, 64, 48)).unwrap_err();
        assert!(matches!(err, FeatError::Provider { stage: Stage::Face, .. }));
    }

    #[test]
    fn test_no_face_stage_yields_empty_frames() {
        let config = reference_config("rf");
        let mut stages = StageSet::default();
        let out = run_batch(&mut stages, &config, &frames(3, 8, 8)).unwrap();
        assert_eq!(out.faces.len(), 3);
        assert!(out.faces.iter().all(Vec::is_empty));
    }

    #[test]
    fn test_classifier_width_mismatch_is_provider_error() {
        // A 12-wide network AU config against fakes sized for the 20-wide schema
        let wide = reference_config("rf");
        let narrow = reference_config("jaanet");
        let mut stages = fake_stage_set(&wide, FakeFaces::PerFrame(vec![1]));
        let err = run_batch(&mut stages, &narrow, &frames(1, 64, 48)).unwrap_err();
        assert!(matches!(err, FeatError::Provider { stage: Stage::ActionUnit, .. }));
    }
}
