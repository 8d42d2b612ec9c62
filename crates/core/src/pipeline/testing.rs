//! Deterministic in-process providers for orchestration tests.
//!
//! Every output depends only on the frame's index and pixels, never on its
//! batch position, so results can be compared across batch sizes.

use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::detection::domain::face_classifier::{
    CropClassifier, CropKind, CropSpec, FaceCrop, FaceFeatures, FeatureClassifier,
};
use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::face_landmarks::FaceLandmarks;
use crate::detection::domain::head_pose::{HeadPose, IntegratedPoseDetector, LandmarkPoseEstimator, PosedFace};
use crate::detection::domain::landmark_detector::LandmarkDetector;
use crate::pipeline::stage_set::{ClassifierStage, FaceStage, PoseStage, ProviderFactory, StageSet};
use crate::registry::model_selection::ProviderFamily;
use crate::registry::resolver::{resolve, ModelNames, ResolvedConfig};
use crate::shared::error::FeatResult;
use crate::shared::face::Face;
use crate::shared::frame::Frame;

#[derive(Clone, Debug)]
pub enum FakeFaces {
    /// Face count for frame `i` is `counts[i % counts.len()]`.
    PerFrame(Vec<usize>),
    /// Returns one result list fewer than frames.
    Broken,
}

pub fn reference_config(au: &str) -> ResolvedConfig {
    resolve(&ModelNames {
        face: Some("retinaface".into()),
        landmark: Some("mobilenet".into()),
        au: Some(au.into()),
        emotion: Some("resmasknet".into()),
        facepose: Some("pnp".into()),
    })
    .unwrap()
}

/// `n` frames of `width x height` with distinct gradients.
pub fn frames(n: usize, width: u32, height: u32) -> Vec<Frame> {
    (0..n).map(|i| frame(i, width, height)).collect()
}

pub fn frame(index: usize, width: u32, height: u32) -> Frame {
    let mut data = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height as usize {
        for x in 0..width as usize {
            data.push(((x * 3 + index * 7) % 256) as u8);
            data.push(((y * 5 + index * 11) % 256) as u8);
            data.push(((x + y + index) % 256) as u8);
        }
    }
    Frame::new(data, width, height, 3, index)
}

pub fn fake_stage_set(config: &ResolvedConfig, faces: FakeFaces) -> StageSet {
    let mut set = StageSet::default();
    if config.face.is_some() {
        let detector = FakeFaceDetector { faces };
        set.face = Some(if config.uses_integrated_pose() {
            FaceStage::Integrated(Box::new(detector))
        } else {
            FaceStage::Standalone(Box::new(detector))
        });
    }
    if config.landmark.is_some() {
        set.landmark = Some(Box::new(FakeLandmarkDetector));
    }
    if let Some(au) = config.au {
        set.au = Some(classifier_stage(au.family(), au.column_names().len(), CropKind::Aligned, au.input_size()));
    }
    if let Some(emotion) = config.emotion {
        set.emotion = Some(classifier_stage(
            emotion.family(),
            emotion.column_names().len(),
            CropKind::FaceBox,
            emotion.input_size(),
        ));
    }
    if config.facepose.is_some() {
        set.pose = Some(if config.uses_integrated_pose() {
            PoseStage::Integrated
        } else {
            PoseStage::FromLandmarks(Box::new(FakePoseEstimator))
        });
    }
    set
}

fn classifier_stage(family: ProviderFamily, width: usize, kind: CropKind, size: u32) -> ClassifierStage {
    match family {
        ProviderFamily::Features => ClassifierStage::Features(Box::new(FakeFeatureClassifier { width })),
        ProviderFamily::Network => ClassifierStage::Crops {
            classifier: Box::new(FakeCropClassifier { width }),
            crop: CropSpec { kind, size },
        },
    }
}

/// Factory handing out fake stage sets and counting how many it built.
#[derive(Clone)]
pub struct FakeFactory {
    pub faces: FakeFaces,
    pub built: Arc<AtomicUsize>,
}

impl FakeFactory {
    pub fn new(faces: FakeFaces) -> Self {
        Self {
            faces,
            built: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl ProviderFactory for FakeFactory {
    fn build(&self, config: &ResolvedConfig) -> FeatResult<StageSet> {
        self.built.fetch_add(1, Ordering::SeqCst);
        Ok(fake_stage_set(config, self.faces.clone()))
    }
}

struct FakeFaceDetector {
    faces: FakeFaces,
}

impl FakeFaceDetector {
    fn faces_for(&self, frame: &Frame) -> Vec<Face> {
        let FakeFaces::PerFrame(counts) = &self.faces else {
            return Vec::new();
        };
        let count = counts[frame.index() % counts.len()];
        let y = 2.0 + (frame.index() % 5) as f32;
        (0..count)
            .map(|k| Face::new(2.0 + 14.0 * k as f32, y, 16.0, 16.0, 0.9 - 0.01 * k as f32))
            .collect()
    }
}

impl FaceDetector for FakeFaceDetector {
    fn detect(&mut self, frames: &[Frame]) -> Result<Vec<Vec<Face>>, Box<dyn Error>> {
        let mut out: Vec<Vec<Face>> = frames.iter().map(|f| self.faces_for(f)).collect();
        if matches!(self.faces, FakeFaces::Broken) {
            out.pop();
        }
        Ok(out)
    }
}

impl IntegratedPoseDetector for FakeFaceDetector {
    fn detect(&mut self, frames: &[Frame]) -> Result<Vec<Vec<PosedFace>>, Box<dyn Error>> {
        let faces = FaceDetector::detect(self, frames)?;
        Ok(faces
            .into_iter()
            .map(|faces| {
                faces
                    .into_iter()
                    .map(|face| PosedFace {
                        face,
                        pose: Some(HeadPose::new(face.x, face.y, -1.0)),
                    })
                    .collect()
            })
            .collect())
    }
}

struct FakeLandmarkDetector;

impl LandmarkDetector for FakeLandmarkDetector {
    fn detect(
        &mut self,
        frames: &[Frame],
        faces: &[Vec<Face>],
    ) -> Result<Vec<Vec<Option<FaceLandmarks>>>, Box<dyn Error>> {
        assert_eq!(frames.len(), faces.len());
        Ok(faces
            .iter()
            .map(|faces| faces.iter().map(|f| Some(landmarks_in(f))).collect())
            .collect())
    }
}

/// A spread of 68 points inside the box; eyes above mouth, nose between.
fn landmarks_in(face: &Face) -> FaceLandmarks {
    let points = (0..68)
        .map(|i| {
            let (u, v) = match i {
                36..=41 => (0.30 + 0.01 * (i - 36) as f32, 0.35),
                42..=47 => (0.65 + 0.01 * (i - 42) as f32, 0.35),
                30 => (0.5, 0.55),
                48 => (0.35, 0.75),
                54 => (0.65, 0.75),
                _ => (0.1 + 0.8 * ((i * 37) % 68) as f32 / 68.0, 0.1 + 0.8 * ((i * 53) % 68) as f32 / 68.0),
            };
            (face.x + u * face.width, face.y + v * face.height)
        })
        .collect();
    FaceLandmarks::new(points).unwrap()
}

struct FakePoseEstimator;

impl LandmarkPoseEstimator for FakePoseEstimator {
    fn estimate(
        &mut self,
        _frames: &[Frame],
        landmarks: &[Vec<Option<FaceLandmarks>>],
    ) -> Result<Vec<Vec<Option<HeadPose>>>, Box<dyn Error>> {
        Ok(landmarks
            .iter()
            .map(|faces| {
                faces
                    .iter()
                    .map(|lm| lm.as_ref().map(|lm| HeadPose::new(lm.point(30).0, lm.point(30).1, 0.0)))
                    .collect()
            })
            .collect())
    }
}

struct FakeFeatureClassifier {
    width: usize,
}

impl FeatureClassifier for FakeFeatureClassifier {
    fn classify(&mut self, features: &[FaceFeatures]) -> Result<Vec<Option<Vec<f32>>>, Box<dyn Error>> {
        Ok(features
            .iter()
            .map(|f| {
                let mean = f.hog.iter().sum::<f32>() / f.hog.len().max(1) as f32;
                Some(vec![mean; self.width])
            })
            .collect())
    }
}

struct FakeCropClassifier {
    width: usize,
}

impl CropClassifier for FakeCropClassifier {
    fn classify(&mut self, crops: &[FaceCrop]) -> Result<Vec<Option<Vec<f32>>>, Box<dyn Error>> {
        Ok(crops
            .iter()
            .map(|c| {
                let raw = c.image.as_raw();
                let mean = raw.iter().map(|&v| v as f32).sum::<f32>() / raw.len().max(1) as f32 / 255.0;
                Some(vec![mean; self.width])
            })
            .collect())
    }
}
