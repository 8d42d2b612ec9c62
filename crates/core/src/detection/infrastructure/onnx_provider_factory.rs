use std::path::{Path, PathBuf};

use crate::detection::domain::face_classifier::{CropKind, CropSpec};
use crate::detection::infrastructure::onnx_classifier::{Activation, OnnxCropClassifier, OnnxFeatureClassifier};
use crate::detection::infrastructure::onnx_face_detector::{OnnxFaceDetector, DEFAULT_CONFIDENCE};
use crate::detection::infrastructure::onnx_landmark_detector::OnnxLandmarkDetector;
use crate::detection::infrastructure::onnx_session::Normalization;
use crate::detection::infrastructure::pnp_pose_estimator::PnpPoseEstimator;
use crate::pipeline::stage_set::{ClassifierStage, FaceStage, PoseStage, ProviderFactory, StageSet};
use crate::registry::model_selection::{AuModel, EmotionModel, LandmarkModel, ProviderFamily};
use crate::registry::resolver::ResolvedConfig;
use crate::shared::error::{FeatError, FeatResult};
use crate::shared::model_resolver::ModelStore;
use crate::shared::stage::Stage;

/// Loads every selected provider as an ONNX Runtime session.
///
/// Model files are looked up in `model_dir`, then the user cache, and
/// downloaded from the release URL as a last resort.
pub struct OnnxProviderFactory {
    store: ModelStore,
}

impl OnnxProviderFactory {
    pub fn new(model_dir: Option<PathBuf>) -> Self {
        Self::with_store(ModelStore::new(model_dir))
    }

    pub fn with_store(store: ModelStore) -> Self {
        Self { store }
    }

    fn model_path(&self, file: &str) -> FeatResult<PathBuf> {
        Ok(self.store.fetch(file)?)
    }
}

impl ProviderFactory for OnnxProviderFactory {
    fn build(&self, config: &ResolvedConfig) -> FeatResult<StageSet> {
        let mut set = StageSet::default();

        if let Some(face) = config.face {
            let path = self.model_path(face.model_file())?;
            let with_pose = config.uses_integrated_pose();
            let detector = OnnxFaceDetector::new(&path, DEFAULT_CONFIDENCE, with_pose)
                .map_err(|e| load_error(Stage::Face, &path, e))?;
            set.face = Some(if with_pose {
                FaceStage::Integrated(Box::new(detector))
            } else {
                FaceStage::Standalone(Box::new(detector))
            });
        }

        if let Some(landmark) = config.landmark {
            let path = self.model_path(landmark.model_file())?;
            let detector = OnnxLandmarkDetector::new(&path, landmark.input_size(), landmark_normalization(landmark))
                .map_err(|e| load_error(Stage::Landmark, &path, e))?;
            set.landmark = Some(Box::new(detector));
        }

        if let Some(au) = config.au {
            set.au = Some(self.au_stage(au)?);
        }

        if let Some(emotion) = config.emotion {
            set.emotion = Some(self.emotion_stage(emotion)?);
        }

        if config.facepose.is_some() {
            set.pose = Some(if config.uses_integrated_pose() {
                PoseStage::Integrated
            } else {
                PoseStage::FromLandmarks(Box::new(PnpPoseEstimator::new()))
            });
        }

        Ok(set)
    }
}

impl OnnxProviderFactory {
    fn au_stage(&self, au: AuModel) -> FeatResult<ClassifierStage> {
        let path = self.model_path(au.model_file())?;
        let outputs = au.column_names().len();
        let stage = match au.family() {
            ProviderFamily::Features => ClassifierStage::Features(Box::new(
                OnnxFeatureClassifier::new(&path, outputs).map_err(|e| load_error(Stage::ActionUnit, &path, e))?,
            )),
            ProviderFamily::Network => ClassifierStage::Crops {
                classifier: Box::new(
                    OnnxCropClassifier::new(&path, outputs, Normalization::UNIT, Activation::Sigmoid)
                        .map_err(|e| load_error(Stage::ActionUnit, &path, e))?,
                ),
                crop: CropSpec {
                    kind: CropKind::Aligned,
                    size: au.input_size(),
                },
            },
        };
        Ok(stage)
    }

    fn emotion_stage(&self, emotion: EmotionModel) -> FeatResult<ClassifierStage> {
        let path = self.model_path(emotion.model_file())?;
        let outputs = emotion.column_names().len();
        let stage = match emotion.family() {
            ProviderFamily::Features => ClassifierStage::Features(Box::new(
                OnnxFeatureClassifier::new(&path, outputs).map_err(|e| load_error(Stage::Emotion, &path, e))?,
            )),
            ProviderFamily::Network => ClassifierStage::Crops {
                classifier: Box::new(
                    OnnxCropClassifier::new(&path, outputs, Normalization::IMAGENET, Activation::Softmax)
                        .map_err(|e| load_error(Stage::Emotion, &path, e))?,
                ),
                crop: CropSpec {
                    kind: CropKind::FaceBox,
                    size: emotion.input_size(),
                },
            },
        };
        Ok(stage)
    }
}

fn landmark_normalization(model: LandmarkModel) -> Normalization {
    match model {
        LandmarkModel::MobileNet => Normalization::IMAGENET,
        LandmarkModel::MobileFaceNet | LandmarkModel::Pfld => Normalization::UNIT,
    }
}

fn load_error(stage: Stage, path: &Path, e: Box<dyn std::error::Error>) -> FeatError {
    FeatError::provider(stage, format!("failed to load {}: {e}", path.display()))
}
