use crate::detection::domain::face_classifier::{CropClassifier, CropSpec, FeatureClassifier};
use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::head_pose::{IntegratedPoseDetector, LandmarkPoseEstimator};
use crate::detection::domain::landmark_detector::LandmarkDetector;
use crate::registry::resolver::ResolvedConfig;
use crate::shared::error::FeatResult;

/// Where face boxes come from.
pub enum FaceStage {
    Standalone(Box<dyn FaceDetector>),
    /// Boxes and poses from one provider; the pose stage reads the poses.
    Integrated(Box<dyn IntegratedPoseDetector>),
}

pub enum PoseStage {
    /// Poses were produced by [`FaceStage::Integrated`].
    Integrated,
    FromLandmarks(Box<dyn LandmarkPoseEstimator>),
}

pub enum ClassifierStage {
    /// HOG features of the landmark-aligned crop.
    Features(Box<dyn FeatureClassifier>),
    Crops {
        classifier: Box<dyn CropClassifier>,
        crop: CropSpec,
    },
}

/// One worker's providers. A worker owns its set exclusively for a request.
#[derive(Default)]
pub struct StageSet {
    pub face: Option<FaceStage>,
    pub landmark: Option<Box<dyn LandmarkDetector>>,
    pub au: Option<ClassifierStage>,
    pub emotion: Option<ClassifierStage>,
    pub pose: Option<PoseStage>,
}

/// Builds provider sets for a resolved configuration.
///
/// Called once per worker, so each call must return independent instances.
pub trait ProviderFactory {
    fn build(&self, config: &ResolvedConfig) -> FeatResult<StageSet>;
}
