use crate::detection::domain::face_landmarks::FaceLandmarks;
use crate::shared::face::Face;
use crate::shared::frame::Frame;

/// Head rotation in degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HeadPose {
    pub pitch: f32,
    pub roll: f32,
    pub yaw: f32,
}

impl HeadPose {
    pub fn new(pitch: f32, roll: f32, yaw: f32) -> Self {
        Self { pitch, roll, yaw }
    }

    pub fn to_array(&self) -> [f32; 3] {
        [self.pitch, self.roll, self.yaw]
    }
}

/// A face localized together with its pose by a single provider pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PosedFace {
    pub face: Face,
    pub pose: Option<HeadPose>,
}

/// Provider that returns face boxes and head poses from one call.
///
/// When selected it is the only source of faces for the request.
pub trait IntegratedPoseDetector: Send {
    fn detect(&mut self, frames: &[Frame])
        -> Result<Vec<Vec<PosedFace>>, Box<dyn std::error::Error>>;
}

/// Estimates head pose from already-fitted landmarks.
pub trait LandmarkPoseEstimator: Send {
    fn estimate(
        &mut self,
        frames: &[Frame],
        landmarks: &[Vec<Option<FaceLandmarks>>],
    ) -> Result<Vec<Vec<Option<HeadPose>>>, Box<dyn std::error::Error>>;
}
