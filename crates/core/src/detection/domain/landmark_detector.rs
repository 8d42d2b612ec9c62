use crate::detection::domain::face_landmarks::FaceLandmarks;
use crate::shared::face::Face;
use crate::shared::frame::Frame;

/// Domain interface for landmark localization.
///
/// `faces[i]` are the faces detected in `frames[i]`; the result mirrors that
/// nesting exactly. A `None` slot marks a face the provider could not fit.
pub trait LandmarkDetector: Send {
    fn detect(
        &mut self,
        frames: &[Frame],
        faces: &[Vec<Face>],
    ) -> Result<Vec<Vec<Option<FaceLandmarks>>>, Box<dyn std::error::Error>>;
}
