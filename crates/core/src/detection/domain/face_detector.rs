use crate::shared::face::Face;
use crate::shared::frame::Frame;

/// Domain interface for face localization.
///
/// Receives a whole batch and returns one face list per frame, in frame
/// order. Implementations may hold inference state, hence `&mut self`.
pub trait FaceDetector: Send {
    fn detect(&mut self, frames: &[Frame]) -> Result<Vec<Vec<Face>>, Box<dyn std::error::Error>>;
}
