use crate::detection::domain::face_landmarks::FaceLandmarks;

/// HOG descriptor of a landmark-aligned face crop plus the aligned landmarks.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceFeatures {
    pub hog: Vec<f32>,
    pub aligned_landmarks: FaceLandmarks,
}

impl FaceFeatures {
    /// Flat classifier input: HOG values, then all x, then all y.
    pub fn to_vector(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.hog.len() + self.aligned_landmarks.points().len() * 2);
        out.extend_from_slice(&self.hog);
        out.extend(self.aligned_landmarks.xs());
        out.extend(self.aligned_landmarks.ys());
        out
    }
}

/// Square RGB crop handed to a network classifier.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceCrop {
    pub image: image::RgbImage,
}

/// How the orchestrator cuts crops for a [`CropClassifier`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CropKind {
    /// Similarity-aligned on the landmark anchors.
    Aligned,
    /// Square box around the detected face.
    FaceBox,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CropSpec {
    pub kind: CropKind,
    pub size: u32,
}

/// Classical classifier over HOG features, one output vector per face.
///
/// A `None` slot marks a face the provider produced no scores for.
pub trait FeatureClassifier: Send {
    fn classify(
        &mut self,
        features: &[FaceFeatures],
    ) -> Result<Vec<Option<Vec<f32>>>, Box<dyn std::error::Error>>;
}

/// Network classifier over face crops, one output vector per face.
pub trait CropClassifier: Send {
    fn classify(
        &mut self,
        crops: &[FaceCrop],
    ) -> Result<Vec<Option<Vec<f32>>>, Box<dyn std::error::Error>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_vector_layout() {
        let lm = FaceLandmarks::new((0..68).map(|i| (i as f32, 100.0 + i as f32)).collect()).unwrap();
        let features = FaceFeatures {
            hog: vec![0.5, 0.25],
            aligned_landmarks: lm,
        };
        let v = features.to_vector();
        assert_eq!(v.len(), 2 + 136);
        assert_eq!(v[0], 0.5);
        assert_eq!(v[2], 0.0);
        assert_eq!(v[69], 67.0);
        assert_eq!(v[70], 100.0);
    }
}
