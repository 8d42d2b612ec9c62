//! AU and emotion classifiers backed by ONNX Runtime.
//!
//! Feature classifiers are scikit-learn style models exported to ONNX: they
//! take `[F, D]` feature rows and emit `[F, K]` scores. Crop classifiers are
//! CNNs over `[F, 3, S, S]` crops emitting `[F, K]` logits, turned into
//! probabilities by the configured activation.
use std::path::Path;

use ndarray::Array2;

use crate::detection::domain::face_classifier::{CropClassifier, FaceCrop, FaceFeatures, FeatureClassifier};
use crate::detection::infrastructure::onnx_session::{
    build_session, crops_to_nchw, require_output, sigmoid, softmax_in_place, Normalization,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Activation {
    Identity,
    Sigmoid,
    Softmax,
}

impl Activation {
    fn apply(&self, scores: &mut [f32]) {
        match self {
            Activation::Identity => {}
            Activation::Sigmoid => scores.iter_mut().for_each(|v| *v = sigmoid(*v)),
            Activation::Softmax => softmax_in_place(scores),
        }
    }
}

pub struct OnnxFeatureClassifier {
    session: ort::session::Session,
    outputs: usize,
}

impl OnnxFeatureClassifier {
    pub fn new(model_path: &Path, outputs: usize) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            session: build_session(model_path)?,
            outputs,
        })
    }
}

impl FeatureClassifier for OnnxFeatureClassifier {
    fn classify(
        &mut self,
        features: &[FaceFeatures],
    ) -> Result<Vec<Option<Vec<f32>>>, Box<dyn std::error::Error>> {
        if features.is_empty() {
            return Ok(Vec::new());
        }
        let input = feature_matrix(features)?;
        let input_value = ort::value::Tensor::from_array(input)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        require_output(outputs.len(), "classifier")?;
        let scores = outputs[0].try_extract_array::<f32>()?;
        let data = scores.as_slice().ok_or("classifier output is not contiguous")?;
        split_scores(data, features.len(), self.outputs, Activation::Identity)
    }
}

pub struct OnnxCropClassifier {
    session: ort::session::Session,
    outputs: usize,
    normalization: Normalization,
    activation: Activation,
}

impl OnnxCropClassifier {
    pub fn new(
        model_path: &Path,
        outputs: usize,
        normalization: Normalization,
        activation: Activation,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            session: build_session(model_path)?,
            outputs,
            normalization,
            activation,
        })
    }
}

impl CropClassifier for OnnxCropClassifier {
    fn classify(&mut self, crops: &[FaceCrop]) -> Result<Vec<Option<Vec<f32>>>, Box<dyn std::error::Error>> {
        if crops.is_empty() {
            return Ok(Vec::new());
        }
        let tensor = crops_to_nchw(crops.iter().map(|c| &c.image), self.normalization);
        let input_value = ort::value::Tensor::from_array(tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        require_output(outputs.len(), "classifier")?;
        let scores = outputs[0].try_extract_array::<f32>()?;
        let data = scores.as_slice().ok_or("classifier output is not contiguous")?;
        split_scores(data, crops.len(), self.outputs, self.activation)
    }
}

/// Stacks feature vectors into `[F, D]`; all faces must share `D`.
fn feature_matrix(features: &[FaceFeatures]) -> Result<Array2<f32>, Box<dyn std::error::Error>> {
    let rows: Vec<Vec<f32>> = features.iter().map(FaceFeatures::to_vector).collect();
    let dim = rows.first().map_or(0, Vec::len);
    if rows.iter().any(|r| r.len() != dim) {
        return Err("feature vectors differ in length".into());
    }
    let flat: Vec<f32> = rows.into_iter().flatten().collect();
    Ok(Array2::from_shape_vec((features.len(), dim), flat)?)
}

fn split_scores(
    data: &[f32],
    faces: usize,
    outputs: usize,
    activation: Activation,
) -> Result<Vec<Option<Vec<f32>>>, Box<dyn std::error::Error>> {
    if data.len() != faces * outputs {
        return Err(format!(
            "classifier returned {} values for {faces} faces x {outputs} outputs",
            data.len()
        )
        .into());
    }
    Ok(data
        .chunks_exact(outputs)
        .map(|chunk| {
            let mut scores = chunk.to_vec();
            activation.apply(&mut scores);
            Some(scores)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::face_landmarks::FaceLandmarks;
    use approx::assert_relative_eq;

    #[test]
    fn test_split_scores_applies_softmax_per_face() {
        let data = [0.0, 0.0, 5.0, 5.0];
        let out = split_scores(&data, 2, 2, Activation::Softmax).unwrap();
        let first = out[0].as_ref().unwrap();
        assert_relative_eq!(first[0], 0.5);
        assert_relative_eq!(out[1].as_ref().unwrap()[1], 0.5);
    }

    #[test]
    fn test_split_scores_rejects_wrong_dimension() {
        assert!(split_scores(&[0.0; 5], 2, 3, Activation::Identity).is_err());
    }

    #[test]
    fn test_feature_matrix_shape() {
        let lm = FaceLandmarks::new(vec![(1.0, 2.0); 68]).unwrap();
        let features = vec![
            FaceFeatures {
                hog: vec![0.1; 4],
                aligned_landmarks: lm.clone(),
            },
            FaceFeatures {
                hog: vec![0.2; 4],
                aligned_landmarks: lm,
            },
        ];
        let m = feature_matrix(&features).unwrap();
        assert_eq!(m.shape(), &[2, 4 + 136]);
        assert_relative_eq!(m[[1, 0]], 0.2);
        assert_relative_eq!(m[[0, 4]], 1.0);
    }
}
