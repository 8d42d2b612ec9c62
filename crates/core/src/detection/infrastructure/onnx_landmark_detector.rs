/// 68-point landmark regression through ONNX Runtime.
///
/// Every face of the batch is cut as a square crop, all crops go through the
/// network in one call, and the `[F, 136]` output (interleaved x/y,
/// normalized to the crop) is mapped back to frame pixels.
use std::path::Path;

use crate::detection::domain::face_landmarks::FaceLandmarks;
use crate::detection::domain::landmark_detector::LandmarkDetector;
use crate::detection::infrastructure::onnx_session::{build_session, crops_to_nchw, require_output, Normalization};
use crate::features::face_crop::{square_face_crop, SquareCrop};
use crate::shared::constants::NUM_LANDMARKS;
use crate::shared::face::Face;
use crate::shared::frame::Frame;

pub struct OnnxLandmarkDetector {
    session: ort::session::Session,
    input_size: u32,
    normalization: Normalization,
}

impl OnnxLandmarkDetector {
    pub fn new(
        model_path: &Path,
        input_size: u32,
        normalization: Normalization,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            session: build_session(model_path)?,
            input_size,
            normalization,
        })
    }
}

impl LandmarkDetector for OnnxLandmarkDetector {
    fn detect(
        &mut self,
        frames: &[Frame],
        faces: &[Vec<Face>],
    ) -> Result<Vec<Vec<Option<FaceLandmarks>>>, Box<dyn std::error::Error>> {
        // Crop slot per face; `None` where the box has no pixels in frame.
        let crops: Vec<Vec<Option<SquareCrop>>> = frames
            .iter()
            .zip(faces)
            .map(|(frame, frame_faces)| {
                frame_faces
                    .iter()
                    .map(|face| square_face_crop(frame, face, self.input_size))
                    .collect()
            })
            .collect();

        let valid: Vec<&SquareCrop> = crops.iter().flatten().flatten().collect();
        let predictions = if valid.is_empty() {
            Vec::new()
        } else {
            let tensor = crops_to_nchw(valid.iter().map(|c| &c.image), self.normalization);
            let input_value = ort::value::Tensor::from_array(tensor)?;
            let outputs = self.session.run(ort::inputs![input_value])?;
            require_output(outputs.len(), "landmark")?;
            let array = outputs[0].try_extract_array::<f32>()?;
            let data = array
                .as_slice()
                .ok_or("landmark model output is not contiguous")?;
            if data.len() != valid.len() * NUM_LANDMARKS * 2 {
                return Err(format!(
                    "landmark model returned {} values for {} faces",
                    data.len(),
                    valid.len()
                )
                .into());
            }
            data.chunks_exact(NUM_LANDMARKS * 2)
                .map(|v| v.to_vec())
                .collect::<Vec<_>>()
        };

        let mut next = predictions.into_iter();
        let mut out = Vec::with_capacity(crops.len());
        for frame_crops in &crops {
            let mut frame_out = Vec::with_capacity(frame_crops.len());
            for crop in frame_crops {
                let landmarks = match crop {
                    Some(crop) => {
                        let values = next.next().ok_or("landmark prediction count mismatch")?;
                        Some(to_frame_landmarks(&values, crop)?)
                    }
                    None => None,
                };
                frame_out.push(landmarks);
            }
            out.push(frame_out);
        }
        Ok(out)
    }
}

fn to_frame_landmarks(values: &[f32], crop: &SquareCrop) -> Result<FaceLandmarks, &'static str> {
    let normalized = FaceLandmarks::from_interleaved(values)?;
    Ok(normalized.map(|(nx, ny)| crop.to_frame(nx, ny)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn test_normalized_points_map_into_crop_rectangle() {
        let crop = SquareCrop {
            image: RgbImage::new(4, 4),
            x: 100.0,
            y: 50.0,
            width: 40.0,
            height: 40.0,
        };
        let mut values = vec![0.5f32; 136];
        values[0] = 0.0;
        values[1] = 1.0;
        let lm = to_frame_landmarks(&values, &crop).unwrap();
        assert_eq!(lm.point(0), (100.0, 90.0));
        assert_eq!(lm.point(1), (120.0, 70.0));
    }

    #[test]
    fn test_wrong_value_count_is_error() {
        let crop = SquareCrop {
            image: RgbImage::new(1, 1),
            x: 0.0,
            y: 0.0,
            width: 1.0,
            height: 1.0,
        };
        assert!(to_frame_landmarks(&[0.0; 10], &crop).is_err());
    }
}
