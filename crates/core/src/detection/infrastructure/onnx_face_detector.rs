/// Face localization (and optionally head pose) through ONNX Runtime.
///
/// Serves every face provider in the registry. Models are exported with
/// their anchor decoding baked in and emit one `[B, K, C]` tensor: per
/// candidate `x1, y1, x2, y2, score` in letterboxed input pixels, followed
/// by `pitch, roll, yaw` in degrees for the integrated pose models.
use std::path::Path;

use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::head_pose::{HeadPose, IntegratedPoseDetector, PosedFace};
use crate::detection::infrastructure::onnx_session::{
    build_session, declared_input_size, letterbox_batch, require_output, Letterbox, Normalization,
};
use crate::shared::face::{Face, DEFAULT_IOU_THRESHOLD};
use crate::shared::frame::Frame;

/// Fallback input side when the model's input shape is dynamic.
const DEFAULT_INPUT_SIZE: u32 = 640;

pub const DEFAULT_CONFIDENCE: f32 = 0.5;

const BOX_VALUES: usize = 5;
const POSE_VALUES: usize = 3;

pub struct OnnxFaceDetector {
    session: ort::session::Session,
    input_size: u32,
    confidence: f32,
    with_pose: bool,
}

impl OnnxFaceDetector {
    pub fn new(model_path: &Path, confidence: f32, with_pose: bool) -> Result<Self, Box<dyn std::error::Error>> {
        let session = build_session(model_path)?;
        let input_size = declared_input_size(&session).unwrap_or(DEFAULT_INPUT_SIZE);
        Ok(Self {
            session,
            input_size,
            confidence,
            with_pose,
        })
    }

    fn run(&mut self, frames: &[Frame]) -> Result<Vec<Vec<PosedFace>>, Box<dyn std::error::Error>> {
        if frames.is_empty() {
            return Ok(Vec::new());
        }
        let (tensor, letterboxes) = letterbox_batch(frames, self.input_size, Normalization::UNIT);
        let input_value = ort::value::Tensor::from_array(tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        require_output(outputs.len(), "face")?;
        let detections = outputs[0].try_extract_array::<f32>()?;
        let shape = detections.shape().to_vec();
        if shape.len() != 3 || shape[0] != frames.len() {
            return Err(format!("unexpected face model output shape: {shape:?}").into());
        }
        let data = detections
            .as_slice()
            .ok_or("face model output is not contiguous")?;

        let layout = OutputLayout {
            candidates: shape[1],
            values: shape[2],
        };
        decode(data, layout, frames, &letterboxes, self.confidence, self.with_pose)
    }
}

impl FaceDetector for OnnxFaceDetector {
    fn detect(&mut self, frames: &[Frame]) -> Result<Vec<Vec<Face>>, Box<dyn std::error::Error>> {
        Ok(self
            .run(frames)?
            .into_iter()
            .map(|faces| faces.into_iter().map(|p| p.face).collect())
            .collect())
    }
}

impl IntegratedPoseDetector for OnnxFaceDetector {
    fn detect(&mut self, frames: &[Frame]) -> Result<Vec<Vec<PosedFace>>, Box<dyn std::error::Error>> {
        if !self.with_pose {
            return Err("face model was loaded without a pose head".into());
        }
        self.run(frames)
    }
}

#[derive(Clone, Copy, Debug)]
struct OutputLayout {
    candidates: usize,
    values: usize,
}

/// Filters by confidence, maps back to frame pixels and suppresses overlaps.
fn decode(
    data: &[f32],
    layout: OutputLayout,
    frames: &[Frame],
    letterboxes: &[Letterbox],
    confidence: f32,
    with_pose: bool,
) -> Result<Vec<Vec<PosedFace>>, Box<dyn std::error::Error>> {
    let needed = if with_pose { BOX_VALUES + POSE_VALUES } else { BOX_VALUES };
    if layout.values < needed {
        return Err(format!(
            "face model emits {} values per candidate, need {needed}",
            layout.values
        )
        .into());
    }

    let per_frame = layout.candidates * layout.values;
    let mut out = Vec::with_capacity(frames.len());
    for (b, (frame, lb)) in frames.iter().zip(letterboxes).enumerate() {
        let rows = &data[b * per_frame..(b + 1) * per_frame];
        let mut candidates: Vec<PosedFace> = Vec::new();
        for row in rows.chunks_exact(layout.values) {
            let score = row[4];
            if !(score >= confidence) {
                continue;
            }
            let (x1, y1) = lb.to_frame(row[0], row[1]);
            let (x2, y2) = lb.to_frame(row[2], row[3]);
            let face = Face::from_corners([x1, y1, x2, y2], score).clamp_to(frame.width(), frame.height());
            if face.area() <= 0.0 {
                continue;
            }
            let pose = with_pose.then(|| HeadPose::new(row[5], row[6], row[7]));
            candidates.push(PosedFace { face, pose });
        }
        out.push(suppress(candidates));
    }
    Ok(out)
}

fn suppress(candidates: Vec<PosedFace>) -> Vec<PosedFace> {
    let faces: Vec<Face> = candidates.iter().map(|p| p.face).collect();
    let kept = Face::suppress_overlaps(&faces, DEFAULT_IOU_THRESHOLD);
    kept.into_iter()
        .filter_map(|k| candidates.iter().find(|p| p.face == k).copied())
        .collect()
}
