use crate::detection::domain::face_landmarks::FaceLandmarks;
use crate::detection::domain::head_pose::HeadPose;
use crate::results::result_table::{ResultRow, ResultTable};
use crate::results::schema::{ColumnGroup, ResultSchema};
use crate::shared::face::Face;

/// Everything inferred for one face of one frame. `None` marks a stage that
/// had no usable output for this face.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceRecord {
    pub face: Face,
    pub landmarks: Option<FaceLandmarks>,
    pub aus: Option<Vec<f32>>,
    pub emotions: Option<Vec<f32>>,
    pub pose: Option<HeadPose>,
}

impl FaceRecord {
    pub fn new(face: Face) -> Self {
        Self {
            face,
            landmarks: None,
            aus: None,
            emotions: None,
            pose: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FrameRecord {
    pub input: String,
    pub frame: usize,
    pub faces: Vec<FaceRecord>,
}

/// Flattens per-frame records into table rows, frame order then face order.
/// The row count is the total number of faces; a frame without faces adds none.
pub fn assemble(schema: &ResultSchema, frames: Vec<FrameRecord>) -> ResultTable {
    let mut table = ResultTable::new(schema.clone());
    for record in frames {
        for (face_index, face) in record.faces.iter().enumerate() {
            table.push(ResultRow {
                input: record.input.clone(),
                frame: record.frame,
                face_index,
                values: face_values(schema, face),
            });
        }
    }
    table
}

fn face_values(schema: &ResultSchema, record: &FaceRecord) -> Vec<f32> {
    let mut values = vec![f32::NAN; schema.value_len()];
    let face = &record.face;

    fill(schema, &mut values, ColumnGroup::FaceBox, Some(&[face.x, face.y, face.width, face.height]));
    fill(schema, &mut values, ColumnGroup::FaceScore, Some(&[face.score]));

    let landmarks: Option<Vec<f32>> = record.landmarks.as_ref().map(|lm| lm.xs().chain(lm.ys()).collect());
    fill(schema, &mut values, ColumnGroup::Landmarks, landmarks.as_deref());
    fill(schema, &mut values, ColumnGroup::ActionUnits, record.aus.as_deref());
    fill(schema, &mut values, ColumnGroup::Emotions, record.emotions.as_deref());
    let pose = record.pose.map(|p| p.to_array());
    fill(schema, &mut values, ColumnGroup::Pose, pose.as_ref().map(|p| &p[..]));
    values
}

/// Copies `source` into the group's columns; absent sources and disabled
/// groups leave NaN in place.
fn fill(schema: &ResultSchema, values: &mut [f32], group: ColumnGroup, source: Option<&[f32]>) {
    if let (Some(range), Some(source)) = (schema.range(group), source) {
        debug_assert_eq!(range.len(), source.len(), "{group:?} width mismatch");
        values[range].copy_from_slice(source);
    }
}
