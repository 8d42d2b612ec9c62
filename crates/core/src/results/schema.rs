use std::ops::Range;

use crate::registry::resolver::ResolvedConfig;
use crate::shared::constants::{
    EMOTION_NAMES, FACE_BOX_COLUMNS, FACE_SCORE_COLUMN, METADATA_COLUMNS, NUM_LANDMARKS, POSE_COLUMNS,
};

/// Logical groups of numeric columns, in schema order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColumnGroup {
    FaceBox,
    FaceScore,
    Landmarks,
    ActionUnits,
    Emotions,
    Pose,
}

/// Column layout of a result table, fixed when the detector is built.
///
/// `input` and `frame` always lead; the numeric columns that follow are
/// addressed by value index (column index minus the metadata columns).
#[derive(Clone, Debug, PartialEq)]
pub struct ResultSchema {
    columns: Vec<String>,
    groups: Vec<(ColumnGroup, Range<usize>)>,
}

impl ResultSchema {
    pub fn from_config(config: &ResolvedConfig) -> Self {
        let mut builder = SchemaBuilder::default();
        if config.face.is_some() {
            builder.push(ColumnGroup::FaceBox, FACE_BOX_COLUMNS.iter().map(|c| c.to_string()));
            builder.push(ColumnGroup::FaceScore, std::iter::once(FACE_SCORE_COLUMN.to_string()));
        }
        if config.landmark.is_some() {
            builder.push(ColumnGroup::Landmarks, landmark_columns());
        }
        if let Some(au) = config.au {
            builder.push(ColumnGroup::ActionUnits, au.column_names().iter().map(|c| c.to_string()));
        }
        if let Some(emotion) = config.emotion {
            builder.push(ColumnGroup::Emotions, emotion.column_names().iter().map(|c| c.to_string()));
        }
        if config.facepose.is_some() {
            builder.push(ColumnGroup::Pose, POSE_COLUMNS.iter().map(|c| c.to_string()));
        }
        builder.finish()
    }

    /// Rebuilds a schema from a persisted header row.
    pub fn from_header(header: &[String]) -> Result<Self, String> {
        if header.len() < METADATA_COLUMNS.len()
            || header[..METADATA_COLUMNS.len()] != METADATA_COLUMNS.map(String::from)
        {
            return Err(format!("header must start with {METADATA_COLUMNS:?}"));
        }
        let mut builder = SchemaBuilder::default();
        let mut current: Option<(ColumnGroup, Vec<String>)> = None;
        for name in &header[METADATA_COLUMNS.len()..] {
            let group = classify_column(name).ok_or_else(|| format!("unrecognized column `{name}`"))?;
            match current.as_mut() {
                Some((g, names)) if *g == group => names.push(name.clone()),
                _ => {
                    if let Some((g, names)) = current.take() {
                        builder.push(g, names.into_iter());
                    }
                    current = Some((group, vec![name.clone()]));
                }
            }
        }
        if let Some((g, names)) = current {
            builder.push(g, names.into_iter());
        }
        Ok(builder.finish())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Number of numeric columns after the metadata columns.
    pub fn value_len(&self) -> usize {
        self.columns.len() - METADATA_COLUMNS.len()
    }

    pub fn value_names(&self) -> &[String] {
        &self.columns[METADATA_COLUMNS.len()..]
    }

    /// Value-index range of a group, `None` when its stage is disabled.
    pub fn range(&self, group: ColumnGroup) -> Option<Range<usize>> {
        self.groups
            .iter()
            .find(|(g, _)| *g == group)
            .map(|(_, r)| r.clone())
    }

    pub fn value_index(&self, name: &str) -> Option<usize> {
        self.value_names().iter().position(|c| c == name)
    }
}

#[derive(Default)]
struct SchemaBuilder {
    values: Vec<String>,
    groups: Vec<(ColumnGroup, Range<usize>)>,
}

impl SchemaBuilder {
    fn push(&mut self, group: ColumnGroup, names: impl Iterator<Item = String>) {
        let start = self.values.len();
        self.values.extend(names);
        self.groups.push((group, start..self.values.len()));
    }

    fn finish(self) -> ResultSchema {
        let mut columns: Vec<String> = METADATA_COLUMNS.iter().map(|c| c.to_string()).collect();
        columns.extend(self.values);
        ResultSchema {
            columns,
            groups: self.groups,
        }
    }
}

fn landmark_columns() -> impl Iterator<Item = String> {
    (0..NUM_LANDMARKS)
        .map(|i| format!("x_{i}"))
        .chain((0..NUM_LANDMARKS).map(|i| format!("y_{i}")))
}

fn classify_column(name: &str) -> Option<ColumnGroup> {
    if FACE_BOX_COLUMNS.contains(&name) {
        Some(ColumnGroup::FaceBox)
    } else if name == FACE_SCORE_COLUMN {
        Some(ColumnGroup::FaceScore)
    } else if POSE_COLUMNS.contains(&name) {
        Some(ColumnGroup::Pose)
    } else if EMOTION_NAMES.contains(&name) {
        Some(ColumnGroup::Emotions)
    } else if name.starts_with("AU") {
        Some(ColumnGroup::ActionUnits)
    } else if is_landmark_column(name) {
        Some(ColumnGroup::Landmarks)
    } else {
        None
    }
}

fn is_landmark_column(name: &str) -> bool {
    let rest = name.strip_prefix("x_").or_else(|| name.strip_prefix("y_"));
    rest.and_then(|r| r.parse::<usize>().ok())
        .is_some_and(|i| i < NUM_LANDMARKS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::resolver::{resolve, ModelNames};

    fn config(au: &str, pose: Option<&str>) -> ResolvedConfig {
        resolve(&ModelNames {
            face: Some("retinaface".into()),
            landmark: Some("mobilenet".into()),
            au: Some(au.into()),
            emotion: Some("resmasknet".into()),
            facepose: pose.map(String::from),
        })
        .unwrap()
    }

    #[test]
    fn test_reference_configuration_has_173_columns() {
        let schema = ResultSchema::from_config(&config("rf", Some("pnp")));
        assert_eq!(schema.len(), 173);
        assert_eq!(&schema.columns()[..3], &["input", "frame", "FaceRectX"]);
        assert_eq!(schema.columns()[7], "x_0");
        assert_eq!(schema.columns()[75], "y_0");
        assert_eq!(schema.columns()[172], "Yaw");
    }

    #[test]
    fn test_network_au_shrinks_schema() {
        let schema = ResultSchema::from_config(&config("jaanet", Some("pnp")));
        assert_eq!(schema.len(), 165);
        assert_eq!(schema.range(ColumnGroup::ActionUnits).unwrap().len(), 12);
    }

    #[test]
    fn test_disabled_stage_columns_omitted() {
        let schema = ResultSchema::from_config(&config("rf", None));
        assert_eq!(schema.len(), 170);
        assert!(schema.range(ColumnGroup::Pose).is_none());
        assert!(schema.value_index("Pitch").is_none());
    }

    #[test]
    fn test_value_ranges_are_contiguous() {
        let schema = ResultSchema::from_config(&config("rf", Some("pnp")));
        assert_eq!(schema.range(ColumnGroup::FaceBox), Some(0..4));
        assert_eq!(schema.range(ColumnGroup::FaceScore), Some(4..5));
        assert_eq!(schema.range(ColumnGroup::Landmarks), Some(5..141));
        assert_eq!(schema.range(ColumnGroup::ActionUnits), Some(141..161));
        assert_eq!(schema.range(ColumnGroup::Emotions), Some(161..168));
        assert_eq!(schema.range(ColumnGroup::Pose), Some(168..171));
        assert_eq!(schema.value_len(), 171);
    }

    #[test]
    fn test_header_round_trip() {
        let schema = ResultSchema::from_config(&config("svm", Some("pnp")));
        let rebuilt = ResultSchema::from_header(schema.columns()).unwrap();
        assert_eq!(rebuilt, schema);
    }

    #[test]
    fn test_header_rejects_unknown_columns() {
        let header: Vec<String> = ["input", "frame", "mystery"].map(String::from).to_vec();
        assert!(ResultSchema::from_header(&header).is_err());
        let header: Vec<String> = ["frame", "input"].map(String::from).to_vec();
        assert!(ResultSchema::from_header(&header).is_err());
    }
}
