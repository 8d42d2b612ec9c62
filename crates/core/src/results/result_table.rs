use std::io::{Read, Write};
use std::path::Path;

use crate::results::schema::{ColumnGroup, ResultSchema};
use crate::shared::error::{FeatError, FeatResult};

/// One detected face. A frame without faces contributes no rows.
#[derive(Clone, Debug, PartialEq)]
pub struct ResultRow {
    pub input: String,
    pub frame: usize,
    /// Position of the face in its frame's detector output.
    pub face_index: usize,
    /// Numeric columns in schema order.
    pub values: Vec<f32>,
}

/// Borrowed view of one column group across all rows.
#[derive(Debug)]
pub struct GroupView<'a> {
    pub columns: &'a [String],
    pub rows: Vec<&'a [f32]>,
}

/// A non-finite value left in a row by a provider sentinel or a NaN output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InferenceAnomaly {
    pub row: usize,
    pub column: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResultTable {
    schema: ResultSchema,
    rows: Vec<ResultRow>,
}

impl ResultTable {
    pub fn new(schema: ResultSchema) -> Self {
        Self {
            schema,
            rows: Vec::new(),
        }
    }

    pub fn from_rows(schema: ResultSchema, rows: Vec<ResultRow>) -> FeatResult<Self> {
        if let Some(bad) = rows.iter().find(|r| r.values.len() != schema.value_len()) {
            return Err(FeatError::Schema(format!(
                "row for {} frame {} has {} values, schema expects {}",
                bad.input,
                bad.frame,
                bad.values.len(),
                schema.value_len()
            )));
        }
        Ok(Self { schema, rows })
    }

    pub fn schema(&self) -> &ResultSchema {
        &self.schema
    }

    pub fn columns(&self) -> &[String] {
        self.schema.columns()
    }

    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// `(rows, columns)`, counting the metadata columns.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.schema.len())
    }

    pub fn inputs(&self) -> Vec<&str> {
        self.rows.iter().map(|r| r.input.as_str()).collect()
    }

    /// Values of a numeric column, `frame` included.
    pub fn column(&self, name: &str) -> Option<Vec<f32>> {
        if name == "frame" {
            return Some(self.rows.iter().map(|r| r.frame as f32).collect());
        }
        let index = self.schema.value_index(name)?;
        Some(self.rows.iter().map(|r| r.values[index]).collect())
    }

    pub fn group(&self, group: ColumnGroup) -> Option<GroupView<'_>> {
        let range = self.schema.range(group)?;
        Some(GroupView {
            columns: &self.schema.value_names()[range.clone()],
            rows: self.rows.iter().map(|r| &r.values[range.clone()]).collect(),
        })
    }

    pub fn faceboxes(&self) -> Option<GroupView<'_>> {
        self.group(ColumnGroup::FaceBox)
    }

    pub fn landmarks(&self) -> Option<GroupView<'_>> {
        self.group(ColumnGroup::Landmarks)
    }

    pub fn aus(&self) -> Option<GroupView<'_>> {
        self.group(ColumnGroup::ActionUnits)
    }

    pub fn emotions(&self) -> Option<GroupView<'_>> {
        self.group(ColumnGroup::Emotions)
    }

    pub fn facepose(&self) -> Option<GroupView<'_>> {
        self.group(ColumnGroup::Pose)
    }

    /// Appends another table's rows; both must share one schema.
    pub fn append(&mut self, other: ResultTable) -> FeatResult<()> {
        if other.schema != self.schema {
            return Err(FeatError::Schema(format!(
                "cannot append a {}-column table to a {}-column table",
                other.schema.len(),
                self.schema.len()
            )));
        }
        self.rows.extend(other.rows);
        Ok(())
    }

    pub(crate) fn push(&mut self, row: ResultRow) {
        debug_assert_eq!(row.values.len(), self.schema.value_len());
        self.rows.push(row);
    }

    /// Every non-finite value, in row then column order.
    pub fn anomalies(&self) -> Vec<InferenceAnomaly> {
        let names = self.schema.value_names();
        self.rows
            .iter()
            .enumerate()
            .flat_map(|(i, r)| {
                r.values
                    .iter()
                    .zip(names)
                    .filter(|(v, _)| !v.is_finite())
                    .map(move |(_, name)| InferenceAnomaly {
                        row: i,
                        column: name.clone(),
                    })
            })
            .collect()
    }

    pub fn write_csv(&self, path: &Path) -> FeatResult<()> {
        let file = std::fs::File::create(path)?;
        self.write_csv_to(std::io::BufWriter::new(file))
    }

    /// Writes a header row then one record per row; missing values are `NaN`.
    pub fn write_csv_to<W: Write>(&self, writer: W) -> FeatResult<()> {
        let mut csv = csv::Writer::from_writer(writer);
        csv.write_record(self.schema.columns())?;
        for row in &self.rows {
            let mut record = Vec::with_capacity(self.schema.len());
            record.push(row.input.clone());
            record.push(row.frame.to_string());
            record.extend(row.values.iter().map(f32::to_string));
            csv.write_record(&record)?;
        }
        csv.flush()?;
        Ok(())
    }

    pub fn read_csv(path: &Path) -> FeatResult<Self> {
        let file = std::fs::File::open(path)?;
        Self::read_csv_from(std::io::BufReader::new(file))
    }

    /// Reads a table written by [`ResultTable::write_csv_to`]. Empty cells
    /// read as NaN. Face indices are rebuilt from row order.
    pub fn read_csv_from<R: Read>(reader: R) -> FeatResult<Self> {
        let mut csv = csv::Reader::from_reader(reader);
        let header: Vec<String> = csv.headers()?.iter().map(String::from).collect();
        let schema = ResultSchema::from_header(&header).map_err(FeatError::Schema)?;

        let mut rows: Vec<ResultRow> = Vec::new();
        for (line, record) in csv.records().enumerate() {
            let record = record?;
            let input = record.get(0).unwrap_or_default().to_string();
            let frame = record
                .get(1)
                .unwrap_or_default()
                .parse::<usize>()
                .map_err(|e| FeatError::Schema(format!("row {line}: bad frame value: {e}")))?;
            let values = record
                .iter()
                .skip(2)
                .map(parse_value)
                .collect::<Result<Vec<f32>, _>>()
                .map_err(|e| FeatError::Schema(format!("row {line}: {e}")))?;

            let face_index = rows
                .iter()
                .rev()
                .take_while(|r| r.input == input && r.frame == frame)
                .count();
            rows.push(ResultRow {
                input,
                frame,
                face_index,
                values,
            });
        }

        Self::from_rows(schema, rows)
    }
}

fn parse_value(cell: &str) -> Result<f32, String> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Ok(f32::NAN);
    }
    cell.parse::<f32>()
        .map_err(|e| format!("bad value `{cell}`: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::resolver::{resolve, ModelNames};
    use tempfile::TempDir;

    fn schema() -> ResultSchema {
        let config = resolve(&ModelNames {
            face: Some("retinaface".into()),
            landmark: Some("mobilenet".into()),
            au: Some("jaanet".into()),
            emotion: Some("resmasknet".into()),
            facepose: Some("pnp".into()),
        })
        .unwrap();
        ResultSchema::from_config(&config)
    }

    fn row(schema: &ResultSchema, input: &str, frame: usize, face_index: usize, fill: f32) -> ResultRow {
        ResultRow {
            input: input.into(),
            frame,
            face_index,
            values: vec![fill; schema.value_len()],
        }
    }

    fn sample() -> ResultTable {
        let schema = schema();
        let rows = vec![
            row(&schema, "a.jpg", 0, 0, 0.25),
            row(&schema, "a.jpg", 0, 1, 0.5),
            row(&schema, "b.jpg", 1, 0, 0.75),
        ];
        ResultTable::from_rows(schema, rows).unwrap()
    }

    #[test]
    fn test_shape_counts_metadata_columns() {
        assert_eq!(sample().shape(), (3, 165));
    }

    #[test]
    fn test_group_views_slice_rows() {
        let table = sample();
        let aus = table.aus().unwrap();
        assert_eq!(aus.columns.len(), 12);
        assert_eq!(aus.columns[0], "AU01");
        assert_eq!(aus.rows.len(), 3);
        assert_eq!(aus.rows[1], &[0.5; 12][..]);
        assert_eq!(table.facepose().unwrap().columns, &["Pitch", "Roll", "Yaw"]);
    }

    #[test]
    fn test_column_lookup() {
        let table = sample();
        assert_eq!(table.column("frame").unwrap(), vec![0.0, 0.0, 1.0]);
        assert_eq!(table.column("happiness").unwrap()[0], 0.25);
        assert!(table.column("AU05").is_none());
    }

    #[test]
    fn test_from_rows_rejects_wrong_width() {
        let schema = schema();
        let bad = ResultRow {
            input: "a".into(),
            frame: 0,
            face_index: 0,
            values: vec![0.0; 3],
        };
        assert!(matches!(
            ResultTable::from_rows(schema, vec![bad]),
            Err(FeatError::Schema(_))
        ));
    }

    #[test]
    fn test_append_requires_same_schema() {
        let mut table = sample();
        table.append(sample()).unwrap();
        assert_eq!(table.len(), 6);

        let other = ResultTable::new(ResultSchema::from_config(&resolve(&ModelNames::default()).unwrap()));
        assert!(table.append(other).is_err());
    }

    #[test]
    fn test_anomalies_point_at_nan_cells() {
        assert!(sample().anomalies().is_empty());

        let mut table = sample();
        let idx = table.schema().value_index("Pitch").unwrap();
        let mut broken = table.rows()[0].clone();
        broken.values[idx] = f32::NAN;
        table.push(broken);

        let anomalies = table.anomalies();
        assert_eq!(
            anomalies,
            vec![InferenceAnomaly {
                row: 3,
                column: "Pitch".into()
            }]
        );
    }

    #[test]
    fn test_csv_round_trip_preserves_nan_and_face_indices() {
        let mut table = sample();
        let idx = table.schema().value_index("Yaw").unwrap();
        let mut sentinel = table.rows()[2].clone();
        sentinel.face_index = 1;
        sentinel.values[idx] = f32::NAN;
        table.push(sentinel);

        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out.csv");
        table.write_csv(&path).unwrap();

        let read = ResultTable::read_csv(&path).unwrap();
        assert_eq!(read.columns(), table.columns());
        assert_eq!(read.shape(), table.shape());
        let indices: Vec<usize> = read.rows().iter().map(|r| r.face_index).collect();
        assert_eq!(indices, vec![0, 1, 0, 1]);
        assert!(read.rows()[3].values[idx].is_nan());
        assert_eq!(read.rows()[1].values, table.rows()[1].values);
    }

    #[test]
    fn test_csv_header_and_row_layout() {
        let mut buf = Vec::new();
        sample().write_csv_to(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("input,frame,FaceRectX,"));
        assert!(text.lines().nth(3).unwrap().starts_with("b.jpg,1,0.75,"));
    }

    #[test]
    fn test_read_accepts_empty_cells_as_nan() {
        let csv = "input,frame,FaceRectX,FaceRectY,FaceRectWidth,FaceRectHeight,FaceScore\nx.png,0,,,,,\n";
        let table = ResultTable::read_csv_from(csv.as_bytes()).unwrap();
        assert_eq!(table.shape(), (1, 7));
        assert_eq!(table.rows()[0].face_index, 0);
        assert_eq!(table.anomalies().len(), 5);
    }
}
