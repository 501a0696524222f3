use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, Float64Array, Float64Builder, Int64Array, Int64Builder, ListArray,
    ListBuilder, StringArray, StringBuilder,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use ndarray::{ArrayD, IxDyn};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;

use super::model::{AxisValues, Dataset, MeasurementAxis};
use crate::error::{Result, StorageError};

const ROLE_COORD: &str = "coord";
const ROLE_DATA: &str = "data";

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

/// Load a dataset from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` – one row per coordinate / data variable (recommended)
/// * `.json`    – the serde representation of [`Dataset`]
pub fn load_file(path: &Path) -> Result<Dataset> {
    match extension_of(path).as_str() {
        "parquet" | "pq" => load_parquet(path),
        "json" => load_json(path),
        other => Err(StorageError::UnsupportedFormat(other.to_string())),
    }
}

/// Write a dataset to a file, choosing the format from the extension.
pub fn save_file(dataset: &Dataset, path: &Path) -> Result<()> {
    match extension_of(path).as_str() {
        "parquet" | "pq" => save_parquet(dataset, path),
        "json" => save_json(dataset, path),
        other => Err(StorageError::UnsupportedFormat(other.to_string())),
    }
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

fn load_json(path: &Path) -> Result<Dataset> {
    let file = File::open(path).map_err(|e| StorageError::io(path, e))?;
    let dataset: Dataset = serde_json::from_reader(BufReader::new(file))?;
    revalidate(dataset)
}

fn save_json(dataset: &Dataset, path: &Path) -> Result<()> {
    let file = File::create(path).map_err(|e| StorageError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, dataset)?;
    writer.flush().map_err(|e| StorageError::io(path, e))
}

/// Deserialized datasets skip `add_variable`; run its checks again.
fn revalidate(dataset: Dataset) -> Result<Dataset> {
    let mut checked = Dataset::new(dataset.coords().clone());
    for (name, var) in dataset.variables() {
        checked.add_variable(name, var.dims.clone(), var.values.clone())?;
    }
    Ok(checked)
}

// ---------------------------------------------------------------------------
// Parquet
// ---------------------------------------------------------------------------

/// Parquet layout: one row per coordinate or data variable.
///
/// - `role`:   `coord` | `data`
/// - `name`:   coordinate / variable name
/// - `dims`:   List<Utf8> – dimension names (a coordinate lists itself)
/// - `shape`:  List<Int64>
/// - `values`: List<Float64>, null for label and count coordinates
/// - `labels`: List<Utf8>, null unless the coordinate holds labels
///
/// A coordinate row with both `values` and `labels` null is a count axis
/// whose size is `shape[0]`.
fn schema() -> SchemaRef {
    let list_of = |dt: DataType| DataType::List(Arc::new(Field::new("item", dt, true)));
    Arc::new(Schema::new(vec![
        Field::new("role", DataType::Utf8, false),
        Field::new("name", DataType::Utf8, false),
        Field::new("dims", list_of(DataType::Utf8), false),
        Field::new("shape", list_of(DataType::Int64), false),
        Field::new("values", list_of(DataType::Float64), true),
        Field::new("labels", list_of(DataType::Utf8), true),
    ]))
}

struct RowBuilder {
    role: StringBuilder,
    name: StringBuilder,
    dims: ListBuilder<StringBuilder>,
    shape: ListBuilder<Int64Builder>,
    values: ListBuilder<Float64Builder>,
    labels: ListBuilder<StringBuilder>,
}

impl RowBuilder {
    fn new() -> Self {
        Self {
            role: StringBuilder::new(),
            name: StringBuilder::new(),
            dims: ListBuilder::new(StringBuilder::new()),
            shape: ListBuilder::new(Int64Builder::new()),
            values: ListBuilder::new(Float64Builder::new()),
            labels: ListBuilder::new(StringBuilder::new()),
        }
    }

    /// Start a row. Exactly one of the `values*` and one of the `labels*`
    /// calls must follow.
    fn begin(&mut self, role: &str, name: &str, dims: &[String], shape: &[usize]) {
        self.role.append_value(role);
        self.name.append_value(name);
        for d in dims {
            self.dims.values().append_value(d);
        }
        self.dims.append(true);
        for &n in shape {
            self.shape.values().append_value(n as i64);
        }
        self.shape.append(true);
    }

    fn values(&mut self, values: impl IntoIterator<Item = f64>) {
        for v in values {
            self.values.values().append_value(v);
        }
        self.values.append(true);
    }

    fn no_values(&mut self) {
        self.values.append(false);
    }

    fn labels(&mut self, labels: &[String]) {
        for l in labels {
            self.labels.values().append_value(l);
        }
        self.labels.append(true);
    }

    fn no_labels(&mut self) {
        self.labels.append(false);
    }

    fn finish(mut self) -> Result<RecordBatch> {
        let columns: Vec<ArrayRef> = vec![
            Arc::new(self.role.finish()),
            Arc::new(self.name.finish()),
            Arc::new(self.dims.finish()),
            Arc::new(self.shape.finish()),
            Arc::new(self.values.finish()),
            Arc::new(self.labels.finish()),
        ];
        Ok(RecordBatch::try_new(schema(), columns)?)
    }
}

fn save_parquet(dataset: &Dataset, path: &Path) -> Result<()> {
    let mut rows = RowBuilder::new();

    for (name, axis) in dataset.coords().iter() {
        rows.begin(ROLE_COORD, name, &[name.to_string()], &[axis.len()]);
        match axis {
            AxisValues::Values(v) => {
                rows.values(v.iter().copied());
                rows.no_labels();
            }
            AxisValues::Labels(l) => {
                rows.no_values();
                rows.labels(l);
            }
            AxisValues::Count(_) => {
                rows.no_values();
                rows.no_labels();
            }
        }
    }
    for (name, var) in dataset.variables() {
        rows.begin(ROLE_DATA, name, &var.dims, var.shape());
        rows.values(var.values.iter().copied());
        rows.no_labels();
    }

    let batch = rows.finish()?;
    let file = File::create(path).map_err(|e| StorageError::io(path, e))?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn load_parquet(path: &Path) -> Result<Dataset> {
    let file = File::open(path).map_err(|e| StorageError::io(path, e))?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

    let mut coords = MeasurementAxis::new();
    let mut data: Vec<(String, Vec<String>, ArrayD<f64>)> = Vec::new();

    for batch_result in reader {
        let batch = batch_result?;
        let role = string_column(&batch, "role")?;
        let name = string_column(&batch, "name")?;
        let dims = list_column(&batch, "dims")?;
        let shape = list_column(&batch, "shape")?;
        let values = list_column(&batch, "values")?;
        let labels = list_column(&batch, "labels")?;

        for row in 0..batch.num_rows() {
            let row_name = name.value(row).to_string();
            let row_shape = extract_usize_list(shape, row)?;
            let row_values = (!values.is_null(row))
                .then(|| extract_f64_list(values, row))
                .transpose()?;

            match role.value(row) {
                ROLE_COORD => {
                    let axis = if let Some(v) = row_values {
                        AxisValues::Values(v)
                    } else if !labels.is_null(row) {
                        AxisValues::Labels(extract_string_list(labels, row)?)
                    } else {
                        AxisValues::Count(row_shape.first().copied().unwrap_or(0))
                    };
                    coords.insert(row_name, axis);
                }
                ROLE_DATA => {
                    let flat = row_values.ok_or_else(|| {
                        StorageError::InvalidDataset(format!("variable '{row_name}' has no values"))
                    })?;
                    let array = ArrayD::from_shape_vec(IxDyn(&row_shape), flat)?;
                    data.push((row_name, extract_string_list(dims, row)?, array));
                }
                other => {
                    return Err(StorageError::InvalidDataset(format!(
                        "row {row}: unknown role '{other}'"
                    )))
                }
            }
        }
    }

    let mut dataset = Dataset::new(coords);
    for (name, dims, array) in data {
        dataset.add_variable(name, dims, array)?;
    }
    Ok(dataset)
}

// -- Arrow helpers --

fn column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef> {
    batch
        .column_by_name(name)
        .ok_or_else(|| StorageError::InvalidDataset(format!("parquet file missing '{name}' column")))
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    column(batch, name)?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| StorageError::InvalidDataset(format!("column '{name}' is not Utf8")))
}

fn list_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ListArray> {
    column(batch, name)?
        .as_any()
        .downcast_ref::<ListArray>()
        .ok_or_else(|| StorageError::InvalidDataset(format!("column '{name}' is not a List")))
}

/// Null entries are read back as NaN.
fn extract_f64_list(col: &ListArray, row: usize) -> Result<Vec<f64>> {
    let values = col.value(row);
    let arr = values
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(|| {
            StorageError::InvalidDataset(format!(
                "row {row}: expected Float64 list, got {:?}",
                values.data_type()
            ))
        })?;
    Ok(arr.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}

fn extract_usize_list(col: &ListArray, row: usize) -> Result<Vec<usize>> {
    let values = col.value(row);
    let arr = values
        .as_any()
        .downcast_ref::<Int64Array>()
        .ok_or_else(|| StorageError::InvalidDataset(format!("row {row}: shape is not Int64")))?;
    arr.iter()
        .map(|v| match v {
            Some(n) if n >= 0 => Ok(n as usize),
            other => Err(StorageError::InvalidDataset(format!(
                "row {row}: invalid extent {other:?}"
            ))),
        })
        .collect()
}

fn extract_string_list(col: &ListArray, row: usize) -> Result<Vec<String>> {
    let values = col.value(row);
    let arr = values
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| StorageError::InvalidDataset(format!("row {row}: expected Utf8 list")))?;
    Ok(arr
        .iter()
        .map(|s| s.unwrap_or_default().to_string())
        .collect())
}

#[cfg(test)]
mod tests {
    use ndarray::{Array, IxDyn};
    use tempfile::TempDir;

    use super::*;
    use crate::data::model::QUBIT_DIM;

    fn sample() -> Dataset {
        let coords = MeasurementAxis::new()
            .with(QUBIT_DIM, vec!["qA1".to_string(), "qA2".to_string()])
            .with("t", vec![16.0, 32.0, 48.0])
            .with("repetition", 2usize);
        let dims = vec![QUBIT_DIM.to_string(), "t".into(), "repetition".into()];
        let mut ds = Dataset::new(coords);
        for (name, offset) in [("I", 0.0), ("Q", 100.0)] {
            let values = Array::from_iter((0..12).map(|i| i as f64 + offset))
                .into_shape_with_order(IxDyn(&[2, 3, 2]))
                .unwrap();
            ds.add_variable(name, dims.clone(), values).unwrap();
        }
        ds
    }

    #[test]
    fn parquet_file_preserves_coordinates_and_variables() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("ds.parquet");
        let ds = sample();

        save_file(&ds, &path).unwrap();
        let loaded = load_file(&path).unwrap();

        assert_eq!(loaded, ds);
        assert_eq!(loaded.coord("repetition"), Some(&AxisValues::Count(2)));
        assert_eq!(loaded.variable("Q").unwrap().values[[1, 2, 1]], 111.0);
    }

    #[test]
    fn json_file_preserves_dataset() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("ds.json");
        let ds = sample();

        save_file(&ds, &path).unwrap();
        assert_eq!(load_file(&path).unwrap(), ds);
    }

    #[test]
    fn json_file_with_inconsistent_shape_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("ds.json");
        let mut raw = serde_json::to_value(sample()).unwrap();
        raw["coords"]["axes"][1][1] = serde_json::json!({ "values": [1.0] });
        std::fs::write(&path, raw.to_string()).unwrap();

        let err = load_file(&path).unwrap_err();
        assert!(matches!(err, StorageError::InvalidDataset(_)));
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        let err = load_file(Path::new("ds.h5")).unwrap_err();
        assert!(matches!(err, StorageError::UnsupportedFormat(ref e) if e == "h5"));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_file(Path::new("/nonexistent/ds.parquet")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/ds.parquet"));
    }
}
