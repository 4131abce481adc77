use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{
    Array, AsArray, BooleanArray, Date32Array, Float32Array, Float64Array, Int32Array,
    Int64Array, LargeListArray, ListArray, StringArray,
};
use arrow::datatypes::DataType;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{MetadataValue, SpikeDataset, Unit};

/// Column holding each unit's spike times (per-unit layout).
pub const TIMES_COLUMN: &str = "spike_times";
/// Column holding each unit's spike depths (per-unit layout, optional).
pub const DEPTHS_COLUMN: &str = "spike_depths";

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a spike dataset from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` – one row per unit, `spike_times` / `spike_depths` list columns
/// * `.json`    – `[{ "spike_times": [...], "spike_depths": [...], ...meta }, ...]`
/// * `.csv`     – either one row per unit with semicolon-separated lists, or
///   one row per spike with `unit`, `spike_time` and optional `spike_depth`
pub fn load_file(path: &Path) -> Result<SpikeDataset> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let dataset = match ext.as_str() {
        "parquet" | "pq" => load_parquet(path),
        "json" => load_json(path),
        "csv" => load_csv(path),
        other => bail!("Unsupported file extension: .{other}"),
    }?;

    log::debug!(
        "{} units, {} spikes read from {}",
        dataset.len(),
        dataset.units.iter().map(Unit::spike_count).sum::<usize>(),
        path.display()
    );
    Ok(dataset)
}

/// Build a unit after checking that depths, if any, line up with times.
fn make_unit(
    spike_times: Vec<f64>,
    spike_depths: Vec<f64>,
    metadata: BTreeMap<String, MetadataValue>,
    row: usize,
) -> Result<Unit> {
    if !spike_depths.is_empty() && spike_depths.len() != spike_times.len() {
        bail!(
            "Row {row}: {TIMES_COLUMN} has {} values but {DEPTHS_COLUMN} has {}",
            spike_times.len(),
            spike_depths.len()
        );
    }
    Ok(Unit {
        spike_times,
        spike_depths,
        metadata,
    })
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, `df.to_json(orient='records')`):
///
/// ```json
/// [
///   {
///     "spike_times":  [0.013, 0.291, ...],
///     "spike_depths": [1220.0, 1218.5, ...],
///     "unit": 4,
///     "quality": "good"
///   },
///   ...
/// ]
/// ```
fn load_json(path: &Path) -> Result<SpikeDataset> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root.as_array().context("Expected top-level JSON array")?;

    let mut units = Vec::with_capacity(records.len());

    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;

        let times = json_array_to_f64(obj.get(TIMES_COLUMN), i, TIMES_COLUMN)?;
        let depths = match obj.get(DEPTHS_COLUMN) {
            None | Some(JsonValue::Null) => Vec::new(),
            some => json_array_to_f64(some, i, DEPTHS_COLUMN)?,
        };

        let metadata = obj
            .iter()
            .filter(|(key, _)| *key != TIMES_COLUMN && *key != DEPTHS_COLUMN)
            .map(|(key, val)| (key.clone(), json_to_metadata(val)))
            .collect();

        units.push(make_unit(times, depths, metadata, i)?);
    }

    Ok(SpikeDataset::from_units(units))
}

fn json_array_to_f64(val: Option<&JsonValue>, row: usize, col: &str) -> Result<Vec<f64>> {
    let arr = val
        .and_then(|v| v.as_array())
        .with_context(|| format!("Row {row}: missing or invalid '{col}' array"))?;

    arr.iter()
        .enumerate()
        .map(|(j, v)| match v {
            // NaN depths are written as null by pandas.
            JsonValue::Null => Ok(f64::NAN),
            _ => v
                .as_f64()
                .with_context(|| format!("Row {row}, {col}[{j}]: not a number")),
        })
        .collect()
}

fn json_to_metadata(val: &JsonValue) -> MetadataValue {
    match val {
        JsonValue::String(s) => MetadataValue::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                MetadataValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                MetadataValue::Float(f)
            } else {
                MetadataValue::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => MetadataValue::Bool(*b),
        JsonValue::Null => MetadataValue::Null,
        other => MetadataValue::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// Column names of the long (one row per spike) CSV layout.
const LONG_UNIT: &str = "unit";
const LONG_TIME: &str = "spike_time";
const LONG_DEPTH: &str = "spike_depth";

/// Two CSV layouts are accepted, told apart by their header:
///
/// * per unit: `spike_times` (and optionally `spike_depths`) hold
///   semicolon-separated floats, `"0.013;0.291;0.877"`; all other columns
///   are metadata.
/// * per spike: `unit`, `spike_time` and optionally `spike_depth`; rows are
///   grouped by `unit` in first-seen order and other columns are read from
///   each unit's first row.
fn load_csv(path: &Path) -> Result<SpikeDataset> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    if headers.iter().any(|h| h == TIMES_COLUMN) {
        read_csv_per_unit(&mut reader, &headers)
    } else if headers.iter().any(|h| h == LONG_TIME) {
        read_csv_per_spike(&mut reader, &headers)
    } else {
        bail!("CSV missing '{TIMES_COLUMN}' or '{LONG_TIME}' column")
    }
}

fn read_csv_per_unit(
    reader: &mut csv::Reader<std::fs::File>,
    headers: &[String],
) -> Result<SpikeDataset> {
    let times_idx = headers
        .iter()
        .position(|h| h == TIMES_COLUMN)
        .context("CSV missing 'spike_times' column")?;
    let depths_idx = headers.iter().position(|h| h == DEPTHS_COLUMN);

    let mut units = Vec::new();

    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;

        let times_cell = record.get(times_idx).unwrap_or("");
        let times = parse_semicolon_floats(times_cell, row_no, TIMES_COLUMN)?;
        let depths = match depths_idx.and_then(|i| record.get(i)) {
            Some(cell) => parse_semicolon_floats(cell, row_no, DEPTHS_COLUMN)?,
            None => Vec::new(),
        };

        let metadata = record
            .iter()
            .enumerate()
            .filter(|(col_idx, _)| *col_idx != times_idx && Some(*col_idx) != depths_idx)
            .map(|(col_idx, value)| (headers[col_idx].clone(), guess_metadata_type(value)))
            .collect();

        units.push(make_unit(times, depths, metadata, row_no)?);
    }

    Ok(SpikeDataset::from_units(units))
}

fn read_csv_per_spike(
    reader: &mut csv::Reader<std::fs::File>,
    headers: &[String],
) -> Result<SpikeDataset> {
    let unit_idx = headers
        .iter()
        .position(|h| h == LONG_UNIT)
        .context("CSV missing 'unit' column")?;
    let time_idx = headers
        .iter()
        .position(|h| h == LONG_TIME)
        .context("CSV missing 'spike_time' column")?;
    let depth_idx = headers.iter().position(|h| h == LONG_DEPTH);

    // unit value → position in `units`, so output keeps first-seen order.
    let mut positions: BTreeMap<MetadataValue, usize> = BTreeMap::new();
    let mut units: Vec<Unit> = Vec::new();

    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;

        let key = guess_metadata_type(record.get(unit_idx).unwrap_or(""));
        let time = parse_float(record.get(time_idx).unwrap_or(""), row_no, LONG_TIME)?;
        let depth = depth_idx
            .and_then(|i| record.get(i))
            .map(|cell| parse_float(cell, row_no, LONG_DEPTH))
            .transpose()?;

        let pos = *positions.entry(key).or_insert_with(|| {
            let metadata = record
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != time_idx && Some(*i) != depth_idx)
                .map(|(i, value)| (headers[i].clone(), guess_metadata_type(value)))
                .collect();
            units.push(Unit {
                metadata,
                ..Default::default()
            });
            units.len() - 1
        });

        let unit = &mut units[pos];
        unit.spike_times.push(time);
        if let Some(d) = depth {
            unit.spike_depths.push(d);
        }
    }

    Ok(SpikeDataset::from_units(units))
}

fn parse_float(tok: &str, row: usize, col: &str) -> Result<f64> {
    let tok = tok.trim();
    if tok.is_empty() || tok.eq_ignore_ascii_case("nan") {
        return Ok(f64::NAN);
    }
    tok.parse::<f64>()
        .with_context(|| format!("Row {row}, {col}: '{tok}' is not a number"))
}

fn parse_semicolon_floats(s: &str, row: usize, col: &str) -> Result<Vec<f64>> {
    if s.trim().is_empty() {
        return Ok(Vec::new());
    }
    s.split(';')
        .enumerate()
        .map(|(j, tok)| {
            tok.trim()
                .parse::<f64>()
                .with_context(|| format!("Row {row}, {col}[{j}]: '{tok}' is not a number"))
        })
        .collect()
}

fn guess_metadata_type(s: &str) -> MetadataValue {
    if s.is_empty() {
        return MetadataValue::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return MetadataValue::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return MetadataValue::Float(f);
    }
    if s == "true" || s == "false" {
        return MetadataValue::Bool(s == "true");
    }
    MetadataValue::String(s.to_string())
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file containing sorted units.
///
/// Expected schema:
/// - `spike_times`: List<Float64> or LargeList<Float64>
/// - `spike_depths`: List<Float64> or LargeList<Float64> (optional)
/// - Any other columns are treated as metadata (strings, ints, floats, bools,
///   dates)
fn load_parquet(path: &Path) -> Result<SpikeDataset> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut units = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();

        let times_idx = schema
            .index_of(TIMES_COLUMN)
            .map_err(|_| anyhow::anyhow!("Parquet file missing '{TIMES_COLUMN}' column"))?;
        let depths_idx = schema.index_of(DEPTHS_COLUMN).ok();

        let times_col = batch.column(times_idx);

        let meta_cols: Vec<(usize, String)> = schema
            .fields()
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != times_idx && Some(*i) != depths_idx)
            .map(|(i, f)| (i, f.name().clone()))
            .collect();

        for row in 0..batch.num_rows() {
            let row_no = units.len();
            let times = extract_f64_list(times_col, row)
                .with_context(|| format!("Row {row_no}: failed to read '{TIMES_COLUMN}'"))?;
            let depths = match depths_idx.map(|i| batch.column(i)) {
                Some(col) if !col.is_null(row) => extract_f64_list(col, row)
                    .with_context(|| format!("Row {row_no}: failed to read '{DEPTHS_COLUMN}'"))?,
                _ => Vec::new(),
            };

            let metadata = meta_cols
                .iter()
                .map(|(col_idx, col_name)| {
                    (col_name.clone(), extract_metadata_value(batch.column(*col_idx), row))
                })
                .collect();

            units.push(make_unit(times, depths, metadata, row_no)?);
        }
    }

    Ok(SpikeDataset::from_units(units))
}

// -- Parquet / Arrow helpers --

/// Extract a `Vec<f64>` from a List or LargeList column at the given row.
fn extract_f64_list(col: &Arc<dyn Array>, row: usize) -> Result<Vec<f64>> {
    if col.is_null(row) {
        bail!("null value in list column");
    }

    let values_array = match col.data_type() {
        DataType::List(_) => col
            .as_any()
            .downcast_ref::<ListArray>()
            .context("expected ListArray")?
            .value(row),
        DataType::LargeList(_) => col
            .as_any()
            .downcast_ref::<LargeListArray>()
            .context("expected LargeListArray")?
            .value(row),
        other => bail!("Expected List or LargeList column, got {other:?}"),
    };

    if let Some(f64_arr) = values_array.as_any().downcast_ref::<Float64Array>() {
        Ok(f64_arr.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    } else if let Some(f32_arr) = values_array.as_any().downcast_ref::<Float32Array>() {
        Ok(f32_arr.iter().map(|v| v.unwrap_or(f32::NAN) as f64).collect())
    } else {
        bail!(
            "List inner type is {:?}, expected Float64 or Float32",
            values_array.data_type()
        )
    }
}

/// Extract a single metadata value from an Arrow column at a given row.
fn extract_metadata_value(col: &Arc<dyn Array>, row: usize) -> MetadataValue {
    if col.is_null(row) {
        return MetadataValue::Null;
    }
    let any = col.as_any();
    match col.data_type() {
        DataType::Utf8 => any
            .downcast_ref::<StringArray>()
            .map(|a| MetadataValue::String(a.value(row).to_string())),
        DataType::LargeUtf8 => Some(MetadataValue::String(
            col.as_string::<i64>().value(row).to_string(),
        )),
        DataType::Int32 => any
            .downcast_ref::<Int32Array>()
            .map(|a| MetadataValue::Integer(a.value(row) as i64)),
        DataType::Int64 => any
            .downcast_ref::<Int64Array>()
            .map(|a| MetadataValue::Integer(a.value(row))),
        DataType::Float32 => any
            .downcast_ref::<Float32Array>()
            .map(|a| MetadataValue::Float(a.value(row) as f64)),
        DataType::Float64 => any
            .downcast_ref::<Float64Array>()
            .map(|a| MetadataValue::Float(a.value(row))),
        DataType::Boolean => any
            .downcast_ref::<BooleanArray>()
            .map(|a| MetadataValue::Bool(a.value(row))),
        DataType::Date32 => any
            .downcast_ref::<Date32Array>()
            .and_then(|a| a.value_as_date(row))
            .map(|d| MetadataValue::Date(d.to_string())),
        _ => None,
    }
    .unwrap_or_else(|| MetadataValue::String(format!("{:?}", col.data_type())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use arrow::array::{Float64Builder, ListBuilder};
    use arrow::datatypes::{Field, Schema};
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::ArrowWriter;

    fn write_temp(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_per_unit_csv() {
        let file = write_temp(
            ".csv",
            "unit,quality,spike_times,spike_depths\n\
             1,good,0.1;0.5;0.9,100;110;120\n\
             2,mua,0.2,300\n",
        );
        let ds = load_file(file.path()).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.units[0].spike_times, vec![0.1, 0.5, 0.9]);
        assert_eq!(ds.units[0].spike_depths, vec![100.0, 110.0, 120.0]);
        assert_eq!(
            ds.units[1].metadata["quality"],
            MetadataValue::String("mua".into())
        );
        assert_eq!(ds.column_names, vec!["quality".to_string(), "unit".to_string()]);
    }

    #[test]
    fn loads_per_spike_csv_in_first_seen_order() {
        let file = write_temp(
            ".csv",
            "unit,spike_time,spike_depth,shank\n\
             7,0.10,40,0\n\
             3,0.20,80,1\n\
             7,0.30,42,0\n",
        );
        let ds = load_file(file.path()).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.units[0].metadata["unit"], MetadataValue::Integer(7));
        assert_eq!(ds.units[0].spike_times, vec![0.10, 0.30]);
        assert_eq!(ds.units[0].spike_depths, vec![40.0, 42.0]);
        assert_eq!(ds.units[1].spike_times, vec![0.20]);
        assert_eq!(ds.units[1].metadata["shank"], MetadataValue::Integer(1));
    }

    #[test]
    fn rejects_depth_length_mismatch() {
        let file = write_temp(
            ".json",
            r#"[{"spike_times": [0.1, 0.2], "spike_depths": [10.0]}]"#,
        );
        let err = load_file(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("spike_depths has 1"));
    }

    #[test]
    fn loads_json_without_depths() {
        let file = write_temp(
            ".json",
            r#"[{"spike_times": [0.1, 0.2], "unit": 1, "good": true}]"#,
        );
        let ds = load_file(file.path()).unwrap();
        assert!(!ds.units[0].has_depths());
        assert_eq!(ds.units[0].metadata["good"], MetadataValue::Bool(true));
    }

    #[test]
    fn rejects_unknown_extension() {
        let file = write_temp(".txt", "");
        let err = load_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("Unsupported file extension"));
    }

    fn write_parquet(schema: Schema, columns: Vec<Arc<dyn Array>>) -> tempfile::NamedTempFile {
        let schema = Arc::new(schema);
        let batch = RecordBatch::try_new(schema.clone(), columns).unwrap();
        let file = tempfile::Builder::new().suffix(".parquet").tempfile().unwrap();
        let out = std::fs::File::create(file.path()).unwrap();
        let mut writer = ArrowWriter::try_new(out, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();
        file
    }

    fn list_field(name: &str) -> Field {
        let item = Arc::new(Field::new("item", DataType::Float64, true));
        Field::new(name, DataType::List(item), true)
    }

    #[test]
    fn loads_parquet_lists() {
        let mut times = ListBuilder::new(Float64Builder::new());
        times.values().append_slice(&[0.5, 1.5]);
        times.append(true);
        let mut depths = ListBuilder::new(Float64Builder::new());
        depths.values().append_slice(&[20.0, 25.0]);
        depths.append(true);

        let file = write_parquet(
            Schema::new(vec![
                list_field(TIMES_COLUMN),
                list_field(DEPTHS_COLUMN),
                Field::new("quality", DataType::Utf8, false),
                Field::new("session_date", DataType::Date32, false),
            ]),
            vec![
                Arc::new(times.finish()),
                Arc::new(depths.finish()),
                Arc::new(StringArray::from(vec!["good"])),
                Arc::new(Date32Array::from(vec![19723])),
            ],
        );

        let ds = load_file(file.path()).unwrap();
        assert_eq!(ds.units[0].spike_times, vec![0.5, 1.5]);
        assert_eq!(ds.units[0].spike_depths, vec![20.0, 25.0]);
        assert_eq!(
            ds.units[0].metadata["quality"],
            MetadataValue::String("good".into())
        );
        assert_eq!(
            ds.units[0].metadata["session_date"],
            MetadataValue::Date("2024-01-01".into())
        );
    }

    #[test]
    fn null_parquet_spike_list_is_an_error() {
        let mut times = ListBuilder::new(Float64Builder::new());
        times.append(false);

        let file = write_parquet(
            Schema::new(vec![list_field(TIMES_COLUMN)]),
            vec![Arc::new(times.finish())],
        );

        let err = load_file(file.path()).unwrap_err();
        assert_eq!(
            format!("{err:#}"),
            "Row 0: failed to read 'spike_times': null value in list column"
        );
    }

    #[test]
    fn parquet_without_spike_times_is_an_error() {
        let file = write_parquet(
            Schema::new(vec![Field::new("quality", DataType::Utf8, false)]),
            vec![Arc::new(StringArray::from(vec!["good"]))],
        );

        let err = load_file(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("Parquet file missing 'spike_times' column"));
    }

    #[test]
    fn json_null_spikes_become_nan() {
        let file = write_temp(
            ".json",
            r#"[{"spike_times": [0.1, 0.2], "spike_depths": [null, 5.0]}]"#,
        );
        let ds = load_file(file.path()).unwrap();
        assert!(ds.units[0].spike_depths[0].is_nan());
        assert_eq!(ds.units[0].spike_depths[1], 5.0);
    }

    #[test]
    fn json_non_numeric_spike_is_an_error() {
        let file = write_temp(".json", r#"[{"spike_times": [0.1, "soon"]}]"#);
        let err = load_file(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("Row 0, spike_times[1]: not a number"));
    }

    #[test]
    fn per_unit_csv_with_bad_number_is_an_error() {
        let file = write_temp(".csv", "unit,spike_times\n1,0.1;abc\n");
        let err = load_file(file.path()).unwrap_err();
        assert!(
            format!("{err:#}").contains("Row 0, spike_times[1]: 'abc' is not a number"),
            "{err:#}"
        );
    }

    #[test]
    fn per_spike_csv_with_bad_number_is_an_error() {
        let file = write_temp(".csv", "unit,spike_time\n1,0.5\n1,x\n");
        let err = load_file(file.path()).unwrap_err();
        assert!(
            format!("{err:#}").contains("Row 1, spike_time: 'x' is not a number"),
            "{err:#}"
        );
    }

    #[test]
    fn csv_without_spike_column_is_an_error() {
        let file = write_temp(".csv", "unit,quality\n1,good\n");
        let err = load_file(file.path()).unwrap_err();
        assert_eq!(
            format!("{err:#}"),
            "CSV missing 'spike_times' or 'spike_time' column"
        );
    }

    #[test]
    fn per_spike_csv_without_depths() {
        let file = write_temp(".csv", "unit,spike_time\n1,0.5\n2,0.7\n1,0.9\n");
        let ds = load_file(file.path()).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.units[0].spike_times, vec![0.5, 0.9]);
        assert!(!ds.units[0].has_depths());
        assert!(!ds.units[1].has_depths());
    }
}
