use std::collections::HashSet;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{Array, ArrayRef, AsArray, Float64Array, Int64Array};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Float64Type, Int64Type, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use serde_json::{Map as JsonMap, Number as JsonNumber, Value as JsonValue};
use thiserror::Error;

use super::model::Table;

/// Key of the table inside an HDF5 file unless told otherwise.
pub const DEFAULT_HDF_KEY: &str = "table";

/// Label of the row-index column in CSV files.
pub const CSV_INDEX_LABEL: &str = "index";

/// Column carrying the row index in Parquet files (the pandas convention).
const PARQUET_INDEX: &str = "__index_level_0__";

// ---------------------------------------------------------------------------
// Format – chosen by file extension only
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Hdf5,
    Json,
    Csv,
    Parquet,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormatError {
    #[error("cannot handle tabular data with extension '{extension}': {}", path.display())]
    Unsupported { path: PathBuf, extension: String },

    #[error("{}: HDF5 support is not compiled in (enable the `hdf5` feature)", path.display())]
    Hdf5Disabled { path: PathBuf },
}

impl Format {
    pub const ALL: [Format; 4] = [Format::Hdf5, Format::Json, Format::Csv, Format::Parquet];

    /// File extensions (without dot) mapped to this format.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            Format::Hdf5 => &["hdf", "hdf5", "h5"],
            Format::Json => &["json"],
            Format::Csv => &["csv"],
            Format::Parquet => &["parquet", "pq"],
        }
    }

    /// Dispatch by extension, case-insensitively.
    pub fn from_path(path: &Path) -> Result<Format, FormatError> {
        let ext = extension_of(path);
        Format::ALL
            .into_iter()
            .find(|f| f.extensions().contains(&ext.as_str()))
            .ok_or_else(|| FormatError::Unsupported {
                path: path.to_path_buf(),
                extension: ext,
            })
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

/// Warn when `path` has an extension no table can be written with.
///
/// Never fails; returns whether the extension is allowed.
pub fn check_extension(path: &Path) -> bool {
    match Format::from_path(path) {
        Ok(_) => true,
        Err(_) => {
            log::warn!("Extension .{} not allowed here.", extension_of(path));
            false
        }
    }
}

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a table from a file. Dispatch by extension.
///
/// Supported formats:
/// * `.hdf` / `.hdf5` / `.h5` – group `hdf_key` (needs the `hdf5` feature)
/// * `.json`    – `{ "col": { "label": v, ... }, ... }` or `[{ "col": v, ... }, ...]`
/// * `.csv`     – header row; the `index` column is read back as data
/// * `.parquet` – numeric columns, optional `__index_level_0__`
pub fn read_table(path: &Path, hdf_key: &str) -> Result<Table> {
    let format = Format::from_path(path).inspect_err(|e| log::error!("{e}"))?;
    let table = match format {
        Format::Hdf5 => read_hdf(path, hdf_key),
        Format::Json => read_json(path),
        Format::Csv => read_csv(path),
        Format::Parquet => read_parquet(path),
    }
    .with_context(|| format!("reading {}", path.display()))?;
    log::debug!("Read {table} from {}", path.display());
    Ok(table)
}

/// Persist a table. Dispatch by extension; nothing is created on error.
pub fn write_table(table: &Table, path: &Path, hdf_key: &str) -> Result<()> {
    let format = Format::from_path(path).inspect_err(|e| log::error!("{e}"))?;
    match format {
        Format::Hdf5 => write_hdf(table, path, hdf_key),
        Format::Json => write_json(table, path),
        Format::Csv => write_csv(table, path),
        Format::Parquet => write_parquet(table, path),
    }
    .with_context(|| format!("writing {}", path.display()))
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

/// Two layouts are accepted:
///
/// ```json
/// { "Theta": { "0": 0.1, "7": 0.3 }, "Distance": { "0": 12.0, "7": 40.1 } }
/// ```
///
/// (the default `df.to_json()`, labels become the index) and
///
/// ```json
/// [ { "Theta": 0.1, "Distance": 12.0 }, { "Theta": 0.3, "Distance": 40.1 } ]
/// ```
///
/// (`orient='records'`, the index is `0..n`).
fn read_json(path: &Path) -> Result<Table> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    match root {
        JsonValue::Array(records) => table_from_records(&records),
        JsonValue::Object(columns) => table_from_column_map(&columns),
        _ => bail!("Expected a JSON array of records or an object of columns"),
    }
}

fn table_from_records(records: &[JsonValue]) -> Result<Table> {
    let mut names: Vec<String> = Vec::new();
    let mut rows = Vec::with_capacity(records.len());
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;
        for key in obj.keys() {
            if !names.contains(key) {
                names.push(key.clone());
            }
        }
        rows.push(obj);
    }

    let mut table = Table::with_rows(rows.len());
    for name in names {
        let values = rows
            .iter()
            .enumerate()
            .map(|(i, obj)| json_to_f64(obj.get(&name), i, &name))
            .collect::<Result<Vec<_>>>()?;
        table.set_column(name, values)?;
    }
    Ok(table)
}

fn table_from_column_map(columns: &JsonMap<String, JsonValue>) -> Result<Table> {
    // Row labels are the union over all columns, in order of first appearance.
    let mut labels: Vec<String> = Vec::new();
    let mut seen = HashSet::new();
    for (name, cells) in columns {
        let keys: Vec<String> = match cells {
            JsonValue::Object(cells) => cells.keys().cloned().collect(),
            JsonValue::Array(cells) => (0..cells.len()).map(|i| i.to_string()).collect(),
            _ => bail!("Column '{name}' must be an object or an array"),
        };
        for key in keys {
            if seen.insert(key.clone()) {
                labels.push(key);
            }
        }
    }
    let index = labels
        .iter()
        .map(|l| {
            l.parse::<i64>()
                .with_context(|| format!("Row label '{l}' is not an integer"))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut table = Table::with_rows(labels.len()).with_index(index)?;
    for (name, cells) in columns {
        let values = labels
            .iter()
            .enumerate()
            .map(|(i, l)| {
                let cell = match cells {
                    JsonValue::Object(cells) => cells.get(l),
                    JsonValue::Array(cells) => l.parse::<usize>().ok().and_then(|p| cells.get(p)),
                    _ => None,
                };
                json_to_f64(cell, i, name)
            })
            .collect::<Result<Vec<_>>>()?;
        table.set_column(name.clone(), values)?;
    }
    Ok(table)
}

fn json_to_f64(val: Option<&JsonValue>, row: usize, col: &str) -> Result<f64> {
    match val {
        None | Some(JsonValue::Null) => Ok(f64::NAN),
        Some(JsonValue::Number(n)) => n
            .as_f64()
            .with_context(|| format!("Row {row}, '{col}': {n} is not representable")),
        Some(JsonValue::Bool(b)) => Ok(if *b { 1.0 } else { 0.0 }),
        Some(JsonValue::String(s)) => s
            .trim()
            .parse::<f64>()
            .with_context(|| format!("Row {row}, '{col}': '{s}' is not a number")),
        Some(other) => bail!("Row {row}, '{col}': {other} is not a number"),
    }
}

fn write_json(table: &Table, path: &Path) -> Result<()> {
    let labels: Vec<String> = table.index().iter().map(|l| l.to_string()).collect();
    let mut root = JsonMap::new();
    for col in table.columns() {
        let cells: JsonMap<String, JsonValue> = labels
            .iter()
            .zip(&col.values)
            .map(|(label, &v)| {
                // Non-finite values have no JSON literal.
                let cell = JsonNumber::from_f64(v).map_or(JsonValue::Null, JsonValue::Number);
                (label.clone(), cell)
            })
            .collect();
        root.insert(col.name.clone(), JsonValue::Object(cells));
    }

    let file = File::create(path).context("creating JSON file")?;
    serde_json::to_writer(BufWriter::new(file), &JsonValue::Object(root))
        .context("serializing JSON")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

/// Every column, the index label column included, is read as data.
/// Empty cells are missing values.
fn read_csv(path: &Path) -> Result<Table> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();
    let headers = mangle_duplicates(headers);

    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); headers.len()];
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        for (col_idx, values) in columns.iter_mut().enumerate() {
            let cell = record.get(col_idx).unwrap_or("");
            values.push(parse_csv_cell(cell, row_no, &headers[col_idx])?);
        }
    }

    let rows = columns.first().map(Vec::len).unwrap_or(0);
    let mut table = Table::with_rows(rows);
    for (name, values) in headers.into_iter().zip(columns) {
        table.set_column(name, values)?;
    }
    Ok(table)
}

/// Repeated names get a `.1`, `.2`, ... suffix, as pandas does.
fn mangle_duplicates(headers: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    headers
        .into_iter()
        .map(|name| {
            let mut unique = name.clone();
            let mut n = 1;
            while seen.contains(&unique) {
                unique = format!("{name}.{n}");
                n += 1;
            }
            seen.insert(unique.clone());
            unique
        })
        .collect()
}

/// Header of the row-label column: `index`, or the first free `level_N`
/// when the table already has an `index` column.
fn csv_index_label(table: &Table) -> String {
    if !table.has_column(CSV_INDEX_LABEL) {
        return CSV_INDEX_LABEL.to_string();
    }
    (0..)
        .map(|n| format!("level_{n}"))
        .find(|label| !table.has_column(label))
        .unwrap_or_default()
}

fn parse_csv_cell(s: &str, row: usize, col: &str) -> Result<f64> {
    let s = s.trim();
    match s {
        "" => Ok(f64::NAN),
        "True" | "true" => Ok(1.0),
        "False" | "false" => Ok(0.0),
        _ => s
            .parse::<f64>()
            .with_context(|| format!("Row {row}, '{col}': '{s}' is not a number")),
    }
}

fn format_csv_cell(v: f64) -> String {
    if v.is_nan() {
        String::new()
    } else {
        format!("{v:?}")
    }
}

fn write_csv(table: &Table, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).context("creating CSV")?;

    let mut header = vec![csv_index_label(table)];
    header.extend(table.column_names().map(str::to_string));
    writer.write_record(&header).context("writing CSV header")?;

    for (row, label) in table.index().iter().enumerate() {
        let mut record = vec![label.to_string()];
        record.extend(table.columns().iter().map(|c| format_csv_cell(c.values[row])));
        writer
            .write_record(&record)
            .with_context(|| format!("writing CSV row {row}"))?;
    }
    writer.flush().context("flushing CSV")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Parquet
// ---------------------------------------------------------------------------

/// Numeric and boolean columns become `f64`, nulls become `NaN`.
///
/// Works with files written by **Pandas** (`df.to_parquet()`), which stores a
/// non-trivial index as `__index_level_0__`.
fn read_parquet(path: &Path) -> Result<Table> {
    let file = File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let schema = builder.schema().clone();
    let reader = builder.build().context("building parquet reader")?;

    for field in schema.fields() {
        let dt = field.data_type();
        if !(dt.is_numeric() || *dt == DataType::Boolean) {
            bail!("Column '{}' has non-numeric type {dt:?}", field.name());
        }
    }

    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); schema.fields().len()];
    let mut index: Option<Vec<i64>> = schema.index_of(PARQUET_INDEX).ok().map(|_| Vec::new());

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        for (col_idx, field) in schema.fields().iter().enumerate() {
            let col = batch.column(col_idx);
            if field.name() == PARQUET_INDEX {
                if let Some(index) = index.as_mut() {
                    extend_i64(col, index).context("reading parquet index")?;
                }
                continue;
            }
            extend_f64(col, &mut columns[col_idx])
                .with_context(|| format!("reading column '{}'", field.name()))?;
        }
    }

    let rows = schema
        .fields()
        .iter()
        .zip(&columns)
        .find(|(f, _)| f.name() != PARQUET_INDEX)
        .map(|(_, v)| v.len())
        .or_else(|| index.as_ref().map(Vec::len))
        .unwrap_or(0);

    let mut table = Table::with_rows(rows);
    if let Some(index) = index {
        table = table.with_index(index)?;
    }
    for (field, values) in schema.fields().iter().zip(columns) {
        if field.name() != PARQUET_INDEX {
            table.set_column(field.name().clone(), values)?;
        }
    }
    Ok(table)
}

fn extend_f64(col: &ArrayRef, out: &mut Vec<f64>) -> Result<()> {
    let values = cast(col.as_ref(), &DataType::Float64).context("casting to Float64")?;
    out.extend(
        values
            .as_primitive::<Float64Type>()
            .iter()
            .map(|v| v.unwrap_or(f64::NAN)),
    );
    Ok(())
}

fn extend_i64(col: &ArrayRef, out: &mut Vec<i64>) -> Result<()> {
    let values = cast(col.as_ref(), &DataType::Int64).context("casting to Int64")?;
    let values = values.as_primitive::<Int64Type>();
    if values.null_count() > 0 {
        bail!("index contains nulls");
    }
    out.extend(values.values().iter().copied());
    Ok(())
}

fn write_parquet(table: &Table, path: &Path) -> Result<()> {
    let mut fields: Vec<Field> = table
        .column_names()
        .map(|name| Field::new(name, DataType::Float64, true))
        .collect();
    fields.push(Field::new(PARQUET_INDEX, DataType::Int64, false));
    let schema = Arc::new(Schema::new(fields));

    let mut arrays: Vec<ArrayRef> = table
        .columns()
        .iter()
        .map(|c| Arc::new(Float64Array::from(c.values.clone())) as ArrayRef)
        .collect();
    arrays.push(Arc::new(Int64Array::from(table.index().to_vec())));

    let batch = RecordBatch::try_new(schema.clone(), arrays).context("building record batch")?;

    let file = File::create(path).context("creating parquet file")?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing record batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// HDF5
// ---------------------------------------------------------------------------

#[cfg(not(feature = "hdf5"))]
fn read_hdf(path: &Path, _key: &str) -> Result<Table> {
    Err(FormatError::Hdf5Disabled {
        path: path.to_path_buf(),
    }
    .into())
}

#[cfg(not(feature = "hdf5"))]
fn write_hdf(_table: &Table, path: &Path, _key: &str) -> Result<()> {
    Err(FormatError::Hdf5Disabled {
        path: path.to_path_buf(),
    }
    .into())
}

#[cfg(feature = "hdf5")]
use hdf::{read_hdf, write_hdf};

/// One group per key in the pandas "fixed" layout:
///
/// - `axis0`: column names as fixed-length ASCII
/// - `axis1`: row labels
/// - `block{N}_items` / `block{N}_values`: the names and the rows × items
///   matrix of one dtype block
///
/// Every block is read, whatever its numeric type; values become f64.
/// Writing produces a single float64 block.
#[cfg(feature = "hdf5")]
mod hdf {
    use std::collections::HashMap;
    use std::path::Path;

    use anyhow::{bail, Context, Result};
    use hdf5::types::{FixedAscii, FixedUnicode, TypeDescriptor, VarLenAscii, VarLenUnicode};
    use hdf5::{Dataset, Group, Location};

    use crate::data::model::Table;

    const COLUMNS: &str = "axis0";
    const INDEX: &str = "axis1";
    /// Longest column name that can be stored.
    const NAME_LEN: usize = 255;
    const ATTR_LEN: usize = 16;

    pub(super) fn read_hdf(path: &Path, key: &str) -> Result<Table> {
        let file = hdf5::File::open(path).context("opening HDF5 file")?;
        let group = file
            .group(key)
            .with_context(|| format!("no table under key '{key}'"))?;

        let names = read_names(&group.dataset(COLUMNS)?).context("reading column names")?;
        let index: Vec<i64> = group.dataset(INDEX)?.read_raw()?;
        let rows = index.len();

        let mut blocks: HashMap<String, Vec<f64>> = HashMap::new();
        for n in 0.. {
            let items_key = format!("block{n}_items");
            if !group.link_exists(&items_key) {
                break;
            }
            let items = read_names(&group.dataset(&items_key)?)
                .with_context(|| format!("reading {items_key}"))?;
            let flat = read_values(&group.dataset(&format!("block{n}_values"))?)
                .with_context(|| format!("reading block{n}_values"))?;
            if flat.len() != rows * items.len() {
                bail!(
                    "block{n}_values holds {} values, expected {} rows × {} items",
                    flat.len(),
                    rows,
                    items.len()
                );
            }
            let width = items.len().max(1);
            for (col, name) in items.into_iter().enumerate() {
                let values = flat.iter().skip(col).step_by(width).copied().collect();
                blocks.insert(name, values);
            }
        }

        let mut table = Table::with_rows(rows).with_index(index)?;
        for name in names {
            let values = blocks
                .remove(&name)
                .with_context(|| format!("column '{name}' is in no block"))?;
            table.set_column(name, values)?;
        }
        Ok(table)
    }

    fn read_names(dataset: &Dataset) -> Result<Vec<String>> {
        let names = match dataset.dtype()?.to_descriptor()? {
            TypeDescriptor::FixedAscii(_) => dataset
                .read_raw::<FixedAscii<NAME_LEN>>()?
                .iter()
                .map(|n| n.as_str().to_string())
                .collect(),
            TypeDescriptor::FixedUnicode(_) => dataset
                .read_raw::<FixedUnicode<NAME_LEN>>()?
                .iter()
                .map(|n| n.as_str().to_string())
                .collect(),
            TypeDescriptor::VarLenAscii => dataset
                .read_raw::<VarLenAscii>()?
                .iter()
                .map(|n| n.as_str().to_string())
                .collect(),
            TypeDescriptor::VarLenUnicode => dataset
                .read_raw::<VarLenUnicode>()?
                .iter()
                .map(|n| n.as_str().to_string())
                .collect(),
            other => bail!("names must be strings, found {other:?}"),
        };
        Ok(names)
    }

    fn read_values(dataset: &Dataset) -> Result<Vec<f64>> {
        let values = match dataset.dtype()?.to_descriptor()? {
            TypeDescriptor::Float(_) => dataset.read_raw::<f64>()?,
            TypeDescriptor::Integer(_) => dataset
                .read_raw::<i64>()?
                .into_iter()
                .map(|v| v as f64)
                .collect(),
            TypeDescriptor::Unsigned(_) => dataset
                .read_raw::<u64>()?
                .into_iter()
                .map(|v| v as f64)
                .collect(),
            TypeDescriptor::Boolean | TypeDescriptor::Enum(_) => dataset
                .read_raw::<bool>()?
                .into_iter()
                .map(|v| if v { 1.0 } else { 0.0 })
                .collect(),
            other => bail!("unsupported block type {other:?}"),
        };
        Ok(values)
    }

    pub(super) fn write_hdf(table: &Table, path: &Path, key: &str) -> Result<()> {
        let file = hdf5::File::append(path).context("opening HDF5 file")?;
        if file.link_exists(key) {
            file.unlink(key)?;
        }
        let group = file.create_group(key)?;
        write_frame_attrs(&group)?;

        let names = table
            .column_names()
            .map(|n| {
                FixedAscii::<NAME_LEN>::from_ascii(n)
                    .with_context(|| format!("column name '{n}' is not short ASCII"))
            })
            .collect::<Result<Vec<_>>>()?;
        for key in [COLUMNS, "block0_items"] {
            let dataset = group.new_dataset_builder().with_data(&names).create(key)?;
            text_attr(&dataset, "kind", "string")?;
        }
        let index = group
            .new_dataset_builder()
            .with_data(table.index())
            .create(INDEX)?;
        text_attr(&index, "kind", "integer")?;

        let n_cols = table.columns().len();
        let mut flat = Vec::with_capacity(table.len() * n_cols);
        for row in 0..table.len() {
            flat.extend(table.columns().iter().map(|c| c.values[row]));
        }
        let values = group
            .new_dataset::<f64>()
            .shape((table.len(), n_cols))
            .create("block0_values")?;
        values.write_raw(&flat)?;
        values
            .new_attr::<u8>()
            .shape(())
            .create("transposed")?
            .write_scalar(&1u8)?;
        Ok(())
    }

    fn write_frame_attrs(group: &Group) -> Result<()> {
        for (name, value) in [
            ("pandas_type", "frame"),
            ("pandas_version", "0.15.2"),
            ("encoding", "UTF-8"),
            ("errors", "strict"),
            ("axis0_variety", "regular"),
            ("axis1_variety", "regular"),
            ("block0_items_variety", "regular"),
        ] {
            text_attr(group, name, value)?;
        }
        for (name, value) in [("ndim", 2i64), ("nblocks", 1)] {
            group
                .new_attr::<i64>()
                .shape(())
                .create(name)?
                .write_scalar(&value)?;
        }
        Ok(())
    }

    fn text_attr(location: &Location, name: &str, value: &str) -> Result<()> {
        let value = FixedAscii::<ATTR_LEN>::from_ascii(value)?;
        location
            .new_attr::<FixedAscii<ATTR_LEN>>()
            .shape(())
            .create(name)?
            .write_scalar(&value)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events() -> Table {
        Table::from_columns([
            ("Theta", vec![0.1, 0.25, 1.5e-7]),
            ("Distance", vec![12.0, f64::NAN, -3.0]),
            ("size", vec![1e30, 2.0, 3.0]),
        ])
        .unwrap()
        .with_index(vec![0, 4, 9])
        .unwrap()
    }

    #[test]
    fn format_by_extension() {
        assert_eq!(Format::from_path(Path::new("a.H5")), Ok(Format::Hdf5));
        assert_eq!(Format::from_path(Path::new("a/b.hdf")), Ok(Format::Hdf5));
        assert_eq!(Format::from_path(Path::new("a.json")), Ok(Format::Json));
        assert_eq!(Format::from_path(Path::new("a.csv")), Ok(Format::Csv));
        assert_eq!(Format::from_path(Path::new("a.pq")), Ok(Format::Parquet));
        assert!(matches!(
            Format::from_path(Path::new("a.txt")),
            Err(FormatError::Unsupported { extension, .. }) if extension == "txt"
        ));
        assert!(Format::from_path(Path::new("noext")).is_err());
    }

    #[test]
    fn check_extension_only_reports() {
        assert!(check_extension(Path::new("out.hdf5")));
        assert!(!check_extension(Path::new("out.txt")));
    }

    #[test]
    fn json_round_trip_keeps_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.json");
        write_table(&events(), &path, DEFAULT_HDF_KEY).unwrap();
        assert_eq!(read_table(&path, DEFAULT_HDF_KEY).unwrap(), events());
    }

    #[test]
    fn json_records_are_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");
        std::fs::write(
            &path,
            r#"[{"a": 1, "b": true}, {"a": 2.5, "c": null}, {"a": "3", "b": false}]"#,
        )
        .unwrap();
        let t = read_table(&path, DEFAULT_HDF_KEY).unwrap();
        assert_eq!(t.column_names().collect::<Vec<_>>(), ["a", "b", "c"]);
        assert_eq!(t.column("a").unwrap(), &[1.0, 2.5, 3.0]);
        assert_eq!(t.index(), &[0, 1, 2]);
        let b = t.column("b").unwrap();
        assert_eq!(b[0], 1.0);
        assert!(b[1].is_nan());
        assert_eq!(b[2], 0.0);
    }

    #[test]
    fn json_rejects_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"[{"a": "gamma"}]"#).unwrap();
        assert!(read_table(&path, DEFAULT_HDF_KEY).is_err());
    }

    #[test]
    fn csv_round_trip_reads_index_as_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.csv");
        write_table(&events(), &path, DEFAULT_HDF_KEY).unwrap();

        let back = read_table(&path, DEFAULT_HDF_KEY).unwrap();
        assert_eq!(
            back.column_names().collect::<Vec<_>>(),
            ["index", "Theta", "Distance", "size"]
        );
        assert_eq!(back.column("index").unwrap(), &[0.0, 4.0, 9.0]);

        let mut cols: Vec<(String, Vec<f64>)> = vec![("index".into(), vec![0.0, 4.0, 9.0])];
        cols.extend(
            events()
                .columns()
                .iter()
                .map(|c| (c.name.clone(), c.values.clone())),
        );
        assert_eq!(back, Table::from_columns(cols).unwrap());
    }

    #[test]
    fn csv_writes_missing_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.csv");
        write_table(&events(), &path, DEFAULT_HDF_KEY).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "index,Theta,Distance,size");
        assert_eq!(lines[2], "4,0.25,,2.0");
    }

    #[test]
    fn csv_index_column_survives_another_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.csv");
        std::fs::write(&input, "index,Theta\n0,1\n4,2\n9,3\n").unwrap();
        let first = read_table(&input, DEFAULT_HDF_KEY).unwrap();
        assert_eq!(first.columns().len(), 2);

        let output = dir.path().join("out.csv");
        write_table(&first, &output, DEFAULT_HDF_KEY).unwrap();
        let back = read_table(&output, DEFAULT_HDF_KEY).unwrap();

        assert_eq!(back.columns().len(), first.columns().len() + 1);
        assert_eq!(
            back.column_names().collect::<Vec<_>>(),
            ["level_0", "index", "Theta"]
        );
        assert_eq!(back.column("index").unwrap(), &[0.0, 4.0, 9.0]);
        assert_eq!(back.column("level_0").unwrap(), &[0.0, 1.0, 2.0]);
    }

    #[test]
    fn csv_duplicate_headers_are_renamed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dup.csv");
        std::fs::write(&path, "a,a,b,a\n1,2,3,4\n").unwrap();
        let t = read_table(&path, DEFAULT_HDF_KEY).unwrap();
        assert_eq!(t.column_names().collect::<Vec<_>>(), ["a", "a.1", "b", "a.2"]);
        assert_eq!(t.column("a.1").unwrap(), &[2.0]);
    }

    #[test]
    fn json_columns_are_aligned_on_all_labels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ragged.json");
        std::fs::write(&path, r#"{"a": {"0": 1, "1": 2}, "b": {"1": 5, "2": 6}}"#).unwrap();
        let t = read_table(&path, DEFAULT_HDF_KEY).unwrap();
        assert_eq!(t.index(), &[0, 1, 2]);
        let a = t.column("a").unwrap();
        assert_eq!(&a[..2], &[1.0, 2.0]);
        assert!(a[2].is_nan());
        let b = t.column("b").unwrap();
        assert!(b[0].is_nan());
        assert_eq!(&b[1..], &[5.0, 6.0]);
    }

    #[test]
    fn parquet_round_trip_keeps_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.parquet");
        write_table(&events(), &path, DEFAULT_HDF_KEY).unwrap();
        assert_eq!(read_table(&path, DEFAULT_HDF_KEY).unwrap(), events());
    }

    #[test]
    fn unsupported_extension_reads_nothing_and_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.txt");

        let err = write_table(&events(), &path, DEFAULT_HDF_KEY).unwrap_err();
        assert!(err.downcast_ref::<FormatError>().is_some());
        assert!(!path.exists());

        std::fs::write(&path, "Theta\n1\n").unwrap();
        let err = read_table(&path, DEFAULT_HDF_KEY).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FormatError>(),
            Some(FormatError::Unsupported { .. })
        ));
    }

    #[cfg(not(feature = "hdf5"))]
    #[test]
    fn hdf_without_feature_is_a_typed_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.h5");
        let err = write_table(&events(), &path, DEFAULT_HDF_KEY).unwrap_err();
        assert!(matches!(
            err.root_cause().downcast_ref::<FormatError>(),
            Some(FormatError::Hdf5Disabled { .. })
        ));
        assert!(!path.exists());
    }

    #[cfg(feature = "hdf5")]
    #[test]
    fn hdf_round_trip_per_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.hdf5");
        write_table(&events(), &path, "events").unwrap();
        let other = Table::from_columns([("x", vec![1.0])]).unwrap();
        write_table(&other, &path, "other").unwrap();
        assert_eq!(read_table(&path, "events").unwrap(), events());
        assert_eq!(read_table(&path, "other").unwrap(), other);
    }

    #[cfg(feature = "hdf5")]
    #[test]
    fn hdf_reads_pandas_blocks_of_mixed_types() {
        use hdf5::types::FixedAscii;

        fn names(list: &[&str]) -> Vec<FixedAscii<8>> {
            list.iter()
                .map(|n| FixedAscii::<8>::from_ascii(n).unwrap())
                .collect()
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pandas.h5");
        {
            let file = hdf5::File::create(&path).unwrap();
            let group = file.create_group("table").unwrap();
            group
                .new_dataset_builder()
                .with_data(&names(&["a", "n", "b"]))
                .create("axis0")
                .unwrap();
            group
                .new_dataset_builder()
                .with_data(&[10i64, 20, 30])
                .create("axis1")
                .unwrap();
            group
                .new_dataset_builder()
                .with_data(&names(&["a", "b"]))
                .create("block0_items")
                .unwrap();
            group
                .new_dataset::<f64>()
                .shape((3, 2))
                .create("block0_values")
                .unwrap()
                .write_raw(&[0.5, 1.5, 2.5, 3.5, 4.5, 5.5])
                .unwrap();
            group
                .new_dataset_builder()
                .with_data(&names(&["n"]))
                .create("block1_items")
                .unwrap();
            group
                .new_dataset::<i64>()
                .shape((3, 1))
                .create("block1_values")
                .unwrap()
                .write_raw(&[7i64, 8, 9])
                .unwrap();
        }

        let table = read_table(&path, "table").unwrap();
        assert_eq!(table.column_names().collect::<Vec<_>>(), ["a", "n", "b"]);
        assert_eq!(table.index(), &[10, 20, 30]);
        assert_eq!(table.column("a").unwrap(), &[0.5, 2.5, 4.5]);
        assert_eq!(table.column("b").unwrap(), &[1.5, 3.5, 5.5]);
        assert_eq!(table.column("n").unwrap(), &[7.0, 8.0, 9.0]);
    }
}
