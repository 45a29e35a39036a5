use std::io::{Cursor, Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{Array, AsArray, Date32Array, Float64Array};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Date32Type, Float64Type};
use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::coerce;
use super::model::{CellValue, Dataset, Row};

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Anything that can hand over all records of a sheet as rows.
///
/// The pipeline only ever sees the resulting [`Dataset`]; how the records
/// are fetched or authenticated is up to the implementor.
pub trait RecordSource {
    /// Stable identifier of the source (a path, a URL).
    fn locator(&self) -> String;

    fn read_records(&self) -> Result<Dataset>;
}

/// A sheet stored in a local file.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RecordSource for FileSource {
    fn locator(&self) -> String {
        self.path.display().to_string()
    }

    fn read_records(&self) -> Result<Dataset> {
        load_file(&self.path)
    }
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a case sheet from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.xlsx`    – first worksheet, header row with column names
/// * `.parquet` – flat columns of text, numbers, dates or timestamps
/// * `.json`    – `[{ "CONTRATO": "...", "MONTO RECUPERADO": 12.5, ... }, ...]`
/// * `.csv`     – header row with column names
pub fn load_file(path: &Path) -> Result<Dataset> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let dataset = match ext.as_str() {
        "xlsx" => {
            let bytes = std::fs::read(path).context("reading workbook")?;
            read_xlsx_bytes(&bytes)
        }
        "parquet" | "pq" => load_parquet(path),
        "json" => load_json(path),
        "csv" => load_csv(path),
        other => bail!("Unsupported file extension: .{other}"),
    }
    .with_context(|| format!("loading {}", path.display()))?;

    log::info!(
        "Loaded {} rows, {} columns from {}",
        dataset.len(),
        dataset.columns().len(),
        path.display()
    );
    Ok(dataset)
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Records-oriented JSON, the shape a "get all records" call returns:
///
/// ```json
/// [
///   { "CONTRATO": "C-001", "ESTADO": "RESUELTO", "MONTO RECUPERADO": 120.5 },
///   ...
/// ]
/// ```
///
/// Key order inside each object is kept.
fn load_json(path: &Path) -> Result<Dataset> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    parse_json_records(&text)
}

pub fn parse_json_records(text: &str) -> Result<Dataset> {
    let root: JsonValue = serde_json::from_str(text).context("parsing JSON")?;

    let records = root
        .as_array()
        .context("Expected top-level JSON array")?;

    let mut rows = Vec::with_capacity(records.len());
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;

        let mut row = Row::new();
        for (key, val) in obj {
            if let Some(cell) = json_to_cell(val) {
                row.insert(key.clone(), cell);
            }
        }
        rows.push(row);
    }

    Ok(Dataset::from_rows(rows))
}

fn json_to_cell(val: &JsonValue) -> Option<CellValue> {
    let cell = match val {
        JsonValue::Null => return None,
        JsonValue::String(s) if s.is_empty() => CellValue::Missing,
        JsonValue::String(s) => CellValue::String(s.clone()),
        JsonValue::Number(n) => match n.as_f64() {
            Some(f) => CellValue::Number(f),
            None => CellValue::String(n.to_string()),
        },
        JsonValue::Bool(b) => CellValue::String(b.to_string()),
        other => CellValue::String(other.to_string()),
    };
    Some(cell)
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// Header row with column names; every field is typed with [`coerce::guess`].
fn load_csv(path: &Path) -> Result<Dataset> {
    let reader = csv::Reader::from_path(path).context("opening CSV")?;
    read_csv(reader)
}

pub fn read_csv<R: Read>(mut reader: csv::Reader<R>) -> Result<Dataset> {
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        let row: Row = headers
            .iter()
            .zip(record.iter())
            .filter(|(name, _)| !name.is_empty())
            .map(|(name, value)| (name.clone(), coerce::guess(value)))
            .collect();
        rows.push(row);
    }

    Ok(Dataset::with_columns(rows, headers.into_iter().filter(|h| !h.is_empty()).collect()))
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a flat Parquet table.
///
/// Text columns become strings, integer and float columns numbers, and
/// `Date32`/`Date64`/`Timestamp` columns dates. Nulls leave the cell out.
fn load_parquet(path: &Path) -> Result<Dataset> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("reading parquet metadata")?;
    let header: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build().context("building parquet reader")?;

    let mut rows = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();

        let columns: Vec<(String, ColumnReader)> = schema
            .fields()
            .iter()
            .zip(batch.columns())
            .map(|(field, col)| {
                ColumnReader::new(col)
                    .with_context(|| format!("column '{}'", field.name()))
                    .map(|reader| (field.name().clone(), reader))
            })
            .collect::<Result<_>>()?;

        for row_idx in 0..batch.num_rows() {
            let mut row = Row::new();
            for (name, reader) in &columns {
                if let Some(cell) = reader.cell(row_idx) {
                    row.insert(name.clone(), cell);
                }
            }
            rows.push(row);
        }
    }

    Ok(Dataset::with_columns(rows, header))
}

// -- Parquet / Arrow helpers --

/// A batch column normalised to one of the three cell representations.
enum ColumnReader {
    Text(Arc<dyn Array>),
    Number(Float64Array),
    Date(Date32Array),
}

impl ColumnReader {
    fn new(col: &Arc<dyn Array>) -> Result<Self> {
        let reader = match col.data_type() {
            DataType::Utf8 | DataType::LargeUtf8 | DataType::Boolean => {
                ColumnReader::Text(cast(col, &DataType::Utf8).context("casting to text")?)
            }
            DataType::Date32 | DataType::Date64 | DataType::Timestamp(_, _) => {
                let dates = cast(col, &DataType::Date32).context("casting to Date32")?;
                ColumnReader::Date(dates.as_primitive::<Date32Type>().clone())
            }
            t if t.is_numeric() => {
                let numbers = cast(col, &DataType::Float64).context("casting to Float64")?;
                ColumnReader::Number(numbers.as_primitive::<Float64Type>().clone())
            }
            other => bail!("unsupported column type {other:?}"),
        };
        Ok(reader)
    }

    fn cell(&self, row: usize) -> Option<CellValue> {
        match self {
            ColumnReader::Text(arr) => {
                if arr.is_null(row) {
                    return None;
                }
                let s = arr.as_string::<i32>().value(row);
                Some(if s.is_empty() {
                    CellValue::Missing
                } else {
                    CellValue::String(s.to_string())
                })
            }
            ColumnReader::Number(arr) => (!arr.is_null(row)).then(|| CellValue::Number(arr.value(row))),
            ColumnReader::Date(arr) => {
                if arr.is_null(row) {
                    return None;
                }
                arr.value_as_date(row).map(CellValue::Date)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// XLSX loader
// ---------------------------------------------------------------------------

/// Decode an `.xlsx` workbook held in memory: the first worksheet, with the
/// first row as column names kept verbatim. Blank cells are left out of
/// their row, as are date cells outside the calendar range.
pub fn read_xlsx_bytes(bytes: &[u8]) -> Result<Dataset> {
    read_xlsx(Cursor::new(bytes))
}

fn read_xlsx<RS: Read + Seek>(reader: RS) -> Result<Dataset> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(reader).context("opening workbook")?;
    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .context("workbook contains no sheets")?;
    let range = workbook
        .worksheet_range(&sheet)
        .with_context(|| format!("reading sheet '{sheet}'"))?;

    let mut lines = range.rows();
    let Some(header_line) = lines.next() else {
        return Ok(Dataset::default());
    };
    let header: Vec<Option<String>> = header_line
        .iter()
        .map(|cell| match cell {
            Data::Empty => None,
            Data::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        })
        .collect();

    let rows = lines
        .map(|line| {
            header
                .iter()
                .zip(line)
                .filter_map(|(name, cell)| Some((name.clone()?, xlsx_to_cell(cell)?)))
                .collect::<Row>()
        })
        .collect();

    Ok(Dataset::with_columns(rows, header.into_iter().flatten().collect()))
}

fn xlsx_to_cell(cell: &Data) -> Option<CellValue> {
    let value = match cell {
        Data::Empty | Data::Error(_) => return None,
        Data::String(s) => CellValue::String(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::String(b.to_string()),
        Data::DateTime(dt) => CellValue::Date(coerce::excel_serial_to_date(dt.as_f64())?),
        Data::DateTimeIso(s) => coerce::parse_date(s)
            .map(CellValue::Date)
            .unwrap_or_else(|| CellValue::String(s.clone())),
        Data::DurationIso(s) => CellValue::String(s.clone()),
    };
    Some(value)
}
