//! Filtered rows to a downloadable `.xlsx` workbook.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::Arc;

use chrono::Datelike;
use lru::LruCache;
use rust_xlsxwriter::{DocProperties, ExcelDateTime, Format, Workbook};

use crate::data::model::{CellValue, Row, View};
use crate::error::ExportError;

pub const FILE_NAME: &str = "reporte_filtrado.xlsx";
pub const CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const SHEET_NAME: &str = "Datos Filtrados";

const MAX_ROWS: usize = 1_048_576;
const MAX_COLUMNS: usize = 16_384;

/// A rendered export, ready to hand to a download action.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub file_name: &'static str,
    pub content_type: &'static str,
    pub bytes: Arc<Vec<u8>>,
}

impl Attachment {
    pub fn new(bytes: Arc<Vec<u8>>) -> Self {
        Self {
            file_name: FILE_NAME,
            content_type: CONTENT_TYPE,
            bytes,
        }
    }
}

/// Serialize `view` as a single-sheet workbook.
///
/// The header is the view's column union in first-seen order; rows follow in
/// view order. Missing cells are left blank. The output is byte-for-byte
/// reproducible for the same view.
///
/// A row with no values becomes an empty sheet line. Readers keep such lines
/// between data rows but drop them after the last one, so trailing all-blank
/// rows do not survive a re-read.
pub fn to_xlsx_bytes(view: &View<'_>) -> Result<Vec<u8>, ExportError> {
    render(&view.columns(), view.rows())
}

fn render<'r>(header: &[String], rows: impl ExactSizeIterator<Item = &'r Row>) -> Result<Vec<u8>, ExportError> {
    if rows.len() + 1 > MAX_ROWS {
        return Err(ExportError::TooManyRows { rows: rows.len() });
    }
    if header.len() > MAX_COLUMNS {
        return Err(ExportError::TooManyColumns {
            columns: header.len(),
        });
    }

    let mut workbook = Workbook::new();
    // pinned so identical views give identical bytes
    let created = ExcelDateTime::from_ymd(2000, 1, 1)?;
    workbook.set_properties(&DocProperties::new().set_creation_datetime(&created));

    let bold = Format::new().set_bold();
    let date_format = Format::new().set_num_format("yyyy-mm-dd");

    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    for (col, name) in header.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, name, &bold)?;
    }

    for (i, row) in rows.enumerate() {
        let line = (i + 1) as u32;
        for (col, name) in header.iter().enumerate() {
            let col16 = col as u16;
            match row.value(name) {
                CellValue::Missing => {}
                CellValue::String(s) => {
                    sheet.write_string(line, col16, s)?;
                }
                CellValue::Number(n) => {
                    if !n.is_finite() {
                        return Err(unsupported(i, name, format!("non-finite number {n}")));
                    }
                    sheet.write_number(line, col16, *n)?;
                }
                CellValue::Date(d) => {
                    let excel = u16::try_from(d.year())
                        .ok()
                        .and_then(|y| ExcelDateTime::from_ymd(y, d.month() as u8, d.day() as u8).ok())
                        .ok_or_else(|| unsupported(i, name, format!("date {d} is outside the workbook range")))?;
                    sheet.write_datetime_with_format(line, col16, &excel, &date_format)?;
                }
            }
        }
    }

    Ok(workbook.save_to_buffer()?)
}

fn unsupported(row: usize, column: &str, reason: String) -> ExportError {
    ExportError::UnsupportedValue {
        row,
        column: column.to_string(),
        reason,
    }
}

// ---------------------------------------------------------------------------
// Memoization
// ---------------------------------------------------------------------------

const DEFAULT_CACHE_CAPACITY: usize = 8;

struct CachedExport {
    header: Vec<String>,
    rows: Vec<Row>,
    bytes: Arc<Vec<u8>>,
}

impl CachedExport {
    fn matches(&self, header: &[String], view: &View<'_>) -> bool {
        self.header == header && self.rows.len() == view.len() && self.rows.iter().zip(view.rows()).all(|(a, b)| a == b)
    }
}

/// Remembers recent exports keyed by the content of the exported view, so
/// re-rendering the same selection does not rebuild the workbook.
///
/// Entries are bucketed by a content fingerprint; a hit also requires equal
/// header and rows.
pub struct ExportCache {
    entries: LruCache<u64, Vec<CachedExport>>,
    hits: u64,
    misses: u64,
}

impl Default for ExportCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }
}

impl ExportCache {
    /// A cache holding at most `capacity` fingerprints (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            hits: 0,
            misses: 0,
        }
    }

    /// Bytes for `view`, rendered on first request.
    pub fn get_or_render(&mut self, view: &View<'_>) -> Result<Arc<Vec<u8>>, ExportError> {
        let header = view.columns();
        let fingerprint = fingerprint(&header, view);

        let cached = self
            .entries
            .get(&fingerprint)
            .and_then(|bucket| bucket.iter().find(|e| e.matches(&header, view)))
            .map(|e| Arc::clone(&e.bytes));
        if let Some(bytes) = cached {
            self.hits += 1;
            log::debug!("export cache hit ({} rows)", view.len());
            return Ok(bytes);
        }

        self.misses += 1;
        let bytes = Arc::new(render(&header, view.rows())?);
        log::info!("rendered export: {} rows, {} bytes", view.len(), bytes.len());
        let entry = CachedExport {
            header,
            rows: view.rows().cloned().collect(),
            bytes: Arc::clone(&bytes),
        };
        if let Some(bucket) = self.entries.get_mut(&fingerprint) {
            bucket.push(entry);
        } else {
            self.entries.put(fingerprint, vec![entry]);
        }
        Ok(bytes)
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    /// Number of cached exports.
    pub fn len(&self) -> usize {
        self.entries.iter().map(|(_, bucket)| bucket.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn fingerprint(header: &[String], view: &View<'_>) -> u64 {
    let mut hasher = DefaultHasher::new();
    header.hash(&mut hasher);
    view.len().hash(&mut hasher);
    for row in view.rows() {
        row.hash(&mut hasher);
    }
    hasher.finish()
}
