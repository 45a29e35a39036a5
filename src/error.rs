use serde::Serialize;
use thiserror::Error;

use crate::data::coerce::ValueKind;

/// Recoverable conditions. The pipeline substitutes a default value and
/// hands these to the caller alongside the result.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum Warning {
    #[error("column '{column}' does not exist in the dataset")]
    MissingColumn { column: String },

    #[error("no value in column '{column}' could be read as a {kind}")]
    UncoercibleColumn { column: String, kind: ValueKind },

    #[error("no rows with both a valid '{date_column}' and a valid '{value_column}'")]
    NoValidData {
        date_column: String,
        value_column: String,
    },

    #[error("no valid dates found in column '{column}'")]
    NoValidDates { column: String },
}

/// Failure to produce the spreadsheet byte stream. The only fatal error of the
/// filter/aggregate/export pipeline.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("row {row}, column '{column}': {reason}")]
    UnsupportedValue {
        row: usize,
        column: String,
        reason: String,
    },

    #[error("{rows} rows do not fit in one worksheet")]
    TooManyRows { rows: usize },

    #[error("{columns} columns do not fit in one worksheet")]
    TooManyColumns { columns: usize },

    #[error("writing workbook: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
}

/// A value computed with fallbacks, plus the warnings raised on the way.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome<T> {
    pub value: T,
    pub warnings: Vec<Warning>,
}

impl<T> Outcome<T> {
    pub fn new(value: T, warnings: Vec<Warning>) -> Self {
        Self { value, warnings }
    }

    pub fn clean(value: T) -> Self {
        Self::new(value, Vec::new())
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}
