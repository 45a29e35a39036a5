use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;

use chrono::NaiveDate;
use serde::{Serialize, Serializer};

use super::coerce::{self, ValueKind};
use crate::error::Warning;

// ---------------------------------------------------------------------------
// CellValue – a single cell of a sheet row
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value as read from a spreadsheet.
/// Used as a set member by the filters, so it must be `Ord` and `Hash`.
#[derive(Debug, Clone)]
pub enum CellValue {
    String(String),
    Number(f64),
    Date(NaiveDate),
    Missing,
}

// -- Manual Eq/Ord so CellValue can live in BTreeSet / HashSet --

impl PartialEq for CellValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for CellValue {}

impl PartialOrd for CellValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CellValue {
    fn cmp(&self, other: &Self) -> Ordering {
        use CellValue::*;
        fn discriminant(v: &CellValue) -> u8 {
            match v {
                Missing => 0,
                Number(_) => 1,
                String(_) => 2,
                Date(_) => 3,
            }
        }
        match (self, other) {
            (Missing, Missing) => Ordering::Equal,
            (Number(a), Number(b)) => a.total_cmp(b),
            (String(a), String(b)) => a.cmp(b),
            (Date(a), Date(b)) => a.cmp(b),
            _ => discriminant(self).cmp(&discriminant(other)),
        }
    }
}

impl std::hash::Hash for CellValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            CellValue::String(s) => s.hash(state),
            CellValue::Number(n) => n.to_bits().hash(state),
            CellValue::Date(d) => d.hash(state),
            CellValue::Missing => {}
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::String(s) => write!(f, "{s}"),
            CellValue::Number(n) => write!(f, "{n}"),
            CellValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            CellValue::Missing => write!(f, "<missing>"),
        }
    }
}

/// Cells go to the presentation layer as plain JSON scalars.
impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellValue::String(s) => serializer.serialize_str(s),
            CellValue::Number(n) => serializer.serialize_f64(*n),
            CellValue::Date(d) => serializer.collect_str(&d.format("%Y-%m-%d")),
            CellValue::Missing => serializer.serialize_none(),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::String(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::String(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<NaiveDate> for CellValue {
    fn from(d: NaiveDate) -> Self {
        CellValue::Date(d)
    }
}

impl CellValue {
    pub fn is_missing(&self) -> bool {
        matches!(self, CellValue::Missing)
    }
}

static MISSING: CellValue = CellValue::Missing;

// ---------------------------------------------------------------------------
// Row – one record of the sheet
// ---------------------------------------------------------------------------

/// One record, keeping its columns in the order they were read.
///
/// Two rows are equal when every column reads the same value in both, whatever
/// their column order. An explicit [`CellValue::Missing`] equals an absent cell.
#[derive(Debug, Clone, Default)]
pub struct Row {
    cells: Vec<(String, CellValue)>,
}

impl PartialEq for Row {
    fn eq(&self, other: &Self) -> bool {
        let covers = |a: &Row, b: &Row| a.iter().all(|(col, value)| b.value(col) == value);
        covers(self, other) && covers(other, self)
    }
}

impl Eq for Row {}

impl std::hash::Hash for Row {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        let mut cells: Vec<_> = self.cells.iter().filter(|(_, v)| !v.is_missing()).collect();
        cells.sort_by(|a, b| a.0.cmp(&b.0));
        cells.hash(state);
    }
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `column` to `value`, replacing an existing cell in place.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<CellValue>) {
        let column = column.into();
        let value = value.into();
        match self.cells.iter_mut().find(|(c, _)| *c == column) {
            Some((_, slot)) => *slot = value,
            None => self.cells.push((column, value)),
        }
    }

    /// Builder-style [`Row::insert`].
    pub fn with(mut self, column: impl Into<String>, value: impl Into<CellValue>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.cells
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v)
    }

    /// Like [`Row::get`] but an absent column reads as [`CellValue::Missing`].
    pub fn value(&self, column: &str) -> &CellValue {
        self.get(column).unwrap_or(&MISSING)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(c, _)| c.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.cells.iter().map(|(c, v)| (c.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    fn get_mut(&mut self, column: &str) -> Option<&mut CellValue> {
        self.cells
            .iter_mut()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v)
    }
}

impl<K: Into<String>, V: Into<CellValue>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (k, v) in iter {
            row.insert(k, v);
        }
        row
    }
}

/// Union of the columns of `rows`, in first-seen order.
pub fn column_union<'a>(rows: impl IntoIterator<Item = &'a Row>) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut columns = Vec::new();
    for row in rows {
        for col in row.columns() {
            if seen.insert(col) {
                columns.push(col.to_string());
            }
        }
    }
    columns
}

// ---------------------------------------------------------------------------
// Dataset – the loaded sheet
// ---------------------------------------------------------------------------

/// All rows of the sheet in source order, plus the first-seen column list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    rows: Vec<Row>,
    columns: Vec<String>,
}

impl Dataset {
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let columns = column_union(&rows);
        Dataset { rows, columns }
    }

    /// Rows without any columns, e.g. a header-only sheet.
    pub fn with_columns(rows: Vec<Row>, header: Vec<String>) -> Self {
        let mut columns = header;
        for col in column_union(&rows) {
            if !columns.contains(&col) {
                columns.push(col);
            }
        }
        Dataset { rows, columns }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// A view over every row.
    pub fn view(&self) -> View<'_> {
        View {
            dataset: self,
            indices: (0..self.rows.len()).collect(),
        }
    }

    /// Rewrite `column` into typed values.
    ///
    /// Cells that fail to parse become [`CellValue::Missing`]. Returns a
    /// warning when the column does not exist, or when it holds values but
    /// none of them parse.
    pub fn coerce_column(&mut self, column: &str, kind: ValueKind) -> Option<Warning> {
        if !self.has_column(column) {
            return Some(Warning::MissingColumn {
                column: column.to_string(),
            });
        }

        let mut present = 0usize;
        let mut parsed = 0usize;
        for row in &mut self.rows {
            let Some(cell) = row.get_mut(column) else {
                continue;
            };
            if cell.is_missing() {
                continue;
            }
            present += 1;
            *cell = match kind {
                ValueKind::Number => coerce::to_number(cell).map_or(CellValue::Missing, CellValue::Number),
                ValueKind::Date => coerce::to_date(cell).map_or(CellValue::Missing, CellValue::Date),
            };
            if !cell.is_missing() {
                parsed += 1;
            }
        }

        log::debug!("coerced '{column}' to {kind}: {parsed}/{present} values parsed");
        if present > 0 && parsed == 0 {
            Some(Warning::UncoercibleColumn {
                column: column.to_string(),
                kind,
            })
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// View – an ordered subset of a dataset
// ---------------------------------------------------------------------------

/// Borrowed subset of a [`Dataset`], identified by row indices in source order.
#[derive(Debug, Clone)]
pub struct View<'a> {
    dataset: &'a Dataset,
    indices: Vec<usize>,
}

impl<'a> View<'a> {
    pub(crate) fn from_indices(dataset: &'a Dataset, indices: Vec<usize>) -> Self {
        View { dataset, indices }
    }

    pub fn dataset(&self) -> &'a Dataset {
        self.dataset
    }

    /// Row indices into the underlying dataset.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn rows(&self) -> impl ExactSizeIterator<Item = &'a Row> + '_ {
        let rows = self.dataset.rows();
        self.indices.iter().map(move |&i| &rows[i])
    }

    pub(crate) fn indexed_rows(&self) -> impl Iterator<Item = (usize, &'a Row)> + '_ {
        let rows = self.dataset.rows();
        self.indices.iter().map(move |&i| (i, &rows[i]))
    }

    /// Column union of the rows in this view, first-seen order.
    ///
    /// An empty view falls back to the columns known to the dataset, so a
    /// fully filtered sheet still exports its header.
    pub fn columns(&self) -> Vec<String> {
        if self.is_empty() {
            return self.dataset.columns().to_vec();
        }
        column_union(self.rows())
    }

    /// Copy the rows of this view into a standalone dataset.
    pub fn to_dataset(&self) -> Dataset {
        Dataset::with_columns(self.rows().cloned().collect(), self.columns())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn columns_follow_first_seen_order() {
        let ds = Dataset::from_rows(vec![
            Row::new().with("B", "x").with("A", 1.0),
            Row::new().with("C", "y").with("B", "z"),
        ]);
        assert_eq!(ds.columns(), ["B", "A", "C"]);
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut row = Row::new().with("A", 1.0).with("B", 2.0);
        row.insert("A", "one");
        assert_eq!(row.columns().collect::<Vec<_>>(), ["A", "B"]);
        assert_eq!(row.get("A"), Some(&CellValue::from("one")));
        assert_eq!(row.value("Z"), &CellValue::Missing);
    }

    #[test]
    fn row_equality_ignores_column_order() {
        let a = Row::new().with("A", 1.0).with("B", "x");
        let b = Row::new().with("B", "x").with("A", 1.0);
        assert_eq!(a, b);
        assert_ne!(a, Row::new().with("A", 1.0));
        assert_eq!(a, b.with("C", CellValue::Missing));
    }

    #[test]
    fn number_ordering_is_total() {
        let nan = CellValue::Number(f64::NAN);
        assert_eq!(nan, nan.clone());
        assert!(CellValue::Missing < CellValue::Number(-1.0));
        assert!(CellValue::Number(2.0) < CellValue::String("a".into()));
    }

    #[test]
    fn coerce_column_parses_and_blanks_failures() {
        let mut ds = Dataset::from_rows(vec![
            Row::new().with("F", "2024-03-01"),
            Row::new().with("F", "not a date"),
            Row::new().with("G", 1.0),
        ]);
        assert_eq!(ds.coerce_column("F", ValueKind::Date), None);
        assert_eq!(ds.rows()[0].value("F"), &CellValue::Date(date(2024, 3, 1)));
        assert_eq!(ds.rows()[1].value("F"), &CellValue::Missing);
        // rows without the column stay without it
        assert_eq!(ds.rows()[2].get("F"), None);
    }

    #[test]
    fn coerce_column_reports_total_failure() {
        let mut ds = Dataset::from_rows(vec![
            Row::new().with("F", "soon"),
            Row::new().with("F", "later"),
        ]);
        let warning = ds.coerce_column("F", ValueKind::Date);
        assert_eq!(
            warning,
            Some(Warning::UncoercibleColumn {
                column: "F".into(),
                kind: ValueKind::Date
            })
        );
        assert!(ds.rows().iter().all(|r| r.value("F").is_missing()));

        assert_eq!(
            ds.coerce_column("nope", ValueKind::Number),
            Some(Warning::MissingColumn { column: "nope".into() })
        );
    }

    #[test]
    fn empty_view_keeps_dataset_header() {
        let ds = Dataset::from_rows(vec![Row::new().with("A", 1.0).with("B", 2.0)]);
        let view = View::from_indices(&ds, Vec::new());
        assert_eq!(view.columns(), ["A", "B"]);
        let copy = view.to_dataset();
        assert!(copy.is_empty());
        assert_eq!(copy.columns(), ["A", "B"]);
    }
}
