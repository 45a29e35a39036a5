use std::collections::{BTreeSet, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::coerce::{self, ValueKind};
use super::model::{CellValue, View};
use crate::error::Warning;

// ---------------------------------------------------------------------------
// Filter predicates
// ---------------------------------------------------------------------------

/// One entry of a date selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateChoice {
    /// "Select all": disables the filter whatever else is selected.
    All,
    /// Matches rows whose date is absent or unparseable.
    Missing,
    On(NaiveDate),
}

/// What a filter accepts. An empty set means nothing was picked, which
/// matches every row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Values(BTreeSet<CellValue>),
    Dates(BTreeSet<DateChoice>),
}

/// A column plus the values accepted in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSpec {
    pub column: String,
    pub selection: Selection,
}

impl FilterSpec {
    pub fn values<V: Into<CellValue>>(column: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        FilterSpec {
            column: column.into(),
            selection: Selection::Values(values.into_iter().map(Into::into).collect()),
        }
    }

    pub fn dates(column: impl Into<String>, choices: impl IntoIterator<Item = DateChoice>) -> Self {
        FilterSpec {
            column: column.into(),
            selection: Selection::Dates(choices.into_iter().collect()),
        }
    }

    /// Whether this filter lets every row through regardless of the data.
    pub fn is_noop(&self) -> bool {
        match &self.selection {
            Selection::Values(values) => values.is_empty(),
            Selection::Dates(choices) => choices.is_empty() || choices.contains(&DateChoice::All),
        }
    }
}

/// Result of [`apply`]: the narrowed view and any recoverable conditions.
#[derive(Debug, Clone)]
pub struct Filtered<'a> {
    pub view: View<'a>,
    pub warnings: Vec<Warning>,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Narrow `view` by every filter in order (logical AND).
///
/// A filter whose column is unknown to the dataset is skipped with a
/// [`Warning::MissingColumn`]. Row order is never changed.
pub fn apply<'a>(view: &View<'a>, filters: &[FilterSpec]) -> Filtered<'a> {
    let dataset = view.dataset();
    let mut indices = view.indices().to_vec();
    let mut warnings = Vec::new();

    for spec in filters {
        if !dataset.has_column(&spec.column) {
            log::warn!("filter on unknown column '{}' skipped", spec.column);
            warnings.push(Warning::MissingColumn {
                column: spec.column.clone(),
            });
            continue;
        }
        if spec.is_noop() {
            continue;
        }

        let before = indices.len();
        let current = View::from_indices(dataset, indices);
        indices = match &spec.selection {
            Selection::Values(accepted) => current
                .indexed_rows()
                .filter(|(_, row)| accepted.contains(row.value(&spec.column)))
                .map(|(i, _)| i)
                .collect(),
            Selection::Dates(accepted) => {
                let (dates, warning) = coerce_dates(&current, &spec.column);
                warnings.extend(warning);
                current
                    .indices()
                    .iter()
                    .zip(dates)
                    .filter(|(_, date)| match date {
                        Some(d) => accepted.contains(&DateChoice::On(*d)),
                        None => accepted.contains(&DateChoice::Missing),
                    })
                    .map(|(&i, _)| i)
                    .collect()
            }
        };
        log::debug!("filter '{}': {before} -> {} rows", spec.column, indices.len());
    }

    Filtered {
        view: View::from_indices(dataset, indices),
        warnings,
    }
}

/// Parse `column` of every row in `view` as a date.
///
/// When the column holds values but none parse, the whole column is treated
/// as missing and a warning is returned.
fn coerce_dates(view: &View<'_>, column: &str) -> (Vec<Option<NaiveDate>>, Option<Warning>) {
    let mut present = 0usize;
    let dates: Vec<Option<NaiveDate>> = view
        .rows()
        .map(|row| {
            let cell = row.value(column);
            if !cell.is_missing() {
                present += 1;
            }
            coerce::to_date(cell)
        })
        .collect();

    let warning = (present > 0 && dates.iter().all(Option::is_none)).then(|| {
        log::warn!("column '{column}' has no parseable dates");
        Warning::UncoercibleColumn {
            column: column.to_string(),
            kind: ValueKind::Date,
        }
    });
    (dates, warning)
}

// ---------------------------------------------------------------------------
// Options for filter widgets
// ---------------------------------------------------------------------------

/// The choices a filter widget offers for one column.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "choices", rename_all = "snake_case")]
pub enum Choices {
    Values(Vec<CellValue>),
    Dates(Vec<DateChoice>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterOptions {
    pub column: String,
    pub choices: Choices,
}

/// Distinct values of `column` in first-seen order. Rows lacking the column
/// contribute [`CellValue::Missing`].
pub fn categorical_options(view: &View<'_>, column: &str) -> Vec<CellValue> {
    let mut seen = HashSet::new();
    view.rows()
        .map(|row| row.value(column))
        .filter(|value| seen.insert(*value))
        .cloned()
        .collect()
}

/// `All` first, then the distinct dates newest first, then `Missing` if any
/// row has no valid date.
pub fn date_options(view: &View<'_>, column: &str) -> Vec<DateChoice> {
    let mut dates = BTreeSet::new();
    let mut any_missing = false;
    for row in view.rows() {
        match coerce::to_date(row.value(column)) {
            Some(d) => {
                dates.insert(d);
            }
            None => any_missing = true,
        }
    }

    let mut options = vec![DateChoice::All];
    options.extend(dates.into_iter().rev().map(DateChoice::On));
    if any_missing {
        options.push(DateChoice::Missing);
    }
    options
}

/// Options for each filter, each computed from the rows left by the filters
/// before it. Filters on unknown columns get no entry.
pub fn cascading_options(view: &View<'_>, filters: &[FilterSpec]) -> Vec<FilterOptions> {
    let mut current = view.clone();
    let mut options = Vec::with_capacity(filters.len());

    for spec in filters {
        if !view.dataset().has_column(&spec.column) {
            continue;
        }
        let choices = match spec.selection {
            Selection::Values(_) => Choices::Values(categorical_options(&current, &spec.column)),
            Selection::Dates(_) => Choices::Dates(date_options(&current, &spec.column)),
        };
        options.push(FilterOptions {
            column: spec.column.clone(),
            choices,
        });
        current = apply(&current, std::slice::from_ref(spec)).view;
    }
    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{Dataset, Row};
    use pretty_assertions::assert_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn cases() -> Dataset {
        Dataset::from_rows(vec![
            Row::new()
                .with("CONTRATO", "A")
                .with("ESTADO", "RESUELTO")
                .with("FECHA ENVIO", "2024-03-01"),
            Row::new()
                .with("CONTRATO", "B")
                .with("ESTADO", "PENDIENTE")
                .with("FECHA ENVIO", "2024-03-02"),
            Row::new()
                .with("CONTRATO", "C")
                .with("ESTADO", "RESUELTO")
                .with("FECHA ENVIO", "sin fecha"),
            Row::new().with("CONTRATO", "D").with("ESTADO", "PENDIENTE"),
        ])
    }

    fn contracts(view: &View<'_>) -> Vec<String> {
        view.rows().map(|r| r.value("CONTRATO").to_string()).collect()
    }

    #[test]
    fn categorical_membership() {
        let ds = cases();
        let out = apply(&ds.view(), &[FilterSpec::values("CONTRATO", ["A", "C"])]);
        assert_eq!(contracts(&out.view), ["A", "C"]);
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn empty_selection_matches_all() {
        let ds = cases();
        let filters = [
            FilterSpec::values("ESTADO", Vec::<CellValue>::new()),
            FilterSpec::dates("FECHA ENVIO", []),
        ];
        let out = apply(&ds.view(), &filters);
        assert_eq!(out.view.indices(), [0, 1, 2, 3]);
    }

    #[test]
    fn filters_combine_with_and() {
        let ds = cases();
        let filters = [
            FilterSpec::values("ESTADO", ["RESUELTO"]),
            FilterSpec::values("CONTRATO", ["A", "B"]),
        ];
        assert_eq!(contracts(&apply(&ds.view(), &filters).view), ["A"]);
    }

    #[test]
    fn unknown_column_is_skipped_with_warning() {
        let ds = cases();
        let out = apply(&ds.view(), &[FilterSpec::values("RESPONSABLE", ["Ana"])]);
        assert_eq!(out.view.len(), 4);
        assert_eq!(
            out.warnings,
            [Warning::MissingColumn { column: "RESPONSABLE".into() }]
        );
    }

    #[test]
    fn missing_cells_match_only_missing_value() {
        let ds = Dataset::from_rows(vec![
            Row::new().with("CONTRATO", "A").with("TIPO", "x"),
            Row::new().with("CONTRATO", "B"),
        ]);
        let out = apply(&ds.view(), &[FilterSpec::values("TIPO", [CellValue::Missing])]);
        assert_eq!(contracts(&out.view), ["B"]);
    }

    #[test]
    fn date_selection() {
        let ds = cases();
        let out = apply(
            &ds.view(),
            &[FilterSpec::dates("FECHA ENVIO", [DateChoice::On(date(2024, 3, 2))])],
        );
        assert_eq!(contracts(&out.view), ["B"]);

        let out = apply(
            &ds.view(),
            &[FilterSpec::dates("FECHA ENVIO", [DateChoice::Missing])],
        );
        assert_eq!(contracts(&out.view), ["C", "D"]);
    }

    #[test]
    fn select_all_overrides_partial_dates() {
        let ds = cases();
        let spec = FilterSpec::dates(
            "FECHA ENVIO",
            [DateChoice::All, DateChoice::On(date(2024, 3, 2))],
        );
        assert!(spec.is_noop());
        assert_eq!(apply(&ds.view(), &[spec]).view.len(), 4);
    }

    #[test]
    fn unparseable_date_column_warns_and_reads_as_missing() {
        let ds = Dataset::from_rows(vec![
            Row::new().with("CONTRATO", "A").with("FECHA", "ayer"),
            Row::new().with("CONTRATO", "B").with("FECHA", "hoy"),
        ]);
        let out = apply(
            &ds.view(),
            &[FilterSpec::dates("FECHA", [DateChoice::On(date(2024, 1, 1))])],
        );
        assert!(out.view.is_empty());
        assert_eq!(
            out.warnings,
            [Warning::UncoercibleColumn {
                column: "FECHA".into(),
                kind: ValueKind::Date
            }]
        );

        let out = apply(&ds.view(), &[FilterSpec::dates("FECHA", [DateChoice::Missing])]);
        assert_eq!(out.view.len(), 2);
    }

    #[test]
    fn filtering_is_idempotent_and_order_preserving() {
        let ds = cases();
        let filters = [FilterSpec::values("ESTADO", ["PENDIENTE", "RESUELTO"])];
        let once = apply(&ds.view(), &filters).view;
        let twice = apply(&once, &filters).view;
        assert_eq!(once.indices(), twice.indices());
        assert_eq!(once.indices(), [0, 1, 2, 3]);
    }

    #[test]
    fn option_lists() {
        let ds = cases();
        assert_eq!(
            categorical_options(&ds.view(), "ESTADO"),
            [CellValue::from("RESUELTO"), CellValue::from("PENDIENTE")]
        );
        assert_eq!(
            date_options(&ds.view(), "FECHA ENVIO"),
            [
                DateChoice::All,
                DateChoice::On(date(2024, 3, 2)),
                DateChoice::On(date(2024, 3, 1)),
                DateChoice::Missing,
            ]
        );
    }

    #[test]
    fn options_cascade_through_earlier_filters() {
        let ds = cases();
        let filters = [
            FilterSpec::values("ESTADO", ["PENDIENTE"]),
            FilterSpec::values("CONTRATO", Vec::<CellValue>::new()),
        ];
        let options = cascading_options(&ds.view(), &filters);
        assert_eq!(options.len(), 2);
        assert_eq!(
            options[0].choices,
            Choices::Values(vec!["RESUELTO".into(), "PENDIENTE".into()])
        );
        assert_eq!(
            options[1].choices,
            Choices::Values(vec!["B".into(), "D".into()])
        );
    }
}
