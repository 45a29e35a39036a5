//! Metric cards and chart series computed over a filtered view.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::config::ColumnBindings;
use crate::data::coerce::{self, ValueKind};
use crate::data::model::{CellValue, View};
use crate::error::{Outcome, Warning};

/// Points in the trailing trend line.
pub const ROLLING_WINDOW: usize = 7;

// ---------------------------------------------------------------------------
// Scalar summary
// ---------------------------------------------------------------------------

/// Headline metrics of a view. Means over no eligible value are NaN.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub rows: usize,
    /// Rows with a contract value.
    pub contracts: usize,
    pub recovered_total: f64,
    pub unrecovered_total: f64,
    pub unbilled_periods_mean: f64,
    pub resolved_cases: usize,
    pub pending_cases: usize,
    pub delay_days_mean: f64,
}

impl Summary {
    /// Scalar metrics by name, in card order.
    pub fn metrics(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("rows", self.rows as f64),
            ("contracts", self.contracts as f64),
            ("recovered_total", self.recovered_total),
            ("unrecovered_total", self.unrecovered_total),
            ("unbilled_periods_mean", self.unbilled_periods_mean),
            ("resolved_cases", self.resolved_cases as f64),
            ("pending_cases", self.pending_cases as f64),
            ("delay_days_mean", self.delay_days_mean),
        ]
    }
}

/// Sum and count over the numeric cells of one column.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NumericStats {
    pub sum: f64,
    /// Cells that parsed as numbers.
    pub eligible: usize,
    /// Cells with a value that did not parse.
    pub ineligible: usize,
}

impl NumericStats {
    pub fn mean(&self) -> f64 {
        if self.eligible == 0 {
            f64::NAN
        } else {
            self.sum / self.eligible as f64
        }
    }
}

/// Numeric statistics of `column`, or `None` if the dataset lacks it.
pub fn numeric_stats(view: &View<'_>, column: &str) -> Option<NumericStats> {
    if !view.dataset().has_column(column) {
        return None;
    }
    let mut stats = NumericStats::default();
    for cell in view.rows().map(|row| row.value(column)) {
        match coerce::to_number(cell) {
            Some(n) => {
                stats.sum += n;
                stats.eligible += 1;
            }
            None if !cell.is_missing() => stats.ineligible += 1,
            None => {}
        }
    }
    Some(stats)
}

/// Accumulates warnings while reading designated columns.
struct Collector<'v, 'a> {
    view: &'v View<'a>,
    warnings: Vec<Warning>,
}

impl Collector<'_, '_> {
    fn has(&mut self, column: &str) -> bool {
        let present = self.view.dataset().has_column(column);
        if !present {
            self.warnings.push(Warning::MissingColumn {
                column: column.to_string(),
            });
        }
        present
    }

    fn numeric(&mut self, column: &str) -> NumericStats {
        match numeric_stats(self.view, column) {
            Some(stats) => {
                if stats.eligible == 0 && stats.ineligible > 0 {
                    self.warnings.push(Warning::UncoercibleColumn {
                        column: column.to_string(),
                        kind: ValueKind::Number,
                    });
                }
                stats
            }
            None => {
                self.has(column);
                NumericStats::default()
            }
        }
    }

    fn count(&mut self, column: &str, mut pred: impl FnMut(&CellValue) -> bool) -> usize {
        if !self.has(column) {
            return 0;
        }
        self.view.rows().filter(|row| pred(row.value(column))).count()
    }
}

/// Compute the metric cards for `view`.
///
/// Designated columns missing from the dataset fall back to 0 for counts and
/// sums and NaN for means, each with a [`Warning::MissingColumn`].
pub fn summarize(view: &View<'_>, bindings: &ColumnBindings) -> Outcome<Summary> {
    let mut c = Collector {
        view,
        warnings: Vec::new(),
    };

    let summary = Summary {
        rows: view.len(),
        contracts: c.count(&bindings.contract, |cell| !cell.is_missing()),
        recovered_total: c.numeric(&bindings.recovered_amount).sum,
        unrecovered_total: c.numeric(&bindings.unrecovered_amount).sum,
        unbilled_periods_mean: c.numeric(&bindings.unbilled_periods).mean(),
        resolved_cases: c.count(&bindings.status, is_text(&bindings.resolved_status)),
        pending_cases: c.count(&bindings.status, is_text(&bindings.pending_status)),
        delay_days_mean: c.numeric(&bindings.delay_days).mean(),
    };

    // the status column is read twice; report it once
    c.warnings.dedup();
    Outcome::new(summary, c.warnings)
}

/// Most recent valid date in `column`.
///
/// A non-empty view with no parseable date yields `None` plus
/// [`Warning::NoValidDates`].
pub fn latest_date(view: &View<'_>, column: &str) -> Outcome<Option<NaiveDate>> {
    if !view.dataset().has_column(column) {
        return Outcome::new(
            None,
            vec![Warning::MissingColumn {
                column: column.to_string(),
            }],
        );
    }
    let latest = view.rows().filter_map(|row| coerce::to_date(row.value(column))).max();
    let mut warnings = Vec::new();
    if latest.is_none() && !view.is_empty() {
        warnings.push(Warning::NoValidDates {
            column: column.to_string(),
        });
    }
    Outcome::new(latest, warnings)
}

fn is_text(literal: &str) -> impl Fn(&CellValue) -> bool + '_ {
    move |cell| matches!(cell, CellValue::String(s) if s == literal)
}

// ---------------------------------------------------------------------------
// Date-grouped series
// ---------------------------------------------------------------------------

/// One chart point: the sum of a value column on one date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub sum: f64,
    /// Mean of this and up to six preceding sums.
    pub rolling_mean: f64,
}

/// Ascending per-date sums with their trailing trend.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroupedSeries {
    pub date_column: String,
    pub value_column: String,
    pub points: Vec<SeriesPoint>,
}

impl GroupedSeries {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|p| p.date).collect()
    }

    pub fn sums(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.sum).collect()
    }

    pub fn trend(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.rolling_mean).collect()
    }
}

/// Sum `value_column` per calendar date of `date_column`.
///
/// Rows where either cell fails to parse are left out of this computation
/// only. When no row survives the result is empty and carries
/// [`Warning::NoValidData`].
pub fn group_by_date_sum(view: &View<'_>, date_column: &str, value_column: &str) -> Outcome<GroupedSeries> {
    let mut series = GroupedSeries {
        date_column: date_column.to_string(),
        value_column: value_column.to_string(),
        points: Vec::new(),
    };

    let missing: Vec<Warning> = [value_column, date_column]
        .into_iter()
        .filter(|col| !view.dataset().has_column(col))
        .map(|col| Warning::MissingColumn {
            column: col.to_string(),
        })
        .collect();
    if !missing.is_empty() {
        return Outcome::new(series, missing);
    }

    let mut groups: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for row in view.rows() {
        let date = coerce::to_date(row.value(date_column));
        let value = coerce::to_number(row.value(value_column));
        if let (Some(date), Some(value)) = (date, value) {
            *groups.entry(date).or_insert(0.0) += value;
        }
    }

    if groups.is_empty() {
        log::warn!("no valid '{date_column}'/'{value_column}' pairs to chart");
        return Outcome::new(
            series,
            vec![Warning::NoValidData {
                date_column: date_column.to_string(),
                value_column: value_column.to_string(),
            }],
        );
    }

    let sums: Vec<f64> = groups.values().copied().collect();
    let trend = rolling_mean(&sums, ROLLING_WINDOW);
    series.points = groups
        .into_iter()
        .zip(trend)
        .map(|((date, sum), rolling_mean)| SeriesPoint {
            date,
            sum,
            rolling_mean,
        })
        .collect();
    Outcome::clean(series)
}

/// Trailing mean over `window` points; the first positions average the
/// `i + 1` points available instead of producing NaN.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    (0..values.len())
        .map(|i| {
            let span = &values[(i + 1).saturating_sub(window)..=i];
            span.iter().sum::<f64>() / span.len() as f64
        })
        .collect()
}
