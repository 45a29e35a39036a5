use anyhow::Result;
use serde::Serialize;

use chrono::NaiveDate;

use crate::aggregate::{group_by_date_sum, latest_date, summarize, GroupedSeries, Summary};
use crate::config::ColumnBindings;
use crate::data::coerce::ValueKind;
use crate::data::filter::{self, FilterOptions, FilterSpec};
use crate::data::loader::RecordSource;
use crate::data::model::{Dataset, View};
use crate::error::{ExportError, Warning};
use crate::export::{Attachment, ExportCache};

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

/// One dashboard session: the sheet loaded at start, the column bindings it
/// was opened with, and the export cache. Filters are passed per call.
pub struct Session {
    dataset: Dataset,
    bindings: ColumnBindings,
    exports: ExportCache,
    /// Newest review date of the whole sheet, fixed when the session opens.
    latest_review: Option<NaiveDate>,
    /// Conditions found while preparing the dataset.
    load_warnings: Vec<Warning>,
}

/// Everything the presentation layer draws for one filter selection.
#[derive(Debug, Clone, Serialize)]
pub struct Report<'a> {
    #[serde(skip)]
    pub view: View<'a>,
    /// "Report updated to" stamp. Independent of the filters.
    pub latest_review: Option<NaiveDate>,
    pub summary: Summary,
    /// Plan rate per sent date: the unrecovered-amount chart.
    pub unrecovered_series: GroupedSeries,
    /// Recovered amount per sent date.
    pub recovered_series: GroupedSeries,
    pub warnings: Vec<Warning>,
}

impl Session {
    /// Wrap an already loaded dataset. The review-date column is coerced to
    /// dates up front and its newest value becomes the report stamp.
    pub fn new(mut dataset: Dataset, bindings: ColumnBindings) -> Self {
        let mut load_warnings: Vec<Warning> = dataset
            .coerce_column(&bindings.review_date, ValueKind::Date)
            .into_iter()
            .collect();
        let latest = latest_date(&dataset.view(), &bindings.review_date);
        load_warnings.extend(latest.warnings);
        dedup_unordered(&mut load_warnings);
        for w in &load_warnings {
            log::warn!("{w}");
        }
        Self {
            dataset,
            bindings,
            exports: ExportCache::default(),
            latest_review: latest.value,
            load_warnings,
        }
    }

    /// Read every record from `source` and start a session over it.
    pub fn open(source: &dyn RecordSource, bindings: ColumnBindings) -> Result<Self> {
        log::info!("Opening {}", source.locator());
        let dataset = source.read_records()?;
        Ok(Self::new(dataset, bindings))
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn bindings(&self) -> &ColumnBindings {
        &self.bindings
    }

    pub fn latest_review(&self) -> Option<NaiveDate> {
        self.latest_review
    }

    pub fn load_warnings(&self) -> &[Warning] {
        &self.load_warnings
    }

    /// The filters a fresh dashboard starts with (everything shown).
    pub fn default_filters(&self) -> Vec<FilterSpec> {
        self.bindings.initial_filters()
    }

    /// Choices for each filter widget given the current selection.
    pub fn filter_options(&self, filters: &[FilterSpec]) -> Vec<FilterOptions> {
        filter::cascading_options(&self.dataset.view(), filters)
    }

    /// Apply `filters` and recompute every metric and chart.
    pub fn refresh(&self, filters: &[FilterSpec]) -> Report<'_> {
        let filtered = filter::apply(&self.dataset.view(), filters);
        let view = filtered.view;
        let mut warnings = filtered.warnings;

        let summary = summarize(&view, &self.bindings);
        warnings.extend(summary.warnings);

        let b = &self.bindings;
        let unrecovered = group_by_date_sum(&view, &b.sent_date, &b.plan_rate);
        warnings.extend(unrecovered.warnings);
        let recovered = group_by_date_sum(&view, &b.sent_date, &b.recovered_amount);
        warnings.extend(recovered.warnings);

        dedup_unordered(&mut warnings);
        log::debug!("refresh: {} of {} rows, {} warnings", view.len(), self.dataset.len(), warnings.len());

        Report {
            view,
            latest_review: self.latest_review,
            summary: summary.value,
            unrecovered_series: unrecovered.value,
            recovered_series: recovered.value,
            warnings,
        }
    }

    /// Spreadsheet attachment of the rows matching `filters`.
    pub fn export(&mut self, filters: &[FilterSpec]) -> Result<Attachment, ExportError> {
        let view = filter::apply(&self.dataset.view(), filters).view;
        let bytes = self.exports.get_or_render(&view)?;
        Ok(Attachment::new(bytes))
    }

    pub fn export_cache(&self) -> &ExportCache {
        &self.exports
    }
}

/// Drop repeated warnings, keeping the first occurrence of each.
fn dedup_unordered(warnings: &mut Vec<Warning>) {
    let mut seen = Vec::with_capacity(warnings.len());
    warnings.retain(|w| {
        if seen.contains(w) {
            false
        } else {
            seen.push(w.clone());
            true
        }
    });
}
