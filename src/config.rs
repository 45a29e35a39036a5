use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::filter::{DateChoice, FilterSpec};
use crate::data::model::CellValue;

/// Kind of widget a filter column gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    Categorical,
    Date,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterColumn {
    pub column: String,
    pub kind: FilterKind,
}

impl FilterColumn {
    fn new(column: &str, kind: FilterKind) -> Self {
        Self {
            column: column.to_string(),
            kind,
        }
    }

    /// The filter this column starts with: nothing picked for categorical
    /// columns, "select all" for dates.
    pub fn initial_spec(&self) -> FilterSpec {
        match self.kind {
            FilterKind::Categorical => FilterSpec::values(&self.column, Vec::<CellValue>::new()),
            FilterKind::Date => FilterSpec::dates(&self.column, [DateChoice::All]),
        }
    }
}

/// Which sheet columns play which role in the report.
///
/// Every field has a default matching the income-control sheet, so a JSON
/// file only needs the entries that differ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnBindings {
    pub contract: String,
    pub recovered_amount: String,
    pub unrecovered_amount: String,
    pub unbilled_periods: String,
    pub status: String,
    pub resolved_status: String,
    pub pending_status: String,
    pub delay_days: String,
    /// Date of the last review; its maximum is the "report updated to" date.
    pub review_date: String,
    /// Date the observation was sent; x axis of both charts.
    pub sent_date: String,
    /// Plan rate summed per sent date for the unrecovered-amount chart.
    pub plan_rate: String,
    /// Filter widgets, in presentation order.
    pub filters: Vec<FilterColumn>,
}

impl Default for ColumnBindings {
    fn default() -> Self {
        Self {
            contract: "CONTRATO".into(),
            recovered_amount: "MONTO RECUPERADO".into(),
            unrecovered_amount: "MONTO NO RECUPERADO".into(),
            unbilled_periods: "PERIODOS NO FACTURADO".into(),
            status: "ESTADO".into(),
            resolved_status: "RESUELTO".into(),
            pending_status: "PENDIENTE".into(),
            delay_days: "DIAS DE DEMORA".into(),
            review_date: "FECHA DE REVISION".into(),
            sent_date: "FECHA ENVIO".into(),
            plan_rate: "TARIFA PLAN".into(),
            filters: vec![
                FilterColumn::new("CONTRATO", FilterKind::Categorical),
                FilterColumn::new("FECHA ENVIO", FilterKind::Date),
                FilterColumn::new("TIPO DE SERVICIO", FilterKind::Categorical),
                FilterColumn::new("ESTADO", FilterKind::Categorical),
                FilterColumn::new("RESPONSABLE", FilterKind::Categorical),
                FilterColumn::new("TIPO DE ERROR", FilterKind::Categorical),
            ],
        }
    }
}

impl ColumnBindings {
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("parsing column bindings")
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading column bindings from {}", path.display()))?;
        Self::from_json_str(&text)
    }

    /// One initial filter per configured filter column.
    pub fn initial_filters(&self) -> Vec<FilterSpec> {
        self.filters.iter().map(FilterColumn::initial_spec).collect()
    }
}
