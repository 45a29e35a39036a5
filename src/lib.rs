//! Filter, aggregate and export pipeline behind the income-control dashboard.
//!
//! ```text
//!  RecordSource ─► Dataset ─► filter::apply ─► View ─┬─► aggregate (cards, charts)
//!                                                     └─► export (.xlsx bytes)
//! ```

pub mod aggregate;
pub mod config;
pub mod data;
pub mod error;
pub mod export;
pub mod session;

pub use aggregate::{group_by_date_sum, latest_date, rolling_mean, summarize, GroupedSeries, SeriesPoint, Summary};
pub use config::{ColumnBindings, FilterColumn, FilterKind};
pub use data::coerce::ValueKind;
pub use data::filter::{apply, DateChoice, FilterSpec, Filtered, Selection};
pub use data::loader::{FileSource, RecordSource};
pub use data::model::{CellValue, Dataset, Row, View};
pub use error::{ExportError, Outcome, Warning};
pub use export::{to_xlsx_bytes, Attachment, ExportCache};
pub use session::{Report, Session};
