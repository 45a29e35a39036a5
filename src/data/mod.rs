/// Data layer: cell types, loading, coercion and filtering.
///
/// Architecture:
/// ```text
///  .xlsx / .parquet / .json / .csv
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  read all records → Dataset
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  Dataset  │  Vec<Row>, first-seen column order
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  column selections → View (row indices)
///   └──────────┘
/// ```

pub mod coerce;
pub mod filter;
pub mod loader;
pub mod model;
