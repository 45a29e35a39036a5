use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;

use recovery_panel::data::coerce;
use recovery_panel::{ColumnBindings, DateChoice, FileSource, FilterSpec, Session};

/// Filter a case sheet, print its metrics and optionally export the rows.
#[derive(Debug, Parser)]
#[command(name = "recovery-panel", version, about)]
struct Args {
    /// Sheet to load (.xlsx, .parquet, .json or .csv).
    data: PathBuf,

    /// JSON file overriding the column bindings.
    #[arg(long)]
    bindings: Option<PathBuf>,

    /// Categorical filter, `COLUMN=value1,value2`. Repeatable.
    #[arg(long = "filter", value_name = "COLUMN=VALUES")]
    filters: Vec<String>,

    /// Date filter, `COLUMN=2024-03-01,2024-03-02`; `all` and `missing` are
    /// accepted as entries. Repeatable.
    #[arg(long = "dates", value_name = "COLUMN=DATES")]
    dates: Vec<String>,

    /// Write the filtered rows to this .xlsx file.
    #[arg(long)]
    export: Option<PathBuf>,

    /// Print the report as JSON instead of text.
    #[arg(long)]
    json: bool,
}

fn split_assignment(arg: &str) -> Result<(&str, Vec<&str>)> {
    let Some((column, values)) = arg.split_once('=') else {
        bail!("expected COLUMN=VALUES, got '{arg}'");
    };
    let values = values
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .collect();
    Ok((column.trim(), values))
}

fn parse_date_choice(token: &str) -> Result<DateChoice> {
    match token.to_ascii_lowercase().as_str() {
        "all" => Ok(DateChoice::All),
        "missing" => Ok(DateChoice::Missing),
        _ => coerce::parse_date(token)
            .map(DateChoice::On)
            .with_context(|| format!("'{token}' is not a date")),
    }
}

fn build_filters(args: &Args) -> Result<Vec<FilterSpec>> {
    let mut filters = Vec::new();
    for arg in &args.filters {
        let (column, values) = split_assignment(arg)?;
        filters.push(FilterSpec::values(column, values.into_iter().map(coerce::guess)));
    }
    for arg in &args.dates {
        let (column, tokens) = split_assignment(arg)?;
        let choices = tokens
            .into_iter()
            .map(parse_date_choice)
            .collect::<Result<Vec<_>>>()?;
        filters.push(FilterSpec::dates(column, choices));
    }
    Ok(filters)
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let bindings = match &args.bindings {
        Some(path) => ColumnBindings::from_json_file(path)?,
        None => ColumnBindings::default(),
    };
    let filters = build_filters(&args)?;

    let mut session = Session::open(&FileSource::new(&args.data), bindings)?;
    let report = session.refresh(&filters);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        if let Some(date) = report.latest_review {
            println!("Report updated to {date}");
        }
        for (name, value) in report.summary.metrics() {
            println!("{name:>24}: {value:.2}");
        }
        for series in [&report.unrecovered_series, &report.recovered_series] {
            println!("\n{} by {}", series.value_column, series.date_column);
            for p in &series.points {
                println!("  {}  {:>14.2}  trend {:>14.2}", p.date, p.sum, p.rolling_mean);
            }
        }
        for w in session.load_warnings().iter().chain(&report.warnings) {
            eprintln!("warning: {w}");
        }
    }

    if let Some(path) = &args.export {
        let attachment = session.export(&filters)?;
        std::fs::write(path, attachment.bytes.as_slice())
            .with_context(|| format!("writing {}", path.display()))?;
        log::info!("Wrote {} ({} bytes)", path.display(), attachment.bytes.len());
    }
    Ok(())
}
