use chrono::NaiveDate;
use pretty_assertions::assert_eq;

use recovery_panel::data::loader::read_xlsx_bytes;
use recovery_panel::{
    apply, group_by_date_sum, summarize, to_xlsx_bytes, CellValue, ColumnBindings, Dataset, FileSource,
    FilterSpec, Row, Session, Warning,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn two_contracts() -> Dataset {
    Dataset::from_rows(vec![
        Row::new()
            .with("CONTRATO", "A")
            .with("STATUS", "RESOLVED")
            .with("RECOVERED", 100.0),
        Row::new()
            .with("CONTRATO", "B")
            .with("STATUS", "PENDING")
            .with("RECOVERED", "bad"),
    ])
}

fn bindings() -> ColumnBindings {
    ColumnBindings {
        contract: "CONTRATO".into(),
        recovered_amount: "RECOVERED".into(),
        status: "STATUS".into(),
        resolved_status: "RESOLVED".into(),
        pending_status: "PENDING".into(),
        ..ColumnBindings::default()
    }
}

#[test]
fn summary_of_resolved_and_pending() {
    let ds = two_contracts();
    let s = summarize(&ds.view(), &bindings()).value;
    assert_eq!(s.rows, 2);
    assert_eq!(s.recovered_total, 100.0);
    assert_eq!(s.resolved_cases, 1);
    assert_eq!(s.pending_cases, 1);
}

#[test]
fn filter_by_contract() {
    let ds = two_contracts();
    let out = apply(&ds.view(), &[FilterSpec::values("CONTRATO", ["A"])]);
    assert_eq!(out.view.len(), 1);
    assert_eq!(out.view.rows().next().unwrap(), &ds.rows()[0]);
}

#[test]
fn series_over_two_dates() {
    let ds = Dataset::from_rows(vec![
        Row::new().with("FECHA", date(2024, 5, 1)).with("V", 4.0),
        Row::new().with("FECHA", date(2024, 5, 1)).with("V", 6.0),
        Row::new().with("FECHA", date(2024, 5, 9)).with("V", 30.0),
    ]);
    let series = group_by_date_sum(&ds.view(), "FECHA", "V").value;
    assert_eq!(series.len(), 2);
    assert_eq!(series.sums(), [10.0, 30.0]);
    assert_eq!(series.points[1].rolling_mean, 20.0);
}

#[test]
fn empty_result_flows_through() {
    let ds = two_contracts();
    let view = apply(&ds.view(), &[FilterSpec::values("CONTRATO", ["Z"])]).view;
    assert!(view.is_empty());

    let s = summarize(&view, &bindings()).value;
    assert_eq!((s.rows, s.resolved_cases, s.pending_cases), (0, 0, 0));
    assert_eq!(s.recovered_total, 0.0);
    assert!(s.unbilled_periods_mean.is_nan());

    let back = read_xlsx_bytes(&to_xlsx_bytes(&view).unwrap()).unwrap();
    assert!(back.is_empty());
    assert_eq!(back.columns(), ["CONTRATO", "STATUS", "RECOVERED"]);
}

#[test]
fn json_sheet_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("casos.json");
    std::fs::write(
        &path,
        r#"[
          {"CONTRATO": "C-1", "FECHA ENVIO": "2024-03-01", "ESTADO": "RESUELTO",
           "TARIFA PLAN": 100, "MONTO RECUPERADO": 100, "FECHA DE REVISION": "2024-03-04"},
          {"CONTRATO": "C-2", "FECHA ENVIO": "2024-03-01", "ESTADO": "PENDIENTE",
           "TARIFA PLAN": 80, "MONTO RECUPERADO": "", "FECHA DE REVISION": ""},
          {"CONTRATO": "C-3", "FECHA ENVIO": "03/02/2024", "ESTADO": "RESUELTO",
           "TARIFA PLAN": "50", "MONTO RECUPERADO": 25, "FECHA DE REVISION": "2024-03-06"}
        ]"#,
    )
    .unwrap();

    let mut session = Session::open(&FileSource::new(&path), ColumnBindings::default()).unwrap();
    let report = session.refresh(&session.default_filters());
    assert_eq!(report.summary.rows, 3);
    assert_eq!(report.summary.recovered_total, 125.0);
    assert_eq!(report.latest_review, Some(date(2024, 3, 6)));
    assert_eq!(report.unrecovered_series.dates(), [date(2024, 3, 1), date(2024, 3, 2)]);
    assert_eq!(report.unrecovered_series.sums(), [180.0, 50.0]);
    assert!(report
        .warnings
        .contains(&Warning::MissingColumn { column: "DIAS DE DEMORA".into() }));

    let attachment = session.export(&[FilterSpec::values("ESTADO", ["RESUELTO"])]).unwrap();
    assert_eq!(
        attachment.content_type,
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
    );
    let back = read_xlsx_bytes(&attachment.bytes).unwrap();
    let contracts: Vec<_> = back.rows().iter().map(|r| r.value("CONTRATO").clone()).collect();
    assert_eq!(contracts, [CellValue::from("C-1"), CellValue::from("C-3")]);
}

#[test]
fn exported_workbook_loads_as_a_source() {
    let ds = two_contracts();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reporte_filtrado.xlsx");
    std::fs::write(&path, to_xlsx_bytes(&ds.view()).unwrap()).unwrap();

    let session = Session::open(&FileSource::new(&path), bindings()).unwrap();
    assert_eq!(session.dataset().rows(), ds.rows());
}
