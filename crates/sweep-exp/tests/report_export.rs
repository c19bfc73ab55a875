use std::fs;

use sweep_exp::{
    artifact_file_name, Dimension, EvalError, EvalRequest, FnEvaluator, MemoryRecorder,
    ParamValue, ParameterSpace, Record, ResultCache, ResultValue, SweepEngine, SweepOptions,
    SweepReport,
};
use tempfile::tempdir;

fn mesh_space() -> ParameterSpace {
    ParameterSpace::new(vec![
        Dimension::int("depth", [7, 8], 7),
        Dimension::boolean("linear_fit", false),
    ])
    .expect("space")
}

fn mesh_report(fields: Vec<String>) -> SweepReport {
    let evaluator = FnEvaluator::new("mesh/v1", |request: &EvalRequest<'_>| {
        let depth = request
            .assignment
            .get("depth")
            .and_then(ParamValue::as_int)
            .ok_or_else(|| EvalError::failed("depth missing"))?;
        let linear = request
            .assignment
            .get("linear_fit")
            .and_then(ParamValue::as_bool)
            .unwrap_or_default();
        if depth == 8 && linear {
            return Err(EvalError::failed("degenerate mesh"));
        }
        let mut record = Record::new()
            .with("vertices", ResultValue::Int(depth * 100))
            .with("quality", ResultValue::Real(if linear { 0.5 } else { 0.25 }));
        if request.wants("mesh") {
            let mut session = request.recorder.open("mesh");
            session.log("mesh/vertices", &depth.to_le_bytes());
            record.insert("mesh", ResultValue::Artifact(session.finish()));
        }
        Ok(record)
    });
    let cache = ResultCache::disabled();
    let recorder = MemoryRecorder::new();
    SweepEngine::new(&cache, &recorder)
        .run(
            &mesh_space(),
            &evaluator,
            &SweepOptions::level(2).with_tag("mesh").with_fields(fields),
        )
        .expect("sweep")
}

#[test]
fn table_lists_dimensions_fields_and_status() {
    let report = mesh_report(Vec::new());
    let table = report.to_table(&[]);
    assert_eq!(
        table.columns,
        vec!["depth", "linear_fit", "mesh", "quality", "vertices", "status"]
    );
    assert_eq!(table.rows.len(), 4);
    assert_eq!(table.rows[0][0], "7");
    assert_eq!(table.rows[0][1], "false");
    assert_eq!(table.rows[0][3], "0.25");
    assert_eq!(table.rows[0][4], "700");
    assert_eq!(table.rows[0][5], "ok");
    assert!(table.rows[0][2].ends_with("_mesh.rrd"));

    let failed = &table.rows[3];
    assert_eq!(failed[..2], ["8".to_string(), "true".to_string()]);
    assert_eq!(failed[2..5], [String::new(), String::new(), String::new()]);
    assert_eq!(failed[5], "failed: degenerate mesh");
}

#[test]
fn requested_fields_limit_columns() {
    let report = mesh_report(vec!["quality".into()]);
    let fields = report.fields.clone();
    let table = report.to_table(&fields);
    assert_eq!(table.columns, vec!["depth", "linear_fit", "quality", "status"]);
    assert!(report
        .rows
        .iter()
        .filter_map(|row| row.outcome.result())
        .all(|record| record.get("mesh").is_none()));
}

#[test]
fn csv_export_writes_header_and_rows() {
    let dir = tempdir().expect("tempdir");
    let report = mesh_report(vec!["vertices".into(), "quality".into()]);
    let path = dir.path().join("out/report.csv");
    report.write_csv(&path, &report.fields).expect("csv");

    let text = fs::read_to_string(&path).expect("read csv");
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "depth,linear_fit,vertices,quality,status");
    assert_eq!(lines[1], "7,false,700,0.25,ok");
    assert_eq!(lines[4], "8,true,,,failed: degenerate mesh");
}

#[test]
fn json_report_round_trips() {
    let dir = tempdir().expect("tempdir");
    let report = mesh_report(Vec::new());
    let path = dir.path().join("report.json");
    report.write_json(&path).expect("write");
    let loaded = SweepReport::load_json(&path).expect("load");
    assert_eq!(loaded, report);
    assert_eq!(loaded.stats.failed, 1);
}

#[test]
fn artifacts_export_beside_the_report() {
    let dir = tempdir().expect("tempdir");
    let report = mesh_report(Vec::new());
    let written = report
        .export_artifacts(&dir.path().join("artifacts"))
        .expect("export");
    assert_eq!(written.len(), 3);

    let first = &report.rows[0];
    let artifact = first
        .outcome
        .result()
        .and_then(|record| record.get("mesh"))
        .and_then(ResultValue::as_artifact)
        .expect("artifact");
    let path = dir
        .path()
        .join("artifacts")
        .join(artifact_file_name(&first.fingerprint, "mesh", artifact));
    assert_eq!(fs::read(path).expect("artifact bytes"), artifact.data);
}

#[test]
fn group_by_collects_rows_per_value() {
    let report = mesh_report(Vec::new());
    let groups = report.group_by("linear_fit");
    assert_eq!(groups.len(), 2);
    assert_eq!(groups["false"].len(), 2);
    assert_eq!(groups["true"].len(), 2);
    assert!(groups["true"].iter().any(|row| row.outcome.is_failed()));
}

#[test]
fn json_report_keeps_non_finite_results() {
    let dir = tempdir().expect("tempdir");
    let evaluator = FnEvaluator::new("residual/v1", |_: &EvalRequest<'_>| {
        Ok(Record::new().with("residual", ResultValue::Real(f64::NAN)))
    });
    let cache = ResultCache::disabled();
    let report = SweepEngine::new(&cache, &MemoryRecorder::new())
        .run(&mesh_space(), &evaluator, &SweepOptions::level(1))
        .expect("sweep");
    let path = dir.path().join("report.json");
    report.write_json(&path).expect("write");

    let loaded = SweepReport::load_json(&path).expect("load");
    assert_eq!(loaded.rows.len(), report.rows.len());
    assert!(loaded
        .column("residual")
        .into_iter()
        .all(|value| value.is_some_and(f64::is_nan)));
}
