use sweep_core::{
    Assignment, EvalError, EvalErrorKind, EvalRequest, Evaluator, FnEvaluator, MemoryRecorder,
    ParamValue, Record, ResultValue,
};

fn quality_evaluator() -> impl Evaluator {
    FnEvaluator::new("quality/v1", |request: &EvalRequest<'_>| {
        let depth = request
            .assignment
            .get("depth")
            .and_then(ParamValue::as_int)
            .ok_or_else(|| EvalError::failed("missing depth"))?;
        let mut record = Record::new();
        if request.wants("quality") {
            record.insert("quality", ResultValue::Real(depth as f64));
        }
        if request.wants("rrd") {
            let mut session = request.recorder.open("mesh");
            session.log("mesh", &depth.to_le_bytes());
            record.insert("rrd", ResultValue::Artifact(session.finish()));
        }
        Ok(record)
    })
}

#[test]
fn closure_evaluator_respects_requested_fields() {
    let evaluator = quality_evaluator();
    let assignment = Assignment::new().with("depth", ParamValue::Int(8));
    let recorder = MemoryRecorder::new();
    let fields = vec!["quality".to_string()];
    let request = EvalRequest {
        assignment: &assignment,
        fields: &fields,
        recorder: &recorder,
    };
    let record = evaluator.evaluate(&request).expect("evaluate");
    assert_eq!(record.get("quality"), Some(&ResultValue::Real(8.0)));
    assert!(record.get("rrd").is_none());
    assert_eq!(evaluator.identity(), "quality/v1");
}

#[test]
fn empty_field_selection_populates_everything() {
    let evaluator = quality_evaluator();
    let assignment = Assignment::new().with("depth", ParamValue::Int(9));
    let recorder = MemoryRecorder::new();
    let request = EvalRequest {
        assignment: &assignment,
        fields: &[],
        recorder: &recorder,
    };
    let record = evaluator.evaluate(&request).expect("evaluate");
    assert_eq!(record.fields().collect::<Vec<_>>(), vec!["quality", "rrd"]);
    assert!(record.get("rrd").and_then(ResultValue::as_artifact).is_some());
}

#[test]
fn evaluator_errors_carry_their_kind() {
    let evaluator = quality_evaluator();
    let assignment = Assignment::new().with("scale", ParamValue::Real(1.1));
    let recorder = MemoryRecorder::new();
    let request = EvalRequest {
        assignment: &assignment,
        fields: &[],
        recorder: &recorder,
    };
    let err = evaluator.evaluate(&request).expect_err("missing depth");
    assert_eq!(err.kind, EvalErrorKind::Failed);
    assert_eq!(err.to_string(), "failed: missing depth");
}
