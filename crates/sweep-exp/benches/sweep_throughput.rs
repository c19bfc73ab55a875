use std::sync::Once;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sweep_exp::{
    CacheBackend, Dimension, EvalError, EvalRequest, FnEvaluator, NullRecorder, ParamValue,
    ParameterSpace, Record, ResultCache, ResultValue, SweepEngine, SweepOptions,
};

fn make_space() -> ParameterSpace {
    ParameterSpace::new(vec![
        Dimension::int("depth", [7, 10], 7),
        Dimension::float("scale", [1.0, 1.4], 1.1),
        Dimension::boolean("linear_fit", false),
    ])
    .expect("space")
}

fn evaluate(request: &EvalRequest<'_>) -> Result<Record, EvalError> {
    let depth = request
        .assignment
        .get("depth")
        .and_then(ParamValue::as_int)
        .ok_or_else(|| EvalError::failed("depth missing"))?;
    let scale = request
        .assignment
        .get("scale")
        .and_then(ParamValue::as_real)
        .unwrap_or(1.0);
    Ok(Record::new().with("quality", ResultValue::Real(depth as f64 * scale)))
}

fn warm_cache() -> ResultCache {
    let dir = std::env::temp_dir().join("sweep-bench");
    let cache = ResultCache::open(&CacheBackend::from_path(dir.join("cache.sqlite")))
        .expect("bench cache");
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        cache.clear().expect("reset cache");
    });
    cache
}

fn bench_sweep(c: &mut Criterion) {
    let space = make_space();
    let evaluator = FnEvaluator::new("bench/v1", evaluate);
    let options = SweepOptions::level(4);

    let disabled = ResultCache::disabled();
    c.bench_function("sweep_cold", |b| {
        b.iter(|| {
            let report = SweepEngine::new(&disabled, &NullRecorder)
                .run(&space, &evaluator, &options)
                .expect("sweep");
            black_box(report.stats);
        });
    });

    let cache = warm_cache();
    SweepEngine::new(&cache, &NullRecorder)
        .run(&space, &evaluator, &options)
        .expect("warm-up");
    c.bench_function("sweep_cache_hits", |b| {
        b.iter(|| {
            let report = SweepEngine::new(&cache, &NullRecorder)
                .run(&space, &evaluator, &options)
                .expect("sweep");
            black_box(report.stats);
        });
    });
}

criterion_group!(benches, bench_sweep);
criterion_main!(benches);
