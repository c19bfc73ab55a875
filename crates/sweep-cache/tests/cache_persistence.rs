use std::path::Path;

use sweep_cache::{fingerprint, CacheBackend, ResultCache, ScopeMode};
use sweep_core::{Artifact, Assignment, ParamValue, Record, ResultValue, SweepError};

fn sample_record(quality: f64) -> Record {
    Record::new()
        .with("quality", ResultValue::Real(quality))
        .with(
            "rrd",
            ResultValue::Artifact(Artifact::new("application/x-rerun-rrd", vec![1, 2, 3])),
        )
}

fn key(depth: i64) -> sweep_cache::Fingerprint {
    let assignment = Assignment::new().with("depth", ParamValue::Int(depth));
    fingerprint(&assignment, "", ScopeMode::RunScoped, "cache-test")
}

fn exercise_backend(backend: CacheBackend) {
    {
        let cache = ResultCache::open(&backend).expect("open cache");
        assert!(cache.is_enabled());
        assert!(cache.lookup(&key(7)).is_none());
        cache.store(&key(7), &sample_record(7.0)).expect("store");
        cache
            .store(&key(7), &sample_record(7.0))
            .expect("idempotent store");
        assert_eq!(cache.len().expect("len"), 1);
    }

    let reopened = ResultCache::open(&backend).expect("reopen cache");
    assert_eq!(reopened.lookup(&key(7)), Some(sample_record(7.0)));
    assert!(reopened.contains(&key(7)));
    assert!(!reopened.contains(&key(8)));

    let err = reopened
        .store(&key(7), &sample_record(7.5))
        .expect_err("conflicting content");
    assert!(matches!(err, SweepError::Integrity(_)));
    assert_eq!(err.info().code, "cache-conflict");
    assert_eq!(reopened.lookup(&key(7)), Some(sample_record(7.0)));

    reopened.store(&key(8), &sample_record(8.0)).expect("store");
    assert_eq!(reopened.clear().expect("clear"), 2);
    assert!(reopened.is_empty().expect("is_empty"));
    assert!(reopened.lookup(&key(8)).is_none());
}

#[test]
fn sqlite_backend_persists_across_reopen() {
    let temp = tempfile::tempdir().expect("tmp dir");
    exercise_backend(CacheBackend::from_path(temp.path().join("nested/cache.sqlite")));
}

#[test]
fn directory_backend_persists_across_reopen() {
    let temp = tempfile::tempdir().expect("tmp dir");
    exercise_backend(CacheBackend::from_path(temp.path().join("cache")));
}

#[test]
fn entries_record_schema_and_fingerprint() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let cache = ResultCache::open(&CacheBackend::from_path(temp.path().join("c.db"))).expect("open");
    cache.store(&key(9), &sample_record(9.0)).expect("store");
    let entry = cache.entry(&key(9)).expect("read").expect("present");
    assert_eq!(entry.fingerprint, key(9));
    assert_eq!(entry.schema, sweep_cache::CACHE_SCHEMA);
    assert!(!entry.created_at.is_empty());
}

#[test]
fn unreachable_location_degrades_to_disabled() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let blocker = temp.path().join("blocker");
    std::fs::write(&blocker, b"not a directory").expect("write blocker");
    let backend = CacheBackend::from_path(blocker.join("cache"));
    assert!(ResultCache::open(&backend).is_err());
    let cache = ResultCache::open_or_disabled(&backend);
    assert!(!cache.is_enabled());
    assert!(cache.location().is_none());
    cache.store(&key(10), &sample_record(10.0)).expect("no-op store");
    assert!(cache.lookup(&key(10)).is_none());
    assert!(!Path::new(&blocker.join("cache")).exists());
}

#[test]
fn directory_handles_never_clobber_each_other() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let backend = CacheBackend::from_path(temp.path().join("cache"));
    let first = ResultCache::open(&backend).expect("first handle");
    let second = ResultCache::open(&backend).expect("second handle");

    first.store(&key(11), &sample_record(11.0)).expect("first store");
    second
        .store(&key(11), &sample_record(11.0))
        .expect("equal content from another handle");
    let err = second
        .store(&key(11), &sample_record(-11.0))
        .expect_err("different content from another handle");
    assert!(matches!(err, SweepError::Integrity(_)));
    assert_eq!(first.lookup(&key(11)), Some(sample_record(11.0)));
    assert_eq!(second.len().expect("len"), 1);
}

#[test]
fn non_finite_reals_are_stored_and_read_back() {
    let temp = tempfile::tempdir().expect("tmp dir");
    for backend in [
        CacheBackend::from_path(temp.path().join("cache.sqlite")),
        CacheBackend::from_path(temp.path().join("cache")),
    ] {
        let cache = ResultCache::open(&backend).expect("open cache");
        let record = Record::new()
            .with("residual", ResultValue::Real(f64::NAN))
            .with("peak", ResultValue::Real(f64::INFINITY));
        cache.store(&key(12), &record).expect("store");
        cache.store(&key(12), &record).expect("repeat store is idempotent");

        let cached = cache.lookup(&key(12)).expect("hit");
        let real = |field: &str| cached.get(field).and_then(ResultValue::as_f64).expect(field);
        assert!(real("residual").is_nan());
        assert_eq!(real("peak"), f64::INFINITY);
    }
}
