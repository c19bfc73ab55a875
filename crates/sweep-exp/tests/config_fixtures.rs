use std::path::PathBuf;

use sweep_exp::{load_run_config, load_space, ParamValue, Sampling, ScopeMode};

fn workspace_root() -> PathBuf {
    let candidate = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("..").join("..");
    candidate.canonicalize().unwrap_or(candidate)
}

#[test]
fn poisson_space_fixture_loads() {
    let space = load_space(&workspace_root().join("configs/poisson_space.yaml")).expect("space");
    assert_eq!(space.names(), vec!["depth", "scale", "linear_fit"]);
    let defaults = space.defaults();
    assert_eq!(defaults.get("depth"), Some(&ParamValue::Int(7)));
    assert_eq!(defaults.get("scale"), Some(&ParamValue::Real(1.1)));
    assert_eq!(defaults.get("linear_fit"), Some(&ParamValue::Bool(false)));
    assert_eq!(space.discretize(3).expect("grid").len(), 3 * 3 * 2);
}

#[test]
fn poisson_run_fixture_loads() {
    let config = load_run_config(&workspace_root().join("configs/poisson_run.yaml")).expect("run");
    assert_eq!(config.sampling(), Sampling::Level(3));
    assert_eq!(config.scope(), ScopeMode::TagScoped);
    assert_eq!(config.tag, "bunny");
    assert_eq!(config.parallelism, 2);
    assert_eq!(config.result_vars.len(), 4);
}

#[test]
fn malformed_space_is_a_config_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("space.yaml");
    std::fs::write(
        &path,
        "dimensions:\n  - name: depth\n    kind: int\n    bounds: [10, 7]\n    default: 7\n",
    )
    .expect("write");
    let err = load_space(&path).expect_err("inverted bounds");
    assert_eq!(err.info().code, "config-parse");
    assert!(err.info().message.contains("lower bound exceeds upper bound"));
}
