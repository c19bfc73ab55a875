//! Parameter space enumeration, cached sweep execution and report assembly.

mod config;
mod engine;
mod report;
mod space;

pub use config::{load_run_config, load_space, CustomValue, RunConfig};
pub use engine::{run_identity, run_sweep, SweepEngine, SweepOptions};
pub use report::{
    artifact_file_name, ReportRow, ReportStats, RowOrigin, RowOutcome, SweepReport, Table,
};
pub use space::{Dimension, Domain, ParameterSpace, Sampling, SpaceSpec};

pub use sweep_cache::{CacheBackend, Fingerprint, ResultCache, ScopeMode};
pub use sweep_core::{
    Artifact, Assignment, EvalError, EvalErrorKind, EvalRequest, Evaluator, FnEvaluator, MemoryRecorder,
    NullRecorder, ParamValue, Record, Recorder, ResultValue, SweepError,
};
