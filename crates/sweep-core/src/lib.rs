#![deny(missing_docs)]
#![doc = "Core value model, error surface and collaborator traits for the sweep engine."]

pub mod canonical;
pub mod errors;
pub mod eval;
pub mod provenance;
pub mod recorder;
pub mod value;

pub use canonical::{
    from_json_slice, from_yaml_slice, stable_hash_string, to_canonical_json_bytes,
};
pub use errors::{ErrorInfo, SweepError};
pub use eval::{EvalError, EvalErrorKind, EvalRequest, Evaluator, FnEvaluator};
pub use provenance::{RunProvenance, SchemaVersion};
pub use recorder::{MemoryRecorder, NullRecorder, Recorder, RecordingSession, RECORDING_MEDIA_TYPE};
pub use value::{Artifact, Assignment, ParamValue, Record, ResultValue};
