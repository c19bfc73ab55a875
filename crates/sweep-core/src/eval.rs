//! Evaluator contract consumed by the sweep engine.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::recorder::Recorder;
use crate::value::{Assignment, Record};

/// Category of a failed evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EvalErrorKind {
    /// The evaluator reported an error.
    Failed,
    /// The evaluator exceeded a caller imposed deadline.
    TimedOut,
    /// The evaluator panicked.
    Panicked,
}

impl Display for EvalErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EvalErrorKind::Failed => "failed",
            EvalErrorKind::TimedOut => "timed-out",
            EvalErrorKind::Panicked => "panicked",
        };
        f.write_str(label)
    }
}

/// Failure of a single evaluator invocation.
///
/// Evaluation failures are recorded against their report row and never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{kind}: {message}")]
pub struct EvalError {
    /// Failure category.
    pub kind: EvalErrorKind,
    /// Human readable description.
    pub message: String,
}

impl EvalError {
    /// Ordinary evaluator error.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            kind: EvalErrorKind::Failed,
            message: message.into(),
        }
    }

    /// Deadline exceeded.
    pub fn timed_out(message: impl Into<String>) -> Self {
        Self {
            kind: EvalErrorKind::TimedOut,
            message: message.into(),
        }
    }

    /// Evaluator panic captured by the engine.
    pub fn panicked(message: impl Into<String>) -> Self {
        Self {
            kind: EvalErrorKind::Panicked,
            message: message.into(),
        }
    }
}

/// Inputs handed to [`Evaluator::evaluate`] for one assignment.
pub struct EvalRequest<'a> {
    /// Parameter values to evaluate.
    pub assignment: &'a Assignment,
    /// Result fields requested by the caller; empty means all.
    pub fields: &'a [String],
    /// Recorder used to capture artefacts for this invocation.
    pub recorder: &'a dyn Recorder,
}

impl EvalRequest<'_> {
    /// Returns true when `field` should be populated.
    pub fn wants(&self, field: &str) -> bool {
        self.fields.is_empty() || self.fields.iter().any(|name| name == field)
    }
}

/// Expensive deterministic function evaluated at every sweep point.
pub trait Evaluator: Send + Sync {
    /// Stable identity folded into run-scoped fingerprints.
    ///
    /// Changing the evaluator's behaviour must change its identity.
    fn identity(&self) -> String;

    /// Evaluates one assignment.
    fn evaluate(&self, request: &EvalRequest<'_>) -> Result<Record, EvalError>;
}

/// [`Evaluator`] backed by a closure.
pub struct FnEvaluator<F> {
    identity: String,
    func: F,
}

impl<F> FnEvaluator<F>
where
    F: Fn(&EvalRequest<'_>) -> Result<Record, EvalError> + Send + Sync,
{
    /// Wraps `func` under the given identity.
    pub fn new(identity: impl Into<String>, func: F) -> Self {
        Self {
            identity: identity.into(),
            func,
        }
    }
}

impl<F> Evaluator for FnEvaluator<F>
where
    F: Fn(&EvalRequest<'_>) -> Result<Record, EvalError> + Send + Sync,
{
    fn identity(&self) -> String {
        self.identity.clone()
    }

    fn evaluate(&self, request: &EvalRequest<'_>) -> Result<Record, EvalError> {
        (self.func)(request)
    }
}
