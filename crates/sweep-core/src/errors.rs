//! Structured error types shared across sweep crates.
//!
//! Every failure carries a stable code (`level-zero`, `dimension-unknown`,
//! `cache-conflict`, `json_deserialize`) that tests and callers match on.
//! The family decides whether a sweep aborts, see [`SweepError::is_fatal`].

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Code, message and the sweep state that explains a [`SweepError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable code such as `custom-kind` or `cache-write`.
    pub code: String,
    /// One-line description of what went wrong.
    pub message: String,
    /// Offending state keyed by role: `dimension` and `level` for space
    /// errors, `path` for store and report IO, `fingerprint` and `stored_at`
    /// for cache conflicts.
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Suggested remedy, or the underlying sqlite/io/serde error text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Payload with no context and no hint.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Records one piece of offending state, e.g. `("dimension", "depth")`.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Attaches the remedy or the lower-level error text.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Error returned by space validation, cache access and sweep execution.
///
/// Evaluator failures normally stay on their report row as an `EvalError`;
/// only escalations surface as [`SweepError::Evaluation`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum SweepError {
    /// Invalid parameter space, level, selection or run configuration.
    #[error("configuration error: {0}")]
    Config(ErrorInfo),
    /// Evaluator failure escalated outside of a report row.
    #[error("evaluation error: {0}")]
    Evaluation(ErrorInfo),
    /// One fingerprint maps to two different results.
    #[error("data integrity error: {0}")]
    Integrity(ErrorInfo),
    /// Persistent result store could not be opened, read or written.
    #[error("cache error: {0}")]
    Cache(ErrorInfo),
    /// Serialization, schema and report IO errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl SweepError {
    /// Code, message and context of the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            SweepError::Config(info)
            | SweepError::Evaluation(info)
            | SweepError::Integrity(info)
            | SweepError::Cache(info)
            | SweepError::Serde(info) => info,
        }
    }

    /// Returns true when the error must abort a sweep.
    ///
    /// Cache faults are recoverable: recomputation is always a valid fallback.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SweepError::Cache(_))
    }
}
