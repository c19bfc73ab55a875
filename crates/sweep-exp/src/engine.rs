use std::collections::{BTreeMap, HashMap};
use std::panic::{self, AssertUnwindSafe};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sweep_cache::{Fingerprint, FingerprintGenerator, ResultCache, ScopeMode};
use sweep_core::errors::{ErrorInfo, SweepError};
use sweep_core::{
    stable_hash_string, Assignment, EvalError, EvalRequest, Evaluator, NullRecorder, Recorder,
    Record, RunProvenance,
};
use tracing::{debug, info, info_span, warn};

use crate::report::{ReportRow, ReportStats, RowOrigin, RowOutcome, SweepReport};
use crate::space::{ParameterSpace, Sampling};

/// Per-invocation sweep settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepOptions {
    pub sampling: Sampling,
    /// Dimensions to sweep; `None` sweeps all of them.
    #[serde(default)]
    pub inputs: Option<Vec<String>>,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub scope: ScopeMode,
    /// Result fields to request and export; empty means all.
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default = "SweepOptions::default_parallelism")]
    pub parallelism: usize,
}

impl SweepOptions {
    const fn default_parallelism() -> usize {
        1
    }

    /// Full-grid sweep at `level` with run-scoped fingerprints.
    pub fn level(level: u32) -> Self {
        Self {
            sampling: Sampling::Level(level),
            inputs: None,
            tag: String::new(),
            scope: ScopeMode::RunScoped,
            fields: Vec::new(),
            parallelism: Self::default_parallelism(),
        }
    }

    /// Sweep over explicit per-dimension values.
    pub fn custom(values: BTreeMap<String, Vec<sweep_core::ParamValue>>) -> Self {
        Self {
            sampling: Sampling::Custom(values),
            ..Self::level(1)
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn with_scope(mut self, scope: ScopeMode) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_inputs(mut self, inputs: Vec<String>) -> Self {
        self.inputs = Some(inputs);
        self
    }

    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }
}

/// Identity of a space/evaluator pairing folded into run-scoped fingerprints.
pub fn run_identity(space: &ParameterSpace, evaluator: &dyn Evaluator) -> Result<String, SweepError> {
    stable_hash_string(&(space, evaluator.identity()))
}

/// Orchestrates enumeration, cache lookups and evaluation.
pub struct SweepEngine<'a> {
    cache: &'a ResultCache,
    recorder: &'a dyn Recorder,
}

enum Resolution {
    Cached(Record),
    Evaluated(Record),
    Failed(EvalError),
}

impl<'a> SweepEngine<'a> {
    pub fn new(cache: &'a ResultCache, recorder: &'a dyn Recorder) -> Self {
        Self { cache, recorder }
    }

    /// Runs one sweep, returning a row per enumerated assignment.
    ///
    /// Configuration problems fail before any evaluation. Evaluator failures
    /// are recorded on their row and never cached. A conflicting cache entry
    /// aborts the sweep with [`SweepError::Integrity`].
    pub fn run(
        &self,
        space: &ParameterSpace,
        evaluator: &dyn Evaluator,
        options: &SweepOptions,
    ) -> Result<SweepReport, SweepError> {
        if options.parallelism == 0 {
            return Err(SweepError::Config(ErrorInfo::new(
                "parallelism-zero",
                "parallelism must be at least 1",
            )));
        }
        let assignments = space.enumerate(&options.sampling, options.inputs.as_deref())?;
        let run_id = run_identity(space, evaluator)?;
        let generator = FingerprintGenerator::new(options.scope, run_id.clone(), options.tag.clone())
            .with_fields(&options.fields);
        let fingerprints: Vec<Fingerprint> =
            assignments.iter().map(|a| generator.fingerprint(a)).collect();

        let span = info_span!(
            "sweep",
            tag = %options.tag,
            scope = ?options.scope,
            points = assignments.len()
        );
        let _entered = span.enter();

        let mut first_seen: HashMap<Fingerprint, usize> = HashMap::new();
        let mut unique = Vec::new();
        for (idx, fp) in fingerprints.iter().enumerate() {
            first_seen.entry(*fp).or_insert_with(|| {
                unique.push(idx);
                idx
            });
        }
        info!(
            points = assignments.len(),
            distinct = unique.len(),
            cache = self.cache.is_enabled(),
            "starting sweep"
        );

        let resolve = |idx: &usize| -> Result<(Fingerprint, Resolution), SweepError> {
            let fp = fingerprints[*idx];
            let resolution = self.resolve(fp, &assignments[*idx], evaluator, &options.fields)?;
            Ok((fp, resolution))
        };
        let resolved: Vec<(Fingerprint, Resolution)> = if options.parallelism == 1 {
            unique.iter().map(resolve).collect::<Result<_, _>>()?
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(options.parallelism)
                .build()
                .map_err(|err| {
                    SweepError::Config(ErrorInfo::new("thread-pool", err.to_string()))
                })?;
            pool.install(|| unique.par_iter().map(resolve).collect::<Result<_, _>>())?
        };
        let resolved: HashMap<Fingerprint, Resolution> = resolved.into_iter().collect();

        let mut rows = Vec::with_capacity(assignments.len());
        for (idx, (assignment, fp)) in assignments.into_iter().zip(fingerprints).enumerate() {
            let Some(resolution) = resolved.get(&fp) else {
                return Err(SweepError::Evaluation(
                    ErrorInfo::new("sweep-unresolved", "fingerprint was never resolved")
                        .with_context("fingerprint", fp.to_hex()),
                ));
            };
            let (origin, outcome) = match resolution {
                _ if first_seen.get(&fp) != Some(&idx) => (RowOrigin::Duplicate, outcome_of(resolution)),
                Resolution::Cached(_) => (RowOrigin::CacheHit, outcome_of(resolution)),
                Resolution::Evaluated(_) | Resolution::Failed(_) => {
                    (RowOrigin::Evaluated, outcome_of(resolution))
                }
            };
            rows.push(ReportRow {
                index: idx,
                assignment,
                fingerprint: fp,
                origin,
                outcome,
            });
        }

        let stats = ReportStats::from_rows(&rows);
        info!(
            evaluated = stats.evaluated,
            cache_hits = stats.cache_hits,
            duplicates = stats.duplicates,
            failed = stats.failed,
            "sweep finished"
        );
        Ok(SweepReport {
            tag: options.tag.clone(),
            scope: options.scope,
            dimensions: space.names(),
            fields: options.fields.clone(),
            rows,
            stats,
            provenance: RunProvenance {
                run_id,
                evaluator: evaluator.identity(),
                created_at: chrono::Utc::now().to_rfc3339(),
                tool_versions: [(
                    env!("CARGO_PKG_NAME").to_string(),
                    env!("CARGO_PKG_VERSION").to_string(),
                )]
                .into_iter()
                .collect(),
            },
        })
    }

    fn resolve(
        &self,
        fp: Fingerprint,
        assignment: &Assignment,
        evaluator: &dyn Evaluator,
        fields: &[String],
    ) -> Result<Resolution, SweepError> {
        if let Some(record) = self.cache.lookup(&fp) {
            debug!(fingerprint = %fp.short(), "cache hit");
            return Ok(Resolution::Cached(record));
        }
        let _claim = self.cache.claim(fp);
        if let Some(record) = self.cache.lookup(&fp) {
            debug!(fingerprint = %fp.short(), "cache hit after concurrent evaluation");
            return Ok(Resolution::Cached(record));
        }
        debug!(fingerprint = %fp.short(), "cache miss, evaluating");
        let request = EvalRequest {
            assignment,
            fields,
            recorder: self.recorder,
        };
        match invoke(evaluator, &request) {
            Ok(record) => {
                match self.cache.store(&fp, &record) {
                    Ok(()) => {}
                    Err(err) if err.is_fatal() => return Err(err),
                    Err(err) => {
                        warn!(fingerprint = %fp.short(), error = %err, "failed to persist result");
                    }
                }
                Ok(Resolution::Evaluated(record))
            }
            Err(error) => {
                warn!(fingerprint = %fp.short(), error = %error, "evaluation failed");
                Ok(Resolution::Failed(error))
            }
        }
    }
}

fn outcome_of(resolution: &Resolution) -> RowOutcome {
    match resolution {
        Resolution::Cached(record) | Resolution::Evaluated(record) => RowOutcome::Ok {
            result: record.clone(),
        },
        Resolution::Failed(error) => RowOutcome::Failed {
            error: error.clone(),
        },
    }
}

fn invoke(evaluator: &dyn Evaluator, request: &EvalRequest<'_>) -> Result<Record, EvalError> {
    match panic::catch_unwind(AssertUnwindSafe(|| evaluator.evaluate(request))) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "evaluator panicked".to_string());
            Err(EvalError::panicked(message))
        }
    }
}

/// Runs a sweep without artefact capture.
pub fn run_sweep(
    space: &ParameterSpace,
    sampling: Sampling,
    evaluator: &dyn Evaluator,
    tag: &str,
    cache: &ResultCache,
    scope: ScopeMode,
) -> Result<SweepReport, SweepError> {
    let options = SweepOptions {
        sampling,
        ..SweepOptions::level(1)
    }
    .with_tag(tag)
    .with_scope(scope);
    SweepEngine::new(cache, &NullRecorder).run(space, evaluator, &options)
}
