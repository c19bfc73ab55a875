use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use csv::WriterBuilder;
use serde::{Deserialize, Serialize};
use sweep_cache::{Fingerprint, ScopeMode};
use sweep_core::errors::{ErrorInfo, SweepError};
use sweep_core::{
    from_json_slice, to_canonical_json_bytes, Artifact, Assignment, EvalError, Record,
    ResultValue, RunProvenance,
};

fn io_error(code: &str, path: &Path, err: impl ToString) -> SweepError {
    SweepError::Serde(
        ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()),
    )
}

/// Where a row's result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RowOrigin {
    /// The evaluator ran for this row (successfully or not).
    Evaluated,
    /// The result was read from the cache.
    CacheHit,
    /// An earlier row of the same sweep shares the fingerprint.
    Duplicate,
}

/// Outcome recorded for a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RowOutcome {
    Ok { result: Record },
    Failed { error: EvalError },
}

impl RowOutcome {
    pub fn result(&self) -> Option<&Record> {
        match self {
            RowOutcome::Ok { result } => Some(result),
            RowOutcome::Failed { .. } => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, RowOutcome::Failed { .. })
    }
}

/// One grid point of a sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub index: usize,
    pub assignment: Assignment,
    pub fingerprint: Fingerprint,
    pub origin: RowOrigin,
    #[serde(flatten)]
    pub outcome: RowOutcome,
}

/// Row counters for one sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReportStats {
    pub total: usize,
    pub evaluated: usize,
    pub cache_hits: usize,
    pub duplicates: usize,
    pub failed: usize,
}

impl ReportStats {
    pub fn from_rows(rows: &[ReportRow]) -> Self {
        let mut stats = ReportStats {
            total: rows.len(),
            ..ReportStats::default()
        };
        for row in rows {
            match row.origin {
                RowOrigin::Evaluated => stats.evaluated += 1,
                RowOrigin::CacheHit => stats.cache_hits += 1,
                RowOrigin::Duplicate => stats.duplicates += 1,
            }
            if row.outcome.is_failed() {
                stats.failed += 1;
            }
        }
        stats
    }
}

/// Ordered (assignment, result) rows covering one sweep invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    pub tag: String,
    pub scope: ScopeMode,
    /// Dimension names in declaration order.
    pub dimensions: Vec<String>,
    /// Result fields requested for export; empty means all.
    #[serde(default)]
    pub fields: Vec<String>,
    pub rows: Vec<ReportRow>,
    pub stats: ReportStats,
    pub provenance: RunProvenance,
}

/// Tabular export: one column per dimension, one per field, then `status`.
///
/// The status cell is `ok` or the evaluator error, e.g. `failed: <message>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl SweepReport {
    /// Result fields that [`SweepReport::to_table`] emits for `requested`.
    ///
    /// An empty request selects every field present in any row, sorted.
    pub fn exported_fields(&self, requested: &[String]) -> Vec<String> {
        if !requested.is_empty() {
            return requested.to_vec();
        }
        let mut fields = BTreeSet::new();
        for row in &self.rows {
            if let Some(result) = row.outcome.result() {
                fields.extend(result.fields().map(str::to_string));
            }
        }
        fields.into_iter().collect()
    }

    /// Builds the export table; artefact cells hold their exported file name.
    pub fn to_table(&self, requested: &[String]) -> Table {
        let fields = self.exported_fields(requested);
        let mut columns = self.dimensions.clone();
        columns.extend(fields.iter().cloned());
        columns.push("status".to_string());

        let rows = self
            .rows
            .iter()
            .map(|row| {
                let mut cells: Vec<String> = self
                    .dimensions
                    .iter()
                    .map(|name| {
                        row.assignment
                            .get(name)
                            .map(ToString::to_string)
                            .unwrap_or_default()
                    })
                    .collect();
                for field in &fields {
                    let cell = match row.outcome.result().and_then(|result| result.get(field)) {
                        Some(ResultValue::Artifact(artifact)) => {
                            artifact_file_name(&row.fingerprint, field, artifact)
                        }
                        Some(value) => value.to_string(),
                        None => String::new(),
                    };
                    cells.push(cell);
                }
                cells.push(match &row.outcome {
                    RowOutcome::Ok { .. } => "ok".to_string(),
                    RowOutcome::Failed { error } => error.to_string(),
                });
                cells
            })
            .collect();
        Table { columns, rows }
    }

    /// Column-wise numeric view of `field`, `None` where absent or non-numeric.
    pub fn column(&self, field: &str) -> Vec<Option<f64>> {
        self.rows
            .iter()
            .map(|row| {
                row.outcome
                    .result()
                    .and_then(|result| result.get(field))
                    .and_then(ResultValue::as_f64)
            })
            .collect()
    }

    /// Rows grouped by the value of one dimension, keyed by its display form.
    pub fn group_by(&self, dimension: &str) -> BTreeMap<String, Vec<&ReportRow>> {
        let mut groups: BTreeMap<String, Vec<&ReportRow>> = BTreeMap::new();
        for row in &self.rows {
            let key = row
                .assignment
                .get(dimension)
                .map(ToString::to_string)
                .unwrap_or_default();
            groups.entry(key).or_default().push(row);
        }
        groups
    }

    pub fn write_json(&self, path: &Path) -> Result<(), SweepError> {
        ensure_parent(path)?;
        let bytes = to_canonical_json_bytes(self)?;
        fs::write(path, bytes).map_err(|err| io_error("report-write", path, err))
    }

    pub fn load_json(path: &Path) -> Result<Self, SweepError> {
        let bytes = fs::read(path).map_err(|err| io_error("report-read", path, err))?;
        from_json_slice(&bytes)
    }

    pub fn write_csv(&self, path: &Path, requested: &[String]) -> Result<(), SweepError> {
        self.to_table(requested).write_csv(path)
    }

    /// Writes every distinct artefact into `dir`, returning the written paths.
    pub fn export_artifacts(&self, dir: &Path) -> Result<Vec<PathBuf>, SweepError> {
        fs::create_dir_all(dir).map_err(|err| io_error("artifact-dir", dir, err))?;
        let mut written = BTreeSet::new();
        for row in &self.rows {
            let Some(result) = row.outcome.result() else {
                continue;
            };
            for (field, value) in result.iter() {
                let Some(artifact) = value.as_artifact() else {
                    continue;
                };
                let path = dir.join(artifact_file_name(&row.fingerprint, field, artifact));
                if written.contains(&path) {
                    continue;
                }
                fs::write(&path, &artifact.data)
                    .map_err(|err| io_error("artifact-write", &path, err))?;
                written.insert(path);
            }
        }
        Ok(written.into_iter().collect())
    }
}

impl Table {
    pub fn write_csv(&self, path: &Path) -> Result<(), SweepError> {
        ensure_parent(path)?;
        let file = fs::File::create(path).map_err(|err| io_error("table-open", path, err))?;
        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .from_writer(BufWriter::new(file));
        writer
            .write_record(&self.columns)
            .map_err(|err| io_error("table-write-header", path, err))?;
        for row in &self.rows {
            writer
                .write_record(row)
                .map_err(|err| io_error("table-write-row", path, err))?;
        }
        writer
            .flush()
            .map_err(|err| io_error("table-flush", path, err))
    }
}

/// Name under which an artefact is exported next to the report.
pub fn artifact_file_name(fingerprint: &Fingerprint, field: &str, artifact: &Artifact) -> String {
    format!("{}_{}.{}", fingerprint.short(), field, artifact.extension())
}

fn ensure_parent(path: &Path) -> Result<(), SweepError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|err| io_error("report-create", parent, err))?;
        }
    }
    Ok(())
}
