use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sweep_cache::{CacheBackend, ResultCache, ScopeMode};
use sweep_core::errors::{ErrorInfo, SweepError};
use sweep_core::{from_json_slice, from_yaml_slice, ParamValue};
use tracing::info;

use crate::engine::SweepOptions;
use crate::space::{ParameterSpace, Sampling};

fn io_error(code: &str, path: &Path, err: impl ToString) -> SweepError {
    SweepError::Config(
        ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()),
    )
}

/// Literal value accepted in `custom` lists.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CustomValue {
    Bool(bool),
    Int(i64),
    Real(f64),
}

impl From<CustomValue> for ParamValue {
    fn from(value: CustomValue) -> Self {
        match value {
            CustomValue::Bool(raw) => ParamValue::Bool(raw),
            CustomValue::Int(raw) => ParamValue::Int(raw),
            CustomValue::Real(raw) => ParamValue::Real(raw),
        }
    }
}

/// Run configuration controlling resolution, caching and export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    #[serde(default = "RunConfig::default_level")]
    pub level: u32,
    #[serde(default = "RunConfig::default_use_sample_cache")]
    pub use_sample_cache: bool,
    /// Fingerprint only the tag and assignment so sweeps share cache entries.
    #[serde(default)]
    pub only_hash_tag: bool,
    #[serde(default)]
    pub tag: String,
    #[serde(default = "RunConfig::default_cache_path")]
    pub cache_path: PathBuf,
    #[serde(default = "RunConfig::default_parallelism")]
    pub parallelism: usize,
    #[serde(default)]
    pub result_vars: Vec<String>,
    #[serde(default)]
    pub inputs: Option<Vec<String>>,
    #[serde(default)]
    pub custom: Option<BTreeMap<String, Vec<CustomValue>>>,
}

impl RunConfig {
    const fn default_level() -> u32 {
        2
    }

    const fn default_use_sample_cache() -> bool {
        true
    }

    fn default_cache_path() -> PathBuf {
        PathBuf::from(".sweep_cache/cache.sqlite")
    }

    const fn default_parallelism() -> usize {
        1
    }

    pub fn scope(&self) -> ScopeMode {
        ScopeMode::from_only_hash_tag(self.only_hash_tag)
    }

    /// Sampling described by the configuration; `custom` takes precedence over `level`.
    pub fn sampling(&self) -> Sampling {
        match &self.custom {
            Some(custom) => Sampling::Custom(
                custom
                    .iter()
                    .map(|(name, values)| {
                        (name.clone(), values.iter().map(|v| ParamValue::from(*v)).collect())
                    })
                    .collect(),
            ),
            None => Sampling::Level(self.level),
        }
    }

    pub fn sweep_options(&self) -> SweepOptions {
        SweepOptions {
            sampling: self.sampling(),
            inputs: self.inputs.clone(),
            tag: self.tag.clone(),
            scope: self.scope(),
            fields: self.result_vars.clone(),
            parallelism: self.parallelism,
        }
    }

    /// Opens the configured cache, or a disabled one when caching is off.
    ///
    /// An unreachable cache location degrades to a disabled cache.
    pub fn open_cache(&self) -> ResultCache {
        if !self.use_sample_cache {
            info!("sample cache disabled by configuration");
            return ResultCache::disabled();
        }
        ResultCache::open_or_disabled(&CacheBackend::from_path(&self.cache_path))
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            use_sample_cache: Self::default_use_sample_cache(),
            only_hash_tag: false,
            tag: String::new(),
            cache_path: Self::default_cache_path(),
            parallelism: Self::default_parallelism(),
            result_vars: Vec::new(),
            inputs: None,
            custom: None,
        }
    }
}

fn load_document<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, SweepError> {
    let bytes = fs::read(path).map_err(|err| io_error("config-read", path, err))?;
    let parsed = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => from_json_slice(&bytes),
        _ => from_yaml_slice(&bytes),
    };
    parsed.map_err(|err| {
        SweepError::Config(
            ErrorInfo::new("config-parse", err.info().message.clone())
                .with_context("path", path.display().to_string()),
        )
    })
}

/// Loads a [`RunConfig`] from YAML (or JSON when the extension says so).
pub fn load_run_config(path: &Path) -> Result<RunConfig, SweepError> {
    load_document(path)
}

/// Loads and validates a [`ParameterSpace`] declaration.
pub fn load_space(path: &Path) -> Result<ParameterSpace, SweepError> {
    load_document(path)
}
