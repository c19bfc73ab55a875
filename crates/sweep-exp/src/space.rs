use std::collections::{BTreeMap, BTreeSet};
use std::convert::TryFrom;

use serde::{Deserialize, Serialize};
use sweep_core::errors::{ErrorInfo, SweepError};
use sweep_core::{Assignment, ParamValue};

fn config_error(code: &str, message: &str) -> ErrorInfo {
    ErrorInfo::new(code, message)
}

/// Value domain of a dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Domain {
    /// Inclusive integer range.
    Int { bounds: [i64; 2], default: i64 },
    /// Inclusive real range.
    Float { bounds: [f64; 2], default: f64 },
    /// Boolean flag; always swept over `[false, true]`.
    Bool { default: bool },
}

/// One named, bounded input varied during a sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    #[serde(flatten)]
    pub domain: Domain,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

impl Dimension {
    pub fn int(name: impl Into<String>, bounds: [i64; 2], default: i64) -> Self {
        Self {
            name: name.into(),
            domain: Domain::Int { bounds, default },
            doc: None,
        }
    }

    pub fn float(name: impl Into<String>, bounds: [f64; 2], default: f64) -> Self {
        Self {
            name: name.into(),
            domain: Domain::Float { bounds, default },
            doc: None,
        }
    }

    pub fn boolean(name: impl Into<String>, default: bool) -> Self {
        Self {
            name: name.into(),
            domain: Domain::Bool { default },
            doc: None,
        }
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Returns true for integer and real dimensions.
    pub fn is_ordered(&self) -> bool {
        !matches!(self.domain, Domain::Bool { .. })
    }

    pub fn default_value(&self) -> ParamValue {
        match self.domain {
            Domain::Int { default, .. } => ParamValue::Int(default),
            Domain::Float { default, .. } => ParamValue::Real(default),
            Domain::Bool { default } => ParamValue::Bool(default),
        }
    }

    fn validate(&self) -> Result<(), SweepError> {
        let invalid = |code: &str, message: &str| {
            SweepError::Config(config_error(code, message).with_context("dimension", self.name.clone()))
        };
        if self.name.is_empty() {
            return Err(invalid("dimension-name", "dimension name must not be empty"));
        }
        match self.domain {
            Domain::Int { bounds, default } => {
                if bounds[0] > bounds[1] {
                    return Err(invalid("dimension-bounds", "lower bound exceeds upper bound"));
                }
                if default < bounds[0] || default > bounds[1] {
                    return Err(invalid("dimension-default", "default lies outside bounds"));
                }
            }
            Domain::Float { bounds, default } => {
                if !bounds.iter().chain([&default]).all(|value| value.is_finite()) {
                    return Err(invalid("dimension-finite", "bounds and default must be finite"));
                }
                if bounds[0] > bounds[1] {
                    return Err(invalid("dimension-bounds", "lower bound exceeds upper bound"));
                }
                if default < bounds[0] || default > bounds[1] {
                    return Err(invalid("dimension-default", "default lies outside bounds"));
                }
            }
            Domain::Bool { .. } => {}
        }
        Ok(())
    }

    /// Discretizes the dimension into at most `level` values.
    ///
    /// Integer ranges no larger than `level` yield every integer. Booleans
    /// ignore `level` and always yield `[false, true]`.
    pub fn values(&self, level: u32) -> Result<Vec<ParamValue>, SweepError> {
        if level == 0 && self.is_ordered() {
            return Err(SweepError::Config(
                config_error("level-zero", "level must be at least 1")
                    .with_context("dimension", self.name.clone()),
            ));
        }
        let values = match self.domain {
            Domain::Int { bounds, .. } => int_values(bounds[0], bounds[1], level)
                .into_iter()
                .map(ParamValue::Int)
                .collect(),
            Domain::Float { bounds, .. } => float_values(bounds[0], bounds[1], level)
                .into_iter()
                .map(ParamValue::Real)
                .collect(),
            Domain::Bool { .. } => vec![ParamValue::Bool(false), ParamValue::Bool(true)],
        };
        Ok(values)
    }

    /// Checks an explicitly supplied value against the dimension's kind.
    ///
    /// Integer literals are widened for real dimensions. Out-of-bounds values
    /// are accepted as deliberate overrides.
    pub fn coerce(&self, value: ParamValue) -> Result<ParamValue, SweepError> {
        match (&self.domain, value) {
            (Domain::Int { .. }, ParamValue::Int(_)) => Ok(value),
            (Domain::Float { .. }, ParamValue::Real(raw)) if raw.is_finite() => Ok(value),
            (Domain::Float { .. }, ParamValue::Int(raw)) => Ok(ParamValue::Real(raw as f64)),
            (Domain::Bool { .. }, ParamValue::Bool(_)) => Ok(value),
            _ => Err(SweepError::Config(
                config_error("custom-kind", "custom value does not match dimension kind")
                    .with_context("dimension", self.name.clone())
                    .with_context("value", format!("{} {}", value.kind_label(), value)),
            )),
        }
    }
}

fn int_values(min: i64, max: i64, level: u32) -> Vec<i64> {
    let span = max as i128 - min as i128;
    if level as i128 > span {
        return (min..=max).collect();
    }
    if level == 1 {
        return vec![min];
    }
    let steps = level as i128 - 1;
    (0..level as i128)
        .map(|idx| {
            let offset = (2 * idx * span + steps) / (2 * steps);
            (min as i128 + offset) as i64
        })
        .collect()
}

fn float_values(min: f64, max: f64, level: u32) -> Vec<f64> {
    if level == 1 {
        return vec![min];
    }
    let steps = (level - 1) as f64;
    let span = max - min;
    (0..level)
        .map(|idx| {
            let t = idx as f64 / steps;
            if idx == level - 1 {
                max
            } else if span.is_finite() {
                min + span * t
            } else {
                // Bounds of opposite sign near f64::MAX overflow the span.
                min * (1.0 - t) + max * t
            }
        })
        .collect()
}

/// How each swept dimension obtains its values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sampling {
    /// Discretize every swept dimension at the given resolution.
    Level(u32),
    /// Explicit values per dimension; unlisted dimensions stay at their default.
    Custom(BTreeMap<String, Vec<ParamValue>>),
}

/// Serialized form of a [`ParameterSpace`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpaceSpec {
    pub dimensions: Vec<Dimension>,
}

/// Ordered collection of uniquely named dimensions.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "SpaceSpec", into = "SpaceSpec")]
pub struct ParameterSpace {
    dimensions: Vec<Dimension>,
}

impl TryFrom<SpaceSpec> for ParameterSpace {
    type Error = SweepError;

    fn try_from(spec: SpaceSpec) -> Result<Self, Self::Error> {
        ParameterSpace::new(spec.dimensions)
    }
}

impl From<ParameterSpace> for SpaceSpec {
    fn from(space: ParameterSpace) -> Self {
        SpaceSpec {
            dimensions: space.dimensions,
        }
    }
}

impl ParameterSpace {
    /// Validates and builds a space; dimension order fixes enumeration order.
    pub fn new(dimensions: Vec<Dimension>) -> Result<Self, SweepError> {
        if dimensions.is_empty() {
            return Err(empty_space());
        }
        let mut seen = BTreeSet::new();
        for dimension in &dimensions {
            dimension.validate()?;
            if !seen.insert(dimension.name.as_str()) {
                return Err(SweepError::Config(
                    config_error("dimension-duplicate", "dimension names must be unique")
                        .with_context("dimension", dimension.name.clone()),
                ));
            }
        }
        Ok(Self { dimensions })
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn dimension(&self, name: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|dimension| dimension.name == name)
    }

    /// Dimension names in declaration order.
    pub fn names(&self) -> Vec<String> {
        self.dimensions.iter().map(|dim| dim.name.clone()).collect()
    }

    /// Assignment holding every dimension at its default.
    pub fn defaults(&self) -> Assignment {
        self.dimensions
            .iter()
            .map(|dim| (dim.name.clone(), dim.default_value()))
            .collect()
    }

    /// Full Cartesian grid at `level`.
    pub fn discretize(&self, level: u32) -> Result<Vec<Assignment>, SweepError> {
        self.enumerate(&Sampling::Level(level), None)
    }

    /// Cartesian grid over the swept dimensions, the rest held at defaults.
    ///
    /// `inputs` restricts which dimensions are swept (`None` sweeps all of
    /// them). Ordering is lexicographic over declaration order: the first
    /// dimension varies slowest.
    pub fn enumerate(
        &self,
        sampling: &Sampling,
        inputs: Option<&[String]>,
    ) -> Result<Vec<Assignment>, SweepError> {
        if self.dimensions.is_empty() {
            return Err(empty_space());
        }
        let swept = self.swept_names(sampling, inputs)?;
        let mut axes = Vec::with_capacity(self.dimensions.len());
        for dimension in &self.dimensions {
            let values = if !swept.contains(dimension.name.as_str()) {
                vec![dimension.default_value()]
            } else {
                match sampling {
                    Sampling::Level(level) => dimension.values(*level)?,
                    Sampling::Custom(custom) => custom_values(dimension, custom)?,
                }
            };
            axes.push((dimension.name.as_str(), values));
        }
        let mut outputs = Vec::new();
        expand_grid(&axes, 0, Assignment::new(), &mut outputs);
        Ok(outputs)
    }

    fn swept_names<'a>(
        &'a self,
        sampling: &'a Sampling,
        inputs: Option<&'a [String]>,
    ) -> Result<BTreeSet<&'a str>, SweepError> {
        if let Sampling::Custom(custom) = sampling {
            for name in custom.keys() {
                self.require(name)?;
            }
        }
        let names: BTreeSet<&str> = match (inputs, sampling) {
            (Some(inputs), _) => {
                let mut names = BTreeSet::new();
                for name in inputs {
                    self.require(name)?;
                    names.insert(name.as_str());
                }
                names
            }
            (None, Sampling::Custom(custom)) => custom.keys().map(String::as_str).collect(),
            (None, Sampling::Level(_)) => self.dimensions.iter().map(|d| d.name.as_str()).collect(),
        };
        if let Sampling::Custom(custom) = sampling {
            if let Some(missing) = names.iter().find(|name| !custom.contains_key(**name)) {
                return Err(SweepError::Config(
                    config_error("custom-missing", "swept dimension has no custom values")
                        .with_context("dimension", missing.to_string()),
                ));
            }
        }
        Ok(names)
    }

    fn require(&self, name: &str) -> Result<&Dimension, SweepError> {
        self.dimension(name).ok_or_else(|| {
            SweepError::Config(
                config_error("dimension-unknown", "unknown dimension")
                    .with_context("dimension", name)
                    .with_hint(format!("declared: {}", self.names().join(", "))),
            )
        })
    }
}

fn empty_space() -> SweepError {
    SweepError::Config(config_error(
        "space-empty",
        "parameter space declares no dimensions",
    ))
}

fn custom_values(
    dimension: &Dimension,
    custom: &BTreeMap<String, Vec<ParamValue>>,
) -> Result<Vec<ParamValue>, SweepError> {
    let values = custom.get(&dimension.name).map(Vec::as_slice).unwrap_or(&[]);
    if values.is_empty() {
        return Err(SweepError::Config(
            config_error("custom-empty", "custom values must not be empty")
                .with_context("dimension", dimension.name.clone()),
        ));
    }
    values.iter().map(|value| dimension.coerce(*value)).collect()
}

fn expand_grid(
    axes: &[(&str, Vec<ParamValue>)],
    idx: usize,
    current: Assignment,
    outputs: &mut Vec<Assignment>,
) {
    if idx == axes.len() {
        outputs.push(current);
        return;
    }
    let (name, values) = &axes[idx];
    for value in values {
        let next = current.clone().with(*name, *value);
        expand_grid(axes, idx + 1, next, outputs);
    }
}
