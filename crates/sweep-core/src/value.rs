//! Parameter and result value model.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Concrete value of a single swept dimension.
///
/// The variant is part of the value's identity: `Int(7)` and `Real(7.0)` are
/// distinct values and never compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum ParamValue {
    /// Integer dimension value.
    Int(i64),
    /// Real dimension value.
    Real(#[serde(with = "real_repr")] f64),
    /// Boolean dimension value.
    Bool(bool),
}

impl ParamValue {
    /// Returns the integer payload, if any.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the real payload, if any.
    pub fn as_real(&self) -> Option<f64> {
        match self {
            ParamValue::Real(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the boolean payload, if any.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Short label of the variant used in diagnostics.
    pub fn kind_label(&self) -> &'static str {
        match self {
            ParamValue::Int(_) => "int",
            ParamValue::Real(_) => "float",
            ParamValue::Bool(_) => "bool",
        }
    }

    /// Returns the value with `-0.0` folded into `0.0`.
    pub fn normalized(self) -> Self {
        match self {
            ParamValue::Real(value) if value == 0.0 => ParamValue::Real(0.0),
            other => other,
        }
    }
}

impl Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(value) => write!(f, "{value}"),
            ParamValue::Real(value) => write!(f, "{value}"),
            ParamValue::Bool(value) => write!(f, "{value}"),
        }
    }
}

/// One concrete combination of values, one per dimension.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Assignment(BTreeMap<String, ParamValue>);

impl Assignment {
    /// Creates an empty assignment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the assignment with `name` bound to `value`.
    pub fn with(mut self, name: impl Into<String>, value: ParamValue) -> Self {
        self.0.insert(name.into(), value.normalized());
        self
    }

    /// Binds `name` to `value`, replacing any previous binding.
    pub fn insert(&mut self, name: impl Into<String>, value: ParamValue) {
        self.0.insert(name.into(), value.normalized());
    }

    /// Returns the value bound to `name`.
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    /// Iterates over entries sorted by dimension name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Number of bound dimensions.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true when no dimension is bound.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, ParamValue)> for Assignment {
    fn from_iter<I: IntoIterator<Item = (String, ParamValue)>>(iter: I) -> Self {
        let mut assignment = Assignment::new();
        for (name, value) in iter {
            assignment.insert(name, value);
        }
        assignment
    }
}

/// Opaque artefact captured during an evaluation (image, recorded session).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Media type describing the payload encoding.
    pub media_type: String,
    /// Hex encoded SHA256 digest of `data`.
    pub digest: String,
    /// Raw payload bytes, hex encoded when serialized.
    #[serde(with = "hex::serde")]
    pub data: Vec<u8>,
}

impl Artifact {
    /// Wraps a payload, computing its digest.
    pub fn new(media_type: impl Into<String>, data: Vec<u8>) -> Self {
        let digest = format!("{:x}", Sha256::digest(&data));
        Self {
            media_type: media_type.into(),
            digest,
            data,
        }
    }

    /// File extension used when the artefact is exported to disk.
    pub fn extension(&self) -> &'static str {
        match self.media_type.as_str() {
            "application/x-rerun-rrd" => "rrd",
            "image/png" => "png",
            "image/jpeg" => "jpg",
            "application/json" => "json",
            "text/plain" => "txt",
            _ => "bin",
        }
    }
}

/// Value of a single named result field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum ResultValue {
    /// Integer measurement.
    Int(i64),
    /// Real measurement. NaN and the infinities survive a JSON round trip.
    Real(#[serde(with = "real_repr")] f64),
    /// Boolean flag.
    Bool(bool),
    /// Free-form text.
    Text(String),
    /// Opaque captured artefact.
    Artifact(Artifact),
}

impl ResultValue {
    /// Returns the value as a real number when it is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ResultValue::Int(value) => Some(*value as f64),
            ResultValue::Real(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the captured artefact, if any.
    pub fn as_artifact(&self) -> Option<&Artifact> {
        match self {
            ResultValue::Artifact(artifact) => Some(artifact),
            _ => None,
        }
    }
}

impl Display for ResultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultValue::Int(value) => write!(f, "{value}"),
            ResultValue::Real(value) => write!(f, "{value}"),
            ResultValue::Bool(value) => write!(f, "{value}"),
            ResultValue::Text(value) => write!(f, "{value}"),
            ResultValue::Artifact(artifact) => write!(f, "sha256:{}", artifact.digest),
        }
    }
}

/// Output of one evaluation: named result fields.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, ResultValue>);

impl Record {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the record with `field` set to `value`.
    pub fn with(mut self, field: impl Into<String>, value: ResultValue) -> Self {
        self.0.insert(field.into(), value);
        self
    }

    /// Sets `field` to `value`.
    pub fn insert(&mut self, field: impl Into<String>, value: ResultValue) {
        self.0.insert(field.into(), value);
    }

    /// Returns the value of `field`.
    pub fn get(&self, field: &str) -> Option<&ResultValue> {
        self.0.get(field)
    }

    /// Iterates over field names in sorted order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Iterates over entries in sorted field order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResultValue)> {
        self.0.iter().map(|(field, value)| (field.as_str(), value))
    }

    /// Number of populated fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true when the record carries no field.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// JSON has no spelling for non-finite reals, so they travel as the strings
/// `"NaN"`, `"inf"` and `"-inf"`. Finite values stay plain numbers.
mod real_repr {
    use std::fmt;

    use serde::de::{self, Deserializer, Unexpected, Visitor};
    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_nan() {
            serializer.serialize_str("NaN")
        } else if value.is_infinite() {
            serializer.serialize_str(if *value > 0.0 { "inf" } else { "-inf" })
        } else {
            serializer.serialize_f64(*value)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        deserializer.deserialize_any(RealVisitor)
    }

    struct RealVisitor;

    impl<'de> Visitor<'de> for RealVisitor {
        type Value = f64;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a number or one of \"NaN\", \"inf\", \"-inf\"")
        }

        fn visit_f64<E: de::Error>(self, value: f64) -> Result<f64, E> {
            Ok(value)
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<f64, E> {
            Ok(value as f64)
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<f64, E> {
            Ok(value as f64)
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<f64, E> {
            match value {
                "NaN" => Ok(f64::NAN),
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                other => Err(E::invalid_value(Unexpected::Str(other), &self)),
            }
        }
    }
}
