use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use sweep_core::errors::{ErrorInfo, SweepError};
use sweep_core::{Assignment, ParamValue};

const DOMAIN: &[u8] = b"sweep-fingerprint/v1";

/// Fixed-size identity of an assignment under a scope policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Wraps raw digest bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hexadecimal rendering.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First twelve hex characters, used in file names and log lines.
    pub fn short(&self) -> String {
        let mut hex = self.to_hex();
        hex.truncate(12);
        hex
    }
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Fingerprint {
    type Err = SweepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes).map_err(|err| {
            SweepError::Serde(
                ErrorInfo::new("fingerprint-parse", "invalid fingerprint encoding")
                    .with_context("value", s)
                    .with_hint(err.to_string()),
            )
        })?;
        Ok(Self(bytes))
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Policy deciding which context is folded into a fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ScopeMode {
    /// Fingerprints include the space/evaluator identity; unrelated sweeps never share keys.
    #[default]
    RunScoped,
    /// Fingerprints include only the tag and the assignment.
    ///
    /// Sweeps over different spaces reuse each other's entries. Two different
    /// evaluators sharing a tag will read each other's results; keeping tags
    /// distinct per evaluator is the caller's responsibility.
    TagScoped,
}

impl ScopeMode {
    /// Maps the `only_hash_tag` configuration flag onto a scope mode.
    pub fn from_only_hash_tag(only_hash_tag: bool) -> Self {
        if only_hash_tag {
            ScopeMode::TagScoped
        } else {
            ScopeMode::RunScoped
        }
    }
}

/// Derives fingerprints for every assignment of one sweep invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintGenerator {
    scope: ScopeMode,
    run_id: String,
    tag: String,
    fields: Vec<String>,
}

impl FingerprintGenerator {
    /// Creates a generator; `run_id` is ignored under [`ScopeMode::TagScoped`].
    pub fn new(scope: ScopeMode, run_id: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            scope,
            run_id: run_id.into(),
            tag: tag.into(),
            fields: Vec::new(),
        }
    }

    /// Folds a result field selection into every fingerprint.
    ///
    /// A narrowed record must never answer a request for other fields, so each
    /// distinct selection gets its own keys. Order and duplicates are ignored,
    /// and an empty selection (all fields) keeps the plain fingerprint.
    pub fn with_fields(mut self, fields: &[String]) -> Self {
        let mut fields = fields.to_vec();
        fields.sort();
        fields.dedup();
        self.fields = fields;
        self
    }

    /// Active scope mode.
    pub fn scope(&self) -> ScopeMode {
        self.scope
    }

    /// Tag folded into every fingerprint.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Fingerprint of `assignment` under this generator's context.
    pub fn fingerprint(&self, assignment: &Assignment) -> Fingerprint {
        let mut hasher = context_hasher(assignment, &self.tag, self.scope, &self.run_id);
        if !self.fields.is_empty() {
            hasher.update([b'F']);
            hasher.update((self.fields.len() as u64).to_be_bytes());
            for field in &self.fields {
                write_str(&mut hasher, field);
            }
        }
        finish(hasher)
    }
}

/// Computes the fingerprint of `assignment`.
///
/// Entries are visited sorted by dimension name and each value is encoded with
/// a type tag, so `Int(7)` and `Real(7.0)` never collide.
pub fn fingerprint(
    assignment: &Assignment,
    tag: &str,
    scope: ScopeMode,
    run_id: &str,
) -> Fingerprint {
    finish(context_hasher(assignment, tag, scope, run_id))
}

fn context_hasher(assignment: &Assignment, tag: &str, scope: ScopeMode, run_id: &str) -> Sha256 {
    let mut hasher = Sha256::new();
    hasher.update(DOMAIN);
    match scope {
        ScopeMode::RunScoped => {
            hasher.update([b'R']);
            write_str(&mut hasher, run_id);
        }
        ScopeMode::TagScoped => hasher.update([b'T']),
    }
    write_str(&mut hasher, tag);
    hasher.update((assignment.len() as u64).to_be_bytes());
    for (name, value) in assignment.iter() {
        write_str(&mut hasher, name);
        write_value(&mut hasher, value);
    }
    hasher
}

fn finish(hasher: Sha256) -> Fingerprint {
    let digest = hasher.finalize();
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&digest);
    Fingerprint(bytes)
}

fn write_str(hasher: &mut Sha256, value: &str) {
    hasher.update((value.len() as u64).to_be_bytes());
    hasher.update(value.as_bytes());
}

fn write_value(hasher: &mut Sha256, value: &ParamValue) {
    match value.normalized() {
        ParamValue::Int(raw) => {
            hasher.update([b'i']);
            hasher.update(raw.to_be_bytes());
        }
        ParamValue::Real(raw) => {
            hasher.update([b'r']);
            hasher.update(raw.to_bits().to_be_bytes());
        }
        ParamValue::Bool(raw) => {
            hasher.update([b'b', u8::from(raw)]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn depth(value: i64) -> Assignment {
        Assignment::new()
            .with("depth", ParamValue::Int(value))
            .with("linear_fit", ParamValue::Bool(false))
    }

    #[test]
    fn hex_roundtrip() {
        let fp = fingerprint(&depth(7), "", ScopeMode::RunScoped, "run");
        let parsed: Fingerprint = fp.to_hex().parse().expect("parse");
        assert_eq!(parsed, fp);
        assert_eq!(fp.short().len(), 12);
        assert!("zz".parse::<Fingerprint>().is_err());
    }

    #[test]
    fn int_and_real_never_collide() {
        let int = Assignment::new().with("depth", ParamValue::Int(7));
        let real = Assignment::new().with("depth", ParamValue::Real(7.0));
        assert_ne!(
            fingerprint(&int, "", ScopeMode::TagScoped, ""),
            fingerprint(&real, "", ScopeMode::TagScoped, "")
        );
    }

    #[test]
    fn run_id_only_matters_when_run_scoped() {
        let a = depth(8);
        assert_ne!(
            fingerprint(&a, "t", ScopeMode::RunScoped, "space-a"),
            fingerprint(&a, "t", ScopeMode::RunScoped, "space-b")
        );
        assert_eq!(
            fingerprint(&a, "t", ScopeMode::TagScoped, "space-a"),
            fingerprint(&a, "t", ScopeMode::TagScoped, "space-b")
        );
    }

    #[test]
    fn scope_modes_do_not_share_keys() {
        let a = depth(9);
        assert_ne!(
            fingerprint(&a, "t", ScopeMode::RunScoped, ""),
            fingerprint(&a, "t", ScopeMode::TagScoped, "")
        );
    }

    #[test]
    fn field_selection_gets_its_own_keys() {
        let a = depth(7);
        let base = FingerprintGenerator::new(ScopeMode::TagScoped, "", "t");
        let quality = base.clone().with_fields(&["quality".to_string()]);
        let both = base
            .clone()
            .with_fields(&["vertices".to_string(), "quality".to_string()]);
        let shuffled = base.clone().with_fields(&[
            "quality".to_string(),
            "vertices".to_string(),
            "quality".to_string(),
        ]);

        assert_eq!(base.fingerprint(&a), fingerprint(&a, "t", ScopeMode::TagScoped, ""));
        assert_eq!(base.clone().with_fields(&[]).fingerprint(&a), base.fingerprint(&a));
        assert_ne!(quality.fingerprint(&a), base.fingerprint(&a));
        assert_ne!(quality.fingerprint(&a), both.fingerprint(&a));
        assert_eq!(both.fingerprint(&a), shuffled.fingerprint(&a));
    }
}
