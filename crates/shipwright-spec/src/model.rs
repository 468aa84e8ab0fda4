//! The deep-frozen `Spec` value and its wire-shape counterpart (spec.md §3).

use serde::{Deserialize, Serialize};
use serde_json::Map;
use shipwright_util::Value;
use std::collections::BTreeMap;

/// Schema versions this validator accepts (spec.md §3, §4.C).
pub const SUPPORTED_SCHEMA_VERSIONS: &[&str] = &["2026.1"];

/// Wire shape of a Spec before validation. Anything that parses as JSON with
/// these top-level namespaces is accepted here; semantic checks happen in
/// [`crate::validate::validate`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSpec {
    pub schema_version: String,
    pub product: Value,
    pub features: Vec<RawFeature>,
    pub journeys: Vec<RawJourney>,
    #[serde(default)]
    pub design: Option<Value>,
    /// Must be a numeric-only map; enforced by the validator, not serde.
    pub quality: BTreeMap<String, Value>,
    pub delivery: Value,
    #[serde(default)]
    pub dependencies: Option<Value>,
    /// Passthrough namespace: any JSON is accepted and preserved verbatim.
    #[serde(default)]
    pub extensions: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawFeature {
    pub id: String,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawJourney {
    pub id: String,
    /// Feature ids exercised by this journey.
    #[serde(default)]
    pub features: Vec<String>,
    pub steps: Vec<RawStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawStep {
    /// e.g. `"action"` or `"assertion"`. Every journey needs >= 1 assertion step.
    pub kind: String,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl RawStep {
    #[must_use]
    pub fn is_assertion(&self) -> bool {
        self.kind == "assertion"
    }
}

/// The deep-frozen product contract. Construction is only possible through
/// [`crate::validate::validate`]; there are no mutation methods, so a `Spec`
/// is transitively immutable for the lifetime of the run — the Rust
/// equivalent of "deep-frozen", enforced at compile time rather than by a
/// runtime freeze flag.
/// `Deserialize` exists only so a persisted run state can be reloaded
/// whole; it reconstructs a previously-validated spec verbatim and is not a
/// second path for turning untrusted input into a `Spec`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Spec {
    raw: RawSpec,
    spec_hash: String,
}

impl Spec {
    pub(crate) fn new(raw: RawSpec, spec_hash: String) -> Self {
        Self { raw, spec_hash }
    }

    #[must_use]
    pub fn schema_version(&self) -> &str {
        &self.raw.schema_version
    }

    #[must_use]
    pub fn product(&self) -> &Value {
        &self.raw.product
    }

    #[must_use]
    pub fn features(&self) -> &[RawFeature] {
        &self.raw.features
    }

    #[must_use]
    pub fn journeys(&self) -> &[RawJourney] {
        &self.raw.journeys
    }

    #[must_use]
    pub fn design(&self) -> Option<&Value> {
        self.raw.design.as_ref()
    }

    #[must_use]
    pub fn quality(&self) -> &BTreeMap<String, Value> {
        &self.raw.quality
    }

    #[must_use]
    pub fn delivery(&self) -> &Value {
        &self.raw.delivery
    }

    #[must_use]
    pub fn dependencies(&self) -> Option<&Value> {
        self.raw.dependencies.as_ref()
    }

    #[must_use]
    pub fn extensions(&self) -> Option<&Value> {
        self.raw.extensions.as_ref()
    }

    /// SHA-256 of this spec's canonical serialization, computed once at
    /// validation time (spec.md §3).
    #[must_use]
    pub fn spec_hash(&self) -> &str {
        &self.spec_hash
    }
}

pub(crate) fn is_number(value: &Value) -> bool {
    matches!(value, Value::Number(_))
}
