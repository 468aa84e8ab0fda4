//! `ConsequenceRecord`: one failure -> resolution pattern the run auditor
//! has observed, with a self-hash so a reloaded store can tell a legitimate
//! [`crate::memory::ConsequenceMemory::decay_confidence`] apart from a
//! hand-edited file (spec.md §3, §4.I, §6).

use serde::{Deserialize, Serialize};
use serde_json::json;
use shipwright_evidence::RunStage;
use shipwright_util::{Value, hash_value};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FailureInfo {
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gate_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionInfo {
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied_in_run_id: Option<String>,
}

/// Caller-supplied fields for [`crate::memory::ConsequenceMemory::write`].
/// `id`, `created_at`, and `hash` are assigned by the store itself.
#[derive(Debug, Clone)]
pub struct NewConsequenceRecord {
    pub source_run_id: String,
    pub domain: String,
    pub stage: RunStage,
    pub spec_hash: String,
    pub pattern: Value,
    pub failure: FailureInfo,
    pub resolution: ResolutionInfo,
    pub confidence: f64,
    pub occurrences: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsequenceRecord {
    pub id: String,
    pub created_at: String,
    pub source_run_id: String,
    pub domain: String,
    pub stage: RunStage,
    pub spec_hash: String,
    pub pattern: Value,
    pub failure: FailureInfo,
    pub resolution: ResolutionInfo,
    pub confidence: f64,
    pub occurrences: u32,
    pub hash: String,
}

impl ConsequenceRecord {
    pub(crate) fn new(id: String, created_at: String, input: NewConsequenceRecord) -> anyhow::Result<Self> {
        let NewConsequenceRecord {
            source_run_id,
            domain,
            stage,
            spec_hash,
            pattern,
            failure,
            resolution,
            confidence,
            occurrences,
        } = input;

        let hash = Self::compute_hash(
            confidence,
            &created_at,
            &domain,
            &failure,
            &id,
            occurrences,
            &pattern,
            &resolution,
            &source_run_id,
            &spec_hash,
            stage,
        )?;

        Ok(Self {
            id,
            created_at,
            source_run_id,
            domain,
            stage,
            spec_hash,
            pattern,
            failure,
            resolution,
            confidence,
            occurrences,
            hash,
        })
    }

    /// `stableStringify` over `{ confidence, createdAt, domain, failure, id,
    /// occurrences, pattern, resolution, sourceRunId, specHash, stage }`
    /// (spec.md §6, "Consequence Record hash input").
    #[allow(clippy::too_many_arguments)]
    fn compute_hash(
        confidence: f64,
        created_at: &str,
        domain: &str,
        failure: &FailureInfo,
        id: &str,
        occurrences: u32,
        pattern: &Value,
        resolution: &ResolutionInfo,
        source_run_id: &str,
        spec_hash: &str,
        stage: RunStage,
    ) -> anyhow::Result<String> {
        hash_value(&json!({
            "confidence": confidence,
            "createdAt": created_at,
            "domain": domain,
            "failure": failure,
            "id": id,
            "occurrences": occurrences,
            "pattern": pattern,
            "resolution": resolution,
            "sourceRunId": source_run_id,
            "specHash": spec_hash,
            "stage": stage,
        }))
    }

    fn recompute_hash(&self) -> anyhow::Result<String> {
        Self::compute_hash(
            self.confidence,
            &self.created_at,
            &self.domain,
            &self.failure,
            &self.id,
            self.occurrences,
            &self.pattern,
            &self.resolution,
            &self.source_run_id,
            &self.spec_hash,
            self.stage,
        )
    }

    /// `confidence = max(0, confidence - amount)`, hash recomputed in step
    /// (spec.md §4.I, "decayConfidence").
    pub(crate) fn decay(&mut self, amount: f64) -> anyhow::Result<()> {
        self.confidence = (self.confidence - amount).max(0.0);
        self.hash = self.recompute_hash()?;
        Ok(())
    }

    /// Whether `hash` still matches a fresh computation over the other
    /// fields — false means the record was edited outside this crate's API.
    #[must_use]
    pub fn is_intact(&self) -> bool {
        self.recompute_hash().map(|h| h == self.hash).unwrap_or(false)
    }
}
