//! `RunManifest` and its nested value types (spec.md §3, §4.J, §6).

use serde::{Deserialize, Serialize};
use shipwright_state::GateResult;

pub const SCHEMA_VERSION: &str = "2026.1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManifestStatus {
    Shipped,
    Aborted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageSummary {
    pub stage: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<String>,
    pub start: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gate_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gate_passed: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactHash {
    pub path: String,
    pub sha256: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmUsage {
    pub total_calls: u64,
    pub total_prompt_tokens: u64,
    pub total_completion_tokens: u64,
    pub total_duration_ms: u64,
    pub models: Vec<String>,
}

/// Built once by [`crate::builder::build_manifest`], then immutable.
/// `manifest_hash` is computed over every other field with itself cleared
/// to the empty string, then stamped in at rest (spec.md §9, decision 1).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunManifest {
    pub schema_version: String,
    pub run_id: String,
    pub status: ManifestStatus,
    pub spec_hash: String,
    pub started_at: String,
    pub completed_at: String,
    pub duration_ms: u64,
    pub stages: Vec<StageSummary>,
    pub gate_verdicts: Vec<GateResult>,
    pub artifact_hashes: Vec<ArtifactHash>,
    pub llm_usage: LlmUsage,
    pub evidence_chain_hash: String,
    pub evidence_chain_length: u64,
    pub consequence_hit_count: u64,
    /// Pure audit tally over `gate_verdicts`, independent of how the run
    /// terminated (spec.md §9, decision 2).
    pub gates_passed: u64,
    pub gates_failed: u64,
    pub manifest_hash: String,
}
