//! Build a [`RunManifest`] from a run's final [`RunState`] and
//! [`EvidenceChain`] (spec.md §4.J). The builder is a pure function of its
//! two inputs (plus the caller-supplied `run_id`, which lives outside both —
//! neither carries it today): running it twice on unchanged inputs produces
//! byte-identical JSON.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use shipwright_evidence::{EntryType, EvidenceChain, RunStage};
use shipwright_state::RunState;
use shipwright_util::{ForgeError, hash_value};

use crate::model::{ArtifactHash, LlmUsage, ManifestStatus, RunManifest, StageSummary, SCHEMA_VERSION};

fn parse_iso8601(ts: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(ts).ok().map(|dt| dt.with_timezone(&Utc))
}

fn evidence_chain_hash(chain: &EvidenceChain) -> Result<String, ForgeError> {
    match chain.get_last_hash() {
        Some(hash) => Ok(hash.to_string()),
        None => hash_value(&"empty").map_err(ForgeError::Other),
    }
}

/// First `run_start` entry's timestamp, or `now` if the chain never saw one
/// (spec.md §4.J, "or now for edge cases").
fn started_at(chain: &EvidenceChain) -> String {
    chain
        .get_timeline()
        .iter()
        .find(|e| e.entry_type == EntryType::RunStart)
        .map(|e| e.timestamp.clone())
        .unwrap_or_else(shipwright_util::now_iso8601)
}

/// Last `run_end` entry's timestamp, or `now` if the chain never saw one.
fn completed_at(chain: &EvidenceChain) -> String {
    chain
        .get_timeline()
        .iter()
        .rev()
        .find(|e| e.entry_type == EntryType::RunEnd)
        .map(|e| e.timestamp.clone())
        .unwrap_or_else(shipwright_util::now_iso8601)
}

fn duration_ms(started_at: &str, completed_at: &str) -> u64 {
    match (parse_iso8601(started_at), parse_iso8601(completed_at)) {
        (Some(start), Some(end)) => (end - start).num_milliseconds().max(0) as u64,
        _ => 0,
    }
}

/// Every `worker_start` entry's worker id, keyed by the stage it ran in —
/// used to annotate `stages[]` with who ran each stage (spec.md §4.J).
fn worker_ids_by_stage(chain: &EvidenceChain) -> BTreeMap<RunStage, String> {
    let mut map = BTreeMap::new();
    for entry in chain.get_timeline() {
        if entry.entry_type == EntryType::WorkerStart {
            map.entry(entry.stage).or_insert_with(|| entry.worker_id.clone());
        }
    }
    map
}

/// Every `gate_pass`/`gate_fail` entry's `(gateId, passed)`, keyed by stage.
fn gate_verdicts_by_stage(chain: &EvidenceChain) -> BTreeMap<RunStage, (String, bool)> {
    let mut map = BTreeMap::new();
    for entry in chain.get_timeline() {
        let passed = match entry.entry_type {
            EntryType::GatePass => true,
            EntryType::GateFail => false,
            _ => continue,
        };
        if let Some(gate_id) = entry.data.get("gateId").and_then(|v| v.as_str()) {
            map.insert(entry.stage, (gate_id.to_string(), passed));
        }
    }
    map
}

fn build_stages(state: &RunState, chain: &EvidenceChain) -> Vec<StageSummary> {
    let worker_ids = worker_ids_by_stage(chain);
    let gate_verdicts = gate_verdicts_by_stage(chain);

    state
        .timestamps()
        .iter()
        .map(|(stage, ts)| {
            let duration = ts
                .end
                .as_ref()
                .map(|end| duration_ms(&ts.start, end));
            let (gate_id, gate_passed) = gate_verdicts
                .get(stage)
                .map(|(id, passed)| (Some(id.clone()), Some(*passed)))
                .unwrap_or((None, None));

            StageSummary {
                stage: stage.as_str().to_string(),
                worker_id: worker_ids.get(stage).cloned(),
                start: ts.start.clone(),
                end: ts.end.clone(),
                duration_ms: duration,
                gate_id,
                gate_passed,
            }
        })
        .collect()
}

/// Sum `promptTokens`/`completionTokens`/`durationMs` and collect distinct
/// `model`s across every `llm_call` entry, regardless of which worker or
/// gate appended it (spec.md §9, decision 3).
fn build_llm_usage(chain: &EvidenceChain) -> LlmUsage {
    let mut usage = LlmUsage::default();
    let mut models: std::collections::BTreeSet<String> = std::collections::BTreeSet::new();

    for entry in chain.get_timeline() {
        if entry.entry_type != EntryType::LlmCall {
            continue;
        }
        usage.total_calls += 1;
        usage.total_prompt_tokens += entry.data.get("promptTokens").and_then(|v| v.as_u64()).unwrap_or(0);
        usage.total_completion_tokens += entry
            .data
            .get("completionTokens")
            .and_then(|v| v.as_u64())
            .unwrap_or(0);
        usage.total_duration_ms += entry.data.get("durationMs").and_then(|v| v.as_u64()).unwrap_or(0);
        if let Some(model) = entry.data.get("model").and_then(|v| v.as_str()) {
            models.insert(model.to_string());
        }
    }

    usage.models = models.into_iter().collect();
    usage
}

/// # Errors
/// Returns an error only if hashing the manifest's canonical form fails,
/// which does not happen for a well-formed manifest.
pub fn build_manifest(
    run_id: impl Into<String>,
    status: ManifestStatus,
    state: &RunState,
    chain: &EvidenceChain,
) -> Result<RunManifest, ForgeError> {
    let started_at = started_at(chain);
    let completed_at = completed_at(chain);

    let gate_verdicts: Vec<_> = state.gate_results().to_vec();
    let gates_passed = gate_verdicts.iter().filter(|g| g.passed).count() as u64;
    let gates_failed = gate_verdicts.iter().filter(|g| !g.passed).count() as u64;

    let artifact_hashes = state
        .release_artifacts()
        .iter()
        .map(|a| ArtifactHash {
            path: a.path.clone(),
            sha256: a.sha256.clone(),
        })
        .collect();

    let mut manifest = RunManifest {
        schema_version: SCHEMA_VERSION.to_string(),
        run_id: run_id.into(),
        status,
        spec_hash: state.spec().spec_hash().to_string(),
        duration_ms: duration_ms(&started_at, &completed_at),
        started_at,
        completed_at,
        stages: build_stages(state, chain),
        gate_verdicts,
        artifact_hashes,
        llm_usage: build_llm_usage(chain),
        evidence_chain_hash: evidence_chain_hash(chain)?,
        evidence_chain_length: chain.length(),
        consequence_hit_count: state.consequence_hits().len() as u64,
        gates_passed,
        gates_failed,
        manifest_hash: String::new(),
    };

    manifest.manifest_hash = hash_value(&manifest).map_err(ForgeError::Other)?;
    Ok(manifest)
}
