//! `EvidenceEntry` and the closed set of entry types it can carry
//! (spec.md §3, §6).

use serde::{Deserialize, Serialize};
use serde_json::json;
use shipwright_util::{Value, hash_value};

use crate::stage::RunStage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    RunStart,
    WorkerStart,
    WorkerEnd,
    GatePass,
    GateFail,
    ArtifactProduced,
    LlmCall,
    Error,
    Note,
    ConsequenceHit,
    RunEnd,
}

/// An immutable, hash-linked log record. Only [`crate::chain::EvidenceChain::append`]
/// constructs one; nothing in this crate ever mutates a value of this type
/// once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceEntry {
    pub seq: u64,
    pub timestamp: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    #[serde(rename = "workerId")]
    pub worker_id: String,
    pub stage: RunStage,
    pub data: Value,
    #[serde(rename = "prevHash")]
    pub prev_hash: Option<String>,
    pub hash: String,
}

impl EvidenceEntry {
    /// Canonical hash input for this entry: `{ data, prevHash, seq, stage,
    /// timestamp, type, workerId }` with keys sorted lexicographically at
    /// every level (spec.md §6). Hashing the whole entry instead would
    /// include `hash` itself and make the entry unable to verify its own
    /// value, so this only ever sees the other six fields.
    fn hash_input(
        seq: u64,
        timestamp: &str,
        entry_type: EntryType,
        worker_id: &str,
        stage: RunStage,
        data: &Value,
        prev_hash: &Option<String>,
    ) -> Value {
        json!({
            "data": data,
            "prevHash": prev_hash,
            "seq": seq,
            "stage": stage,
            "timestamp": timestamp,
            "type": entry_type,
            "workerId": worker_id,
        })
    }

    pub(crate) fn build(
        seq: u64,
        timestamp: String,
        entry_type: EntryType,
        worker_id: String,
        stage: RunStage,
        data: Value,
        prev_hash: Option<String>,
    ) -> anyhow::Result<Self> {
        let input = Self::hash_input(
            seq,
            &timestamp,
            entry_type,
            &worker_id,
            stage,
            &data,
            &prev_hash,
        );
        let hash = hash_value(&input)?;
        Ok(Self {
            seq,
            timestamp,
            entry_type,
            worker_id,
            stage,
            data,
            prev_hash,
            hash,
        })
    }

    /// Recompute this entry's hash from its fields and compare against the
    /// stored `hash` (spec.md §8, invariant 2).
    #[must_use]
    pub fn recomputed_hash(&self) -> anyhow::Result<String> {
        let input = Self::hash_input(
            self.seq,
            &self.timestamp,
            self.entry_type,
            &self.worker_id,
            self.stage,
            &self.data,
            &self.prev_hash,
        );
        hash_value(&input)
    }
}
