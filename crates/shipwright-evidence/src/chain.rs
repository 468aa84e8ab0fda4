//! `EvidenceChain`: append-only, hash-linked event log (spec.md §4.B).
//!
//! The public surface deliberately has no update/delete/splice/set/reset —
//! only [`EvidenceChain::append`] grows the chain, matching spec.md's "the
//! public API does not expose" list for the Gate Registry and, by the same
//! reasoning, this chain.

use camino::Utf8Path;
use shipwright_util::{ForgeError, Value, atomic_write, now_iso8601};

use crate::entry::{EntryType, EvidenceEntry};
use crate::stage::RunStage;

/// Input to [`EvidenceChain::append`]. `timestamp` defaults to "now" when
/// `None`, letting tests supply a deterministic clock.
#[derive(Debug, Clone)]
pub struct AppendInput {
    pub entry_type: EntryType,
    pub worker_id: String,
    pub stage: RunStage,
    pub data: Value,
    pub timestamp: Option<String>,
}

impl AppendInput {
    #[must_use]
    pub fn new(entry_type: EntryType, worker_id: impl Into<String>, stage: RunStage, data: Value) -> Self {
        Self {
            entry_type,
            worker_id: worker_id.into(),
            stage,
            data,
            timestamp: None,
        }
    }
}

/// Result of [`EvidenceChain::verify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyResult {
    pub valid: bool,
    pub length: u64,
    pub broken_at_seq: Option<u64>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct EvidenceChain {
    entries: Vec<EvidenceEntry>,
}

impl EvidenceChain {
    #[must_use]
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Append a new entry. Assigns `seq = len`, links `prevHash` to the
    /// current tail, and computes the new entry's hash.
    ///
    /// # Errors
    /// Returns an error only if hashing the entry's canonical form fails,
    /// which does not happen for well-formed JSON `data`.
    pub fn append(&mut self, input: AppendInput) -> Result<&EvidenceEntry, ForgeError> {
        let seq = self.entries.len() as u64;
        let prev_hash = self.entries.last().map(|e| e.hash.clone());
        let timestamp = input.timestamp.unwrap_or_else(now_iso8601);

        let entry = EvidenceEntry::build(
            seq,
            timestamp,
            input.entry_type,
            input.worker_id,
            input.stage,
            input.data,
            prev_hash,
        )
        .map_err(ForgeError::Other)?;

        self.entries.push(entry);
        Ok(self.entries.last().expect("just pushed"))
    }

    /// Walk the chain verifying `prevHash` links and recomputed hashes
    /// (spec.md §8, invariants 1 and 2).
    #[must_use]
    pub fn verify(&self) -> VerifyResult {
        let mut expected_prev: Option<String> = None;
        for (i, entry) in self.entries.iter().enumerate() {
            if entry.prev_hash != expected_prev {
                return VerifyResult {
                    valid: false,
                    length: self.entries.len() as u64,
                    broken_at_seq: Some(i as u64),
                    error: Some(format!("prevHash mismatch at seq {i}")),
                };
            }
            match entry.recomputed_hash() {
                Ok(recomputed) if recomputed == entry.hash => {}
                Ok(_) => {
                    return VerifyResult {
                        valid: false,
                        length: self.entries.len() as u64,
                        broken_at_seq: Some(i as u64),
                        error: Some(format!("hash mismatch at seq {i}")),
                    };
                }
                Err(e) => {
                    return VerifyResult {
                        valid: false,
                        length: self.entries.len() as u64,
                        broken_at_seq: Some(i as u64),
                        error: Some(format!("failed to recompute hash at seq {i}: {e}")),
                    };
                }
            }
            expected_prev = Some(entry.hash.clone());
        }

        VerifyResult {
            valid: true,
            length: self.entries.len() as u64,
            broken_at_seq: None,
            error: None,
        }
    }

    #[must_use]
    pub fn get_entry(&self, seq: u64) -> Option<&EvidenceEntry> {
        self.entries.get(seq as usize)
    }

    #[must_use]
    pub fn get_last_hash(&self) -> Option<&str> {
        self.entries.last().map(|e| e.hash.as_str())
    }

    #[must_use]
    pub fn length(&self) -> u64 {
        self.entries.len() as u64
    }

    /// Read-only view over the full chain, in seq order.
    #[must_use]
    pub fn get_timeline(&self) -> &[EvidenceEntry] {
        &self.entries
    }

    /// One JSON entry per line, LF-terminated; empty chain serializes to an
    /// empty string (spec.md §4.B, §8 boundary behaviors).
    ///
    /// # Errors
    /// Returns an error if any entry fails to serialize, which does not
    /// happen for entries built through [`EvidenceChain::append`].
    pub fn to_ndjson(&self) -> Result<String, ForgeError> {
        let mut out = String::new();
        for entry in &self.entries {
            let line = serde_json::to_string(entry).map_err(|e| ForgeError::Other(e.into()))?;
            out.push_str(&line);
            out.push('\n');
        }
        Ok(out)
    }

    /// Parse NDJSON produced by [`Self::to_ndjson`]. Entries are trusted to
    /// already satisfy the chain invariants (this does not call
    /// [`Self::verify`]; callers that need that guarantee call it
    /// explicitly after loading).
    ///
    /// # Errors
    /// Returns an error if any non-empty line fails to parse as a JSON
    /// `EvidenceEntry`.
    pub fn from_ndjson(ndjson: &str) -> Result<Self, ForgeError> {
        let mut entries = Vec::new();
        for line in ndjson.lines() {
            if line.is_empty() {
                continue;
            }
            let entry: EvidenceEntry =
                serde_json::from_str(line).map_err(|e| ForgeError::Other(e.into()))?;
            entries.push(entry);
        }
        Ok(Self { entries })
    }

    /// # Errors
    /// Returns [`ForgeError::PersistFailure`] if the write cannot be made
    /// durable.
    pub fn write_to_file(&self, path: &Utf8Path) -> Result<(), ForgeError> {
        let ndjson = self.to_ndjson()?;
        atomic_write::write_file_atomic(path, &ndjson)
    }

    /// # Errors
    /// Returns [`ForgeError::PersistFailure`] if the file cannot be read, or
    /// a parse error if its content is not valid NDJSON.
    pub fn read_from_file(path: &Utf8Path) -> Result<Self, ForgeError> {
        let ndjson = atomic_write::read_file(path)?;
        Self::from_ndjson(&ndjson)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_input(stage: RunStage) -> AppendInput {
        AppendInput::new(EntryType::Note, "tester", stage, json!({"k": "v"}))
    }

    #[test]
    fn empty_chain_boundary_behaviors() {
        let chain = EvidenceChain::new();
        let v = chain.verify();
        assert!(v.valid);
        assert_eq!(v.length, 0);
        assert_eq!(chain.get_last_hash(), None);
        assert_eq!(chain.to_ndjson().unwrap(), "");
    }

    #[test]
    fn first_entry_has_null_prev_hash() {
        let mut chain = EvidenceChain::new();
        chain.append(sample_input(RunStage::Initializing)).unwrap();
        assert_eq!(chain.get_entry(0).unwrap().prev_hash, None);
    }

    #[test]
    fn seqs_are_dense_and_monotone() {
        let mut chain = EvidenceChain::new();
        for i in 0..5 {
            chain
                .append(sample_input(RunStage::Initializing))
                .unwrap();
            assert_eq!(chain.get_entry(i).unwrap().seq, i as u64);
        }
    }

    #[test]
    fn each_prev_hash_equals_predecessors_hash() {
        let mut chain = EvidenceChain::new();
        for _ in 0..5 {
            chain
                .append(sample_input(RunStage::Initializing))
                .unwrap();
        }
        for i in 1..chain.length() {
            let prev = chain.get_entry(i - 1).unwrap().hash.clone();
            assert_eq!(chain.get_entry(i).unwrap().prev_hash, Some(prev));
        }
    }

    #[test]
    fn verify_passes_on_untampered_chain() {
        let mut chain = EvidenceChain::new();
        for _ in 0..10 {
            chain
                .append(sample_input(RunStage::Initializing))
                .unwrap();
        }
        let v = chain.verify();
        assert!(v.valid);
        assert_eq!(v.length, 10);
        assert_eq!(v.broken_at_seq, None);
    }

    #[test]
    fn verify_detects_tampered_data() {
        let mut chain = EvidenceChain::new();
        for i in 0..5 {
            chain
                .append(AppendInput::new(
                    EntryType::Note,
                    "tester",
                    RunStage::Initializing,
                    json!({"value": i}),
                ))
                .unwrap();
        }
        // Tamper with a field the hash was computed over.
        chain.entries[3].data = json!({"value": "tampered"});
        let v = chain.verify();
        assert!(!v.valid);
        assert_eq!(v.broken_at_seq, Some(3));
    }

    #[test]
    fn verify_detects_broken_prev_hash_link() {
        let mut chain = EvidenceChain::new();
        for _ in 0..5 {
            chain
                .append(sample_input(RunStage::Initializing))
                .unwrap();
        }
        chain.entries[3].prev_hash = Some("0".repeat(64));
        let v = chain.verify();
        assert!(!v.valid);
        assert_eq!(v.broken_at_seq, Some(3));
    }

    #[test]
    fn ndjson_round_trip_is_byte_identical() {
        let mut chain = EvidenceChain::new();
        for i in 0..7 {
            chain
                .append(AppendInput::new(
                    EntryType::Note,
                    format!("worker-{i}"),
                    RunStage::Initializing,
                    json!({"i": i}),
                ))
                .unwrap();
        }
        let ndjson = chain.to_ndjson().unwrap();
        let reloaded = EvidenceChain::from_ndjson(&ndjson).unwrap();
        assert_eq!(reloaded.to_ndjson().unwrap(), ndjson);
        assert!(reloaded.verify().valid);
    }

    #[test]
    fn ndjson_lines_are_lf_terminated() {
        let mut chain = EvidenceChain::new();
        chain.append(sample_input(RunStage::Initializing)).unwrap();
        let ndjson = chain.to_ndjson().unwrap();
        assert!(ndjson.ends_with('\n'));
        assert_eq!(ndjson.matches('\n').count(), 1);
    }

    #[test]
    fn write_and_read_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = camino::Utf8PathBuf::from_path_buf(dir.path().join("chain.ndjson")).unwrap();

        let mut chain = EvidenceChain::new();
        for _ in 0..3 {
            chain
                .append(sample_input(RunStage::Initializing))
                .unwrap();
        }
        chain.write_to_file(&path).unwrap();
        let reloaded = EvidenceChain::read_from_file(&path).unwrap();
        assert_eq!(reloaded.length(), 3);
        assert!(reloaded.verify().valid);
    }

    proptest::proptest! {
        #[test]
        fn appending_never_breaks_verify(n in 1usize..30) {
            let mut chain = EvidenceChain::new();
            for i in 0..n {
                chain.append(AppendInput::new(
                    EntryType::Note,
                    "w",
                    RunStage::Initializing,
                    json!({"i": i}),
                )).unwrap();
            }
            proptest::prop_assert!(chain.verify().valid);
            proptest::prop_assert_eq!(chain.length(), n as u64);
        }
    }
}
