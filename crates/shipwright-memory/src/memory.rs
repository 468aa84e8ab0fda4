//! `ConsequenceMemory` (spec.md §4.I): writes are restricted to the run
//! auditor; every other caller can only read. Records are never deleted —
//! `decay_confidence` is the only mutation, and it keeps each record's hash
//! in step with its own fields.

use camino::{Utf8Path, Utf8PathBuf};
use uuid::Uuid;

use shipwright_util::{ForgeError, Value, atomic_write, now_iso8601};

use crate::record::{ConsequenceRecord, NewConsequenceRecord};

/// The only caller id allowed to write, decay, or import records
/// (spec.md §4.I: `callerWorkerId == "run-auditor"`).
pub const RUN_AUDITOR_CALLER_ID: &str = "run-auditor";

#[derive(Debug, Clone)]
pub struct IntegrityReport {
    pub valid: bool,
    pub tampered_ids: Vec<String>,
}

pub struct ConsequenceMemory {
    records: Vec<ConsequenceRecord>,
    persist_path: Utf8PathBuf,
}

impl ConsequenceMemory {
    /// # Errors
    /// Returns [`ForgeError::PersistFailure`] if the empty store can't be
    /// written to `path`.
    pub fn create(path: Utf8PathBuf) -> Result<Self, ForgeError> {
        let store = Self {
            records: Vec::new(),
            persist_path: path,
        };
        store.persist()?;
        Ok(store)
    }

    /// # Errors
    /// Returns an error if the file can't be read or a line fails to parse.
    pub fn load(path: &Utf8Path) -> Result<Self, ForgeError> {
        let records = Self::parse_ndjson(&atomic_write::read_file(path)?)?;
        Ok(Self {
            records,
            persist_path: path.to_owned(),
        })
    }

    fn parse_ndjson(raw: &str) -> Result<Vec<ConsequenceRecord>, ForgeError> {
        let mut records = Vec::new();
        for line in raw.lines() {
            if line.is_empty() {
                continue;
            }
            records.push(serde_json::from_str(line).map_err(|e| ForgeError::Other(e.into()))?);
        }
        Ok(records)
    }

    fn to_ndjson(&self) -> Result<String, ForgeError> {
        let mut out = String::new();
        for record in &self.records {
            out.push_str(&serde_json::to_string(record).map_err(|e| ForgeError::Other(e.into()))?);
            out.push('\n');
        }
        Ok(out)
    }

    fn persist(&self) -> Result<(), ForgeError> {
        let ndjson = self.to_ndjson()?;
        atomic_write::write_file_atomic(&self.persist_path, &ndjson)
    }

    fn require_auditor(caller: &str) -> Result<(), ForgeError> {
        if caller != RUN_AUDITOR_CALLER_ID {
            return Err(ForgeError::Forbidden(format!(
                "'{caller}' is not allowed to write Consequence Memory"
            )));
        }
        Ok(())
    }

    /// Assigns a fresh UUID and timestamp, computes the record's hash,
    /// appends it, and persists the full NDJSON.
    ///
    /// # Errors
    /// Returns [`ForgeError::Forbidden`] if `caller` is not the run auditor.
    pub fn write(
        &mut self,
        input: NewConsequenceRecord,
        caller: &str,
    ) -> Result<&ConsequenceRecord, ForgeError> {
        Self::require_auditor(caller)?;

        let record = ConsequenceRecord::new(Uuid::new_v4().to_string(), now_iso8601(), input)
            .map_err(ForgeError::Other)?;

        self.records.push(record);
        self.persist()?;
        Ok(self.records.last().expect("just pushed"))
    }

    /// `confidence = max(0, confidence - amount)` for the record with `id`.
    ///
    /// # Errors
    /// Returns [`ForgeError::Forbidden`] if `caller` is not the run auditor,
    /// or an error if no record with `id` exists.
    pub fn decay_confidence(
        &mut self,
        id: &str,
        amount: f64,
        caller: &str,
    ) -> Result<&ConsequenceRecord, ForgeError> {
        Self::require_auditor(caller)?;
        let record = self
            .records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| ForgeError::Other(anyhow::anyhow!("no consequence record with id {id}")))?;
        record.decay(amount).map_err(ForgeError::Other)?;
        self.persist()?;
        Ok(self.records.iter().find(|r| r.id == id).expect("just updated"))
    }

    /// Records whose stored `pattern` object contains every key of `pattern`
    /// with an equal primitive value; `domain`, when given, filters further.
    #[must_use]
    pub fn query(&self, pattern: &Value, domain: Option<&str>) -> Vec<&ConsequenceRecord> {
        self.records
            .iter()
            .filter(|r| domain.is_none_or(|d| r.domain == d))
            .filter(|r| Self::pattern_matches(&r.pattern, pattern))
            .collect()
    }

    fn pattern_matches(stored: &Value, query: &Value) -> bool {
        let (Value::Object(stored), Value::Object(query)) = (stored, query) else {
            return stored == query;
        };
        query
            .iter()
            .all(|(k, v)| stored.get(k).is_some_and(|sv| sv == v))
    }

    #[must_use]
    pub fn get_by_domain(&self, domain: &str) -> Vec<&ConsequenceRecord> {
        self.records.iter().filter(|r| r.domain == domain).collect()
    }

    #[must_use]
    pub fn get_by_id(&self, id: &str) -> Option<&ConsequenceRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    #[must_use]
    pub fn length(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn verify_integrity(&self) -> IntegrityReport {
        let tampered_ids: Vec<String> = self
            .records
            .iter()
            .filter(|r| !r.is_intact())
            .map(|r| r.id.clone())
            .collect();
        IntegrityReport {
            valid: tampered_ids.is_empty(),
            tampered_ids,
        }
    }

    /// Write the full in-memory set to `path` (byte-equal to `self` if no
    /// changes happened in between — any ordinary caller may export).
    ///
    /// # Errors
    /// Returns [`ForgeError::PersistFailure`] if the write cannot be made
    /// durable.
    pub fn export_records(&self, path: &Utf8Path) -> Result<(), ForgeError> {
        atomic_write::write_file_atomic(path, &self.to_ndjson()?)
    }

    /// Import records from `path`, skipping any id already present. Every
    /// incoming record's hash is checked before any are accepted; a single
    /// mismatch rejects the whole import.
    ///
    /// # Errors
    /// Returns [`ForgeError::Forbidden`] if `caller` is not the run auditor,
    /// or [`ForgeError::TamperedRecord`] if an incoming record's hash
    /// doesn't match its fields.
    pub fn import_records(&mut self, path: &Utf8Path, caller: &str) -> Result<usize, ForgeError> {
        Self::require_auditor(caller)?;

        let incoming = Self::parse_ndjson(&atomic_write::read_file(path)?)?;
        for record in &incoming {
            if !record.is_intact() {
                return Err(ForgeError::TamperedRecord(record.id.clone()));
            }
        }

        let existing_ids: std::collections::HashSet<String> =
            self.records.iter().map(|r| r.id.clone()).collect();
        let mut imported = 0;
        for record in incoming {
            if existing_ids.contains(&record.id) {
                continue;
            }
            self.records.push(record);
            imported += 1;
        }
        if imported > 0 {
            self.persist()?;
        }
        Ok(imported)
    }
}
