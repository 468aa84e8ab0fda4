//! Evidence Chain (spec.md §4.B): the append-only, hash-linked event log
//! that is the source of truth for "what happened" in a run.

pub mod chain;
pub mod entry;
pub mod stage;

pub use chain::{AppendInput, EvidenceChain, VerifyResult};
pub use entry::{EntryType, EvidenceEntry};
pub use stage::RunStage;
