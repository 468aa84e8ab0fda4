//! Consequence Memory (spec.md §4.I).

pub mod memory;
pub mod record;

pub use memory::{ConsequenceMemory, IntegrityReport, RUN_AUDITOR_CALLER_ID};
pub use record::{ConsequenceRecord, FailureInfo, NewConsequenceRecord, ResolutionInfo};
