//! shipwright: a deterministic AI shipping factory runtime. A run takes a
//! validated product spec through a fixed pipeline of workers and gates,
//! appending every observable action to a hash-linked evidence chain, and
//! ends in a signed [`shipwright_manifest::RunManifest`] that either ships
//! or aborts the run reproducibly.

/// The crate version, as set in `Cargo.toml`.
#[must_use]
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub mod factory;
pub mod logging;

// Core types used by external consumers of this runtime, re-exported from
// their owning crates so most callers only need to depend on `shipwright`.
pub use shipwright_controller::{MasterController, RunOptions, RunOutcome};
pub use shipwright_evidence::{AppendInput, EntryType, EvidenceChain, EvidenceEntry, RunStage, VerifyResult};
pub use shipwright_gate::{Gate, GateRegistry, GateVerdict};
pub use shipwright_manifest::{ArtifactHash, LlmUsage, ManifestStatus, RunManifest, StageSummary, build_manifest};
pub use shipwright_memory::{
    ConsequenceMemory, ConsequenceRecord, FailureInfo, IntegrityReport, NewConsequenceRecord,
    RUN_AUDITOR_CALLER_ID, ResolutionInfo,
};
pub use shipwright_pipeline::{PipelineConfig, StageConfig};
pub use shipwright_spec::{RawFeature, RawJourney, RawSpec, RawStep, Spec, SpecError, validate};
pub use shipwright_state::{
    BuildOutput, ConsequenceHit, GateCheck, GateResult, Plan, ReleaseArtifact, RunState, RunStatus,
    SecurityReport, Slice, StageTimestamps, TestResult, UiInspection, WorkUnit, WorkUnitStatus,
};
pub use shipwright_util::atomic_write::write_file_atomic;
pub use shipwright_util::{ForgeError, PipelineStructureError, Value, canonical_json, hash_value, now_iso8601};
pub use shipwright_worker::{Artifact, Worker, WorkerRegistry, WorkerResult};

pub use factory::ship;
pub use logging::init_tracing;
