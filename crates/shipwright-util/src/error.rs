//! Error taxonomy shared across the runtime (spec.md §7).
//!
//! Every crate defines the error kinds it owns; `ForgeError` is the umbrella
//! that public entry points (the Master Controller above all) return,
//! mirroring how the teacher's `XCheckerError` aggregates per-subsystem
//! errors via `#[from]`.

use thiserror::Error;

/// Top-level error type returned by public shipwright APIs.
#[derive(Error, Debug)]
pub enum ForgeError {
    /// Spec failed structural or semantic validation.
    #[error("spec invalid at {path}: {message}")]
    SpecError { path: String, message: String },

    /// A Run State write violated the slot's ordering invariant.
    #[error("illegal state transition: {0}")]
    IllegalStateTransition(String),

    /// A worker was dispatched before one of its declared `requires` slices
    /// was present.
    #[error("worker precondition missing: slice '{0}' not available")]
    WorkerPreconditionMissing(String),

    /// A worker's bounded execution exceeded its declared timeout.
    #[error("worker '{worker_id}' timed out after {timeout_ms}ms")]
    WorkerTimeout { worker_id: String, timeout_ms: u64 },

    /// A worker returned a domain failure (not a bug).
    #[error("worker failed: {0}")]
    WorkerFailed(String),

    /// A worker's `execute` returned an error / panicked.
    #[error("worker exception: {0}")]
    WorkerException(String),

    /// `Gate Registry::evaluate` was asked for an unregistered gate.
    #[error("gate not registered: {0}")]
    GateNotRegistered(String),

    /// `Worker Registry::dispatch` was asked for an unregistered worker.
    #[error("worker not registered: {0}")]
    WorkerNotRegistered(String),

    /// `register` was called twice with the same id.
    #[error("duplicate registration: {0}")]
    DuplicateRegistration(String),

    /// Pipeline Config construction or cross-validation failed.
    #[error("pipeline structure error: {0}")]
    PipelineStructure(#[from] PipelineStructureError),

    /// `EvidenceChain::verify` found a broken hash link.
    #[error("evidence chain broken at seq {broken_at_seq}")]
    ChainBroken { broken_at_seq: u64 },

    /// A Consequence Memory write/modify was attempted by a caller other than
    /// the run auditor.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A Consequence Record's stored hash did not match its recomputed hash.
    #[error("tampered record: {0}")]
    TamperedRecord(String),

    /// A durable write could not be made durable. Fatal to the run.
    #[error("persist failure at {path}: {reason}")]
    PersistFailure { path: String, reason: String },

    /// Any other I/O failure surfaced while reading/writing runtime state.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Catch-all for serialization failures that do not fit a narrower kind.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Structured failure modes for Pipeline Config construction (spec.md §4.G).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineStructureError {
    #[error("duplicate stage id: {0}")]
    DuplicateStage(String),

    #[error("stage '{stage}' depends on unknown stage '{dependency}'")]
    UnknownDependency { stage: String, dependency: String },

    #[error("cycle detected: {0}")]
    Cycle(String),

    #[error(
        "stage '{stage}' requires slice '{slice}' which is not yet available"
    )]
    MissingSlice { stage: String, slice: String },

    #[error("stage '{stage}' references unknown worker '{worker}'")]
    UnknownWorker { stage: String, worker: String },

    #[error("stage '{stage}' references unknown gate '{gate}'")]
    UnknownGate { stage: String, gate: String },
}
