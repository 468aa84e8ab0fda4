//! The `Worker` contract (spec.md §4.E): one stage's domain logic, exposed
//! behind a uniform interface so the controller never needs to know whether
//! a given stage shells out to a compiler, calls an LLM, or runs in-process.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shipwright_evidence::RunStage;
use shipwright_state::{RunState, Slice};
use shipwright_util::{ForgeError, Value};

/// A file (or file-like) output a worker hands back to the controller. Not
/// the same thing as a `RunState` slice — an artifact is a piece of disk
/// content; a slice is a typed field in `RunState`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub name: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

/// What a worker run produced. `Failed` is a *reported* task failure — the
/// worker ran to completion and decided its stage didn't succeed. An
/// unexpected failure inside `execute` (a panic, an I/O error the worker
/// itself can't interpret) is a different thing and travels as an `Err`
/// instead, so it is never mistaken for an ordinary `Failed` outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WorkerResult {
    Done {
        /// Stage-specific payload; the controller knows how to fold this
        /// into the `RunState` slice this worker's `produces()` names.
        output: Value,
        #[serde(default)]
        artifacts: Vec<Artifact>,
    },
    Failed {
        reason: String,
    },
}

/// One stage's domain logic. Implementors do not touch `RunState` or the
/// evidence chain directly — `execute` reads `state` for context and
/// returns its result; the registry and controller own every write.
#[async_trait]
pub trait Worker: Send + Sync {
    fn id(&self) -> &str;

    /// The single stage this worker is dispatched for.
    fn accepts(&self) -> RunStage;

    /// `RunState` slices that must be present before this worker may run.
    fn requires(&self) -> &[Slice];

    /// `RunState` slices this worker's successful output feeds.
    fn produces(&self) -> &[Slice];

    /// Wall-clock budget for a single `execute` call.
    fn timeout_ms(&self) -> u64;

    /// # Errors
    /// Returns an error for anything that is not an ordinary reported task
    /// failure — implementors should prefer `Ok(WorkerResult::Failed { .. })`
    /// for expected domain failures and reserve `Err` for the unexpected.
    async fn execute(&self, state: &RunState) -> Result<WorkerResult, ForgeError>;
}
