//! Run State (spec.md §4.D): the single mutable record of a run's progress.

pub mod model;
pub mod run_state;

pub use model::{
    BuildOutput, ConsequenceHit, GateCheck, GateResult, Plan, ReleaseArtifact, RunStatus,
    SecurityReport, Slice, StageTimestamps, TestResult, UiInspection, WorkUnit, WorkUnitStatus,
};
pub use run_state::RunState;
