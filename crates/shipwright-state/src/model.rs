//! Value types that live in [`crate::run_state::RunState`] slots (spec.md §3).

use serde::{Deserialize, Serialize};
use shipwright_util::Value;

/// The named slots of [`crate::run_state::RunState`], used wherever a
/// worker or stage config needs to name "a thing RunState holds" without
/// borrowing the field itself — worker `requires`/`produces` lists and
/// pipeline slice-availability checks both key off this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Slice {
    Spec,
    Plan,
    WorkUnits,
    BuildOutput,
    TestResults,
    UiInspection,
    SecurityReport,
    ReleaseArtifacts,
    GateResults,
    ConsequenceHits,
}

impl Slice {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Spec => "spec",
            Self::Plan => "plan",
            Self::WorkUnits => "workUnits",
            Self::BuildOutput => "buildOutput",
            Self::TestResults => "testResults",
            Self::UiInspection => "uiInspection",
            Self::SecurityReport => "securityReport",
            Self::ReleaseArtifacts => "releaseArtifacts",
            Self::GateResults => "gateResults",
            Self::ConsequenceHits => "consequenceHits",
        }
    }
}

impl std::fmt::Display for Slice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkUnitStatus {
    Pending,
    Building,
    Done,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkUnit {
    pub id: String,
    pub feature_ids: Vec<String>,
    pub description: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    pub status: WorkUnitStatus,
    #[serde(default)]
    pub output_files: Vec<String>,
}

/// Output of the planning stage. `work_units` backs the derived `workUnits[]`
/// view spec.md §3 lists as its own slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub summary: Value,
    pub work_units: Vec<WorkUnit>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildOutput {
    pub artifacts: Vec<String>,
    pub data: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub passed: bool,
    #[serde(default)]
    pub details: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiInspection {
    pub findings: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityReport {
    pub findings: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseArtifact {
    pub platform: String,
    pub path: String,
    /// Lowercase hex, 64 chars.
    pub sha256: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateCheck {
    pub name: String,
    pub passed: bool,
    pub measured: f64,
    pub threshold: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateResult {
    pub gate_id: String,
    pub passed: bool,
    pub timestamp: String,
    pub checks: Vec<GateCheck>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsequenceHit {
    pub record_id: String,
    pub stage: shipwright_evidence::RunStage,
    pub matched_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageTimestamps {
    pub start: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Shipped,
    Aborted,
}

impl RunStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Shipped | Self::Aborted)
    }
}
