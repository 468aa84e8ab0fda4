//! `RunStage`: the ten values an [`crate::entry::EvidenceEntry`] or a
//! `RunState.currentStage` can hold — the nine pipeline stages plus the
//! `initializing` state the Master occupies before the first stage starts
//! (spec.md §3, "stage (sum of ten stage names plus `initializing`)").

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Initializing,
    SpecValidation,
    Planning,
    Building,
    Assembly,
    Testing,
    UiInspection,
    SecurityAudit,
    ReleasePackage,
    RunAudit,
}

impl RunStage {
    /// All nine pipeline stages in their canonical order, excluding
    /// `Initializing` (which is never a DAG node).
    pub const PIPELINE_ORDER: [RunStage; 9] = [
        RunStage::SpecValidation,
        RunStage::Planning,
        RunStage::Building,
        RunStage::Assembly,
        RunStage::Testing,
        RunStage::UiInspection,
        RunStage::SecurityAudit,
        RunStage::ReleasePackage,
        RunStage::RunAudit,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::SpecValidation => "spec_validation",
            Self::Planning => "planning",
            Self::Building => "building",
            Self::Assembly => "assembly",
            Self::Testing => "testing",
            Self::UiInspection => "ui_inspection",
            Self::SecurityAudit => "security_audit",
            Self::ReleasePackage => "release_package",
            Self::RunAudit => "run_audit",
        }
    }
}

impl std::fmt::Display for RunStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
