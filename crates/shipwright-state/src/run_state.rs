//! `RunState`: the single mutable record of a run's progress (spec.md §3).
//!
//! Each producer-stage slot is written at most once, in the order the
//! pipeline stages run in; every write is persisted immediately so a crash
//! never loses more than the write in flight.

use std::collections::BTreeMap;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use shipwright_evidence::RunStage;
use shipwright_spec::Spec;
use shipwright_util::{ForgeError, atomic_write, now_iso8601};

use crate::model::{
    BuildOutput, ConsequenceHit, GateResult, Plan, ReleaseArtifact, RunStatus, SecurityReport,
    Slice, StageTimestamps, TestResult, UiInspection,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunState {
    spec: Spec,
    plan: Option<Plan>,
    build_output: Option<BuildOutput>,
    test_results: Vec<TestResult>,
    ui_inspection: Option<UiInspection>,
    security_report: Option<SecurityReport>,
    release_artifacts: Vec<ReleaseArtifact>,
    gate_results: Vec<GateResult>,
    consequence_hits: Vec<ConsequenceHit>,
    timestamps: BTreeMap<RunStage, StageTimestamps>,
    status: RunStatus,
    current_stage: RunStage,
    #[serde(skip, default)]
    persist_path: Option<Utf8PathBuf>,
}

impl RunState {
    /// # Errors
    /// Returns [`ForgeError::PersistFailure`] if the initial state can't be
    /// written to `persist_path`.
    pub fn new(spec: Spec, persist_path: Utf8PathBuf) -> Result<Self, ForgeError> {
        let mut state = Self {
            spec,
            plan: None,
            build_output: None,
            test_results: Vec::new(),
            ui_inspection: None,
            security_report: None,
            release_artifacts: Vec::new(),
            gate_results: Vec::new(),
            consequence_hits: Vec::new(),
            timestamps: BTreeMap::new(),
            status: RunStatus::Running,
            current_stage: RunStage::Initializing,
            persist_path: Some(persist_path),
        };
        state.persist()?;
        Ok(state)
    }

    /// Reload a previously-persisted run state. The reloaded value's future
    /// writes persist back to `path`.
    ///
    /// # Errors
    /// Returns an error if the file can't be read or doesn't parse.
    pub fn load(path: &Utf8Path) -> Result<Self, ForgeError> {
        let raw = atomic_write::read_file(path)?;
        let mut state: Self =
            serde_json::from_str(&raw).map_err(|e| ForgeError::Other(e.into()))?;
        state.persist_path = Some(path.to_owned());
        Ok(state)
    }

    fn persist(&self) -> Result<(), ForgeError> {
        let Some(path) = self.persist_path.clone() else {
            return Ok(());
        };
        let json = self.to_json()?;
        atomic_write::write_file_atomic(&path, &json)
    }

    /// Stable-ordered JSON snapshot of the whole state (field order follows
    /// struct declaration order, so repeated calls on an unchanged state are
    /// byte-identical).
    ///
    /// # Errors
    /// Returns an error if serialization fails, which does not happen for a
    /// well-formed `RunState`.
    pub fn to_json(&self) -> Result<String, ForgeError> {
        serde_json::to_string_pretty(self).map_err(|e| ForgeError::Other(e.into()))
    }

    #[must_use]
    pub fn spec(&self) -> &Spec {
        &self.spec
    }

    #[must_use]
    pub fn plan(&self) -> Option<&Plan> {
        self.plan.as_ref()
    }

    #[must_use]
    pub fn build_output(&self) -> Option<&BuildOutput> {
        self.build_output.as_ref()
    }

    #[must_use]
    pub fn test_results(&self) -> &[TestResult] {
        &self.test_results
    }

    #[must_use]
    pub fn ui_inspection(&self) -> Option<&UiInspection> {
        self.ui_inspection.as_ref()
    }

    #[must_use]
    pub fn security_report(&self) -> Option<&SecurityReport> {
        self.security_report.as_ref()
    }

    #[must_use]
    pub fn release_artifacts(&self) -> &[ReleaseArtifact] {
        &self.release_artifacts
    }

    #[must_use]
    pub fn gate_results(&self) -> &[GateResult] {
        &self.gate_results
    }

    #[must_use]
    pub fn consequence_hits(&self) -> &[ConsequenceHit] {
        &self.consequence_hits
    }

    #[must_use]
    pub fn timestamps(&self) -> &BTreeMap<RunStage, StageTimestamps> {
        &self.timestamps
    }

    #[must_use]
    pub fn status(&self) -> RunStatus {
        self.status
    }

    #[must_use]
    pub fn current_stage(&self) -> RunStage {
        self.current_stage
    }

    /// Whether `slice` currently holds a value, under the "present" meaning
    /// of each slot: set for scalars, non-empty for lists (spec.md §3).
    #[must_use]
    pub fn is_slice_present(&self, slice: Slice) -> bool {
        match slice {
            Slice::Spec => true,
            Slice::Plan => self.plan.is_some(),
            Slice::WorkUnits => self.plan.as_ref().is_some_and(|p| !p.work_units.is_empty()),
            Slice::BuildOutput => self.build_output.is_some(),
            Slice::TestResults => !self.test_results.is_empty(),
            Slice::UiInspection => self.ui_inspection.is_some(),
            Slice::SecurityReport => self.security_report.is_some(),
            Slice::ReleaseArtifacts => !self.release_artifacts.is_empty(),
            Slice::GateResults => !self.gate_results.is_empty(),
            Slice::ConsequenceHits => !self.consequence_hits.is_empty(),
        }
    }

    pub fn set_plan(&mut self, plan: Plan) -> Result<(), ForgeError> {
        if self.plan.is_some() {
            return Err(ForgeError::IllegalStateTransition(
                "plan is already set".into(),
            ));
        }
        self.plan = Some(plan);
        self.persist()
    }

    pub fn set_build_output(&mut self, build_output: BuildOutput) -> Result<(), ForgeError> {
        if self.plan.is_none() {
            return Err(ForgeError::IllegalStateTransition(
                "buildOutput requires plan to be set first".into(),
            ));
        }
        if self.build_output.is_some() {
            return Err(ForgeError::IllegalStateTransition(
                "buildOutput is already set".into(),
            ));
        }
        self.build_output = Some(build_output);
        self.persist()
    }

    pub fn append_test_results(&mut self, results: Vec<TestResult>) -> Result<(), ForgeError> {
        if self.build_output.is_none() {
            return Err(ForgeError::IllegalStateTransition(
                "testResults requires buildOutput to be set first".into(),
            ));
        }
        self.test_results.extend(results);
        self.persist()
    }

    pub fn set_ui_inspection(&mut self, ui_inspection: UiInspection) -> Result<(), ForgeError> {
        if self.test_results.is_empty() {
            return Err(ForgeError::IllegalStateTransition(
                "uiInspection requires at least one testResults entry".into(),
            ));
        }
        if self.ui_inspection.is_some() {
            return Err(ForgeError::IllegalStateTransition(
                "uiInspection is already set".into(),
            ));
        }
        self.ui_inspection = Some(ui_inspection);
        self.persist()
    }

    pub fn set_security_report(&mut self, report: SecurityReport) -> Result<(), ForgeError> {
        if self.build_output.is_none() {
            return Err(ForgeError::IllegalStateTransition(
                "securityReport requires buildOutput to be set first".into(),
            ));
        }
        if self.security_report.is_some() {
            return Err(ForgeError::IllegalStateTransition(
                "securityReport is already set".into(),
            ));
        }
        self.security_report = Some(report);
        self.persist()
    }

    pub fn append_release_artifacts(
        &mut self,
        artifacts: Vec<ReleaseArtifact>,
    ) -> Result<(), ForgeError> {
        if self.security_report.is_none() {
            return Err(ForgeError::IllegalStateTransition(
                "releaseArtifacts requires securityReport to be set first".into(),
            ));
        }
        self.release_artifacts.extend(artifacts);
        self.persist()
    }

    pub fn add_gate_result(&mut self, result: GateResult) -> Result<(), ForgeError> {
        self.gate_results.push(result);
        self.persist()
    }

    pub fn add_consequence_hit(&mut self, hit: ConsequenceHit) -> Result<(), ForgeError> {
        self.consequence_hits.push(hit);
        self.persist()
    }

    pub fn stage_start(&mut self, stage: RunStage) -> Result<(), ForgeError> {
        if self.timestamps.contains_key(&stage) {
            return Err(ForgeError::IllegalStateTransition(format!(
                "stage {stage} already has a start timestamp"
            )));
        }
        self.timestamps.insert(
            stage,
            StageTimestamps {
                start: now_iso8601(),
                end: None,
            },
        );
        self.persist()
    }

    pub fn stage_end(&mut self, stage: RunStage) -> Result<(), ForgeError> {
        let entry = self.timestamps.get_mut(&stage).ok_or_else(|| {
            ForgeError::IllegalStateTransition(format!(
                "stage {stage} has no start timestamp to end"
            ))
        })?;
        if entry.end.is_some() {
            return Err(ForgeError::IllegalStateTransition(format!(
                "stage {stage} is already ended"
            )));
        }
        entry.end = Some(now_iso8601());
        self.persist()
    }

    pub fn set_current_stage(&mut self, stage: RunStage) -> Result<(), ForgeError> {
        self.current_stage = stage;
        self.persist()
    }

    /// Status is monotone once terminal: `shipped`/`aborted` cannot be
    /// changed again (spec.md §8, terminality invariant).
    pub fn set_status(&mut self, status: RunStatus) -> Result<(), ForgeError> {
        if self.status.is_terminal() {
            return Err(ForgeError::IllegalStateTransition(format!(
                "status is already terminal ({:?})",
                self.status
            )));
        }
        self.status = status;
        self.persist()
    }
}
