//! Pipeline Config (spec.md §4.G): the validated DAG of stages the Master
//! Controller walks in topological order.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::json;
use shipwright_evidence::RunStage;
use shipwright_state::Slice;
use shipwright_util::{PipelineStructureError, Value};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageConfig {
    pub id: String,
    pub worker: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate: Option<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub parallel: bool,
    #[serde(default)]
    pub requires: Vec<Slice>,
    #[serde(default)]
    pub produces: Vec<Slice>,
}

#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    stages: Vec<StageConfig>,
}

impl PipelineConfig {
    #[must_use]
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    #[must_use]
    pub fn stages(&self) -> &[StageConfig] {
        &self.stages
    }

    #[must_use]
    pub fn get_stage(&self, id: &str) -> Option<&StageConfig> {
        self.stages.iter().find(|s| s.id == id)
    }

    /// # Errors
    /// Returns [`PipelineStructureError::DuplicateStage`] if `stage.id` is
    /// already present.
    pub fn add_stage(&mut self, stage: StageConfig) -> Result<(), PipelineStructureError> {
        if self.get_stage(&stage.id).is_some() {
            return Err(PipelineStructureError::DuplicateStage(stage.id));
        }
        self.stages.push(stage);
        Ok(())
    }

    /// Full structural validation: duplicate ids, unknown dependencies,
    /// cycles, and slice availability in dependency order.
    ///
    /// # Errors
    /// Returns the first structural violation found.
    pub fn validate(&self) -> Result<(), PipelineStructureError> {
        let mut seen = HashSet::new();
        for stage in &self.stages {
            if !seen.insert(stage.id.clone()) {
                return Err(PipelineStructureError::DuplicateStage(stage.id.clone()));
            }
        }

        let known_ids: HashSet<&str> = self.stages.iter().map(|s| s.id.as_str()).collect();
        for stage in &self.stages {
            for dep in &stage.depends_on {
                if !known_ids.contains(dep.as_str()) {
                    return Err(PipelineStructureError::UnknownDependency {
                        stage: stage.id.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        let order = self.topological_order()?;

        let mut available: HashSet<Slice> = HashSet::from([Slice::Spec]);
        for id in &order {
            let stage = self.get_stage(id).expect("id came from this config");
            for slice in &stage.requires {
                if !available.contains(slice) {
                    return Err(PipelineStructureError::MissingSlice {
                        stage: stage.id.clone(),
                        slice: slice.to_string(),
                    });
                }
            }
            available.extend(stage.produces.iter().copied());
        }

        Ok(())
    }

    /// Stable topological order: among stages whose dependencies are all
    /// already placed, always pick the lexicographically smallest id next.
    ///
    /// # Errors
    /// Returns [`PipelineStructureError::Cycle`] naming the stages that
    /// could never be placed.
    pub fn topological_order(&self) -> Result<Vec<String>, PipelineStructureError> {
        let mut indegree: HashMap<&str, usize> = HashMap::new();
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

        for stage in &self.stages {
            indegree.entry(stage.id.as_str()).or_insert(0);
            for dep in &stage.depends_on {
                *indegree.entry(stage.id.as_str()).or_insert(0) += 1;
                dependents.entry(dep.as_str()).or_default().push(stage.id.as_str());
            }
        }

        let mut ready: BTreeSet<&str> = indegree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(id, _)| *id)
            .collect();

        let mut order = Vec::with_capacity(self.stages.len());
        while let Some(&id) = ready.iter().next() {
            ready.remove(id);
            order.push(id.to_string());
            if let Some(deps) = dependents.get(id) {
                for &dependent in deps {
                    let deg = indegree.get_mut(dependent).expect("known stage");
                    *deg -= 1;
                    if *deg == 0 {
                        ready.insert(dependent);
                    }
                }
            }
        }

        if order.len() != self.stages.len() {
            let placed: HashSet<&str> = order.iter().map(String::as_str).collect();
            let mut remaining: Vec<&str> = self
                .stages
                .iter()
                .map(|s| s.id.as_str())
                .filter(|id| !placed.contains(id))
                .collect();
            remaining.sort_unstable();
            return Err(PipelineStructureError::Cycle(remaining.join(" -> ")));
        }

        Ok(order)
    }

    /// Check that every stage's `worker`/`gate` reference is registered
    /// elsewhere in the runtime (spec.md §4.G, cross-component validation).
    ///
    /// # Errors
    /// Returns the first unresolved reference found.
    pub fn cross_validate(
        &self,
        known_workers: &[String],
        known_gates: &[String],
    ) -> Result<(), PipelineStructureError> {
        for stage in &self.stages {
            if !known_workers.iter().any(|w| w == &stage.worker) {
                return Err(PipelineStructureError::UnknownWorker {
                    stage: stage.id.clone(),
                    worker: stage.worker.clone(),
                });
            }
            if let Some(gate) = &stage.gate {
                if !known_gates.iter().any(|g| g == gate) {
                    return Err(PipelineStructureError::UnknownGate {
                        stage: stage.id.clone(),
                        gate: gate.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Insert `new_stage` after `after_stage_id`, rewiring every stage that
    /// previously depended on `after_stage_id` to depend on `new_stage`
    /// instead. Applied atomically: on validation failure the config is left
    /// exactly as it was.
    ///
    /// # Errors
    /// Returns whatever [`Self::validate`] reports for the candidate graph,
    /// or [`PipelineStructureError::DuplicateStage`] if `new_stage.id`
    /// already exists.
    pub fn insert_stage(
        &mut self,
        mut new_stage: StageConfig,
        after_stage_id: &str,
    ) -> Result<(), PipelineStructureError> {
        if self.get_stage(&new_stage.id).is_some() {
            return Err(PipelineStructureError::DuplicateStage(new_stage.id));
        }
        if self.get_stage(after_stage_id).is_none() {
            return Err(PipelineStructureError::UnknownDependency {
                stage: new_stage.id,
                dependency: after_stage_id.to_string(),
            });
        }

        if !new_stage.depends_on.iter().any(|d| d == after_stage_id) {
            new_stage.depends_on.push(after_stage_id.to_string());
        }

        let mut candidate = self.stages.clone();
        for stage in &mut candidate {
            if stage.depends_on.iter().any(|d| d == after_stage_id) {
                stage.depends_on.retain(|d| d != after_stage_id);
                stage.depends_on.push(new_stage.id.clone());
            }
        }
        candidate.push(new_stage);

        let candidate_config = Self {
            stages: candidate.clone(),
        };
        candidate_config.validate()?;

        self.stages = candidate;
        Ok(())
    }

    /// JSON snapshot suitable for embedding in an evidence entry's `data`.
    #[must_use]
    pub fn to_evidence(&self) -> Value {
        json!({
            "stages": self.stages.iter().map(|s| json!({
                "id": s.id,
                "worker": s.worker,
                "gate": s.gate,
                "dependsOn": s.depends_on,
                "parallel": s.parallel,
                "requires": s.requires.iter().map(Slice::to_string).collect::<Vec<_>>(),
                "produces": s.produces.iter().map(Slice::to_string).collect::<Vec<_>>(),
            })).collect::<Vec<_>>(),
        })
    }

    /// The nine canonical stages in a straight-line chain, one worker per
    /// stage, named to match `RunStage::PIPELINE_ORDER`.
    #[must_use]
    pub fn default_factory1() -> Self {
        let mut config = Self::new();
        let mut previous: Option<String> = None;

        let specs: [(RunStage, Option<&str>, Vec<Slice>, Vec<Slice>); 9] = [
            (RunStage::SpecValidation, Some("spec_valid"), vec![Slice::Spec], vec![]),
            (RunStage::Planning, Some("plan_complete"), vec![Slice::Spec], vec![Slice::Plan]),
            (RunStage::Building, None, vec![Slice::Plan], vec![]),
            (
                RunStage::Assembly,
                Some("build_success"),
                vec![Slice::Plan],
                vec![Slice::BuildOutput],
            ),
            (
                RunStage::Testing,
                Some("tests_pass"),
                vec![Slice::BuildOutput],
                vec![Slice::TestResults],
            ),
            (
                RunStage::UiInspection,
                Some("visual_qa"),
                vec![Slice::TestResults],
                vec![Slice::UiInspection],
            ),
            (
                RunStage::SecurityAudit,
                Some("security_clear"),
                vec![Slice::BuildOutput],
                vec![Slice::SecurityReport],
            ),
            (
                RunStage::ReleasePackage,
                Some("artifact_ready"),
                vec![Slice::SecurityReport],
                vec![Slice::ReleaseArtifacts],
            ),
            (RunStage::RunAudit, Some("manifest_valid"), vec![Slice::ReleaseArtifacts], vec![]),
        ];

        for (stage, gate, requires, produces) in specs {
            let id = stage.as_str().to_string();
            let depends_on = previous.clone().into_iter().collect();
            config
                .add_stage(StageConfig {
                    id: id.clone(),
                    worker: id.clone(),
                    gate: gate.map(str::to_string),
                    depends_on,
                    parallel: false,
                    requires,
                    produces,
                })
                .expect("default factory never produces duplicate ids");
            previous = Some(id);
        }

        config
    }
}
