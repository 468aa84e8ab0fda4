//! Master Controller (spec.md §4.H): the single state machine that walks a
//! [`PipelineConfig`] in topological order, dispatching workers and
//! evaluating gates. It spawns no background tasks — a run is one
//! cooperative `async fn` from start to a terminal `Shipped`/`Aborted`.

use camino::Utf8Path;
use serde_json::{Map, json};
use tracing::{info, instrument, warn};

use shipwright_evidence::{AppendInput, EntryType, EvidenceChain, RunStage};
use shipwright_gate::GateRegistry;
use shipwright_pipeline::{PipelineConfig, StageConfig};
use shipwright_spec::Spec;
use shipwright_state::{RunState, RunStatus};
use shipwright_util::{ForgeError, Value};
use shipwright_worker::{Artifact, WorkerRegistry, WorkerResult};

use crate::options::RunOptions;
use crate::outcome::RunOutcome;

fn stage_from_id(id: &str) -> Result<RunStage, ForgeError> {
    RunStage::PIPELINE_ORDER
        .into_iter()
        .find(|s| s.as_str() == id)
        .ok_or_else(|| ForgeError::PipelineStructure(shipwright_util::PipelineStructureError::UnknownDependency {
            stage: id.to_string(),
            dependency: "<not a pipeline stage name>".to_string(),
        }))
}

/// What a stage's dispatch produced, once retries are exhausted one way or
/// the other. Unlike [`WorkerResult`], `Failed` here also covers a worker
/// that threw on every attempt — by the time retries run out, a thrown
/// exception and a reported failure are indistinguishable to the stage's
/// gate.
enum DispatchResult {
    Done {
        output: Value,
        artifacts: Vec<Artifact>,
    },
    Failed {
        reason: String,
    },
}

pub struct MasterController {
    pipeline: PipelineConfig,
    workers: WorkerRegistry,
    gates: GateRegistry,
    options: RunOptions,
}

impl MasterController {
    #[must_use]
    pub fn new(
        pipeline: PipelineConfig,
        workers: WorkerRegistry,
        gates: GateRegistry,
        options: RunOptions,
    ) -> Self {
        Self {
            pipeline,
            workers,
            gates,
            options,
        }
    }

    /// Validate the pipeline against the registered workers/gates, create a
    /// fresh `RunState` and evidence chain, and walk every stage to
    /// completion.
    ///
    /// # Errors
    /// Returns an error if pipeline validation fails or a stage's worker
    /// raises an unexpected (not reported-failure) error.
    #[instrument(skip_all)]
    pub async fn run(&self, spec: Spec, run_id: impl Into<String>) -> Result<RunOutcome, ForgeError> {
        self.validate_wiring()?;
        let run_id = run_id.into();

        let mut state = RunState::new(spec, self.options.run_state_path.clone())?;
        let mut chain = EvidenceChain::new();

        let spec_hash = state.spec().spec_hash().to_string();
        let mut run_start_data = self.pipeline.to_evidence();
        if let Value::Object(fields) = &mut run_start_data {
            fields.insert("runId".into(), json!(run_id));
            fields.insert("specHash".into(), json!(spec_hash));
            fields.insert("maxRetries".into(), json!(self.options.max_retries));
        }
        chain.append(AppendInput::new(
            EntryType::RunStart,
            "master-controller",
            RunStage::Initializing,
            run_start_data,
        ))?;
        self.persist_chain(&chain)?;

        self.execute_loop(&mut state, &mut chain).await
    }

    /// Reload a previously-persisted run and continue from the first
    /// not-yet-ended stage.
    ///
    /// # Errors
    /// Returns [`ForgeError::ChainBroken`] if the reloaded chain fails
    /// verification, or whatever [`Self::run`] would return for a fresh run.
    #[instrument(skip_all)]
    pub async fn resume(
        &self,
        run_state_path: &Utf8Path,
        evidence_chain_path: &Utf8Path,
    ) -> Result<RunOutcome, ForgeError> {
        self.validate_wiring()?;

        let mut state = RunState::load(run_state_path)?;
        let mut chain = EvidenceChain::read_from_file(evidence_chain_path)?;
        let verification = chain.verify();
        if !verification.valid {
            return Err(ForgeError::ChainBroken {
                broken_at_seq: verification.broken_at_seq.unwrap_or(0),
            });
        }

        self.execute_loop(&mut state, &mut chain).await
    }

    fn validate_wiring(&self) -> Result<(), ForgeError> {
        self.pipeline.validate()?;
        let known_workers: Vec<String> = self.workers.list().into_iter().map(String::from).collect();
        let known_gates: Vec<String> = self.gates.get_registered().into_iter().map(String::from).collect();
        self.pipeline.cross_validate(&known_workers, &known_gates)?;
        Ok(())
    }

    fn persist_chain(&self, chain: &EvidenceChain) -> Result<(), ForgeError> {
        chain.write_to_file(&self.options.evidence_chain_path)
    }

    fn stage_complete(state: &RunState, stage: RunStage) -> bool {
        state
            .timestamps()
            .get(&stage)
            .is_some_and(|ts| ts.end.is_some())
    }

    async fn execute_loop(
        &self,
        state: &mut RunState,
        chain: &mut EvidenceChain,
    ) -> Result<RunOutcome, ForgeError> {
        let order = self.pipeline.topological_order()?;

        for stage_id in order {
            let stage = stage_from_id(&stage_id)?;
            if Self::stage_complete(state, stage) {
                info!(stage = %stage_id, "skipping already-completed stage on resume");
                continue;
            }

            let stage_cfg = self
                .pipeline
                .get_stage(&stage_id)
                .expect("stage id came from this pipeline's own topological order")
                .clone();

            state.set_current_stage(stage)?;
            state.stage_start(stage)?;
            chain.append(AppendInput::new(
                EntryType::Note,
                "master-controller",
                stage,
                json!({"event": "stage_start", "stageId": stage_id}),
            ))?;
            chain.append(AppendInput::new(
                EntryType::WorkerStart,
                &stage_cfg.worker,
                stage,
                json!({"stage": stage_id}),
            ))?;
            self.persist_chain(chain)?;

            let result = self.dispatch_with_retry(&stage_cfg, stage, state, chain).await?;

            if let DispatchResult::Done { output, .. } = &result {
                self.apply_stage_output(state, stage, output.clone())?;
            }

            let worker_status = match &result {
                DispatchResult::Done { .. } => "done",
                DispatchResult::Failed { .. } => "failed",
            };
            state.stage_end(stage)?;
            chain.append(AppendInput::new(
                EntryType::Note,
                "master-controller",
                stage,
                json!({"event": "stage_end", "stageId": stage_id, "workerStatus": worker_status}),
            ))?;
            self.persist_chain(chain)?;

            if let Some(gate_id) = &stage_cfg.gate {
                let evidence = self.gate_evidence_for(state, stage, &result);
                let gate_result = self.gates.evaluate(gate_id, &evidence, chain, stage)?;
                self.persist_chain(chain)?;
                let passed = gate_result.passed;
                state.add_gate_result(gate_result)?;

                if !passed {
                    warn!(stage = %stage_id, gate = %gate_id, "gate failed, aborting run");
                    return self
                        .abort(
                            state,
                            chain,
                            stage,
                            &stage_id,
                            format!("gate '{gate_id}' failed at stage '{stage_id}'"),
                        )
                        .await;
                }
            }
        }

        state.set_status(RunStatus::Shipped)?;
        chain.append(AppendInput::new(
            EntryType::RunEnd,
            "master-controller",
            RunStage::RunAudit,
            json!({"status": "shipped"}),
        ))?;
        self.persist_chain(chain)?;
        info!("run shipped");
        Ok(RunOutcome::Shipped)
    }

    async fn abort(
        &self,
        state: &mut RunState,
        chain: &mut EvidenceChain,
        stage: RunStage,
        stage_id: &str,
        reason: String,
    ) -> Result<RunOutcome, ForgeError> {
        state.set_status(RunStatus::Aborted)?;
        chain.append(AppendInput::new(
            EntryType::RunEnd,
            "master-controller",
            stage,
            json!({"status": "aborted", "reason": reason}),
        ))?;
        self.persist_chain(chain)?;
        Ok(RunOutcome::Aborted {
            stage: stage_id.to_string(),
            reason,
        })
    }

    /// A reported [`WorkerResult::Failed`] is not retried — the worker ran
    /// to completion and decided its stage didn't succeed, so that verdict
    /// goes straight to `worker_end` and on to gate evaluation. Only a
    /// thrown `Err` (a bug, a timeout, a precondition miss) is retried, up
    /// to `max_retries` attempts total.
    async fn dispatch_with_retry(
        &self,
        stage_cfg: &StageConfig,
        stage: RunStage,
        state: &RunState,
        chain: &mut EvidenceChain,
    ) -> Result<DispatchResult, ForgeError> {
        let max_attempts = self.options.max_retries;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match self.workers.dispatch(&stage_cfg.worker, state).await {
                Ok(WorkerResult::Done { output, artifacts }) => {
                    chain.append(AppendInput::new(
                        EntryType::WorkerEnd,
                        &stage_cfg.worker,
                        stage,
                        json!({"status": "done", "attempt": attempt, "artifacts": artifacts}),
                    ))?;
                    self.persist_chain(chain)?;
                    return Ok(DispatchResult::Done { output, artifacts });
                }
                Ok(WorkerResult::Failed { reason }) => {
                    chain.append(AppendInput::new(
                        EntryType::WorkerEnd,
                        &stage_cfg.worker,
                        stage,
                        json!({"status": "failed", "reason": reason, "attempt": attempt}),
                    ))?;
                    self.persist_chain(chain)?;
                    return Ok(DispatchResult::Failed { reason });
                }
                Err(e) => {
                    chain.append(AppendInput::new(
                        EntryType::Error,
                        &stage_cfg.worker,
                        stage,
                        json!({"attempt": attempt, "error": e.to_string()}),
                    ))?;

                    if attempt >= max_attempts {
                        let reason = format!(
                            "retries exhausted ({attempt}/{max_attempts}): {e}"
                        );
                        chain.append(AppendInput::new(
                            EntryType::WorkerEnd,
                            &stage_cfg.worker,
                            stage,
                            json!({"status": "failed", "reason": reason, "attempt": attempt}),
                        ))?;
                        self.persist_chain(chain)?;
                        return Ok(DispatchResult::Failed { reason });
                    }

                    chain.append(AppendInput::new(
                        EntryType::Note,
                        &stage_cfg.worker,
                        stage,
                        json!({"event": "retry_scheduled", "attempt": attempt + 1, "maxRetries": max_attempts}),
                    ))?;
                    self.persist_chain(chain)?;
                }
            }
        }
    }

    fn apply_stage_output(
        &self,
        state: &mut RunState,
        stage: RunStage,
        output: Value,
    ) -> Result<(), ForgeError> {
        match stage {
            RunStage::Planning => {
                let plan = serde_json::from_value(output).map_err(|e| ForgeError::Other(e.into()))?;
                state.set_plan(plan)
            }
            RunStage::Assembly => {
                let build_output =
                    serde_json::from_value(output).map_err(|e| ForgeError::Other(e.into()))?;
                state.set_build_output(build_output)
            }
            RunStage::Testing => {
                let results = serde_json::from_value(output).map_err(|e| ForgeError::Other(e.into()))?;
                state.append_test_results(results)
            }
            RunStage::UiInspection => {
                let ui = serde_json::from_value(output).map_err(|e| ForgeError::Other(e.into()))?;
                state.set_ui_inspection(ui)
            }
            RunStage::SecurityAudit => {
                let report =
                    serde_json::from_value(output).map_err(|e| ForgeError::Other(e.into()))?;
                state.set_security_report(report)
            }
            RunStage::ReleasePackage => {
                let artifacts =
                    serde_json::from_value(output).map_err(|e| ForgeError::Other(e.into()))?;
                state.append_release_artifacts(artifacts)
            }
            RunStage::SpecValidation | RunStage::Building | RunStage::RunAudit | RunStage::Initializing => Ok(()),
        }
    }

    /// Evidence handed to the gate registered for `stage`: the worker's
    /// outcome, plus whatever that stage just wrote into `state`.
    fn gate_evidence_for(
        &self,
        state: &RunState,
        stage: RunStage,
        result: &DispatchResult,
    ) -> Map<String, Value> {
        let mut evidence = Map::new();
        match result {
            DispatchResult::Done { .. } => {
                evidence.insert("workerStatus".into(), json!("done"));
            }
            DispatchResult::Failed { reason } => {
                evidence.insert("workerStatus".into(), json!("failed"));
                evidence.insert("workerReason".into(), json!(reason));
            }
        }
        match stage {
            RunStage::SpecValidation => {
                evidence.insert("specHash".into(), json!(state.spec().spec_hash()));
            }
            RunStage::Testing => {
                let total = state.test_results().len();
                let passed = state.test_results().iter().filter(|t| t.passed).count();
                let pass_rate = if total == 0 { 0.0 } else { passed as f64 / total as f64 };
                evidence.insert("passRate".into(), json!(pass_rate));
                evidence.insert("total".into(), json!(total));
                evidence.insert("passed".into(), json!(passed));
            }
            RunStage::UiInspection => {
                if let Some(ui) = state.ui_inspection() {
                    evidence.insert("findings".into(), ui.findings.clone());
                }
            }
            RunStage::SecurityAudit => {
                if let Some(report) = state.security_report() {
                    evidence.insert("findings".into(), report.findings.clone());
                }
            }
            RunStage::ReleasePackage => {
                evidence.insert("artifactCount".into(), json!(state.release_artifacts().len()));
            }
            RunStage::Planning
            | RunStage::Building
            | RunStage::Assembly
            | RunStage::RunAudit
            | RunStage::Initializing => {}
        }
        evidence
    }
}
