//! End-to-end scenarios for the Master Controller: a full nine-stage run,
//! retry recovery and exhaustion, gate rejection, resume-from-partial, and
//! tamper detection on reload.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use camino::Utf8PathBuf;
use serde_json::{Map, json};

use shipwright_controller::{MasterController, RunOptions, RunOutcome};
use shipwright_evidence::RunStage;
use shipwright_gate::{Gate, GateRegistry, GateVerdict};
use shipwright_pipeline::PipelineConfig;
use shipwright_spec::{RawFeature, RawJourney, RawSpec, RawStep, Spec, validate};
use shipwright_state::{GateCheck, RunState, Slice};
use shipwright_util::{ForgeError, Value};
use shipwright_worker::{Worker, WorkerRegistry, WorkerResult};

fn sample_spec() -> Spec {
    let raw = RawSpec {
        schema_version: "2026.1".into(),
        product: json!({"name": "demo"}),
        features: vec![RawFeature {
            id: "f1".into(),
            rest: Map::new(),
        }],
        journeys: vec![RawJourney {
            id: "j1".into(),
            features: vec!["f1".into()],
            steps: vec![RawStep {
                kind: "assertion".into(),
                rest: Map::new(),
            }],
        }],
        design: None,
        quality: Default::default(),
        delivery: json!({}),
        dependencies: None,
        extensions: None,
    };
    validate(raw).expect("sample spec is valid")
}

fn temp_paths() -> (Utf8PathBuf, Utf8PathBuf) {
    let dir = tempfile::tempdir().unwrap().keep();
    (
        Utf8PathBuf::from_path_buf(dir.join("run-state.json")).unwrap(),
        Utf8PathBuf::from_path_buf(dir.join("evidence.ndjson")).unwrap(),
    )
}

struct StaticWorker {
    id: String,
    stage: RunStage,
    requires: Vec<Slice>,
    produces: Vec<Slice>,
    output: Value,
}

#[async_trait]
impl Worker for StaticWorker {
    fn id(&self) -> &str {
        &self.id
    }
    fn accepts(&self) -> RunStage {
        self.stage
    }
    fn requires(&self) -> &[Slice] {
        &self.requires
    }
    fn produces(&self) -> &[Slice] {
        &self.produces
    }
    fn timeout_ms(&self) -> u64 {
        5_000
    }
    async fn execute(&self, _state: &RunState) -> Result<WorkerResult, ForgeError> {
        Ok(WorkerResult::Done {
            output: self.output.clone(),
            artifacts: vec![],
        })
    }
}

/// Throws on its first `fail_times` calls, then succeeds. Only a thrown
/// error is retried, so this is what exercises `dispatch_with_retry`'s
/// retry path — a reported `Failed` never gets a second attempt.
struct FlakyWorker {
    id: String,
    stage: RunStage,
    requires: Vec<Slice>,
    produces: Vec<Slice>,
    fail_times: AtomicU32,
    success_output: Value,
}

#[async_trait]
impl Worker for FlakyWorker {
    fn id(&self) -> &str {
        &self.id
    }
    fn accepts(&self) -> RunStage {
        self.stage
    }
    fn requires(&self) -> &[Slice] {
        &self.requires
    }
    fn produces(&self) -> &[Slice] {
        &self.produces
    }
    fn timeout_ms(&self) -> u64 {
        5_000
    }
    async fn execute(&self, _state: &RunState) -> Result<WorkerResult, ForgeError> {
        let remaining = self.fail_times.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_times.fetch_sub(1, Ordering::SeqCst);
            return Err(ForgeError::WorkerException("transient failure".into()));
        }
        Ok(WorkerResult::Done {
            output: self.success_output.clone(),
            artifacts: vec![],
        })
    }
}

/// A gate that fails whenever the stage's worker reported `failed`.
struct RejectsFailedWorker(&'static str);
impl Gate for RejectsFailedWorker {
    fn id(&self) -> &str {
        self.0
    }
    fn check(&self, evidence: &Map<String, Value>) -> GateVerdict {
        let passed = evidence.get("workerStatus").and_then(Value::as_str) == Some("done");
        GateVerdict {
            passed,
            checks: vec![GateCheck {
                name: "workerStatus".into(),
                passed,
                measured: if passed { 1.0 } else { 0.0 },
                threshold: 1.0,
                message: None,
            }],
        }
    }
}

struct AlwaysPass(&'static str);
impl Gate for AlwaysPass {
    fn id(&self) -> &str {
        self.0
    }
    fn check(&self, _evidence: &Map<String, Value>) -> GateVerdict {
        GateVerdict {
            passed: true,
            checks: vec![GateCheck {
                name: "trivial".into(),
                passed: true,
                measured: 1.0,
                threshold: 1.0,
                message: None,
            }],
        }
    }
}

struct PassRateGate {
    threshold: f64,
}
impl Gate for PassRateGate {
    fn id(&self) -> &str {
        "test-pass-rate"
    }
    fn check(&self, evidence: &Map<String, Value>) -> GateVerdict {
        let measured = evidence.get("passRate").and_then(Value::as_f64).unwrap_or(0.0);
        let passed = measured >= self.threshold;
        GateVerdict {
            passed,
            checks: vec![GateCheck {
                name: "passRate".into(),
                passed,
                measured,
                threshold: self.threshold,
                message: None,
            }],
        }
    }
}

fn happy_path_output(stage: RunStage) -> Value {
    match stage {
        RunStage::Planning => json!({
            "summary": {},
            "work_units": [{
                "id": "wu1",
                "feature_ids": ["f1"],
                "description": "build it",
                "dependencies": [],
                "status": "done",
                "output_files": [],
            }],
        }),
        RunStage::Assembly => json!({"artifacts": ["bin"], "data": {}}),
        RunStage::Testing => json!([{"name": "t1", "passed": true, "details": {}}]),
        RunStage::UiInspection => json!({"findings": {}}),
        RunStage::SecurityAudit => json!({"findings": {}}),
        RunStage::ReleasePackage => json!([{
            "platform": "linux",
            "path": "/out/app",
            "sha256": "a".repeat(64),
            "size_bytes": 1024,
        }]),
        _ => json!({}),
    }
}

fn register_happy_workers(registry: &mut WorkerRegistry, pipeline: &PipelineConfig) {
    for stage_cfg in pipeline.stages() {
        let stage = RunStage::PIPELINE_ORDER
            .into_iter()
            .find(|s| s.as_str() == stage_cfg.id)
            .unwrap();
        registry
            .register(Box::new(StaticWorker {
                id: stage_cfg.worker.clone(),
                stage,
                requires: stage_cfg.requires.clone(),
                produces: stage_cfg.produces.clone(),
                output: happy_path_output(stage),
            }))
            .unwrap();
    }
}

fn register_happy_gates(registry: &mut GateRegistry, pipeline: &PipelineConfig) {
    for stage_cfg in pipeline.stages() {
        if let Some(gate_id) = &stage_cfg.gate {
            let leaked: &'static str = Box::leak(gate_id.clone().into_boxed_str());
            registry.register(Box::new(AlwaysPass(leaked))).unwrap();
        }
    }
}

#[tokio::test]
async fn happy_path_ships_all_nine_stages() {
    let pipeline = PipelineConfig::default_factory1();
    let mut workers = WorkerRegistry::new();
    register_happy_workers(&mut workers, &pipeline);
    let mut gates = GateRegistry::new();
    register_happy_gates(&mut gates, &pipeline);

    let (state_path, chain_path) = temp_paths();
    let options = RunOptions::new(state_path, chain_path);
    let controller = MasterController::new(pipeline, workers, gates, options);

    let outcome = controller.run(sample_spec(), "run-1").await.unwrap();
    assert_eq!(outcome, RunOutcome::Shipped);
}

#[tokio::test]
async fn retry_recovers_from_a_transient_failure() {
    let mut pipeline = PipelineConfig::new();
    pipeline
        .add_stage(shipwright_pipeline::StageConfig {
            id: "spec_validation".into(),
            worker: "spec_validation".into(),
            gate: None,
            depends_on: vec![],
            parallel: false,
            requires: vec![Slice::Spec],
            produces: vec![],
        })
        .unwrap();

    let mut workers = WorkerRegistry::new();
    workers
        .register(Box::new(FlakyWorker {
            id: "spec_validation".into(),
            stage: RunStage::SpecValidation,
            requires: vec![],
            produces: vec![],
            fail_times: AtomicU32::new(1),
            success_output: json!({}),
        }))
        .unwrap();
    let gates = GateRegistry::new();

    let (state_path, chain_path) = temp_paths();
    let options = RunOptions::new(state_path, chain_path).with_max_retries(2);
    let controller = MasterController::new(pipeline, workers, gates, options);

    let outcome = controller.run(sample_spec(), "run-1").await.unwrap();
    assert_eq!(outcome, RunOutcome::Shipped);
}

#[tokio::test]
async fn retry_exhaustion_aborts_the_run() {
    let mut pipeline = PipelineConfig::new();
    pipeline
        .add_stage(shipwright_pipeline::StageConfig {
            id: "spec_validation".into(),
            worker: "spec_validation".into(),
            gate: Some("spec_valid".into()),
            depends_on: vec![],
            parallel: false,
            requires: vec![Slice::Spec],
            produces: vec![],
        })
        .unwrap();

    let mut workers = WorkerRegistry::new();
    workers
        .register(Box::new(FlakyWorker {
            id: "spec_validation".into(),
            stage: RunStage::SpecValidation,
            requires: vec![],
            produces: vec![],
            fail_times: AtomicU32::new(10),
            success_output: json!({}),
        }))
        .unwrap();
    let mut gates = GateRegistry::new();
    gates.register(Box::new(RejectsFailedWorker("spec_valid"))).unwrap();

    let (state_path, chain_path) = temp_paths();
    let options = RunOptions::new(state_path, chain_path).with_max_retries(3);
    let controller = MasterController::new(pipeline, workers, gates, options);

    let outcome = controller.run(sample_spec(), "run-1").await.unwrap();
    match outcome {
        RunOutcome::Aborted { stage, reason } => {
            assert_eq!(stage, "spec_validation");
            assert!(reason.contains("spec_valid' failed at stage 'spec_validation'"));
        }
        RunOutcome::Shipped => panic!("expected abort"),
    }
}

#[tokio::test]
async fn gate_rejection_aborts_the_run() {
    let mut pipeline = PipelineConfig::new();
    pipeline
        .add_stage(shipwright_pipeline::StageConfig {
            id: "spec_validation".into(),
            worker: "spec_validation".into(),
            gate: None,
            depends_on: vec![],
            parallel: false,
            requires: vec![Slice::Spec],
            produces: vec![],
        })
        .unwrap();
    pipeline
        .add_stage(shipwright_pipeline::StageConfig {
            id: "assembly".into(),
            worker: "assembly".into(),
            gate: None,
            depends_on: vec!["spec_validation".into()],
            parallel: false,
            requires: vec![],
            produces: vec![Slice::BuildOutput],
        })
        .unwrap();
    pipeline
        .add_stage(shipwright_pipeline::StageConfig {
            id: "testing".into(),
            worker: "testing".into(),
            gate: Some("test-pass-rate".into()),
            depends_on: vec!["assembly".into()],
            parallel: false,
            requires: vec![Slice::BuildOutput],
            produces: vec![Slice::TestResults],
        })
        .unwrap();

    let mut workers = WorkerRegistry::new();
    workers
        .register(Box::new(StaticWorker {
            id: "spec_validation".into(),
            stage: RunStage::SpecValidation,
            requires: vec![],
            produces: vec![],
            output: json!({}),
        }))
        .unwrap();
    workers
        .register(Box::new(StaticWorker {
            id: "assembly".into(),
            stage: RunStage::Assembly,
            requires: vec![],
            produces: vec![Slice::BuildOutput],
            output: json!({"artifacts": [], "data": {}}),
        }))
        .unwrap();
    workers
        .register(Box::new(StaticWorker {
            id: "testing".into(),
            stage: RunStage::Testing,
            requires: vec![Slice::BuildOutput],
            produces: vec![Slice::TestResults],
            output: json!([
                {"name": "t1", "passed": true, "details": {}},
                {"name": "t2", "passed": false, "details": {}},
            ]),
        }))
        .unwrap();

    let mut gates = GateRegistry::new();
    gates
        .register(Box::new(PassRateGate { threshold: 0.99 }))
        .unwrap();

    let (state_path, chain_path) = temp_paths();
    let options = RunOptions::new(state_path, chain_path);
    let controller = MasterController::new(pipeline, workers, gates, options);

    let outcome = controller.run(sample_spec(), "run-1").await.unwrap();
    match outcome {
        RunOutcome::Aborted { stage, reason } => {
            assert_eq!(stage, "testing");
            assert!(reason.contains("test-pass-rate"));
        }
        RunOutcome::Shipped => panic!("expected abort"),
    }
}

#[tokio::test]
async fn resume_skips_completed_stages_and_finishes() {
    let pipeline = PipelineConfig::default_factory1();
    let mut workers = WorkerRegistry::new();
    register_happy_workers(&mut workers, &pipeline);
    let mut gates = GateRegistry::new();
    register_happy_gates(&mut gates, &pipeline);

    let (state_path, chain_path) = temp_paths();

    // Simulate a crash after the first stage: build state/chain by hand
    // instead of going through the controller.
    let mut state = RunState::new(sample_spec(), state_path.clone()).unwrap();
    let mut chain = shipwright_evidence::EvidenceChain::new();
    chain
        .append(shipwright_evidence::AppendInput::new(
            shipwright_evidence::EntryType::RunStart,
            "master-controller",
            RunStage::Initializing,
            json!({}),
        ))
        .unwrap();
    state.set_current_stage(RunStage::SpecValidation).unwrap();
    state.stage_start(RunStage::SpecValidation).unwrap();
    state.stage_end(RunStage::SpecValidation).unwrap();
    chain.write_to_file(&chain_path).unwrap();

    let options = RunOptions::new(state_path.clone(), chain_path.clone());
    let controller = MasterController::new(pipeline, workers, gates, options);

    let outcome = controller.resume(&state_path, &chain_path).await.unwrap();
    assert_eq!(outcome, RunOutcome::Shipped);
}

#[tokio::test]
async fn resume_detects_a_tampered_chain() {
    let pipeline = PipelineConfig::default_factory1();
    let mut workers = WorkerRegistry::new();
    register_happy_workers(&mut workers, &pipeline);
    let mut gates = GateRegistry::new();
    register_happy_gates(&mut gates, &pipeline);

    let (state_path, chain_path) = temp_paths();
    let state = RunState::new(sample_spec(), state_path.clone()).unwrap();
    let mut chain = shipwright_evidence::EvidenceChain::new();
    for _ in 0..3 {
        chain
            .append(shipwright_evidence::AppendInput::new(
                shipwright_evidence::EntryType::Note,
                "x",
                RunStage::Initializing,
                json!({"v": 1}),
            ))
            .unwrap();
    }
    chain.write_to_file(&chain_path).unwrap();
    drop(state);

    // Corrupt the second line's data field in place.
    let raw = std::fs::read_to_string(chain_path.as_std_path()).unwrap();
    let mut lines: Vec<String> = raw.lines().map(str::to_string).collect();
    lines[1] = lines[1].replace("\"v\":1", "\"v\":999");
    std::fs::write(chain_path.as_std_path(), format!("{}\n", lines.join("\n"))).unwrap();

    let options = RunOptions::new(state_path.clone(), chain_path.clone());
    let controller = MasterController::new(pipeline, workers, gates, options);

    let err = controller
        .resume(&state_path, &chain_path)
        .await
        .unwrap_err();
    assert!(matches!(err, ForgeError::ChainBroken { .. }));
}
