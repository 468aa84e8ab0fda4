//! End-to-end wiring: drive a [`MasterController`] run to completion, then
//! build and persist the [`RunManifest`] for it. Most callers want this
//! instead of driving the controller and the manifest builder by hand.

use camino::Utf8Path;
use shipwright_controller::{MasterController, RunOptions, RunOutcome};
use shipwright_evidence::EvidenceChain;
use shipwright_manifest::{ManifestStatus, RunManifest, build_manifest};
use shipwright_spec::Spec;
use shipwright_state::RunState;
use shipwright_util::atomic_write::write_file_atomic;
use shipwright_util::{ForgeError, canonical_json};

/// Run `spec` through `controller`, reload the run state and evidence chain
/// it persisted, and write a `RunManifest` to `manifest_path`.
///
/// `run_id` is supplied by the caller since neither `RunState` nor
/// `EvidenceChain` carry one yet.
///
/// # Errors
/// Propagates any error from the run itself, from reloading the persisted
/// state/chain, or from hashing/persisting the manifest.
pub async fn ship(
    controller: &MasterController,
    options: &RunOptions,
    spec: Spec,
    run_id: impl Into<String>,
    manifest_path: &Utf8Path,
) -> Result<(RunOutcome, RunManifest), ForgeError> {
    let run_id = run_id.into();
    let outcome = controller.run(spec, run_id.clone()).await?;

    let state = RunState::load(&options.run_state_path)?;
    let chain = EvidenceChain::read_from_file(&options.evidence_chain_path)?;

    let status = match &outcome {
        RunOutcome::Shipped => ManifestStatus::Shipped,
        RunOutcome::Aborted { .. } => ManifestStatus::Aborted,
    };

    let manifest = build_manifest(run_id, status, &state, &chain)?;
    let json = canonical_json(&manifest).map_err(ForgeError::Other)?;
    write_file_atomic(manifest_path, &json)?;

    Ok((outcome, manifest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use serde_json::json;
    use shipwright_gate::GateRegistry;
    use shipwright_pipeline::PipelineConfig;
    use shipwright_spec::{RawFeature, RawJourney, RawStep, RawSpec, validate};
    use shipwright_worker::WorkerRegistry;
    use std::collections::BTreeMap;

    fn temp_path(name: &str) -> Utf8PathBuf {
        let dir = tempfile::tempdir().unwrap().keep();
        Utf8PathBuf::from_path_buf(dir.join(name)).unwrap()
    }

    fn sample_spec() -> Spec {
        let raw = RawSpec {
            schema_version: "2026.1".into(),
            product: json!({"name": "demo"}),
            features: vec![RawFeature {
                id: "f1".into(),
                rest: serde_json::Map::new(),
            }],
            journeys: vec![RawJourney {
                id: "j1".into(),
                features: vec!["f1".into()],
                steps: vec![RawStep {
                    kind: "assertion".into(),
                    rest: serde_json::Map::new(),
                }],
            }],
            design: None,
            quality: BTreeMap::new(),
            delivery: json!({}),
            dependencies: None,
            extensions: None,
        };
        validate(raw).expect("sample spec is valid")
    }

    #[tokio::test]
    async fn ship_persists_a_manifest_matching_the_outcome() {
        let options = RunOptions::new(temp_path("run-state.json"), temp_path("chain.ndjson"));
        let controller = MasterController::new(
            PipelineConfig::new(),
            WorkerRegistry::new(),
            GateRegistry::new(),
            options.clone(),
        );
        let manifest_path = temp_path("manifest.json");

        let (outcome, manifest) = ship(&controller, &options, sample_spec(), "run-1", &manifest_path)
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::Shipped);
        assert_eq!(manifest.status, ManifestStatus::Shipped);
        assert!(manifest_path.exists());
    }
}
