//! `GateRegistry` (spec.md §4.F): one-shot registration, and the only way a
//! gate verdict reaches the evidence chain.
//!
//! The public surface is deliberately narrow: register, evaluate,
//! get_registered. There is no override, skip, force, bypass, or remove —
//! a failed gate stays failed.

use std::collections::HashMap;

use serde_json::{Map, json};
use shipwright_evidence::{AppendInput, EntryType, EvidenceChain, RunStage};
use shipwright_state::GateResult;
use shipwright_util::{ForgeError, Value, now_iso8601};

use crate::gate::Gate;

#[derive(Default)]
pub struct GateRegistry {
    gates: HashMap<String, Box<dyn Gate>>,
}

impl GateRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            gates: HashMap::new(),
        }
    }

    /// # Errors
    /// Returns [`ForgeError::DuplicateRegistration`] if a gate with this id
    /// is already registered.
    pub fn register(&mut self, gate: Box<dyn Gate>) -> Result<(), ForgeError> {
        let id = gate.id().to_string();
        if self.gates.contains_key(&id) {
            return Err(ForgeError::DuplicateRegistration(id));
        }
        self.gates.insert(id, gate);
        Ok(())
    }

    #[must_use]
    pub fn get_registered(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.gates.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Run `gate_id` over `evidence` and append exactly one `gate_pass` or
    /// `gate_fail` entry to `chain`.
    ///
    /// # Errors
    /// Returns [`ForgeError::GateNotRegistered`] if `gate_id` is unknown, or
    /// whatever [`EvidenceChain::append`] returns on hashing failure.
    pub fn evaluate(
        &self,
        gate_id: &str,
        evidence: &Map<String, Value>,
        chain: &mut EvidenceChain,
        stage: RunStage,
    ) -> Result<GateResult, ForgeError> {
        let gate = self
            .gates
            .get(gate_id)
            .ok_or_else(|| ForgeError::GateNotRegistered(gate_id.to_string()))?;

        let verdict = gate.check(evidence);
        let result = GateResult {
            gate_id: gate_id.to_string(),
            passed: verdict.passed,
            timestamp: now_iso8601(),
            checks: verdict.checks,
        };

        let entry_type = if result.passed {
            EntryType::GatePass
        } else {
            EntryType::GateFail
        };
        let data = serde_json::to_value(&result).map_err(|e| ForgeError::Other(e.into()))?;
        chain.append(AppendInput::new(entry_type, "gate-registry", stage, data))?;

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shipwright_state::GateCheck;

    struct AlwaysPass;
    impl Gate for AlwaysPass {
        fn id(&self) -> &str {
            "always-pass"
        }
        fn check(&self, _evidence: &Map<String, Value>) -> crate::gate::GateVerdict {
            crate::gate::GateVerdict {
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

    struct ThresholdGate {
        threshold: f64,
    }
    impl Gate for ThresholdGate {
        fn id(&self) -> &str {
            "coverage"
        }
        fn check(&self, evidence: &Map<String, Value>) -> crate::gate::GateVerdict {
            let measured = evidence.get("coverage").and_then(Value::as_f64).unwrap_or(0.0);
            let passed = measured >= self.threshold;
            crate::gate::GateVerdict {
                passed,
                checks: vec![GateCheck {
                    name: "coverage".into(),
                    passed,
                    measured,
                    threshold: self.threshold,
                    message: if passed {
                        None
                    } else {
                        Some(format!("coverage {measured} below threshold {}", self.threshold))
                    },
                }],
            }
        }
    }

    #[test]
    fn evaluate_appends_gate_pass_entry() {
        let mut registry = GateRegistry::new();
        registry.register(Box::new(AlwaysPass)).unwrap();
        let mut chain = EvidenceChain::new();
        let result = registry
            .evaluate("always-pass", &Map::new(), &mut chain, RunStage::SpecValidation)
            .unwrap();
        assert!(result.passed);
        assert_eq!(chain.length(), 1);
        assert_eq!(chain.get_entry(0).unwrap().entry_type, EntryType::GatePass);
    }

    #[test]
    fn evaluate_appends_gate_fail_entry_on_failure() {
        let mut registry = GateRegistry::new();
        registry.register(Box::new(ThresholdGate { threshold: 0.9 })).unwrap();
        let mut evidence = Map::new();
        evidence.insert("coverage".into(), json!(0.5));
        let mut chain = EvidenceChain::new();
        let result = registry
            .evaluate("coverage", &evidence, &mut chain, RunStage::Testing)
            .unwrap();
        assert!(!result.passed);
        assert_eq!(chain.get_entry(0).unwrap().entry_type, EntryType::GateFail);
    }

    #[test]
    fn evaluate_unregistered_gate_errors_without_touching_chain() {
        let registry = GateRegistry::new();
        let mut chain = EvidenceChain::new();
        let err = registry
            .evaluate("ghost", &Map::new(), &mut chain, RunStage::Testing)
            .unwrap_err();
        assert!(matches!(err, ForgeError::GateNotRegistered(_)));
        assert_eq!(chain.length(), 0);
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = GateRegistry::new();
        registry.register(Box::new(AlwaysPass)).unwrap();
        let err = registry.register(Box::new(AlwaysPass)).unwrap_err();
        assert!(matches!(err, ForgeError::DuplicateRegistration(_)));
    }

    #[test]
    fn get_registered_is_sorted() {
        let mut registry = GateRegistry::new();
        registry.register(Box::new(AlwaysPass)).unwrap();
        registry.register(Box::new(ThresholdGate { threshold: 0.5 })).unwrap();
        assert_eq!(registry.get_registered(), vec!["always-pass", "coverage"]);
    }
}
