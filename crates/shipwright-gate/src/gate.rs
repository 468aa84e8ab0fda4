//! `Gate`: a pure, synchronous pass/fail check over a slice of evidence
//! (spec.md §4.F). Gates never see the whole `RunState` and never touch the
//! evidence chain themselves — [`crate::registry::GateRegistry::evaluate`]
//! owns both.

use serde_json::Map;
use shipwright_state::GateCheck;
use shipwright_util::Value;

/// What a gate decides, before the registry stamps on a `gate_id` and
/// `timestamp` to turn it into a [`shipwright_state::GateResult`].
#[derive(Debug, Clone)]
pub struct GateVerdict {
    pub passed: bool,
    pub checks: Vec<GateCheck>,
}

pub trait Gate: Send + Sync {
    fn id(&self) -> &str;

    /// `evidence` is whatever subset of run data this gate's checks need,
    /// assembled by the caller — a gate does not reach into `RunState` or
    /// the evidence chain on its own.
    fn check(&self, evidence: &Map<String, Value>) -> GateVerdict;
}
