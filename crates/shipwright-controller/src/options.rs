//! `RunOptions`: the Master Controller's ambient configuration. There is no
//! file-based loader — a run is configured by its caller in-process, the
//! same way the rest of this runtime is wired together.

use camino::Utf8PathBuf;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub run_state_path: Utf8PathBuf,
    pub evidence_chain_path: Utf8PathBuf,
    /// Total attempt budget for a worker before its stage's dispatch gives
    /// up and reports `Failed` with a "retries exhausted" reason. `1` means
    /// a single attempt, no retries.
    pub max_retries: u32,
}

impl RunOptions {
    #[must_use]
    pub fn new(run_state_path: Utf8PathBuf, evidence_chain_path: Utf8PathBuf) -> Self {
        Self {
            run_state_path,
            evidence_chain_path,
            max_retries: 2,
        }
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}
