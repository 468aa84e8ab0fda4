//! `WorkerRegistry` (spec.md §4.E): one-shot registration plus
//! precondition-checked, timeout-bounded dispatch.

use std::collections::HashMap;
use std::time::Duration;

use shipwright_state::RunState;
use shipwright_util::ForgeError;

use crate::worker::{Worker, WorkerResult};

#[derive(Default)]
pub struct WorkerRegistry {
    workers: HashMap<String, Box<dyn Worker>>,
}

impl WorkerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            workers: HashMap::new(),
        }
    }

    /// # Errors
    /// Returns [`ForgeError::DuplicateRegistration`] if a worker with this
    /// id is already registered.
    pub fn register(&mut self, worker: Box<dyn Worker>) -> Result<(), ForgeError> {
        let id = worker.id().to_string();
        if self.workers.contains_key(&id) {
            return Err(ForgeError::DuplicateRegistration(id));
        }
        self.workers.insert(id, worker);
        Ok(())
    }

    #[must_use]
    pub fn has(&self, id: &str) -> bool {
        self.workers.contains_key(id)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&dyn Worker> {
        self.workers.get(id).map(std::convert::AsRef::as_ref)
    }

    #[must_use]
    pub fn list(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.workers.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Check preconditions, then run `worker_id`'s `execute` bounded by its
    /// own `timeout_ms`.
    ///
    /// # Errors
    /// - [`ForgeError::WorkerNotRegistered`] if `worker_id` is unknown.
    /// - [`ForgeError::WorkerPreconditionMissing`] if a required slice is
    ///   absent from `state`.
    /// - [`ForgeError::WorkerTimeout`] if `execute` doesn't finish in time.
    /// - whatever `execute` itself returns, otherwise.
    pub async fn dispatch(
        &self,
        worker_id: &str,
        state: &RunState,
    ) -> Result<WorkerResult, ForgeError> {
        let worker = self
            .get(worker_id)
            .ok_or_else(|| ForgeError::WorkerNotRegistered(worker_id.to_string()))?;

        for slice in worker.requires() {
            if !state.is_slice_present(*slice) {
                return Err(ForgeError::WorkerPreconditionMissing(format!(
                    "{worker_id} requires {slice} to be present"
                )));
            }
        }

        let budget = Duration::from_millis(worker.timeout_ms());
        match tokio::time::timeout(budget, worker.execute(state)).await {
            Ok(result) => result,
            Err(_) => Err(ForgeError::WorkerTimeout {
                worker_id: worker_id.to_string(),
                timeout_ms: worker.timeout_ms(),
            }),
        }
    }
}
