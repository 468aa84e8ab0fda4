//! Worker contract and registry (spec.md §4.E).

pub mod registry;
pub mod worker;

pub use registry::WorkerRegistry;
pub use worker::{Artifact, Worker, WorkerResult};
