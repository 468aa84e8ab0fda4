//! RunManifest builder (spec.md §4.J): a deterministic digest over a run's
//! final state and evidence chain.

pub mod builder;
pub mod model;

pub use builder::build_manifest;
pub use model::{ArtifactHash, LlmUsage, ManifestStatus, RunManifest, StageSummary, SCHEMA_VERSION};
