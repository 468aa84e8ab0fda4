//! Pipeline Config (spec.md §4.G).

pub mod config;

pub use config::{PipelineConfig, StageConfig};
