//! Gate Registry (spec.md §4.F).

pub mod gate;
pub mod registry;

pub use gate::{Gate, GateVerdict};
pub use registry::GateRegistry;
