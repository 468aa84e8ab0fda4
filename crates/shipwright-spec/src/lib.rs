//! Spec schema and validator (spec.md §3, §4.C): the structural + semantic
//! gatekeeper that turns a raw JSON document into a deep-frozen [`Spec`].

pub mod model;
pub mod validate;

pub use model::{RawFeature, RawJourney, RawSpec, RawStep, Spec, SUPPORTED_SCHEMA_VERSIONS};
pub use validate::{SpecError, validate};
