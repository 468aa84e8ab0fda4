//! Shared primitives for the shipwright runtime: canonical JSON serialization,
//! SHA-256 hashing, the dynamic JSON value type, atomic file persistence, and
//! the error taxonomy every other crate's errors fold into.

pub mod atomic_write;
pub mod canonical;
pub mod error;
pub mod time;
pub mod value;

pub use canonical::{canonical_json, hash_value, sha256_hex};
pub use error::{ForgeError, PipelineStructureError};
pub use time::{format_iso8601, now_iso8601};
pub use value::Value;
