//! The dynamic JSON value carried by `data`, `pattern`, and gate evidence bags.
//!
//! spec.md §9 asks for a closed `Null | Bool | Number | String | Array | Object`
//! sum rather than a language-specific dynamic facility. `serde_json::Value`
//! already is exactly that sum, and it is what `serde_json_canonicalizer`
//! consumes directly, so we re-export it rather than wrap it — wrapping would
//! just add a layer of `From`/`Into` boilerplate with no behavioral gain.
pub type Value = serde_json::Value;
