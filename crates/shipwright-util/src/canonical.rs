//! Stable serializer and SHA-256 hashing (spec.md §4.A).
//!
//! Canonical JSON: arrays preserve order, object keys are recursively sorted
//! lexicographically, numbers/booleans/null follow standard JSON. Every hash
//! in the system routes through [`canonical_json`] before hashing — anything
//! that hashes a value some other way breaks the evidence chain.

use anyhow::{Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Serialize `value` to its canonical JSON form (RFC 8785 JSON Canonicalization
/// Scheme): recursively sorted object keys, stable number formatting, array
/// order preserved.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String> {
    let json_value =
        serde_json::to_value(value).context("failed to serialize value to JSON")?;
    let bytes = serde_json_canonicalizer::to_vec(&json_value)
        .context("failed to canonicalize JSON using JCS")?;
    String::from_utf8(bytes).context("canonicalized JSON was not valid UTF-8")
}

/// SHA-256 of arbitrary bytes, lowercase 64-char hex.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Canonicalize `value` and return its SHA-256 hash as lowercase hex.
///
/// This is the single entry point every component (`EvidenceEntry`,
/// `ConsequenceRecord`, `RunManifest`, `Spec`) should use to compute its hash
/// — see spec.md §4.A.
pub fn hash_value<T: Serialize>(value: &T) -> Result<String> {
    let serialized = canonical_json(value)?;
    Ok(sha256_hex(serialized.as_bytes()))
}

/// Minimal local replacement for the `hex` crate's `encode`, kept inline so the
/// dependency list does not grow for one helper function.
mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        use std::fmt::Write as _;
        let mut out = String::with_capacity(bytes.as_ref().len() * 2);
        for byte in bytes.as_ref() {
            let _ = write!(out, "{byte:02x}");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_is_irrelevant_to_hash() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(hash_value(&a).unwrap(), hash_value(&b).unwrap());
    }

    #[test]
    fn array_order_matters() {
        let a = json!({"xs": [1, 2, 3]});
        let b = json!({"xs": [3, 2, 1]});
        assert_ne!(hash_value(&a).unwrap(), hash_value(&b).unwrap());
    }

    #[test]
    fn nested_key_order_is_sorted_recursively() {
        let a = json!({"outer": {"z": 1, "a": 2}, "top": 1});
        let b = json!({"top": 1, "outer": {"a": 2, "z": 1}});
        assert_eq!(canonical_json(&a).unwrap(), canonical_json(&b).unwrap());
    }

    #[test]
    fn sha256_hex_is_64_chars() {
        let h = sha256_hex(b"hello world");
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn hash_is_deterministic_across_calls() {
        let v = json!({"a": [1, 2, {"c": true, "b": null}]});
        assert_eq!(hash_value(&v).unwrap(), hash_value(&v).unwrap());
    }

    proptest::proptest! {
        #[test]
        fn hash_value_never_panics(s in ".*", n in -1_000_000i64..1_000_000) {
            let v = json!({"s": s, "n": n});
            let _ = hash_value(&v);
        }
    }
}
