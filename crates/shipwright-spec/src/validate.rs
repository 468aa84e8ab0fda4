//! Structural + semantic validation (spec.md §4.C).

use std::collections::HashSet;

use shipwright_util::hash_value;

use crate::model::{RawSpec, Spec, SUPPORTED_SCHEMA_VERSIONS, is_number};

/// A single validation failure. Callers are expected to surface the full
/// `Vec<SpecError>` rather than stop at the first problem, so authors of a
/// Spec can fix everything in one pass.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("{path}: {message}")]
pub struct SpecError {
    pub path: String,
    pub message: String,
}

impl SpecError {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Validate a raw, just-parsed Spec and, on success, return the deep-frozen
/// [`Spec`] with its `specHash` already computed.
///
/// # Errors
/// Returns every semantic violation found (spec.md §3/§4.C), not just the
/// first one.
pub fn validate(raw: RawSpec) -> Result<Spec, Vec<SpecError>> {
    let mut errors = Vec::new();

    if !SUPPORTED_SCHEMA_VERSIONS.contains(&raw.schema_version.as_str()) {
        errors.push(SpecError::new(
            "schema_version",
            format!(
                "unsupported schema_version '{}': supported versions are {:?}",
                raw.schema_version, SUPPORTED_SCHEMA_VERSIONS
            ),
        ));
    }

    let mut feature_ids = HashSet::new();
    for (i, feature) in raw.features.iter().enumerate() {
        if !feature_ids.insert(feature.id.clone()) {
            errors.push(SpecError::new(
                format!("features[{i}].id"),
                format!("duplicate feature id '{}'", feature.id),
            ));
        }
    }

    let mut journey_ids = HashSet::new();
    let mut covered_features = HashSet::new();
    for (i, journey) in raw.journeys.iter().enumerate() {
        if !journey_ids.insert(journey.id.clone()) {
            errors.push(SpecError::new(
                format!("journeys[{i}].id"),
                format!("duplicate journey id '{}'", journey.id),
            ));
        }

        for feature_id in &journey.features {
            if feature_ids.contains(feature_id) {
                covered_features.insert(feature_id.clone());
            } else {
                errors.push(SpecError::new(
                    format!("journeys[{i}].features"),
                    format!(
                        "journey '{}' references unknown feature '{feature_id}'",
                        journey.id
                    ),
                ));
            }
        }

        if !journey.steps.iter().any(|step| step.is_assertion()) {
            errors.push(SpecError::new(
                format!("journeys[{i}].steps"),
                format!(
                    "journey '{}' has no assertion step (requires >= 1)",
                    journey.id
                ),
            ));
        }
    }

    for feature in &raw.features {
        if !covered_features.contains(&feature.id) {
            errors.push(SpecError::new(
                "journeys",
                format!(
                    "feature '{}' is not referenced by any journey",
                    feature.id
                ),
            ));
        }
    }

    for (key, value) in &raw.quality {
        if !is_number(value) {
            errors.push(SpecError::new(
                format!("quality.{key}"),
                "quality values must be numbers".to_string(),
            ));
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    let spec_hash = hash_value(&raw).map_err(|e| {
        vec![SpecError::new(
            "<root>",
            format!("failed to compute spec hash: {e}"),
        )]
    })?;

    Ok(Spec::new(raw, spec_hash))
}
