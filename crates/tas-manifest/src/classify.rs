//! Content-based manifest classification
//!
//! Fetched files arrive without a trustworthy role, so each document is
//! classified by shape:
//! - primary: `applications[0]` has a `name` key
//! - vars: no top-level value is a mapping
//! - autoscaler: has both `instance_limits` and `rules`

use crate::descriptor::ManifestKind;
use crate::yaml::{get_ci, parse_mapping, APPLICATIONS, INSTANCE_LIMITS, NAME, RULES};
use serde_yaml::{Mapping, Value};

/// Classify a document, returning `None` for unparseable or unrecognised content
#[must_use]
pub fn classify(path: &str, content: &str) -> Option<ManifestKind> {
    let map = match parse_mapping(path, content) {
        Ok(map) => map,
        Err(e) => {
            tracing::warn!(path, error = %e, "failed to parse file, skipping");
            return None;
        }
    };

    if is_primary(&map) {
        Some(ManifestKind::Primary)
    } else if is_vars(&map) {
        Some(ManifestKind::Vars)
    } else if is_autoscaler(&map) {
        Some(ManifestKind::Autoscaler)
    } else {
        tracing::warn!(path, "file is neither a manifest, vars nor autoscaler document, skipping");
        None
    }
}

fn is_primary(map: &Mapping) -> bool {
    match get_ci(map, APPLICATIONS) {
        Some(Value::Sequence(apps)) => match apps.first() {
            Some(Value::Mapping(app)) => get_ci(app, NAME).is_some(),
            _ => false,
        },
        _ => false,
    }
}

fn is_vars(map: &Mapping) -> bool {
    !map.values().any(Value::is_mapping)
}

fn is_autoscaler(map: &Mapping) -> bool {
    get_ci(map, INSTANCE_LIMITS).is_some() && get_ci(map, RULES).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_primary() {
        let doc = "applications:\n- NAME: orders\n  instances: 2\n";
        assert_eq!(classify("m.yml", doc), Some(ManifestKind::Primary));
    }

    #[test]
    fn application_without_name_is_not_primary() {
        // A list-valued top level is still a vars document by shape.
        let doc = "applications:\n- instances: 2\n";
        assert_eq!(classify("m.yml", doc), Some(ManifestKind::Vars));
    }

    #[test]
    fn classifies_vars() {
        assert_eq!(
            classify("v.yml", "app_name: orders\ninstances: 3\n"),
            Some(ManifestKind::Vars)
        );
    }

    #[test]
    fn classifies_autoscaler() {
        let doc = "instance_limits:\n  min: 1\n  max: 4\nrules:\n- rule_type: cpu\n";
        assert_eq!(classify("a.yml", doc), Some(ManifestKind::Autoscaler));
    }

    #[test]
    fn autoscaler_keys_ignore_case() {
        let doc = "Instance_Limits:\n  min: 1\n  max: 4\nRULES:\n- rule_type: cpu\n";
        assert_eq!(classify("a.yml", doc), Some(ManifestKind::Autoscaler));
    }

    #[test]
    fn unknown_nested_document_is_skipped() {
        assert_eq!(classify("x.yml", "env:\n  a: b\n"), None);
    }

    #[test]
    fn unparseable_is_skipped() {
        assert_eq!(classify("x.yml", "key: [unclosed"), None);
    }
}
