//! YAML helpers for manifest documents
//!
//! Uses serde_yaml's dynamic `Value` for:
//! - Parsing a document into a top-level mapping
//! - Case-insensitive key lookup (manifest keys are matched without case)
//! - Scalar rendering for substitution

use crate::error::{ManifestError, ManifestResult};
use serde_yaml::{Mapping, Value};

/// Top-level key holding the application list
pub const APPLICATIONS: &str = "applications";
/// Application name key
pub const NAME: &str = "name";
/// Instance count key
pub const INSTANCES: &str = "instances";
/// Process list key
pub const PROCESSES: &str = "processes";
/// Process type key
pub const PROCESS_TYPE: &str = "type";
/// Web process type value
pub const WEB_PROCESS: &str = "web";
/// Route list key
pub const ROUTES: &str = "routes";
/// Route entry key
pub const ROUTE: &str = "route";
/// No-route flag key
pub const NO_ROUTE: &str = "no-route";
/// Autoscaler limits key
pub const INSTANCE_LIMITS: &str = "instance_limits";
/// Autoscaler rules key
pub const RULES: &str = "rules";

/// Parse a document and require a mapping at the top level
pub fn parse_mapping(source_name: &str, content: &str) -> ManifestResult<Mapping> {
    let value: Value =
        serde_yaml::from_str(content).map_err(|e| ManifestError::parse(source_name, e))?;
    match value {
        Value::Mapping(map) => Ok(map),
        Value::Null => Err(ManifestError::parse(source_name, "empty YAML document")),
        other => Err(ManifestError::parse(
            source_name,
            format!("expected a mapping, found {}", type_name(&other)),
        )),
    }
}

/// Look up a key ignoring ASCII case
#[must_use]
pub fn get_ci<'a>(map: &'a Mapping, key: &str) -> Option<&'a Value> {
    map.iter().find_map(|(k, v)| match k {
        Value::String(s) if s.eq_ignore_ascii_case(key) => Some(v),
        _ => None,
    })
}

/// Render a scalar as the string a manifest author would have written
#[must_use]
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Tagged(tagged) => scalar_to_string(&tagged.value),
        Value::Null | Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

/// First entry of the `applications` list of a primary descriptor
///
/// The first application is always the one being deployed.
pub fn first_application(content: &str) -> ManifestResult<Mapping> {
    let doc = parse_mapping("tas manifest", content)?;
    let apps = get_ci(&doc, APPLICATIONS).ok_or(ManifestError::NoApplication)?;
    match apps {
        Value::Sequence(seq) => match seq.first() {
            Some(Value::Mapping(app)) => Ok(app.clone()),
            Some(_) => Err(ManifestError::parse(
                "tas manifest",
                "application entry is not a mapping",
            )),
            None => Err(ManifestError::NoApplication),
        },
        _ => Err(ManifestError::NoApplication),
    }
}

/// Get a nested value by dot-separated path, matching each segment case-insensitively
#[must_use]
pub fn get_path<'a>(map: &'a Mapping, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = get_ci(map, segments.next()?)?;
    for segment in segments {
        match current {
            Value::Mapping(inner) => current = get_ci(inner, segment)?,
            _ => return None,
        }
    }
    Some(current)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}
