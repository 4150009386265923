//! Values read from the primary application descriptor
//!
//! Application name, desired instance count and route list, each with
//! `((token))` substitution from the bundle's variable-override documents.

use crate::bundle::ManifestBundle;
use crate::error::{ManifestError, ManifestResult};
use crate::substitution::{has_tokens, VariableOverrides};
use crate::yaml::{
    first_application, get_ci, scalar_to_string, INSTANCES, NAME, NO_ROUTE, PROCESSES,
    PROCESS_TYPE, ROUTE, ROUTES, WEB_PROCESS,
};
use serde_yaml::{Mapping, Value};

/// Fully resolved application name
///
/// Any token left unresolved is an error: the name must be final before a
/// remote command runs.
pub fn application_name(bundle: &ManifestBundle) -> ManifestResult<String> {
    let app = first_application(bundle.manifest_yml())?;
    let name = get_ci(&app, NAME)
        .and_then(scalar_to_string)
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .ok_or(ManifestError::MissingApplicationName)?;

    if !has_tokens(&name) {
        return Ok(name);
    }

    let overrides = VariableOverrides::parse(bundle.variable_ymls())?;
    let resolved = overrides.substitute(&name);
    if !resolved.is_complete() {
        return Err(ManifestError::UnresolvedApplicationName {
            name,
            tokens: resolved.unresolved,
        });
    }
    Ok(resolved.text)
}

/// Instance count declared by the primary descriptor, 0 when absent
///
/// The `web` entry of `processes` takes precedence over the top-level
/// `instances` key.
pub fn desired_instance_count(bundle: &ManifestBundle) -> ManifestResult<u32> {
    let app = first_application(bundle.manifest_yml())?;
    let raw = web_process_instances(&app)
        .or_else(|| get_ci(&app, INSTANCES).and_then(scalar_to_string))
        .map(|v| v.trim().to_string())
        .unwrap_or_default();

    if raw.is_empty() {
        return Ok(0);
    }

    let value = if has_tokens(&raw) {
        if bundle.variable_ymls().is_empty() {
            return Err(ManifestError::NoVariableFiles);
        }
        VariableOverrides::parse(bundle.variable_ymls())?
            .substitute(&raw)
            .text
    } else {
        raw
    };

    value
        .trim()
        .parse::<u32>()
        .map_err(|_| ManifestError::InvalidInstanceCount(value))
}

fn web_process_instances(app: &Mapping) -> Option<String> {
    let Some(Value::Sequence(processes)) = get_ci(app, PROCESSES) else {
        return None;
    };
    processes.iter().find_map(|process| match process {
        Value::Mapping(p) => {
            let is_web = get_ci(p, PROCESS_TYPE)
                .and_then(scalar_to_string)
                .is_some_and(|t| t.eq_ignore_ascii_case(WEB_PROCESS));
            if is_web {
                get_ci(p, INSTANCES).and_then(scalar_to_string)
            } else {
                None
            }
        }
        _ => None,
    })
}

/// Whether the application opts out of routes entirely
#[must_use]
pub fn uses_no_route(app: &Mapping) -> bool {
    match get_ci(app, NO_ROUTE) {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}

/// Routes of the primary descriptor followed by `additional_routes`
///
/// `no-route: true` yields an empty list regardless of anything else.
/// Tokens are substituted when override documents exist; empty entries
/// are dropped.
pub fn route_maps(
    bundle: &ManifestBundle,
    additional_routes: &[String],
) -> ManifestResult<Vec<String>> {
    let app = first_application(bundle.manifest_yml())?;
    if uses_no_route(&app) {
        return Ok(Vec::new());
    }

    let mut routes = match get_ci(&app, ROUTES) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Sequence(entries)) => entries
            .iter()
            .map(route_entry)
            .collect::<ManifestResult<Vec<_>>>()?,
        Some(_) => return Err(ManifestError::InvalidRouteFormat),
    };
    routes.extend(additional_routes.iter().cloned());

    let routes: Vec<String> = routes
        .into_iter()
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .collect();

    if bundle.variable_ymls().is_empty() {
        return Ok(routes);
    }
    let overrides = VariableOverrides::parse(bundle.variable_ymls())?;
    Ok(routes
        .into_iter()
        .map(|route| {
            if has_tokens(&route) {
                overrides.substitute(&route).text
            } else {
                route
            }
        })
        .collect())
}

fn route_entry(entry: &Value) -> ManifestResult<String> {
    match entry {
        Value::Mapping(m) => get_ci(m, ROUTE)
            .and_then(scalar_to_string)
            .ok_or(ManifestError::InvalidRouteFormat),
        _ => Err(ManifestError::InvalidRouteFormat),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn bundle(manifest: &str, vars: &[&str]) -> ManifestBundle {
        ManifestBundle::new(
            manifest,
            None,
            vars.iter().map(|v| (*v).to_string()).collect(),
        )
        .unwrap()
    }

    #[test]
    fn plain_application_name() {
        let b = bundle("applications:\n- name: orders\n", &[]);
        assert_eq!(application_name(&b).unwrap(), "orders");
    }

    #[test]
    fn substituted_application_name() {
        let b = bundle(
            "applications:\n- name: ((prefix))-orders\n",
            &["prefix: dev", "prefix: qa"],
        );
        assert_eq!(application_name(&b).unwrap(), "qa-orders");
    }

    #[test]
    fn unresolved_application_name_is_fatal() {
        let b = bundle("applications:\n- name: ((prefix))-orders\n", &["other: x"]);
        let err = application_name(&b).unwrap_err();
        assert_eq!(
            err,
            ManifestError::UnresolvedApplicationName {
                name: "((prefix))-orders".into(),
                tokens: vec!["prefix".into()],
            }
        );
    }

    #[test]
    fn unresolved_name_without_vars_is_fatal() {
        let b = bundle("applications:\n- name: ((prefix))\n", &[]);
        assert!(matches!(
            application_name(&b),
            Err(ManifestError::UnresolvedApplicationName { .. })
        ));
    }

    #[test]
    fn blank_application_name() {
        let b = bundle("applications:\n- name: \"  \"\n", &[]);
        assert_eq!(
            application_name(&b).unwrap_err(),
            ManifestError::MissingApplicationName
        );
    }

    #[test]
    fn instance_count_top_level() {
        let b = bundle("applications:\n- name: a\n  instances: 4\n", &[]);
        assert_eq!(desired_instance_count(&b).unwrap(), 4);
    }

    #[test]
    fn instance_count_prefers_web_process() {
        let manifest = "applications:\n- name: a\n  instances: 4\n  processes:\n  - type: worker\n    instances: 9\n  - type: web\n    instances: 6\n";
        assert_eq!(desired_instance_count(&bundle(manifest, &[])).unwrap(), 6);
    }

    #[test]
    fn instance_count_absent_is_zero() {
        let b = bundle("applications:\n- name: a\n", &[]);
        assert_eq!(desired_instance_count(&b).unwrap(), 0);
    }

    #[test]
    fn instance_count_from_vars() {
        let b = bundle(
            "applications:\n- name: a\n  instances: ((count))\n",
            &["count: 3"],
        );
        assert_eq!(desired_instance_count(&b).unwrap(), 3);
    }

    #[test]
    fn instance_count_tokens_without_vars() {
        let b = bundle("applications:\n- name: a\n  instances: ((count))\n", &[]);
        assert_eq!(
            desired_instance_count(&b).unwrap_err(),
            ManifestError::NoVariableFiles
        );
    }

    #[test]
    fn instance_count_non_numeric() {
        let b = bundle("applications:\n- name: a\n  instances: many\n", &[]);
        assert_eq!(
            desired_instance_count(&b).unwrap_err(),
            ManifestError::InvalidInstanceCount("many".into())
        );
    }

    #[test]
    fn routes_with_additional_and_substitution() {
        let b = bundle(
            "applications:\n- name: a\n  routes:\n  - route: a.((domain))\n  - route: b.example.com\n",
            &["domain: example.com"],
        );
        let routes = route_maps(&b, &["extra.example.com".into(), " ".into()]).unwrap();
        assert_eq!(
            routes,
            vec!["a.example.com", "b.example.com", "extra.example.com"]
        );
    }

    #[test]
    fn no_route_wins_over_routes_block() {
        let b = bundle(
            "applications:\n- name: a\n  no-route: true\n  routes:\n  - route: a.example.com\n",
            &[],
        );
        assert!(route_maps(&b, &["extra.example.com".into()]).unwrap().is_empty());
    }

    #[test]
    fn malformed_routes_block() {
        let b = bundle("applications:\n- name: a\n  routes: a.example.com\n", &[]);
        assert_eq!(
            route_maps(&b, &[]).unwrap_err(),
            ManifestError::InvalidRouteFormat
        );
        let b = bundle("applications:\n- name: a\n  routes:\n  - a.example.com\n", &[]);
        assert_eq!(
            route_maps(&b, &[]).unwrap_err(),
            ManifestError::InvalidRouteFormat
        );
    }
}
