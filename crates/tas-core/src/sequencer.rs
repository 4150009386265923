//! Command-unit sequencer
//!
//! Maps each step to the ordered progress-unit names it reports. The order
//! only structures logs and UI sections; the worker decides the real
//! execution order.

use crate::types::{ResizeStrategy, StepKind};

pub const FETCH_FILES: &str = "Fetch Files";
pub const FETCH_CUSTOM_FILES: &str = "Fetch Custom Files";
pub const FETCH_COMMAND_SCRIPT: &str = "Fetch Command Script";
pub const VERIFY_MANIFESTS: &str = "Verify Manifests";
pub const SETUP_APPLICATION: &str = "Setup Application";
pub const DEPLOY: &str = "Deploy";
pub const WRAPUP: &str = "Wrapup";
pub const UPSIZE: &str = "Upsize";
pub const DOWNSIZE: &str = "Downsize";
pub const ROLLBACK: &str = "Rollback";
pub const SWAP_ROUTES_NEW: &str = "Swap Routes for New Application";
pub const SWAP_ROUTES_EXISTING: &str = "Swap Routes for Existing Application";
pub const RENAME: &str = "Rename";
pub const SWAP_ROLLBACK: &str = "Swap Rollback";
pub const EXECUTE_CF_COMMAND: &str = "Execute CF Command";
pub const ROUTE_MAPPING: &str = "Route Mapping";

fn names(units: &[&str]) -> Vec<String> {
    units.iter().map(|u| (*u).to_string()).collect()
}

/// Units of a resize: the new version first unless the strategy says otherwise
#[must_use]
pub fn resize_units(strategy: ResizeStrategy) -> Vec<String> {
    match strategy {
        ResizeStrategy::UpsizeNewFirst => names(&[UPSIZE, DOWNSIZE, WRAPUP]),
        ResizeStrategy::DownsizeOldFirst => names(&[DOWNSIZE, UPSIZE, WRAPUP]),
    }
}

#[must_use]
pub fn swap_routes_units() -> Vec<String> {
    names(&[SWAP_ROUTES_NEW, SWAP_ROUTES_EXISTING, DOWNSIZE, RENAME, WRAPUP])
}

#[must_use]
pub fn swap_rollback_units() -> Vec<String> {
    names(&[UPSIZE, SWAP_ROLLBACK, DOWNSIZE, WRAPUP])
}

#[must_use]
pub fn setup_units() -> Vec<String> {
    names(&[VERIFY_MANIFESTS, SETUP_APPLICATION, WRAPUP])
}

#[must_use]
pub fn rolling_deploy_units() -> Vec<String> {
    names(&[VERIFY_MANIFESTS, DEPLOY, WRAPUP])
}

#[must_use]
pub fn rollback_units() -> Vec<String> {
    names(&[UPSIZE, DOWNSIZE, WRAPUP])
}

#[must_use]
pub fn rolling_rollback_units() -> Vec<String> {
    names(&[ROLLBACK, WRAPUP])
}

#[must_use]
pub fn route_mapping_units() -> Vec<String> {
    names(&[ROUTE_MAPPING, WRAPUP])
}

#[must_use]
pub fn command_units() -> Vec<String> {
    names(&[EXECUTE_CF_COMMAND])
}

/// Command units of any step
#[must_use]
pub fn units_for(step: StepKind, strategy: ResizeStrategy) -> Vec<String> {
    match step {
        StepKind::BasicSetup | StepKind::CanarySetup | StepKind::BlueGreenSetup => setup_units(),
        StepKind::RollingDeploy => rolling_deploy_units(),
        StepKind::Resize => resize_units(strategy),
        StepKind::RouteMapping => route_mapping_units(),
        StepKind::SwapRoutes => swap_routes_units(),
        StepKind::Rollback => rollback_units(),
        StepKind::RollingRollback => rolling_rollback_units(),
        StepKind::SwapRollback => swap_rollback_units(),
        StepKind::Command => command_units(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn resize_order_follows_strategy() {
        assert_eq!(
            resize_units(ResizeStrategy::UpsizeNewFirst),
            vec!["Upsize", "Downsize", "Wrapup"]
        );
        assert_eq!(
            resize_units(ResizeStrategy::DownsizeOldFirst),
            vec!["Downsize", "Upsize", "Wrapup"]
        );
    }

    #[test]
    fn swap_routes_has_five_stages() {
        assert_eq!(
            swap_routes_units(),
            vec![
                "Swap Routes for New Application",
                "Swap Routes for Existing Application",
                "Downsize",
                "Rename",
                "Wrapup",
            ]
        );
    }

    #[test]
    fn every_step_ends_cleanly() {
        for step in [
            StepKind::BasicSetup,
            StepKind::RollingDeploy,
            StepKind::Resize,
            StepKind::RouteMapping,
            StepKind::SwapRoutes,
            StepKind::Rollback,
            StepKind::RollingRollback,
            StepKind::SwapRollback,
        ] {
            let units = units_for(step, ResizeStrategy::default());
            assert_eq!(units.last().map(String::as_str), Some(WRAPUP), "{step}");
        }
        assert_eq!(units_for(StepKind::Command, ResizeStrategy::default()), vec![EXECUTE_CF_COMMAND]);
    }
}
