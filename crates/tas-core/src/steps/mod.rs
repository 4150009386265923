//! Deployment-strategy steps
//!
//! Nodes of the deployment graph. Setup, rolling deploy and arbitrary
//! command fetch manifests through the chain; the rest act on outcomes
//! published by earlier nodes and dispatch a single command. A node whose
//! upstream outcome is missing ends as skipped.

pub mod command;
pub mod resize;
pub mod rollback;
pub mod rolling;
pub mod rolling_rollback;
pub mod route_mapping;
pub mod setup;
pub mod swap_rollback;
pub mod swap_routes;

pub use command::{CommandParams, CommandStep};
pub use resize::{ResizeParams, ResizeStep};
pub use rollback::{RollbackParams, RollbackStep};
pub use rolling::{RollingDeployParams, RollingDeployStep};
pub use rolling_rollback::{RollingRollbackParams, RollingRollbackStep};
pub use route_mapping::{RouteMappingParams, RouteMappingStep};
pub use setup::{SetupParams, SetupStep};
pub use swap_rollback::{SwapRollbackParams, SwapRollbackStep};
pub use swap_routes::{SwapRoutesParams, SwapRoutesStep};

use crate::command::{CommandResult, TasTarget};
use crate::error::{TasError, TasResult};
use crate::outcome::{
    DeploymentSetupOutcome, InstancesOutcome, OutputKey, OutputScope, ResizeOutcome,
    RollingDeployOutcome, StepOutcome, SwapRoutesOutcome, INSTANCES_OUTCOME, RESIZE_OUTCOME,
    ROLLING_DEPLOY_OUTCOME, SETUP_OUTCOME, SWAP_ROUTES_OUTCOME,
};
use crate::runtime::StepEnv;
use crate::types::InstanceRecord;

/// Connector and space the step's command targets
pub(crate) async fn resolve_target(env: &StepEnv<'_>) -> TasResult<TasTarget> {
    let infrastructure = env.ctx.infrastructure.clone();
    let connector = env
        .runtime
        .resolve_connector(&infrastructure.connector_ref)
        .await?;
    Ok(TasTarget {
        infrastructure,
        connector,
    })
}

pub(crate) async fn read_setup(
    env: &StepEnv<'_>,
    step_path: &str,
) -> TasResult<Option<DeploymentSetupOutcome>> {
    env.read_output(&OutputKey::new(step_path, SETUP_OUTCOME), StepOutcome::into_setup)
        .await
}

pub(crate) async fn read_resize(
    env: &StepEnv<'_>,
    step_path: &str,
) -> TasResult<Option<ResizeOutcome>> {
    env.read_output(&OutputKey::new(step_path, RESIZE_OUTCOME), StepOutcome::into_resize)
        .await
}

pub(crate) async fn read_rolling_deploy(
    env: &StepEnv<'_>,
    step_path: &str,
) -> TasResult<Option<RollingDeployOutcome>> {
    env.read_output(
        &OutputKey::new(step_path, ROLLING_DEPLOY_OUTCOME),
        StepOutcome::into_rolling_deploy,
    )
    .await
}

pub(crate) async fn read_swap_routes(
    env: &StepEnv<'_>,
    step_path: &str,
) -> TasResult<Option<SwapRoutesOutcome>> {
    env.read_output(
        &OutputKey::new(step_path, SWAP_ROUTES_OUTCOME),
        StepOutcome::into_swap_routes,
    )
    .await
}

/// Publish the running instances; only called on success
pub(crate) async fn publish_instances(
    env: &StepEnv<'_>,
    instances: Vec<InstanceRecord>,
) -> TasResult<InstancesOutcome> {
    let outcome = InstancesOutcome::new(instances);
    env.publish(
        INSTANCES_OUTCOME,
        StepOutcome::Instances(outcome.clone()),
        OutputScope::Stage,
    )
    .await?;
    Ok(outcome)
}

/// Error for a successful command that returned the wrong result
pub(crate) fn unexpected_result(expected: &str, actual: Option<&CommandResult>) -> TasError {
    TasError::UnexpectedResult {
        expected: expected.to_string(),
        actual: actual.map_or("nothing", CommandResult::type_name).to_string(),
    }
}

/// Reason logged when an upstream outcome is missing
pub(crate) fn missing_outcome(what: &str, step_path: &str) -> String {
    format!("{what} outcome not found at {step_path}, skipping")
}
