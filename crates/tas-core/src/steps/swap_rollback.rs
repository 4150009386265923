//! Swap rollback
//!
//! Undoes a blue-green deployment: routes go back to the previous
//! application when a swap happened, the recorded resize is inverted and
//! the new application is removed.

use crate::chain::{Dispatch, Preparation, StepResponse, TasStep};
use crate::command::{CommandResult, PlatformCommand, SwapRollbackCommand};
use crate::error::{TasError, TasResult};
use crate::outcome::{DeploymentSetupOutcome, ResizeOutcome, StepOutcome};
use crate::planner::{invert_changes, rollback_downsize_list, rollback_upsize_list};
use crate::progress::UnitProgress;
use crate::runtime::StepEnv;
use crate::sequencer::swap_rollback_units;
use crate::steps::{
    missing_outcome, publish_instances, read_resize, read_setup, read_swap_routes,
    resolve_target, unexpected_result,
};
use crate::types::StepKind;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tas_manifest::FetchedManifests;

/// Swap rollback parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapRollbackParams {
    pub setup_step_path: String,
    pub resize_step_path: String,
    pub swap_routes_step_path: Option<String>,
    /// Scale the inactive application back up as well
    #[serde(default)]
    pub upsize_inactive_application: bool,
}

impl SwapRollbackParams {
    pub fn new(
        setup_step_path: impl Into<String>,
        resize_step_path: impl Into<String>,
    ) -> TasResult<Self> {
        let params = Self {
            setup_step_path: setup_step_path.into(),
            resize_step_path: resize_step_path.into(),
            swap_routes_step_path: None,
            upsize_inactive_application: false,
        };
        params.validate()?;
        Ok(params)
    }

    #[inline]
    #[must_use]
    pub fn with_swap_routes_step(mut self, step_path: impl Into<String>) -> Self {
        self.swap_routes_step_path = Some(step_path.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_upsize_inactive_application(mut self, upsize: bool) -> Self {
        self.upsize_inactive_application = upsize;
        self
    }

    pub fn validate(&self) -> TasResult<()> {
        if self.setup_step_path.trim().is_empty() || self.resize_step_path.trim().is_empty() {
            return Err(TasError::configuration(
                "swap rollback requires the setup and resize step paths",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwapRollbackStep;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapRollbackPrepared {
    setup: DeploymentSetupOutcome,
    resize: ResizeOutcome,
    swap_routes_performed: bool,
}

/// Whether the new application goes away
///
/// A first deployment whose routes were already swapped has nothing else
/// serving traffic, so its new application is kept.
fn deletes_new_application(first_deployment: bool, swap_routes_performed: bool) -> bool {
    !(first_deployment && swap_routes_performed)
}

#[async_trait]
impl TasStep for SwapRollbackStep {
    type Params = SwapRollbackParams;
    type Prepared = SwapRollbackPrepared;
    type InFlight = ();

    fn kind(&self) -> StepKind {
        StepKind::SwapRollback
    }

    async fn prepare(
        &self,
        params: &SwapRollbackParams,
        env: &StepEnv<'_>,
    ) -> TasResult<Preparation<SwapRollbackPrepared>> {
        params.validate()?;
        let Some(setup) = read_setup(env, &params.setup_step_path).await? else {
            return Ok(Preparation::Skip(missing_outcome("tas setup", &params.setup_step_path)));
        };
        let Some(resize) = read_resize(env, &params.resize_step_path).await? else {
            return Ok(Preparation::Skip(missing_outcome(
                "tas resize",
                &params.resize_step_path,
            )));
        };
        setup.cli_version().ensure_supported()?;

        let swap_routes_performed = match params.swap_routes_step_path.as_deref() {
            Some(path) => read_swap_routes(env, path)
                .await?
                .is_some_and(|s| s.routes_swapped),
            None => false,
        };
        Ok(Preparation::proceed(SwapRollbackPrepared {
            setup,
            resize,
            swap_routes_performed,
        }))
    }

    async fn dispatch(
        &self,
        params: &SwapRollbackParams,
        env: &StepEnv<'_>,
        context: SwapRollbackPrepared,
        _manifests: FetchedManifests,
    ) -> TasResult<Dispatch<()>> {
        let SwapRollbackPrepared {
            setup,
            resize,
            swap_routes_performed,
        } = context;
        let new_application = setup.new_application().clone();
        let inverted = invert_changes(&resize.instance_changes);
        let delete_new_application =
            deletes_new_application(setup.is_first_deployment(), swap_routes_performed);
        tracing::info!(
            application = %new_application.application_name,
            swap_routes_performed,
            delete_new_application,
            "swap rollback planned"
        );

        let target = resolve_target(env).await?;
        let command = PlatformCommand::SwapRollback(SwapRollbackCommand {
            target,
            release_name_prefix: setup.application_name().to_string(),
            upsize: rollback_upsize_list(&inverted, Some(&new_application.application_name)),
            downsize: rollback_downsize_list(&inverted),
            new_application,
            active_application: setup.active_application().cloned(),
            inactive_application: setup.inactive_application().cloned(),
            final_routes: setup.routes().to_vec(),
            temp_routes: setup.temp_routes().to_vec(),
            swap_routes_performed,
            upsize_inactive_application: params.upsize_inactive_application,
            delete_new_application,
            cli_version: setup.cli_version(),
            timeout_mins: env.timeout_mins(),
        });
        Ok(Dispatch {
            command,
            context: (),
            units: swap_rollback_units(),
        })
    }

    async fn finalize(
        &self,
        _params: &SwapRollbackParams,
        env: &StepEnv<'_>,
        _context: (),
        result: Option<CommandResult>,
        units: Vec<UnitProgress>,
    ) -> TasResult<StepResponse> {
        let result = match result {
            Some(CommandResult::Rollback(result)) => result,
            other => return Err(unexpected_result("rollback", other.as_ref())),
        };
        let instances = publish_instances(env, result.instances).await?;
        Ok(StepResponse::succeeded(Some(StepOutcome::Instances(instances)), units))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_paths_are_required() {
        assert!(SwapRollbackParams::new("setup", "").is_err());
        assert!(SwapRollbackParams::new("", "resize").is_err());
        let params = SwapRollbackParams::new("setup", "resize")
            .unwrap()
            .with_swap_routes_step("swap")
            .with_upsize_inactive_application(true);
        assert_eq!(params.swap_routes_step_path.as_deref(), Some("swap"));
        assert!(params.upsize_inactive_application);
    }

    #[test]
    fn first_deployment_keeps_swapped_application() {
        assert!(!deletes_new_application(true, true));
        assert!(deletes_new_application(true, false));
        assert!(deletes_new_application(false, true));
        assert!(deletes_new_application(false, false));
    }
}
