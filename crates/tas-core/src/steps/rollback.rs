//! Rollback of a basic or canary deployment
//!
//! Inverts the instance changes a resize recorded. A first deployment has
//! nothing to return to, so its new application is deleted instead.

use crate::chain::{Dispatch, Preparation, StepResponse, TasStep};
use crate::command::{CommandResult, PlatformCommand, RollbackCommand};
use crate::error::{TasError, TasResult};
use crate::outcome::{DeploymentSetupOutcome, StepOutcome};
use crate::planner::{invert_changes, rollback_downsize_list, rollback_upsize_list};
use crate::progress::UnitProgress;
use crate::runtime::StepEnv;
use crate::sequencer::rollback_units;
use crate::steps::{
    missing_outcome, publish_instances, read_resize, read_setup, resolve_target,
    unexpected_result,
};
use crate::types::{InstanceCountChange, StepKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tas_manifest::FetchedManifests;

/// Rollback parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackParams {
    pub setup_step_path: String,
    pub resize_step_path: Option<String>,
}

impl RollbackParams {
    pub fn new(setup_step_path: impl Into<String>) -> TasResult<Self> {
        let params = Self {
            setup_step_path: setup_step_path.into(),
            resize_step_path: None,
        };
        params.validate()?;
        Ok(params)
    }

    #[inline]
    #[must_use]
    pub fn with_resize_step(mut self, step_path: impl Into<String>) -> Self {
        self.resize_step_path = Some(step_path.into());
        self
    }

    pub fn validate(&self) -> TasResult<()> {
        if self.setup_step_path.trim().is_empty() {
            return Err(TasError::configuration("rollback requires the setup step path"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RollbackStep;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackPrepared {
    setup: DeploymentSetupOutcome,
    /// Changes recorded by the resize, empty when it never ran
    changes: Vec<InstanceCountChange>,
}

#[async_trait]
impl TasStep for RollbackStep {
    type Params = RollbackParams;
    type Prepared = RollbackPrepared;
    type InFlight = ();

    fn kind(&self) -> StepKind {
        StepKind::Rollback
    }

    async fn prepare(
        &self,
        params: &RollbackParams,
        env: &StepEnv<'_>,
    ) -> TasResult<Preparation<RollbackPrepared>> {
        params.validate()?;
        let Some(setup) = read_setup(env, &params.setup_step_path).await? else {
            return Ok(Preparation::Skip(missing_outcome("tas setup", &params.setup_step_path)));
        };
        setup.cli_version().ensure_supported()?;

        let changes = match params.resize_step_path.as_deref() {
            Some(path) => read_resize(env, path)
                .await?
                .map(|r| r.instance_changes)
                .unwrap_or_default(),
            None => Vec::new(),
        };
        Ok(Preparation::proceed(RollbackPrepared { setup, changes }))
    }

    async fn dispatch(
        &self,
        _params: &RollbackParams,
        env: &StepEnv<'_>,
        context: RollbackPrepared,
        _manifests: FetchedManifests,
    ) -> TasResult<Dispatch<()>> {
        let RollbackPrepared { setup, changes } = context;
        let new_application = setup.new_application().clone();
        let inverted = invert_changes(&changes);
        let first_deployment = setup.is_first_deployment();
        tracing::info!(
            application = %new_application.application_name,
            first_deployment,
            changes = inverted.len(),
            "rollback planned"
        );

        let target = resolve_target(env).await?;
        let command = PlatformCommand::Rollback(RollbackCommand {
            target,
            upsize: rollback_upsize_list(&inverted, Some(&new_application.application_name)),
            downsize: rollback_downsize_list(&inverted),
            new_application,
            active_application: setup.active_application().cloned(),
            delete_new_application: first_deployment,
            enable_old_autoscaler: setup.has_autoscaler() && !first_deployment,
            release_name_prefix: setup.application_name().to_string(),
            cli_version: setup.cli_version(),
            timeout_mins: env.timeout_mins(),
        });
        Ok(Dispatch {
            command,
            context: (),
            units: rollback_units(),
        })
    }

    async fn finalize(
        &self,
        _params: &RollbackParams,
        env: &StepEnv<'_>,
        _context: (),
        result: Option<CommandResult>,
        units: Vec<UnitProgress>,
    ) -> TasResult<StepResponse> {
        let result = match result {
            Some(CommandResult::Rollback(result)) => result,
            other => return Err(unexpected_result("rollback", other.as_ref())),
        };
        if let Some(deleted) = &result.deleted_application {
            tracing::info!(application = %deleted, "new application deleted");
        }
        let instances = publish_instances(env, result.instances).await?;
        Ok(StepResponse::succeeded(Some(StepOutcome::Instances(instances)), units))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_path_is_required() {
        assert!(RollbackParams::new("  ").is_err());
        let params = RollbackParams::new("setup").unwrap().with_resize_step("resize");
        assert_eq!(params.resize_step_path.as_deref(), Some("resize"));
    }
}
