//! Rolling rollback
//!
//! Restores the application a rolling deployment replaced, or removes it
//! when that deployment was the first one.

use crate::chain::{Dispatch, Preparation, StepResponse, TasStep};
use crate::command::{CommandResult, PlatformCommand, RollingRollbackCommand};
use crate::error::{TasError, TasResult};
use crate::outcome::{RollingDeployOutcome, StepOutcome};
use crate::progress::UnitProgress;
use crate::runtime::StepEnv;
use crate::sequencer::rolling_rollback_units;
use crate::steps::{
    missing_outcome, publish_instances, read_rolling_deploy, resolve_target, unexpected_result,
};
use crate::types::StepKind;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tas_manifest::FetchedManifests;

/// Rolling rollback parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollingRollbackParams {
    pub rolling_deploy_step_path: String,
}

impl RollingRollbackParams {
    pub fn new(rolling_deploy_step_path: impl Into<String>) -> TasResult<Self> {
        let params = Self {
            rolling_deploy_step_path: rolling_deploy_step_path.into(),
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> TasResult<()> {
        if self.rolling_deploy_step_path.trim().is_empty() {
            return Err(TasError::configuration(
                "rolling rollback requires the rolling deploy step path",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RollingRollbackStep;

#[async_trait]
impl TasStep for RollingRollbackStep {
    type Params = RollingRollbackParams;
    type Prepared = RollingDeployOutcome;
    type InFlight = ();

    fn kind(&self) -> StepKind {
        StepKind::RollingRollback
    }

    async fn prepare(
        &self,
        params: &RollingRollbackParams,
        env: &StepEnv<'_>,
    ) -> TasResult<Preparation<RollingDeployOutcome>> {
        params.validate()?;
        let path = &params.rolling_deploy_step_path;
        let Some(deployed) = read_rolling_deploy(env, path).await? else {
            return Ok(Preparation::Skip(missing_outcome("tas rolling deploy", path)));
        };
        if !deployed.deployment_started {
            return Ok(Preparation::Skip(format!(
                "rolling deployment at {path} never started, nothing to roll back"
            )));
        }
        deployed.cli_version.ensure_supported()?;
        Ok(Preparation::proceed(deployed))
    }

    async fn dispatch(
        &self,
        _params: &RollingRollbackParams,
        env: &StepEnv<'_>,
        deployed: RollingDeployOutcome,
        _manifests: FetchedManifests,
    ) -> TasResult<Dispatch<()>> {
        let target = resolve_target(env).await?;
        Ok(Dispatch {
            command: PlatformCommand::RollingRollback(RollingRollbackCommand {
                target,
                application_name: deployed.application_name,
                first_deployment: deployed.first_deployment,
                previous_application: deployed.previous_application,
                route_maps: deployed.routes,
                cli_version: deployed.cli_version,
                timeout_mins: env.timeout_mins(),
            }),
            context: (),
            units: rolling_rollback_units(),
        })
    }

    async fn finalize(
        &self,
        _params: &RollingRollbackParams,
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
    fn step_path_is_required() {
        assert!(RollingRollbackParams::new(" ").is_err());
        assert!(RollingRollbackParams::new("deploy").is_ok());
    }
}
