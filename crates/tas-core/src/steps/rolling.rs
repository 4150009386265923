//! Rolling deployment
//!
//! Resolves the manifests like a setup does, then lets the worker replace
//! the application's instances in place. The outcome is published even when
//! the command fails so a rolling rollback can tell whether anything
//! changed.

use crate::chain::{Dispatch, Preparation, StepResponse, TasStep};
use crate::command::{CommandResult, PlatformCommand, RollingDeployCommand, RollingDeployResult};
use crate::error::{TasError, TasResult};
use crate::outcome::{OutputScope, RollingDeployOutcome, StepOutcome, ROLLING_DEPLOY_OUTCOME};
use crate::progress::UnitProgress;
use crate::runtime::StepEnv;
use crate::sequencer::rolling_deploy_units;
use crate::steps::{publish_instances, resolve_target, unexpected_result};
use crate::types::{ArtifactKind, ArtifactReference, CfCliVersion, StepKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tas_manifest::{
    application_name, desired_instance_count, plan_fetch, route_maps, FetchedManifests,
    ManifestBundle, ManifestDescriptor,
};

/// Rolling deploy parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollingDeployParams {
    pub manifests: Vec<ManifestDescriptor>,
    pub artifact: Option<ArtifactReference>,
    #[serde(default)]
    pub additional_routes: Vec<String>,
    pub cli_version: Option<CfCliVersion>,
}

impl RollingDeployParams {
    pub fn new(
        manifests: Vec<ManifestDescriptor>,
        artifact: ArtifactReference,
    ) -> TasResult<Self> {
        let params = Self {
            manifests,
            artifact: Some(artifact),
            additional_routes: Vec::new(),
            cli_version: None,
        };
        params.validate()?;
        Ok(params)
    }

    #[inline]
    #[must_use]
    pub fn with_additional_routes(mut self, routes: Vec<String>) -> Self {
        self.additional_routes = routes;
        self
    }

    pub fn validate(&self) -> TasResult<()> {
        if self.artifact.is_none() {
            return Err(TasError::configuration(
                "primary artifact is required for tas rolling deploy",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RollingDeployStep;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollingPrepared {
    artifact: ArtifactReference,
    artifact_kind: ArtifactKind,
    cli_version: CfCliVersion,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollingInFlight {
    application_name: String,
    routes: Vec<String>,
    desired_count: u32,
    bundle: ManifestBundle,
    cli_version: CfCliVersion,
}

impl RollingInFlight {
    fn outcome(self, result: Option<&RollingDeployResult>) -> RollingDeployOutcome {
        let (application_guid, previous_application, deployment_started) = match result {
            Some(r) => (
                r.new_application.application_guid.clone(),
                r.previous_application.clone(),
                r.deployment_started,
            ),
            None => (String::new(), None, false),
        };
        RollingDeployOutcome {
            application_name: self.application_name,
            application_guid,
            routes: self.routes,
            desired_count: self.desired_count,
            first_deployment: previous_application.is_none(),
            deployment_started,
            previous_application,
            bundle: self.bundle,
            cli_version: self.cli_version,
        }
    }
}

#[async_trait]
impl TasStep for RollingDeployStep {
    type Params = RollingDeployParams;
    type Prepared = RollingPrepared;
    type InFlight = RollingInFlight;

    fn kind(&self) -> StepKind {
        StepKind::RollingDeploy
    }

    async fn prepare(
        &self,
        params: &RollingDeployParams,
        env: &StepEnv<'_>,
    ) -> TasResult<Preparation<RollingPrepared>> {
        params.validate()?;
        let cli_version = params
            .cli_version
            .unwrap_or(env.config.cli_version)
            .ensure_supported()?;
        let artifact = params.artifact.clone().ok_or_else(|| {
            TasError::configuration("primary artifact is required for tas rolling deploy")
        })?;
        let artifact_kind = artifact.kind()?;
        let plan = plan_fetch(
            &env.ctx.stage,
            &params.manifests,
            env.runtime.file_store(),
            &env.ctx.account_id,
        )?;

        Ok(Preparation::Proceed {
            context: RollingPrepared {
                artifact,
                artifact_kind,
                cli_version,
            },
            fetch: Some(plan),
            units: Vec::new(),
        })
    }

    async fn dispatch(
        &self,
        params: &RollingDeployParams,
        env: &StepEnv<'_>,
        context: RollingPrepared,
        manifests: FetchedManifests,
    ) -> TasResult<Dispatch<RollingInFlight>> {
        let bundle = manifests.assemble()?;
        let application_name = application_name(&bundle)?;
        let desired_count = desired_instance_count(&bundle)?;
        let routes = route_maps(&bundle, &params.additional_routes)?;
        let target = resolve_target(env).await?;

        let command = PlatformCommand::RollingDeploy(Box::new(RollingDeployCommand {
            target,
            application_name: application_name.clone(),
            bundle: bundle.clone(),
            artifact: context.artifact,
            artifact_kind: context.artifact_kind,
            route_maps: routes.clone(),
            desired_count,
            cli_version: context.cli_version,
            timeout_mins: env.timeout_mins(),
        }));

        Ok(Dispatch {
            command,
            context: RollingInFlight {
                application_name,
                routes,
                desired_count,
                bundle,
                cli_version: context.cli_version,
            },
            units: rolling_deploy_units(),
        })
    }

    async fn finalize(
        &self,
        _params: &RollingDeployParams,
        env: &StepEnv<'_>,
        context: RollingInFlight,
        result: Option<CommandResult>,
        units: Vec<UnitProgress>,
    ) -> TasResult<StepResponse> {
        let result = match result {
            Some(CommandResult::RollingDeploy(result)) => result,
            other => return Err(unexpected_result("rollingDeploy", other.as_ref())),
        };
        let outcome = StepOutcome::RollingDeploy(Box::new(context.outcome(Some(&result))));
        env.publish(ROLLING_DEPLOY_OUTCOME, outcome.clone(), OutputScope::Stage)
            .await?;
        publish_instances(env, result.instances).await?;
        Ok(StepResponse::succeeded(Some(outcome), units))
    }

    async fn on_failure(
        &self,
        _params: &RollingDeployParams,
        env: &StepEnv<'_>,
        context: RollingInFlight,
        result: Option<CommandResult>,
    ) -> TasResult<()> {
        let result = match result {
            Some(CommandResult::RollingDeploy(result)) => Some(result),
            _ => None,
        };
        let outcome = context.outcome(result.as_ref());
        tracing::info!(
            started = outcome.deployment_started,
            "recording failed rolling deployment"
        );
        env.publish(
            ROLLING_DEPLOY_OUTCOME,
            StepOutcome::RollingDeploy(Box::new(outcome)),
            OutputScope::Stage,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TasApplicationInfo;

    fn in_flight() -> RollingInFlight {
        RollingInFlight {
            application_name: "orders".into(),
            routes: vec!["orders.example.com".into()],
            desired_count: 3,
            bundle: ManifestBundle::new("applications:\n- name: orders\n", None, Vec::new()).unwrap(),
            cli_version: CfCliVersion::V7,
        }
    }

    #[test]
    fn outcome_without_result_never_started() {
        let outcome = in_flight().outcome(None);
        assert!(!outcome.deployment_started);
        assert!(outcome.first_deployment);
    }

    #[test]
    fn outcome_tracks_previous_application() {
        let result = RollingDeployResult {
            deployment_started: true,
            new_application: TasApplicationInfo::new("orders", "guid-2"),
            previous_application: Some(TasApplicationInfo::new("orders", "guid-1")),
            instances: Vec::new(),
        };
        let outcome = in_flight().outcome(Some(&result));
        assert!(outcome.deployment_started);
        assert!(!outcome.first_deployment);
        assert_eq!(outcome.application_guid, "guid-2");
    }
}
