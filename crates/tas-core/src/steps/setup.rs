//! Basic, canary and blue-green setup
//!
//! Fetches and resolves the manifests, asks the worker to create the new
//! application version, and publishes the [`DeploymentSetupOutcome`] every
//! later node of the deployment reads.

use crate::chain::{Dispatch, Preparation, StepResponse, TasStep};
use crate::command::{CommandResult, PlatformCommand, SetupCommand};
use crate::error::{TasError, TasResult};
use crate::outcome::{
    DeploymentSetupOutcome, OutputScope, SetupOutcomeParts, StepOutcome, SETUP_OUTCOME,
};
use crate::progress::UnitProgress;
use crate::runtime::StepEnv;
use crate::sequencer::setup_units;
use crate::steps::{resolve_target, unexpected_result};
use crate::types::{
    ArtifactKind, ArtifactReference, CfCliVersion, InstanceCountPolicy, ResizeStrategy,
    SetupVariant, StepKind,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tas_manifest::{
    application_name, desired_instance_count, has_tokens, plan_fetch, route_maps, substitute,
    FetchedManifests, ManifestBundle, ManifestDescriptor,
};

/// Setup step parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupParams {
    pub manifests: Vec<ManifestDescriptor>,
    /// Resolved primary artifact
    pub artifact: Option<ArtifactReference>,
    #[serde(default)]
    pub instance_count_policy: InstanceCountPolicy,
    #[serde(default)]
    pub resize_strategy: ResizeStrategy,
    pub existing_versions_to_keep: Option<u32>,
    /// Routes added to the ones the manifest declares
    #[serde(default)]
    pub additional_routes: Vec<String>,
    /// Blue-green only
    #[serde(default)]
    pub temp_routes: Vec<String>,
    pub cli_version: Option<CfCliVersion>,
}

impl SetupParams {
    pub fn new(
        manifests: Vec<ManifestDescriptor>,
        artifact: ArtifactReference,
    ) -> TasResult<Self> {
        let params = Self {
            manifests,
            artifact: Some(artifact),
            instance_count_policy: InstanceCountPolicy::default(),
            resize_strategy: ResizeStrategy::default(),
            existing_versions_to_keep: None,
            additional_routes: Vec::new(),
            temp_routes: Vec::new(),
            cli_version: None,
        };
        params.validate()?;
        Ok(params)
    }

    #[inline]
    #[must_use]
    pub fn with_instance_count_policy(mut self, policy: InstanceCountPolicy) -> Self {
        self.instance_count_policy = policy;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_resize_strategy(mut self, strategy: ResizeStrategy) -> Self {
        self.resize_strategy = strategy;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_versions_to_keep(mut self, count: u32) -> Self {
        self.existing_versions_to_keep = Some(count);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_additional_routes(mut self, routes: Vec<String>) -> Self {
        self.additional_routes = routes;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_temp_routes(mut self, routes: Vec<String>) -> Self {
        self.temp_routes = routes;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_cli_version(mut self, version: CfCliVersion) -> Self {
        self.cli_version = Some(version);
        self
    }

    /// Checks that do not depend on the setup variant
    pub fn validate(&self) -> TasResult<()> {
        if self.artifact.is_none() {
            return Err(TasError::configuration("primary artifact is required for tas setup"));
        }
        if self.existing_versions_to_keep == Some(0) {
            return Err(TasError::configuration(
                "existing versions to keep must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Setup step for one deployment variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupStep {
    variant: SetupVariant,
}

impl SetupStep {
    #[inline]
    #[must_use]
    pub fn new(variant: SetupVariant) -> Self {
        Self { variant }
    }

    #[inline]
    #[must_use]
    pub fn basic() -> Self {
        Self::new(SetupVariant::Basic)
    }

    #[inline]
    #[must_use]
    pub fn canary() -> Self {
        Self::new(SetupVariant::Canary)
    }

    #[inline]
    #[must_use]
    pub fn blue_green() -> Self {
        Self::new(SetupVariant::BlueGreen)
    }

    #[inline]
    #[must_use]
    pub fn variant(&self) -> SetupVariant {
        self.variant
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupPrepared {
    artifact: ArtifactReference,
    artifact_kind: ArtifactKind,
    cli_version: CfCliVersion,
    existing_versions_to_keep: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupInFlight {
    application_name: String,
    bundle: ManifestBundle,
    routes: Vec<String>,
    temp_routes: Vec<String>,
    manifest_instance_count: u32,
    artifact: ArtifactReference,
    artifact_kind: ArtifactKind,
    cli_version: CfCliVersion,
    existing_versions_to_keep: u32,
}

/// Temporary routes with any `((tokens))` resolved against the bundle
fn resolve_temp_routes(bundle: &ManifestBundle, routes: &[String]) -> TasResult<Vec<String>> {
    let mut resolved = Vec::with_capacity(routes.len());
    for route in routes.iter().map(|r| r.trim()).filter(|r| !r.is_empty()) {
        if has_tokens(route) && !bundle.variable_ymls().is_empty() {
            resolved.push(substitute(route, bundle.variable_ymls())?.text);
        } else {
            resolved.push(route.to_string());
        }
    }
    Ok(resolved)
}

#[async_trait]
impl TasStep for SetupStep {
    type Params = SetupParams;
    type Prepared = SetupPrepared;
    type InFlight = SetupInFlight;

    fn kind(&self) -> StepKind {
        self.variant.step_kind()
    }

    async fn prepare(
        &self,
        params: &SetupParams,
        env: &StepEnv<'_>,
    ) -> TasResult<Preparation<SetupPrepared>> {
        params.validate()?;
        if self.variant != SetupVariant::BlueGreen && !params.temp_routes.is_empty() {
            return Err(TasError::configuration(
                "temporary routes are only used by blue green setup",
            ));
        }
        let cli_version = params
            .cli_version
            .unwrap_or(env.config.cli_version)
            .ensure_supported()?;
        let artifact = params
            .artifact
            .clone()
            .ok_or_else(|| TasError::configuration("primary artifact is required for tas setup"))?;
        let artifact_kind = artifact.kind()?;

        let plan = plan_fetch(
            &env.ctx.stage,
            &params.manifests,
            env.runtime.file_store(),
            &env.ctx.account_id,
        )?;
        tracing::info!(
            variant = ?self.variant,
            primary = %plan.primary_identifier,
            git = plan.flags.git,
            custom = plan.flags.custom,
            "setup manifests planned"
        );

        Ok(Preparation::Proceed {
            context: SetupPrepared {
                artifact,
                artifact_kind,
                cli_version,
                existing_versions_to_keep: params
                    .existing_versions_to_keep
                    .unwrap_or(env.config.existing_versions_to_keep),
            },
            fetch: Some(plan),
            units: Vec::new(),
        })
    }

    async fn dispatch(
        &self,
        params: &SetupParams,
        env: &StepEnv<'_>,
        context: SetupPrepared,
        manifests: FetchedManifests,
    ) -> TasResult<Dispatch<SetupInFlight>> {
        let bundle = manifests.assemble()?;
        let application_name = application_name(&bundle)?;
        let manifest_instance_count = desired_instance_count(&bundle)?;
        let routes = route_maps(&bundle, &params.additional_routes)?;
        let temp_routes = if self.variant == SetupVariant::BlueGreen {
            resolve_temp_routes(&bundle, &params.temp_routes)?
        } else {
            Vec::new()
        };
        let target = resolve_target(env).await?;
        tracing::info!(
            application = %application_name,
            instances = manifest_instance_count,
            routes = routes.len(),
            "manifests resolved"
        );

        let command = PlatformCommand::Setup(Box::new(SetupCommand {
            target,
            variant: self.variant,
            release_name_prefix: application_name.clone(),
            bundle: bundle.clone(),
            artifact: context.artifact.clone(),
            artifact_kind: context.artifact_kind,
            route_maps: routes.clone(),
            temp_route_maps: temp_routes.clone(),
            max_count: manifest_instance_count,
            use_current_running_count: params.instance_count_policy
                == InstanceCountPolicy::MatchRunningInstances,
            existing_versions_to_keep: context.existing_versions_to_keep,
            cli_version: context.cli_version,
            timeout_mins: env.timeout_mins(),
        }));

        Ok(Dispatch {
            command,
            context: SetupInFlight {
                application_name,
                bundle,
                routes,
                temp_routes,
                manifest_instance_count,
                artifact: context.artifact,
                artifact_kind: context.artifact_kind,
                cli_version: context.cli_version,
                existing_versions_to_keep: context.existing_versions_to_keep,
            },
            units: setup_units(),
        })
    }

    async fn finalize(
        &self,
        params: &SetupParams,
        env: &StepEnv<'_>,
        context: SetupInFlight,
        result: Option<CommandResult>,
        units: Vec<UnitProgress>,
    ) -> TasResult<StepResponse> {
        let result = match result {
            Some(CommandResult::Setup(result)) => result,
            other => return Err(unexpected_result("setup", other.as_ref())),
        };

        let mut temp_routes = context.temp_routes;
        if self.variant == SetupVariant::BlueGreen
            && (temp_routes.is_empty() || temp_routes.iter().any(|r| has_tokens(r)))
        {
            temp_routes = result.new_application_urls.clone();
        }

        let outcome = DeploymentSetupOutcome::new(
            SetupOutcomeParts {
                variant: self.variant,
                application_name: context.application_name,
                new_application: result.new_application,
                routes: context.routes,
                temp_routes,
                instance_count_policy: params.instance_count_policy,
                manifest_instance_count: context.manifest_instance_count,
                resize_strategy: params.resize_strategy,
                artifact: context.artifact,
                artifact_kind: context.artifact_kind,
                bundle: context.bundle,
                active_application: result.active_application,
                inactive_application: result.inactive_application,
                existing_versions_to_keep: context.existing_versions_to_keep,
                cli_version: context.cli_version,
            },
            &env.ctx.infrastructure,
        )?;
        tracing::info!(
            application = %outcome.new_application().application_name,
            first_deployment = outcome.is_first_deployment(),
            total = outcome.total_desired_count(),
            "setup completed"
        );

        let outcome = StepOutcome::Setup(Box::new(outcome));
        env.publish(SETUP_OUTCOME, outcome.clone(), OutputScope::Stage)
            .await?;
        Ok(StepResponse::succeeded(Some(outcome), units))
    }
}
