//! Published step outcomes
//!
//! Outcomes are the only state that outlives a step invocation. Each is
//! published under a well-known name scoped by the producing step's path
//! and read back by later nodes of the same deployment.

use crate::error::{TasError, TasResult};
use crate::types::{
    ArtifactKind, ArtifactReference, CfCliVersion, InstanceCountChange, InstanceCountPolicy,
    InstanceRecord, ResizeStrategy, SetupVariant, TasApplicationInfo, TasInfrastructure,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use tas_manifest::ManifestBundle;

pub const SETUP_OUTCOME: &str = "tasSetupDataOutcome";
pub const RESIZE_OUTCOME: &str = "tasAppResizeDataOutcome";
pub const ROLLING_DEPLOY_OUTCOME: &str = "tasRollingDeployOutcome";
pub const SWAP_ROUTES_OUTCOME: &str = "tasSwapRouteDataOutcome";
pub const COMMAND_OUTCOME: &str = "tasCommandOutcome";
pub const INSTANCES_OUTCOME: &str = "tasInstancesOutcome";

/// Name an outcome is published under
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputKey {
    pub step_path: String,
    pub name: String,
}

impl OutputKey {
    #[inline]
    #[must_use]
    pub fn new(step_path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            step_path: step_path.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for OutputKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.step_path, self.name)
    }
}

/// Visibility of a published outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutputScope {
    /// Visible to the rest of the stage
    Stage,
    /// Visible to the whole pipeline execution
    Pipeline,
}

/// Inputs to [`DeploymentSetupOutcome::new`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupOutcomeParts {
    pub variant: SetupVariant,
    /// Release name prefix resolved from the manifest
    pub application_name: String,
    pub new_application: TasApplicationInfo,
    pub routes: Vec<String>,
    pub temp_routes: Vec<String>,
    pub instance_count_policy: InstanceCountPolicy,
    pub manifest_instance_count: u32,
    pub resize_strategy: ResizeStrategy,
    pub artifact: ArtifactReference,
    pub artifact_kind: ArtifactKind,
    pub bundle: ManifestBundle,
    pub active_application: Option<TasApplicationInfo>,
    pub inactive_application: Option<TasApplicationInfo>,
    pub existing_versions_to_keep: u32,
    pub cli_version: CfCliVersion,
}

/// Result of a setup step, read by every later node of the deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentSetupOutcome {
    variant: SetupVariant,
    application_name: String,
    new_application: TasApplicationInfo,
    routes: Vec<String>,
    temp_routes: Vec<String>,
    instance_count_policy: InstanceCountPolicy,
    total_desired_count: u32,
    max_count: u32,
    resize_strategy: ResizeStrategy,
    artifact: ArtifactReference,
    artifact_kind: ArtifactKind,
    bundle: ManifestBundle,
    active_application: Option<TasApplicationInfo>,
    inactive_application: Option<TasApplicationInfo>,
    existing_versions_to_keep: u32,
    cli_version: CfCliVersion,
    deployment_identifier: String,
}

impl DeploymentSetupOutcome {
    /// Validate and freeze a setup result
    pub fn new(parts: SetupOutcomeParts, infrastructure: &TasInfrastructure) -> TasResult<Self> {
        if parts.application_name.trim().is_empty() {
            return Err(TasError::configuration("setup outcome requires an application name"));
        }
        if parts.new_application.application_name.trim().is_empty() {
            return Err(TasError::configuration(
                "setup outcome requires the new application's name",
            ));
        }
        if parts.variant != SetupVariant::BlueGreen && !parts.temp_routes.is_empty() {
            return Err(TasError::configuration(
                "temporary routes are only used by blue green setup",
            ));
        }
        if parts.existing_versions_to_keep == 0 {
            return Err(TasError::configuration(
                "existing versions to keep must be greater than zero",
            ));
        }

        let previous_running = parts.active_application.as_ref().map(|a| a.running_count);
        let total_desired_count = crate::planner::total_desired_count(
            parts.instance_count_policy,
            parts.manifest_instance_count,
            previous_running,
        );

        Ok(Self {
            deployment_identifier: infrastructure.deployment_identifier(&parts.application_name),
            variant: parts.variant,
            application_name: parts.application_name,
            new_application: parts.new_application,
            routes: parts.routes,
            temp_routes: parts.temp_routes,
            instance_count_policy: parts.instance_count_policy,
            total_desired_count,
            max_count: parts.manifest_instance_count,
            resize_strategy: parts.resize_strategy,
            artifact: parts.artifact,
            artifact_kind: parts.artifact_kind,
            bundle: parts.bundle,
            active_application: parts.active_application,
            inactive_application: parts.inactive_application,
            existing_versions_to_keep: parts.existing_versions_to_keep,
            cli_version: parts.cli_version,
        })
    }

    #[inline]
    #[must_use]
    pub fn variant(&self) -> SetupVariant {
        self.variant
    }

    /// Release name prefix
    #[inline]
    #[must_use]
    pub fn application_name(&self) -> &str {
        &self.application_name
    }

    #[inline]
    #[must_use]
    pub fn new_application(&self) -> &TasApplicationInfo {
        &self.new_application
    }

    /// Final routes of the application
    #[inline]
    #[must_use]
    pub fn routes(&self) -> &[String] {
        &self.routes
    }

    /// Temporary routes of a blue-green deployment
    #[inline]
    #[must_use]
    pub fn temp_routes(&self) -> &[String] {
        &self.temp_routes
    }

    #[inline]
    #[must_use]
    pub fn instance_count_policy(&self) -> InstanceCountPolicy {
        self.instance_count_policy
    }

    #[inline]
    #[must_use]
    pub fn total_desired_count(&self) -> u32 {
        self.total_desired_count
    }

    /// Instance count declared by the manifest
    #[inline]
    #[must_use]
    pub fn max_count(&self) -> u32 {
        self.max_count
    }

    #[inline]
    #[must_use]
    pub fn resize_strategy(&self) -> ResizeStrategy {
        self.resize_strategy
    }

    #[inline]
    #[must_use]
    pub fn artifact(&self) -> &ArtifactReference {
        &self.artifact
    }

    #[inline]
    #[must_use]
    pub fn artifact_kind(&self) -> ArtifactKind {
        self.artifact_kind
    }

    #[inline]
    #[must_use]
    pub fn bundle(&self) -> &ManifestBundle {
        &self.bundle
    }

    /// Previous active application; `None` on a first deployment
    #[inline]
    #[must_use]
    pub fn active_application(&self) -> Option<&TasApplicationInfo> {
        self.active_application.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn inactive_application(&self) -> Option<&TasApplicationInfo> {
        self.inactive_application.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn is_first_deployment(&self) -> bool {
        self.active_application.is_none()
    }

    /// Instances running on the previous active application, 0 if none
    #[inline]
    #[must_use]
    pub fn previous_running_count(&self) -> u32 {
        self.active_application.as_ref().map_or(0, |a| a.running_count)
    }

    #[inline]
    #[must_use]
    pub fn existing_versions_to_keep(&self) -> u32 {
        self.existing_versions_to_keep
    }

    #[inline]
    #[must_use]
    pub fn has_autoscaler(&self) -> bool {
        self.bundle.has_autoscaler()
    }

    #[inline]
    #[must_use]
    pub fn cli_version(&self) -> CfCliVersion {
        self.cli_version
    }

    /// `{org}-{space}-{application}`
    #[inline]
    #[must_use]
    pub fn deployment_identifier(&self) -> &str {
        &self.deployment_identifier
    }
}

/// Result of a resize
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResizeOutcome {
    pub total_desired_count: u32,
    pub upsize_count: u32,
    pub downsize_count: u32,
    pub instance_changes: Vec<InstanceCountChange>,
}

/// Result of a rolling deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollingDeployOutcome {
    pub application_name: String,
    pub application_guid: String,
    pub routes: Vec<String>,
    pub desired_count: u32,
    pub first_deployment: bool,
    /// Whether the worker got as far as starting the rollout
    pub deployment_started: bool,
    pub previous_application: Option<TasApplicationInfo>,
    pub bundle: ManifestBundle,
    pub cli_version: CfCliVersion,
}

/// Result of a route swap
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapRoutesOutcome {
    pub routes_swapped: bool,
    pub old_app_downsized: bool,
    pub final_application_name: String,
}

/// Variables exported by an arbitrary command
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandOutcome {
    pub output_variables: IndexMap<String, String>,
}

/// Instances running after a step
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstancesOutcome {
    pub instances: Vec<InstanceRecord>,
}

impl InstancesOutcome {
    #[inline]
    #[must_use]
    pub fn new(instances: Vec<InstanceRecord>) -> Self {
        Self { instances }
    }

    #[must_use]
    pub fn host_names(&self) -> Vec<String> {
        self.instances.iter().map(InstanceRecord::host_name).collect()
    }
}

/// Any published outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StepOutcome {
    Setup(Box<DeploymentSetupOutcome>),
    Resize(ResizeOutcome),
    RollingDeploy(Box<RollingDeployOutcome>),
    SwapRoutes(SwapRoutesOutcome),
    Command(CommandOutcome),
    Instances(InstancesOutcome),
}

impl StepOutcome {
    #[must_use]
    pub fn into_setup(self) -> Option<DeploymentSetupOutcome> {
        match self {
            Self::Setup(outcome) => Some(*outcome),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_resize(self) -> Option<ResizeOutcome> {
        match self {
            Self::Resize(outcome) => Some(outcome),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_rolling_deploy(self) -> Option<RollingDeployOutcome> {
        match self {
            Self::RollingDeploy(outcome) => Some(*outcome),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_swap_routes(self) -> Option<SwapRoutesOutcome> {
        match self {
            Self::SwapRoutes(outcome) => Some(outcome),
            _ => None,
        }
    }

    /// Variant name for logs and error messages
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Setup(_) => "setup",
            Self::Resize(_) => "resize",
            Self::RollingDeploy(_) => "rollingDeploy",
            Self::SwapRoutes(_) => "swapRoutes",
            Self::Command(_) => "command",
            Self::Instances(_) => "instances",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(variant: SetupVariant) -> SetupOutcomeParts {
        SetupOutcomeParts {
            variant,
            application_name: "orders".into(),
            new_application: TasApplicationInfo::new("orders__4", "guid-4"),
            routes: vec!["orders.example.com".into()],
            temp_routes: Vec::new(),
            instance_count_policy: InstanceCountPolicy::FromManifest,
            manifest_instance_count: 4,
            resize_strategy: ResizeStrategy::UpsizeNewFirst,
            artifact: ArtifactReference::new("DockerRegistry", "acme/orders"),
            artifact_kind: ArtifactKind::Container,
            bundle: ManifestBundle::new("applications:\n- name: orders\n", None, Vec::new()).unwrap(),
            active_application: None,
            inactive_application: None,
            existing_versions_to_keep: 3,
            cli_version: CfCliVersion::V7,
        }
    }

    fn infra() -> TasInfrastructure {
        TasInfrastructure::new("tas", "acme", "prod")
    }

    #[test]
    fn first_deployment_has_no_previous_instances() {
        let outcome = DeploymentSetupOutcome::new(parts(SetupVariant::BlueGreen), &infra()).unwrap();
        assert!(outcome.is_first_deployment());
        assert_eq!(outcome.previous_running_count(), 0);
        assert_eq!(outcome.total_desired_count(), 4);
        assert_eq!(outcome.deployment_identifier(), "acme-prod-orders");
    }

    #[test]
    fn match_running_instances_reads_active_app() {
        let mut p = parts(SetupVariant::Canary);
        p.instance_count_policy = InstanceCountPolicy::MatchRunningInstances;
        p.active_application = Some(TasApplicationInfo::new("orders__3", "guid-3").with_running_count(6));
        let outcome = DeploymentSetupOutcome::new(p, &infra()).unwrap();
        assert_eq!(outcome.total_desired_count(), 6);
        assert_eq!(outcome.max_count(), 4);
        assert!(!outcome.is_first_deployment());
    }

    #[test]
    fn temp_routes_only_for_blue_green() {
        let mut p = parts(SetupVariant::Basic);
        p.temp_routes = vec!["orders-temp.example.com".into()];
        assert!(DeploymentSetupOutcome::new(p, &infra()).is_err());
    }

    #[test]
    fn outcome_round_trips_through_json() {
        let outcome = StepOutcome::Setup(Box::new(
            DeploymentSetupOutcome::new(parts(SetupVariant::Basic), &infra()).unwrap(),
        ));
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["type"], "setup");
        let back: StepOutcome = serde_json::from_value(json).unwrap();
        assert_eq!(back, outcome);
        assert!(back.into_setup().is_some());
    }

    #[test]
    fn output_key_display() {
        assert_eq!(
            OutputKey::new("pipeline.stages.deploy.steps.setup", SETUP_OUTCOME).to_string(),
            "pipeline.stages.deploy.steps.setup.tasSetupDataOutcome"
        );
    }
}
