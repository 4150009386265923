//! Core types for TAS orchestration
//!
//! Defines the values shared by the chain and every step:
//! - Invocation and sub-task identifiers
//! - Step kinds and deployment variants
//! - Target infrastructure and CLI version
//! - Artifact references and their classification
//! - Application details and instance inventory

use crate::error::{TasError, TasResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// Unique step invocation identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InvocationId(pub Ulid);

impl InvocationId {
    /// Generate new invocation ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for InvocationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InvocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique sub-task identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId(pub Ulid);

impl TaskId {
    /// Generate new task ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Deployment-strategy graph node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StepKind {
    BasicSetup,
    CanarySetup,
    BlueGreenSetup,
    RollingDeploy,
    Resize,
    RouteMapping,
    SwapRoutes,
    Rollback,
    RollingRollback,
    SwapRollback,
    Command,
}

impl StepKind {
    /// Whether the step fetches manifests before its command
    #[inline]
    #[must_use]
    pub fn uses_manifests(self) -> bool {
        matches!(
            self,
            Self::BasicSetup
                | Self::CanarySetup
                | Self::BlueGreenSetup
                | Self::RollingDeploy
                | Self::Command
        )
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::BasicSetup => "TasBasicAppSetup",
            Self::CanarySetup => "TasCanaryAppSetup",
            Self::BlueGreenSetup => "TasBGAppSetup",
            Self::RollingDeploy => "TasRollingDeploy",
            Self::Resize => "TasAppResize",
            Self::RouteMapping => "TasRouteMapping",
            Self::SwapRoutes => "TasSwapRoutes",
            Self::Rollback => "TasRollback",
            Self::RollingRollback => "TasRollingRollback",
            Self::SwapRollback => "TasSwapRollback",
            Self::Command => "TanzuCommand",
        };
        f.write_str(name)
    }
}

/// Setup flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SetupVariant {
    Basic,
    Canary,
    BlueGreen,
}

impl SetupVariant {
    /// Step kind that runs this setup
    #[inline]
    #[must_use]
    pub fn step_kind(self) -> StepKind {
        match self {
            Self::Basic => StepKind::BasicSetup,
            Self::Canary => StepKind::CanarySetup,
            Self::BlueGreen => StepKind::BlueGreenSetup,
        }
    }
}

/// Order in which a resize touches the two application versions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResizeStrategy {
    #[default]
    UpsizeNewFirst,
    DownsizeOldFirst,
}

/// Where the total desired instance count comes from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InstanceCountPolicy {
    /// Count declared by the primary manifest
    #[default]
    FromManifest,
    /// Count currently running on the previous active application
    MatchRunningInstances,
}

/// Cloud Foundry CLI major version used by the worker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CfCliVersion {
    V6,
    #[default]
    V7,
}

impl CfCliVersion {
    /// Reject versions the worker no longer supports
    pub fn ensure_supported(self) -> TasResult<Self> {
        match self {
            Self::V7 => Ok(self),
            Self::V6 => Err(TasError::UnsupportedCliVersion(self)),
        }
    }
}

impl fmt::Display for CfCliVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V6 => f.write_str("v6"),
            Self::V7 => f.write_str("v7"),
        }
    }
}

/// Organisation and space a step deploys into
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TasInfrastructure {
    pub connector_ref: String,
    pub organization: String,
    pub space: String,
}

impl TasInfrastructure {
    #[inline]
    #[must_use]
    pub fn new(
        connector_ref: impl Into<String>,
        organization: impl Into<String>,
        space: impl Into<String>,
    ) -> Self {
        Self {
            connector_ref: connector_ref.into(),
            organization: organization.into(),
            space: space.into(),
        }
    }

    /// Identifier of a deployment of `application` into this space
    #[must_use]
    pub fn deployment_identifier(&self, application: &str) -> String {
        format!("{}-{}-{}", self.organization, self.space, application)
    }
}

/// How the worker obtains the artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ArtifactKind {
    /// Downloaded archive pushed with `cf push -p`
    Package,
    /// Image pushed with `cf push --docker-image`
    Container,
}

/// Resolved primary artifact, otherwise opaque
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactReference {
    /// Source type, e.g. `DockerRegistry` or `AmazonS3`
    pub source_type: String,
    /// Image, path or artifact identifier
    pub identifier: String,
    pub version: Option<String>,
    pub connector_ref: Option<String>,
    /// Repository format for sources serving more than one (`docker`, `generic`, `maven`)
    pub repository_format: Option<String>,
}

impl ArtifactReference {
    #[inline]
    #[must_use]
    pub fn new(source_type: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            source_type: source_type.into(),
            identifier: identifier.into(),
            version: None,
            connector_ref: None,
            repository_format: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_repository_format(mut self, format: impl Into<String>) -> Self {
        self.repository_format = Some(format.into());
        self
    }

    /// Classify the artifact source
    pub fn kind(&self) -> TasResult<ArtifactKind> {
        let docker_format = self
            .repository_format
            .as_deref()
            .is_some_and(|f| f.eq_ignore_ascii_case("docker"));
        match self.source_type.as_str() {
            "DockerRegistry" | "Ecr" | "Gcr" | "Acr" | "GoogleArtifactRegistry"
            | "GithubPackageRegistry" => Ok(ArtifactKind::Container),
            "ArtifactoryRegistry" | "Nexus3Registry" if docker_format => {
                Ok(ArtifactKind::Container)
            }
            "ArtifactoryRegistry" | "Nexus3Registry" | "AmazonS3" | "Jenkins"
            | "AzureArtifacts" | "CustomArtifact" => Ok(ArtifactKind::Package),
            other => Err(TasError::UnsupportedArtifact(other.to_string())),
        }
    }
}

/// Application as reported by the platform
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TasApplicationInfo {
    pub application_name: String,
    pub application_guid: String,
    pub old_name: Option<String>,
    pub attached_routes: Vec<String>,
    pub running_count: u32,
}

impl TasApplicationInfo {
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, guid: impl Into<String>) -> Self {
        Self {
            application_name: name.into(),
            application_guid: guid.into(),
            ..Self::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn with_routes(mut self, routes: Vec<String>) -> Self {
        self.attached_routes = routes;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_running_count(mut self, count: u32) -> Self {
        self.running_count = count;
        self
    }
}

/// One running instance reported back to the platform
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceRecord {
    pub application_id: String,
    pub display_name: String,
    pub instance_index: String,
    /// Whether the instance belongs to the application being scaled up
    pub upsize: bool,
}

impl InstanceRecord {
    #[inline]
    #[must_use]
    pub fn new(
        application_id: impl Into<String>,
        display_name: impl Into<String>,
        instance_index: impl Into<String>,
    ) -> Self {
        Self {
            application_id: application_id.into(),
            display_name: display_name.into(),
            instance_index: instance_index.into(),
            upsize: false,
        }
    }

    /// Host name shown in instance listings
    #[must_use]
    pub fn host_name(&self) -> String {
        format!("{}:{}", self.display_name, self.instance_index)
    }
}

/// Instance count change applied to one application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceCountChange {
    pub name: String,
    pub id: String,
    pub previous_count: u32,
    pub desired_count: u32,
}

impl InstanceCountChange {
    #[inline]
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        id: impl Into<String>,
        previous: u32,
        desired: u32,
    ) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            previous_count: previous,
            desired_count: desired,
        }
    }

    /// Change that undoes this one
    #[inline]
    #[must_use]
    pub fn inverted(&self) -> Self {
        Self {
            previous_count: self.desired_count,
            desired_count: self.previous_count,
            ..self.clone()
        }
    }
}
