//! Sub-task payloads and responses
//!
//! Closed unions of everything a step sends to, and receives from, the
//! remote worker. The serialized shape is this crate's own; translating it
//! to the worker's wire format is the runtime's job.

use crate::planner::ResizePlan;
use crate::progress::UnitProgress;
use crate::runtime::ConnectorConfig;
use crate::types::{
    ArtifactKind, ArtifactReference, CfCliVersion, InstanceCountChange, InstanceRecord,
    ResizeStrategy, SetupVariant, TasApplicationInfo, TasInfrastructure,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tas_manifest::{
    CustomFetchRequest, FetchedFile, FetchedFiles, GitFetchRequest, ManifestBundle,
};

/// Outcome reported by the worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandStatus {
    Success,
    Failure,
}

/// Where a platform command runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TasTarget {
    pub infrastructure: TasInfrastructure,
    pub connector: ConnectorConfig,
}

/// Create the new application version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupCommand {
    pub target: TasTarget,
    pub variant: SetupVariant,
    pub release_name_prefix: String,
    pub bundle: ManifestBundle,
    pub artifact: ArtifactReference,
    pub artifact_kind: ArtifactKind,
    pub route_maps: Vec<String>,
    pub temp_route_maps: Vec<String>,
    pub max_count: u32,
    pub use_current_running_count: bool,
    pub existing_versions_to_keep: u32,
    pub cli_version: CfCliVersion,
    pub timeout_mins: u64,
}

/// Rolling deployment of the application in place
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollingDeployCommand {
    pub target: TasTarget,
    pub application_name: String,
    pub bundle: ManifestBundle,
    pub artifact: ArtifactReference,
    pub artifact_kind: ArtifactKind,
    pub route_maps: Vec<String>,
    pub desired_count: u32,
    pub cli_version: CfCliVersion,
    pub timeout_mins: u64,
}

/// Scale the new version up and the previous one down
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResizeCommand {
    pub target: TasTarget,
    pub new_application: TasApplicationInfo,
    pub downsize_application: Option<TasApplicationInfo>,
    pub plan: ResizePlan,
    pub resize_strategy: ResizeStrategy,
    pub standard_blue_green: bool,
    pub autoscaler_yml: Option<String>,
    pub cli_version: CfCliVersion,
    pub timeout_mins: u64,
}

/// Undo a resize, or delete the new application on a first deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackCommand {
    pub target: TasTarget,
    pub new_application: TasApplicationInfo,
    pub active_application: Option<TasApplicationInfo>,
    pub upsize: Vec<InstanceCountChange>,
    pub downsize: Vec<InstanceCountChange>,
    pub delete_new_application: bool,
    pub enable_old_autoscaler: bool,
    pub release_name_prefix: String,
    pub cli_version: CfCliVersion,
    pub timeout_mins: u64,
}

/// Roll a rolling deployment back to the previous version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollingRollbackCommand {
    pub target: TasTarget,
    pub application_name: String,
    pub first_deployment: bool,
    pub previous_application: Option<TasApplicationInfo>,
    pub route_maps: Vec<String>,
    pub cli_version: CfCliVersion,
    pub timeout_mins: u64,
}

/// Move production routes to the new version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapRoutesCommand {
    pub target: TasTarget,
    pub release_name_prefix: String,
    pub new_application: TasApplicationInfo,
    pub active_application: Option<TasApplicationInfo>,
    pub inactive_application: Option<TasApplicationInfo>,
    pub final_routes: Vec<String>,
    pub temp_routes: Vec<String>,
    pub downsize_old_application: bool,
    pub existing_versions_to_keep: u32,
    pub instance_changes: Vec<InstanceCountChange>,
    pub cli_version: CfCliVersion,
    pub timeout_mins: u64,
}

/// Undo a route swap together with the resize before it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapRollbackCommand {
    pub target: TasTarget,
    pub release_name_prefix: String,
    pub new_application: TasApplicationInfo,
    pub active_application: Option<TasApplicationInfo>,
    pub inactive_application: Option<TasApplicationInfo>,
    pub final_routes: Vec<String>,
    pub temp_routes: Vec<String>,
    pub upsize: Vec<InstanceCountChange>,
    pub downsize: Vec<InstanceCountChange>,
    pub swap_routes_performed: bool,
    pub upsize_inactive_application: bool,
    pub delete_new_application: bool,
    pub cli_version: CfCliVersion,
    pub timeout_mins: u64,
}

/// Map or unmap routes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RouteOperation {
    Map,
    Unmap,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteMappingCommand {
    pub target: TasTarget,
    pub application_name: String,
    pub routes: Vec<String>,
    pub operation: RouteOperation,
    pub cli_version: CfCliVersion,
    pub timeout_mins: u64,
}

/// Run a user script against the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteCommand {
    pub target: TasTarget,
    pub script: String,
    pub repo_root: String,
    pub files: Vec<FetchedFile>,
    pub input_variables: IndexMap<String, String>,
    pub output_variables: Vec<String>,
    pub cli_version: CfCliVersion,
    pub timeout_mins: u64,
}

/// Platform command sent to the worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PlatformCommand {
    Setup(Box<SetupCommand>),
    RollingDeploy(Box<RollingDeployCommand>),
    Resize(ResizeCommand),
    Rollback(RollbackCommand),
    RollingRollback(RollingRollbackCommand),
    SwapRoutes(SwapRoutesCommand),
    SwapRollback(SwapRollbackCommand),
    RouteMapping(RouteMappingCommand),
    Execute(ExecuteCommand),
}

impl PlatformCommand {
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Setup(_) => "setup",
            Self::RollingDeploy(_) => "rollingDeploy",
            Self::Resize(_) => "resize",
            Self::Rollback(_) => "rollback",
            Self::RollingRollback(_) => "rollingRollback",
            Self::SwapRoutes(_) => "swapRoutes",
            Self::SwapRollback(_) => "swapRollback",
            Self::RouteMapping(_) => "routeMapping",
            Self::Execute(_) => "execute",
        }
    }
}

/// Setup result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupResult {
    pub new_application: TasApplicationInfo,
    pub active_application: Option<TasApplicationInfo>,
    pub inactive_application: Option<TasApplicationInfo>,
    /// Urls the platform assigned to the new application
    pub new_application_urls: Vec<String>,
}

/// Resize result
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResizeResult {
    pub instance_changes: Vec<InstanceCountChange>,
    pub new_instances: Vec<InstanceRecord>,
    pub old_instances: Vec<InstanceRecord>,
}

/// Rolling deployment result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollingDeployResult {
    pub deployment_started: bool,
    pub new_application: TasApplicationInfo,
    pub previous_application: Option<TasApplicationInfo>,
    pub instances: Vec<InstanceRecord>,
}

/// Route swap result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapRoutesResult {
    pub routes_swapped: bool,
    pub old_app_downsized: bool,
    pub final_application_name: String,
    pub instances: Vec<InstanceRecord>,
}

/// Result of any rollback
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackResult {
    pub instances: Vec<InstanceRecord>,
    pub deleted_application: Option<String>,
}

/// Arbitrary command result
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteResult {
    pub output_variables: IndexMap<String, String>,
}

/// Typed result of a successful platform command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CommandResult {
    Setup(SetupResult),
    Resize(ResizeResult),
    RollingDeploy(RollingDeployResult),
    SwapRoutes(SwapRoutesResult),
    Rollback(RollbackResult),
    Execute(ExecuteResult),
}

impl CommandResult {
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Setup(_) => "setup",
            Self::Resize(_) => "resize",
            Self::RollingDeploy(_) => "rollingDeploy",
            Self::SwapRoutes(_) => "swapRoutes",
            Self::Rollback(_) => "rollback",
            Self::Execute(_) => "execute",
        }
    }
}

/// Git fetch sub-task response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitFetchResponse {
    pub status: CommandStatus,
    pub error_message: Option<String>,
    /// Files keyed by descriptor order
    #[serde(default)]
    pub files: FetchedFiles,
    #[serde(default)]
    pub unit_progress: Vec<UnitProgress>,
}

/// Custom-script fetch sub-task response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomFetchResponse {
    pub status: CommandStatus,
    pub error_message: Option<String>,
    #[serde(default)]
    pub files: FetchedFiles,
    pub zipped_manifest_id: Option<String>,
    #[serde(default)]
    pub unit_progress: Vec<UnitProgress>,
}

/// Platform command sub-task response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResponse {
    pub status: CommandStatus,
    pub error_message: Option<String>,
    #[serde(default)]
    pub unit_progress: Vec<UnitProgress>,
    pub result: Option<CommandResult>,
}

impl CommandResponse {
    #[must_use]
    pub fn success(result: Option<CommandResult>, unit_progress: Vec<UnitProgress>) -> Self {
        Self {
            status: CommandStatus::Success,
            error_message: None,
            unit_progress,
            result,
        }
    }

    #[must_use]
    pub fn failure(message: impl Into<String>, unit_progress: Vec<UnitProgress>) -> Self {
        Self {
            status: CommandStatus::Failure,
            error_message: Some(message.into()),
            unit_progress,
            result: None,
        }
    }
}

/// Any response the runtime can hand back to a suspended chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SubTaskResponse {
    GitFetch(GitFetchResponse),
    CustomFetch(CustomFetchResponse),
    Command(CommandResponse),
}

impl SubTaskResponse {
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::GitFetch(_) => "gitFetch",
            Self::CustomFetch(_) => "customFetch",
            Self::Command(_) => "command",
        }
    }
}

/// Sub-task payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "request", rename_all = "camelCase")]
pub enum SubTaskPayload {
    GitFetch(GitFetchRequest),
    CustomFetch(CustomFetchRequest),
    Command(PlatformCommand),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn response_is_tagged() {
        let response = SubTaskResponse::Command(CommandResponse::failure("cf push failed", vec![]));
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["type"], "command");
        assert_eq!(json["status"], "FAILURE");
        let back: SubTaskResponse = serde_json::from_value(json).unwrap();
        assert_eq!(back, response);
    }

    #[test]
    fn fetch_response_defaults() {
        let json = serde_json::json!({
            "type": "gitFetch",
            "status": "FAILURE",
            "errorMessage": "repository not found"
        });
        let response: SubTaskResponse = serde_json::from_value(json).unwrap();
        match response {
            SubTaskResponse::GitFetch(r) => {
                assert!(r.files.is_empty());
                assert_eq!(r.error_message.as_deref(), Some("repository not found"));
            }
            other => panic!("unexpected response {}", other.type_name()),
        }
    }

    #[test]
    fn result_names() {
        assert_eq!(CommandResult::Rollback(RollbackResult::default()).type_name(), "rollback");
    }
}
