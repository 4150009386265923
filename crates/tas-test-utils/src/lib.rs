//! Testing utilities for the TAS orchestration workspace
//!
//! An in-memory pipeline runtime, an in-memory file store and fixtures for
//! contexts, manifests, setup outcomes and worker responses.

#![allow(missing_docs)]

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Once;
use tas_core::command::{
    CommandResponse, CommandResult, CommandStatus, CustomFetchResponse, GitFetchResponse,
    SubTaskPayload, SubTaskResponse,
};
use tas_core::outcome::{
    DeploymentSetupOutcome, OutputKey, OutputScope, SetupOutcomeParts, StepOutcome,
};
use tas_core::progress::UnitProgress;
use tas_core::runtime::{
    ConnectorConfig, DispatchHandle, PipelineRuntime, StepContext, SubTaskRequest,
};
use tas_core::{
    ArtifactKind, ArtifactReference, CfCliVersion, InstanceCountPolicy, ResizeStrategy,
    RuntimeError, SetupVariant, TasApplicationInfo, TasInfrastructure, TasResult,
};
use tas_manifest::{
    FetchedFile, FileStore, FileStoreNode, FileStoreRef, ManifestBundle, ManifestDescriptor,
    ManifestKind, ManifestStore,
};

pub const ACCOUNT: &str = "account-1";
pub const STAGE: &str = "deploy";
pub const CONNECTOR: &str = "tas-connector";

static INIT: Once = Once::new();

/// Route test logs through the test writer, once per process
pub fn init_test_logging() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new("debug"))
            .with_test_writer()
            .try_init();
    });
}

/// File store backed by a map of paths
#[derive(Debug, Default)]
pub struct InMemoryFileStore {
    nodes: DashMap<String, FileStoreNode>,
}

impl InMemoryFileStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, path: &str, content: &str) {
        self.nodes.insert(
            path.to_string(),
            FileStoreNode::File {
                path: path.to_string(),
                content: content.to_string(),
            },
        );
    }

    pub fn add_folder(&self, path: &str, children: Vec<String>) {
        self.nodes.insert(
            path.to_string(),
            FileStoreNode::Folder {
                path: path.to_string(),
                children,
            },
        );
    }
}

impl FileStore for InMemoryFileStore {
    fn lookup(&self, path: &str) -> Option<FileStoreNode> {
        self.nodes.get(path).map(|node| node.value().clone())
    }
}

/// Pipeline runtime that keeps everything in memory
///
/// Every feature flag is on and the default connector resolves until a test
/// says otherwise.
#[derive(Debug)]
pub struct InMemoryRuntime {
    outputs: DashMap<OutputKey, (StepOutcome, OutputScope)>,
    dispatched: Mutex<Vec<SubTaskRequest>>,
    disabled_flags: DashSet<String>,
    connectors: DashMap<String, ConnectorConfig>,
    files: InMemoryFileStore,
    fail_publish: AtomicBool,
    fail_dispatch: AtomicBool,
}

impl Default for InMemoryRuntime {
    fn default() -> Self {
        let connectors = DashMap::new();
        connectors.insert(
            CONNECTOR.to_string(),
            ConnectorConfig::new(CONNECTOR, "https://api.sys.example.com"),
        );
        Self {
            outputs: DashMap::new(),
            dispatched: Mutex::new(Vec::new()),
            disabled_flags: DashSet::new(),
            connectors,
            files: InMemoryFileStore::new(),
            fail_publish: AtomicBool::new(false),
            fail_dispatch: AtomicBool::new(false),
        }
    }
}

impl InMemoryRuntime {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an outcome as if an earlier step had published it
    pub fn insert_output(&self, step_path: &str, name: &str, outcome: StepOutcome) {
        self.outputs
            .insert(OutputKey::new(step_path, name), (outcome, OutputScope::Stage));
    }

    #[must_use]
    pub fn output(&self, step_path: &str, name: &str) -> Option<StepOutcome> {
        self.outputs
            .get(&OutputKey::new(step_path, name))
            .map(|entry| entry.value().0.clone())
    }

    #[must_use]
    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    /// Requests dispatched so far, oldest first
    #[must_use]
    pub fn dispatched(&self) -> Vec<SubTaskRequest> {
        self.dispatched.lock().clone()
    }

    #[must_use]
    pub fn last_dispatched(&self) -> Option<SubTaskRequest> {
        self.dispatched.lock().last().cloned()
    }

    pub fn disable_flag(&self, flag: &str) {
        self.disabled_flags.insert(flag.to_string());
    }

    pub fn remove_connector(&self, connector_ref: &str) {
        self.connectors.remove(connector_ref);
    }

    pub fn fail_publish(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }

    pub fn fail_dispatch(&self, fail: bool) {
        self.fail_dispatch.store(fail, Ordering::SeqCst);
    }

    #[must_use]
    pub fn files(&self) -> &InMemoryFileStore {
        &self.files
    }
}

#[async_trait]
impl PipelineRuntime for InMemoryRuntime {
    async fn resolve_named_output(&self, key: &OutputKey) -> TasResult<Option<StepOutcome>> {
        Ok(self.outputs.get(key).map(|entry| entry.value().0.clone()))
    }

    async fn publish_output(
        &self,
        key: &OutputKey,
        outcome: StepOutcome,
        scope: OutputScope,
    ) -> TasResult<()> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(RuntimeError::PublishFailed(key.to_string()).into());
        }
        self.outputs.insert(key.clone(), (outcome, scope));
        Ok(())
    }

    async fn dispatch_sub_task(&self, request: SubTaskRequest) -> TasResult<DispatchHandle> {
        if self.fail_dispatch.load(Ordering::SeqCst) {
            return Err(RuntimeError::DispatchFailed(request.task_id.to_string()).into());
        }
        let handle = DispatchHandle {
            task_id: request.task_id,
        };
        self.dispatched.lock().push(request);
        Ok(handle)
    }

    async fn is_feature_enabled(&self, _account_id: &str, flag: &str) -> TasResult<bool> {
        Ok(!self.disabled_flags.contains(flag))
    }

    async fn resolve_connector(&self, connector_ref: &str) -> TasResult<ConnectorConfig> {
        self.connectors
            .get(connector_ref)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| RuntimeError::ConnectorNotFound(connector_ref.to_string()).into())
    }

    fn file_store(&self) -> &dyn FileStore {
        &self.files
    }
}

/// Command payload of a dispatched request, if it is one
#[must_use]
pub fn command_payload(request: &SubTaskRequest) -> Option<&tas_core::command::PlatformCommand> {
    match &request.payload {
        SubTaskPayload::Command(command) => Some(command),
        _ => None,
    }
}

#[must_use]
pub fn infrastructure() -> TasInfrastructure {
    TasInfrastructure::new(CONNECTOR, "acme", "dev")
}

#[must_use]
pub fn step_context(step_path: &str) -> StepContext {
    StepContext::new(ACCOUNT, STAGE, step_path, infrastructure())
}

#[must_use]
pub fn docker_artifact() -> ArtifactReference {
    ArtifactReference::new("DockerRegistry", "library/orders").with_version("1.4.0")
}

/// Primary manifest for `name` with `instances` declared inline
#[must_use]
pub fn manifest_yaml(name: &str, instances: u32) -> String {
    format!(
        "applications:\n- name: {name}\n  instances: {instances}\n  routes:\n  - route: {name}.apps.example.com\n"
    )
}

/// Inline primary descriptor
#[must_use]
pub fn inline_primary(identifier: &str, content: &str) -> ManifestDescriptor {
    ManifestDescriptor::new(
        identifier,
        ManifestKind::Primary,
        0,
        ManifestStore::Inline(content.to_string()),
    )
    .unwrap()
}

/// Inline vars descriptor at `order`
#[must_use]
pub fn inline_vars(identifier: &str, order: u32, content: &str) -> ManifestDescriptor {
    ManifestDescriptor::new(
        identifier,
        ManifestKind::Vars,
        order,
        ManifestStore::Inline(content.to_string()),
    )
    .unwrap()
}

/// Primary descriptor read from the internal file store
#[must_use]
pub fn file_store_primary(identifier: &str, path: &str) -> ManifestDescriptor {
    ManifestDescriptor::new(
        identifier,
        ManifestKind::Primary,
        0,
        ManifestStore::InternalFileStore(FileStoreRef {
            paths: vec![path.to_string()],
        }),
    )
    .unwrap()
}

/// Builder for setup outcomes seeded into a runtime
#[derive(Debug, Clone)]
pub struct SetupOutcomeBuilder {
    parts: SetupOutcomeParts,
}

impl SetupOutcomeBuilder {
    /// First deployment of `orders` with `instances` in its manifest
    #[must_use]
    pub fn new(variant: SetupVariant, instances: u32) -> Self {
        let bundle = ManifestBundle::new(manifest_yaml("orders", instances), None, Vec::new())
            .unwrap();
        let temp_routes = if variant == SetupVariant::BlueGreen {
            vec!["orders-temp.apps.example.com".to_string()]
        } else {
            Vec::new()
        };
        Self {
            parts: SetupOutcomeParts {
                variant,
                application_name: "orders".to_string(),
                new_application: TasApplicationInfo::new("orders__1", "guid-new"),
                routes: vec!["orders.apps.example.com".to_string()],
                temp_routes,
                instance_count_policy: InstanceCountPolicy::FromManifest,
                manifest_instance_count: instances,
                resize_strategy: ResizeStrategy::UpsizeNewFirst,
                artifact: docker_artifact(),
                artifact_kind: ArtifactKind::Container,
                bundle,
                active_application: None,
                inactive_application: None,
                existing_versions_to_keep: 3,
                cli_version: CfCliVersion::V7,
            },
        }
    }

    /// A previous version is running with `running` instances
    #[must_use]
    pub fn with_active(mut self, running: u32) -> Self {
        self.parts.active_application =
            Some(TasApplicationInfo::new("orders__0", "guid-old").with_running_count(running));
        self
    }

    #[must_use]
    pub fn with_inactive(mut self) -> Self {
        self.parts.inactive_application = Some(TasApplicationInfo::new("orders__inactive", "guid-inactive"));
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: InstanceCountPolicy) -> Self {
        self.parts.instance_count_policy = policy;
        self
    }

    #[must_use]
    pub fn with_strategy(mut self, strategy: ResizeStrategy) -> Self {
        self.parts.resize_strategy = strategy;
        self
    }

    #[must_use]
    pub fn build(self) -> DeploymentSetupOutcome {
        DeploymentSetupOutcome::new(self.parts, &infrastructure()).unwrap()
    }
}

#[must_use]
pub fn command_success(result: CommandResult, units: Vec<UnitProgress>) -> SubTaskResponse {
    SubTaskResponse::Command(CommandResponse::success(Some(result), units))
}

#[must_use]
pub fn command_failure(message: &str, units: Vec<UnitProgress>) -> SubTaskResponse {
    SubTaskResponse::Command(CommandResponse::failure(message, units))
}

#[must_use]
pub fn git_fetch_success(files: Vec<(&str, Vec<FetchedFile>)>) -> SubTaskResponse {
    SubTaskResponse::GitFetch(GitFetchResponse {
        status: CommandStatus::Success,
        error_message: None,
        files: files
            .into_iter()
            .map(|(id, files)| (id.to_string(), files))
            .collect(),
        unit_progress: Vec::new(),
    })
}

#[must_use]
pub fn git_fetch_failure(message: &str) -> SubTaskResponse {
    SubTaskResponse::GitFetch(GitFetchResponse {
        status: CommandStatus::Failure,
        error_message: Some(message.to_string()),
        files: Default::default(),
        unit_progress: Vec::new(),
    })
}

#[must_use]
pub fn custom_fetch_success(files: Vec<(&str, Vec<FetchedFile>)>) -> SubTaskResponse {
    SubTaskResponse::CustomFetch(CustomFetchResponse {
        status: CommandStatus::Success,
        error_message: None,
        files: files
            .into_iter()
            .map(|(id, files)| (id.to_string(), files))
            .collect(),
        unit_progress: Vec::new(),
        zipped_manifest_id: Some("zip-1".to_string()),
    })
}

#[must_use]
pub fn custom_fetch_failure(message: &str) -> SubTaskResponse {
    SubTaskResponse::CustomFetch(CustomFetchResponse {
        status: CommandStatus::Failure,
        error_message: Some(message.to_string()),
        files: Default::default(),
        unit_progress: Vec::new(),
        zipped_manifest_id: None,
    })
}
