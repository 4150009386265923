//! Boundary to the surrounding pipeline runtime
//!
//! Steps never talk to the outside world directly. Everything they need
//! from the host goes through [`PipelineRuntime`]:
//! - named outputs published by earlier steps
//! - sub-task dispatch to the remote worker
//! - feature flags and connector lookup
//! - the internal file store

use crate::command::SubTaskPayload;
use crate::config::TasConfig;
use crate::error::TasResult;
use crate::outcome::{OutputKey, OutputScope, StepOutcome};
use crate::types::{InvocationId, TaskId, TasInfrastructure};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tas_manifest::FileStore;

/// Resolved platform connector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorConfig {
    pub identifier: String,
    pub endpoint: String,
    pub delegate_selectors: Vec<String>,
}

impl ConnectorConfig {
    #[inline]
    #[must_use]
    pub fn new(identifier: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            endpoint: endpoint.into(),
            delegate_selectors: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_delegate_selectors(mut self, selectors: Vec<String>) -> Self {
        self.delegate_selectors = selectors;
        self
    }
}

/// Sub-task handed to the runtime for execution on a worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubTaskRequest {
    pub task_id: TaskId,
    pub payload: SubTaskPayload,
    /// Progress units the worker reports against, in display order
    pub progress_units: Vec<String>,
    pub timeout_secs: u64,
    pub deadline: DateTime<Utc>,
}

impl SubTaskRequest {
    /// Build a request with a fresh id, due `timeout_secs` from now
    #[must_use]
    pub fn new(payload: SubTaskPayload, progress_units: Vec<String>, timeout_secs: u64) -> Self {
        let deadline = i64::try_from(timeout_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|timeout| Utc::now().checked_add_signed(timeout))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            task_id: TaskId::new(),
            payload,
            progress_units,
            timeout_secs,
            deadline,
        }
    }
}

/// Handle of a dispatched sub-task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchHandle {
    pub task_id: TaskId,
}

/// Services the host pipeline provides to steps
#[async_trait]
pub trait PipelineRuntime: Send + Sync {
    /// Read an outcome published by an earlier step, `None` when absent
    async fn resolve_named_output(&self, key: &OutputKey) -> TasResult<Option<StepOutcome>>;

    /// Publish an outcome for later steps
    async fn publish_output(
        &self,
        key: &OutputKey,
        outcome: StepOutcome,
        scope: OutputScope,
    ) -> TasResult<()>;

    /// Queue a sub-task; its response arrives through a later resume
    async fn dispatch_sub_task(&self, request: SubTaskRequest) -> TasResult<DispatchHandle>;

    async fn is_feature_enabled(&self, account_id: &str, flag: &str) -> TasResult<bool>;

    async fn resolve_connector(&self, connector_ref: &str) -> TasResult<ConnectorConfig>;

    /// Internal file store for the current account
    fn file_store(&self) -> &dyn FileStore;
}

/// Where the current invocation runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepContext {
    pub invocation_id: InvocationId,
    pub account_id: String,
    /// Fully qualified path of the step node, used to scope outputs
    pub step_path: String,
    pub stage: String,
    pub infrastructure: TasInfrastructure,
}

impl StepContext {
    #[must_use]
    pub fn new(
        account_id: impl Into<String>,
        stage: impl Into<String>,
        step_path: impl Into<String>,
        infrastructure: TasInfrastructure,
    ) -> Self {
        Self {
            invocation_id: InvocationId::new(),
            account_id: account_id.into(),
            step_path: step_path.into(),
            stage: stage.into(),
            infrastructure,
        }
    }

    /// Key of an outcome this step publishes
    #[inline]
    #[must_use]
    pub fn own_output(&self, name: &str) -> OutputKey {
        OutputKey::new(self.step_path.clone(), name)
    }
}

/// Everything a step reads while it runs
#[derive(Clone, Copy)]
pub struct StepEnv<'a> {
    pub ctx: &'a StepContext,
    pub runtime: &'a dyn PipelineRuntime,
    pub config: &'a TasConfig,
}

impl<'a> StepEnv<'a> {
    #[inline]
    #[must_use]
    pub fn new(
        ctx: &'a StepContext,
        runtime: &'a dyn PipelineRuntime,
        config: &'a TasConfig,
    ) -> Self {
        Self {
            ctx,
            runtime,
            config,
        }
    }

    /// Read an outcome by key, typed through `extract`
    ///
    /// An outcome of another shape counts as absent.
    pub async fn read_output<T>(
        &self,
        key: &OutputKey,
        extract: fn(StepOutcome) -> Option<T>,
    ) -> TasResult<Option<T>> {
        let outcome = self.runtime.resolve_named_output(key).await?;
        Ok(outcome.and_then(extract))
    }

    /// Publish an outcome under this step's path
    pub async fn publish(
        &self,
        name: &str,
        outcome: StepOutcome,
        scope: OutputScope,
    ) -> TasResult<()> {
        let key = self.ctx.own_output(name);
        tracing::debug!(output = %key, kind = outcome.type_name(), "publishing outcome");
        self.runtime.publish_output(&key, outcome, scope).await
    }

    /// Step timeout in whole minutes, at least one
    #[inline]
    #[must_use]
    pub fn timeout_mins(&self) -> u64 {
        self.config.default_timeout_secs.div_ceil(60).max(1)
    }
}
