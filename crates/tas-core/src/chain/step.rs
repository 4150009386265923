//! Step contract driven by the task chain

use crate::command::{CommandResult, PlatformCommand};
use crate::error::TasResult;
use crate::outcome::StepOutcome;
use crate::progress::UnitProgress;
use crate::runtime::StepEnv;
use crate::types::StepKind;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tas_manifest::{FetchPlan, FetchedManifests};

/// Final status of a step invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    Succeeded,
    Failed,
    Skipped,
}

/// What a step invocation ends with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResponse {
    pub status: StepStatus,
    pub failure_message: Option<String>,
    pub unit_progress: Vec<UnitProgress>,
    /// Main outcome published by the step, if any
    pub outcome: Option<StepOutcome>,
}

impl StepResponse {
    #[must_use]
    pub fn succeeded(outcome: Option<StepOutcome>, unit_progress: Vec<UnitProgress>) -> Self {
        Self {
            status: StepStatus::Succeeded,
            failure_message: None,
            unit_progress,
            outcome,
        }
    }

    #[must_use]
    pub fn failed(message: impl Into<String>, unit_progress: Vec<UnitProgress>) -> Self {
        Self {
            status: StepStatus::Failed,
            failure_message: Some(message.into()),
            unit_progress,
            outcome: None,
        }
    }

    /// Benign end for a step whose upstream outcome is missing
    #[must_use]
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            status: StepStatus::Skipped,
            failure_message: Some(reason.into()),
            unit_progress: Vec::new(),
            outcome: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == StepStatus::Succeeded
    }
}

/// Result of preparing a step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Preparation<P> {
    /// Nothing to do; the step ends as skipped
    Skip(String),
    Proceed {
        context: P,
        /// Manifests to fetch before the command is built
        fetch: Option<FetchPlan>,
        /// Units already completed during preparation
        units: Vec<UnitProgress>,
    },
}

impl<P> Preparation<P> {
    /// Proceed straight to the command
    #[inline]
    #[must_use]
    pub fn proceed(context: P) -> Self {
        Self::Proceed {
            context,
            fetch: None,
            units: Vec::new(),
        }
    }
}

/// Platform command built by a step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch<D> {
    pub command: PlatformCommand,
    pub context: D,
    /// Progress units the command reports against
    pub units: Vec<String>,
}

/// Deployment-strategy step
///
/// The chain calls `prepare` once, `dispatch` once all manifests are in,
/// and `finalize` with the successful command's result. A failed command
/// only reaches `on_failure`; a failed fetch never reaches the step.
#[async_trait]
pub trait TasStep: Send + Sync {
    type Params: Send + Sync;
    /// Carried from preparation to dispatch
    type Prepared: Serialize + DeserializeOwned + Send + Sync;
    /// Carried from dispatch to finalization
    type InFlight: Serialize + DeserializeOwned + Send + Sync;

    fn kind(&self) -> StepKind;

    async fn prepare(
        &self,
        params: &Self::Params,
        env: &StepEnv<'_>,
    ) -> TasResult<Preparation<Self::Prepared>>;

    async fn dispatch(
        &self,
        params: &Self::Params,
        env: &StepEnv<'_>,
        context: Self::Prepared,
        manifests: FetchedManifests,
    ) -> TasResult<Dispatch<Self::InFlight>>;

    async fn finalize(
        &self,
        params: &Self::Params,
        env: &StepEnv<'_>,
        context: Self::InFlight,
        result: Option<CommandResult>,
        units: Vec<UnitProgress>,
    ) -> TasResult<StepResponse>;

    /// Record whatever a failed command still reported
    ///
    /// The step ends as FAILED regardless of what this returns.
    async fn on_failure(
        &self,
        _params: &Self::Params,
        _env: &StepEnv<'_>,
        _context: Self::InFlight,
        _result: Option<CommandResult>,
    ) -> TasResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skipped_response_has_no_units() {
        let response = StepResponse::skipped("setup outcome not found");
        assert_eq!(response.status, StepStatus::Skipped);
        assert!(response.unit_progress.is_empty());
        assert!(!response.is_success());
    }

    #[test]
    fn failed_response_drops_outcome() {
        let response = StepResponse::failed("boom", vec![UnitProgress::queued("Upsize")]);
        assert_eq!(response.failure_message.as_deref(), Some("boom"));
        assert!(response.outcome.is_none());
    }
}
