//! Task-chain orchestrator
//!
//! Drives one step invocation through its sub-tasks:
//! - checks the feature gate and lets the step prepare
//! - runs any fetch sub-tasks one at a time, custom-script fetch first
//! - dispatches the platform command built from the assembled manifests
//! - hands a successful command result to the step's finalizer
//!
//! Each call returns either a serializable continuation plus the handle of
//! the sub-task in flight, or the step's final response.

use crate::chain::phase::{validate_transition, ChainPhase};
use crate::chain::state::{AwaitingFetch, ChainState, DispatchedCommand, FetchSource, FetchTask};
use crate::chain::step::{Dispatch, Preparation, StepResponse, TasStep};
use crate::command::{CommandResponse, CommandStatus, SubTaskPayload, SubTaskResponse};
use crate::error::{ChainStateError, TasError, TasResult};
use crate::observability::invocation_span;
use crate::progress::{
    complete_unit_progress, mark_unit, merge_unit_progress, UnitProgress, UnitStatus,
};
use crate::runtime::{DispatchHandle, StepEnv, SubTaskRequest};
use crate::sequencer::FETCH_FILES;
use tas_manifest::{FetchPlan, FetchedFiles, FetchedManifests};
use tracing::Instrument;

/// Continuation type of a step
pub type StepState<S> = ChainState<<S as TasStep>::Prepared, <S as TasStep>::InFlight>;

/// Where a chain stands after a call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepProgress<P, D> {
    /// Waiting on a sub-task; hand `state` back with its response
    Suspended {
        state: ChainState<P, D>,
        handle: DispatchHandle,
    },
    Completed(StepResponse),
}

/// Progress type of a step
pub type Progress<S> = StepProgress<<S as TasStep>::Prepared, <S as TasStep>::InFlight>;

impl<P, D> StepProgress<P, D> {
    /// Final response, `None` while suspended
    #[must_use]
    pub fn into_response(self) -> Option<StepResponse> {
        match self {
            Self::Completed(response) => Some(response),
            Self::Suspended { .. } => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_suspended(&self) -> bool {
        matches!(self, Self::Suspended { .. })
    }
}

/// Stateless driver of one step
pub struct TaskChain<'a, S: TasStep> {
    step: &'a S,
    env: StepEnv<'a>,
}

impl<'a, S: TasStep> TaskChain<'a, S> {
    #[inline]
    #[must_use]
    pub fn new(step: &'a S, env: StepEnv<'a>) -> Self {
        Self { step, env }
    }

    /// Begin an invocation
    pub async fn start(&self, params: &S::Params) -> TasResult<Progress<S>> {
        let ctx = self.env.ctx;
        let span = invocation_span(self.step.kind(), ctx.invocation_id, &ctx.account_id);
        self.start_inner(params).instrument(span).await
    }

    /// Continue an invocation with the response of the sub-task in flight
    pub async fn resume(
        &self,
        params: &S::Params,
        state: StepState<S>,
        response: SubTaskResponse,
    ) -> TasResult<Progress<S>> {
        let ctx = self.env.ctx;
        let span = invocation_span(self.step.kind(), ctx.invocation_id, &ctx.account_id);
        self.resume_inner(params, state, response).instrument(span).await
    }

    async fn start_inner(&self, params: &S::Params) -> TasResult<Progress<S>> {
        let flag = &self.env.config.feature_flag;
        if !self
            .env
            .runtime
            .is_feature_enabled(&self.env.ctx.account_id, flag)
            .await?
        {
            tracing::warn!(flag = %flag, "step gated off");
            return Ok(StepProgress::Completed(StepResponse::failed(
                TasError::FeatureDisabled(flag.clone()).to_string(),
                Vec::new(),
            )));
        }

        let preparation = match self.step.prepare(params, &self.env).await {
            Ok(preparation) => preparation,
            Err(err) => return fold(err, Vec::new()),
        };

        match preparation {
            Preparation::Skip(reason) => {
                validate_transition(ChainPhase::Start, ChainPhase::Done)?;
                tracing::info!(reason = %reason, "step skipped");
                Ok(StepProgress::Completed(StepResponse::skipped(reason)))
            }
            Preparation::Proceed {
                context,
                fetch: None,
                units,
            } => {
                self.dispatch_command(
                    params,
                    ChainPhase::Start,
                    context,
                    FetchedManifests::default(),
                    units,
                )
                .await
            }
            Preparation::Proceed {
                context,
                fetch: Some(plan),
                mut units,
            } => {
                if plan.flags.local {
                    units = merge_unit_progress(units, vec![UnitProgress::succeeded(FETCH_FILES)]);
                }
                let fetched = FetchedManifests::from_plan(&plan);
                let mut queue = fetch_queue(plan);
                tracing::debug!(pending = queue.len(), "manifest fetch planned");

                if queue.is_empty() {
                    return self
                        .dispatch_command(params, ChainPhase::Start, context, fetched, units)
                        .await;
                }
                let next = queue.remove(0);
                self.dispatch_fetch(ChainPhase::Start, next, queue, context, fetched, units)
                    .await
            }
        }
    }

    async fn resume_inner(
        &self,
        params: &S::Params,
        state: StepState<S>,
        response: SubTaskResponse,
    ) -> TasResult<Progress<S>> {
        match (state, response) {
            (ChainState::AwaitingFetch(waiting), SubTaskResponse::GitFetch(r))
                if waiting.in_flight == FetchSource::Git =>
            {
                let outcome = FetchOutcome {
                    ok: r.status == CommandStatus::Success,
                    error_message: r.error_message,
                    files: r.files,
                    zipped_manifest_id: None,
                    unit_progress: r.unit_progress,
                };
                self.on_fetch(params, waiting, outcome).await
            }
            (ChainState::AwaitingFetch(waiting), SubTaskResponse::CustomFetch(r))
                if waiting.in_flight == FetchSource::Custom =>
            {
                let outcome = FetchOutcome {
                    ok: r.status == CommandStatus::Success,
                    error_message: r.error_message,
                    files: r.files,
                    zipped_manifest_id: r.zipped_manifest_id,
                    unit_progress: r.unit_progress,
                };
                self.on_fetch(params, waiting, outcome).await
            }
            (ChainState::Dispatched(dispatched), SubTaskResponse::Command(r)) => {
                self.on_command(params, dispatched, r).await
            }
            (state, response) => Err(ChainStateError::UnexpectedResponse {
                phase: state.phase(),
                response: response.type_name().to_string(),
            }
            .into()),
        }
    }

    async fn on_fetch(
        &self,
        params: &S::Params,
        waiting: AwaitingFetch<S::Prepared>,
        outcome: FetchOutcome,
    ) -> TasResult<Progress<S>> {
        let source = waiting.in_flight;
        let mut units = merge_unit_progress(waiting.units, outcome.unit_progress);

        if !outcome.ok {
            validate_transition(ChainPhase::AwaitingFetch, ChainPhase::Done)?;
            let reason = outcome
                .error_message
                .unwrap_or_else(|| format!("{} sub-task failed", source.unit_name()));
            tracing::error!(unit = source.unit_name(), error = %reason, "manifest fetch failed");
            return Ok(StepProgress::Completed(StepResponse::failed(
                TasError::FetchFailed(reason).to_string(),
                complete_unit_progress(units),
            )));
        }

        mark_unit(&mut units, source.unit_name(), UnitStatus::Success);
        let fetched = match source {
            FetchSource::Git => waiting.fetched.with_git(outcome.files),
            FetchSource::Custom => waiting
                .fetched
                .with_custom(outcome.files, outcome.zipped_manifest_id),
        };
        tracing::info!(unit = source.unit_name(), "manifest fetch completed");

        let mut remaining = waiting.remaining;
        if remaining.is_empty() {
            return self
                .dispatch_command(
                    params,
                    ChainPhase::AwaitingFetch,
                    waiting.context,
                    fetched,
                    units,
                )
                .await;
        }
        let next = remaining.remove(0);
        self.dispatch_fetch(
            ChainPhase::AwaitingFetch,
            next,
            remaining,
            waiting.context,
            fetched,
            units,
        )
        .await
    }

    async fn on_command(
        &self,
        params: &S::Params,
        dispatched: DispatchedCommand<S::InFlight>,
        response: CommandResponse,
    ) -> TasResult<Progress<S>> {
        validate_transition(ChainPhase::Dispatched, ChainPhase::Done)?;
        let units = merge_unit_progress(dispatched.units, response.unit_progress);

        if response.status == CommandStatus::Failure {
            let message = response
                .error_message
                .unwrap_or_else(|| "platform command failed".to_string());
            tracing::error!(error = %message, "platform command failed");
            if let Err(err) = self
                .step
                .on_failure(params, &self.env, dispatched.context, response.result)
                .await
            {
                if err.escapes_step() {
                    return Err(err);
                }
                tracing::warn!(error = %err, "could not record failed command");
            }
            return Ok(StepProgress::Completed(StepResponse::failed(
                TasError::CommandFailed(message).to_string(),
                complete_unit_progress(units),
            )));
        }

        match self
            .step
            .finalize(params, &self.env, dispatched.context, response.result, units.clone())
            .await
        {
            Ok(response) => {
                tracing::info!(status = ?response.status, "step finished");
                Ok(StepProgress::Completed(response))
            }
            Err(err) => fold(err, units),
        }
    }

    async fn dispatch_fetch(
        &self,
        from: ChainPhase,
        task: FetchTask,
        remaining: Vec<FetchTask>,
        context: S::Prepared,
        fetched: FetchedManifests,
        units: Vec<UnitProgress>,
    ) -> TasResult<Progress<S>> {
        validate_transition(from, ChainPhase::AwaitingFetch)?;
        let source = task.source();
        let payload = match task {
            FetchTask::Custom(request) => SubTaskPayload::CustomFetch(request),
            FetchTask::Git(request) => SubTaskPayload::GitFetch(request),
        };
        let request = SubTaskRequest::new(
            payload,
            vec![source.unit_name().to_string()],
            self.env.config.default_timeout_secs,
        );
        let handle = self.env.runtime.dispatch_sub_task(request).await?;
        tracing::info!(unit = source.unit_name(), task = %handle.task_id, "fetch dispatched");

        let units = merge_unit_progress(units, vec![UnitProgress::running(source.unit_name())]);
        Ok(StepProgress::Suspended {
            state: ChainState::AwaitingFetch(AwaitingFetch {
                context,
                in_flight: source,
                remaining,
                fetched,
                units,
            }),
            handle,
        })
    }

    async fn dispatch_command(
        &self,
        params: &S::Params,
        from: ChainPhase,
        context: S::Prepared,
        fetched: FetchedManifests,
        units: Vec<UnitProgress>,
    ) -> TasResult<Progress<S>> {
        validate_transition(from, ChainPhase::Dispatched)?;
        let Dispatch {
            command,
            context,
            units: names,
        } = match self.step.dispatch(params, &self.env, context, fetched).await {
            Ok(dispatch) => dispatch,
            Err(err) => return fold(err, units),
        };

        let command_type = command.type_name();
        let request = SubTaskRequest::new(
            SubTaskPayload::Command(command),
            names.clone(),
            self.env.config.default_timeout_secs,
        );
        let handle = self.env.runtime.dispatch_sub_task(request).await?;
        tracing::info!(
            command = command_type,
            task = %handle.task_id,
            "platform command dispatched"
        );

        let queued = names.into_iter().map(UnitProgress::queued).collect();
        Ok(StepProgress::Suspended {
            state: ChainState::Dispatched(DispatchedCommand {
                context,
                units: merge_unit_progress(units, queued),
            }),
            handle,
        })
    }
}

struct FetchOutcome {
    ok: bool,
    error_message: Option<String>,
    files: FetchedFiles,
    zipped_manifest_id: Option<String>,
    unit_progress: Vec<UnitProgress>,
}

/// Remote fetches in dispatch order: custom-script output may feed the git fetch
fn fetch_queue(plan: FetchPlan) -> Vec<FetchTask> {
    let mut queue = Vec::with_capacity(2);
    if let Some(custom) = plan.custom.filter(|r| !r.is_empty()) {
        queue.push(FetchTask::Custom(custom));
    }
    if let Some(git) = plan.git.filter(|r| !r.is_empty()) {
        queue.push(FetchTask::Git(git));
    }
    queue
}

/// End the step as FAILED unless the error belongs to the runtime
fn fold<P, D>(err: TasError, units: Vec<UnitProgress>) -> TasResult<StepProgress<P, D>> {
    if err.escapes_step() {
        return Err(err);
    }
    tracing::error!(kind = ?err.kind(), error = %err, "step failed");
    Ok(StepProgress::Completed(StepResponse::failed(
        err.to_string(),
        complete_unit_progress(units),
    )))
}
