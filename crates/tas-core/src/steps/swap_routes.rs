//! Swap routes
//!
//! Moves production routes from the previous application to the new one
//! of a blue-green deployment, optionally downsizing the previous one.

use crate::chain::{Dispatch, Preparation, StepResponse, TasStep};
use crate::command::{CommandResult, PlatformCommand, SwapRoutesCommand};
use crate::error::{TasError, TasResult};
use crate::outcome::{
    DeploymentSetupOutcome, OutputScope, ResizeOutcome, StepOutcome, SwapRoutesOutcome,
    SWAP_ROUTES_OUTCOME,
};
use crate::progress::UnitProgress;
use crate::runtime::StepEnv;
use crate::sequencer::swap_routes_units;
use crate::steps::{
    missing_outcome, publish_instances, read_resize, read_setup, resolve_target,
    unexpected_result,
};
use crate::types::{SetupVariant, StepKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tas_manifest::FetchedManifests;

/// Swap routes parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapRoutesParams {
    pub setup_step_path: String,
    /// Resize whose instance changes are handed to the worker
    pub resize_step_path: Option<String>,
    #[serde(default)]
    pub downsize_old_application: bool,
}

impl SwapRoutesParams {
    pub fn new(setup_step_path: impl Into<String>) -> TasResult<Self> {
        let params = Self {
            setup_step_path: setup_step_path.into(),
            resize_step_path: None,
            downsize_old_application: false,
        };
        params.validate()?;
        Ok(params)
    }

    #[inline]
    #[must_use]
    pub fn with_resize_step(mut self, step_path: impl Into<String>) -> Self {
        self.resize_step_path = Some(step_path.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_downsize_old_application(mut self, downsize: bool) -> Self {
        self.downsize_old_application = downsize;
        self
    }

    pub fn validate(&self) -> TasResult<()> {
        if self.setup_step_path.trim().is_empty() {
            return Err(TasError::configuration("swap routes requires the setup step path"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwapRoutesStep;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapRoutesPrepared {
    setup: DeploymentSetupOutcome,
    resize: Option<ResizeOutcome>,
}

#[async_trait]
impl TasStep for SwapRoutesStep {
    type Params = SwapRoutesParams;
    type Prepared = SwapRoutesPrepared;
    type InFlight = ();

    fn kind(&self) -> StepKind {
        StepKind::SwapRoutes
    }

    async fn prepare(
        &self,
        params: &SwapRoutesParams,
        env: &StepEnv<'_>,
    ) -> TasResult<Preparation<SwapRoutesPrepared>> {
        params.validate()?;
        let Some(setup) = read_setup(env, &params.setup_step_path).await? else {
            return Ok(Preparation::Skip(missing_outcome("tas setup", &params.setup_step_path)));
        };
        if setup.variant() != SetupVariant::BlueGreen {
            return Err(TasError::configuration(
                "swap routes can only follow a blue green app setup",
            ));
        }
        setup.cli_version().ensure_supported()?;

        let resize = match params.resize_step_path.as_deref() {
            Some(path) => read_resize(env, path).await?,
            None => None,
        };
        Ok(Preparation::proceed(SwapRoutesPrepared { setup, resize }))
    }

    async fn dispatch(
        &self,
        params: &SwapRoutesParams,
        env: &StepEnv<'_>,
        context: SwapRoutesPrepared,
        _manifests: FetchedManifests,
    ) -> TasResult<Dispatch<()>> {
        let SwapRoutesPrepared { setup, resize } = context;
        let target = resolve_target(env).await?;
        let command = PlatformCommand::SwapRoutes(SwapRoutesCommand {
            target,
            release_name_prefix: setup.application_name().to_string(),
            new_application: setup.new_application().clone(),
            active_application: setup.active_application().cloned(),
            inactive_application: setup.inactive_application().cloned(),
            final_routes: setup.routes().to_vec(),
            temp_routes: setup.temp_routes().to_vec(),
            downsize_old_application: params.downsize_old_application,
            existing_versions_to_keep: setup.existing_versions_to_keep(),
            instance_changes: resize.map(|r| r.instance_changes).unwrap_or_default(),
            cli_version: setup.cli_version(),
            timeout_mins: env.timeout_mins(),
        });
        Ok(Dispatch {
            command,
            context: (),
            units: swap_routes_units(),
        })
    }

    async fn finalize(
        &self,
        _params: &SwapRoutesParams,
        env: &StepEnv<'_>,
        _context: (),
        result: Option<CommandResult>,
        units: Vec<UnitProgress>,
    ) -> TasResult<StepResponse> {
        let result = match result {
            Some(CommandResult::SwapRoutes(result)) => result,
            other => return Err(unexpected_result("swapRoutes", other.as_ref())),
        };
        let outcome = StepOutcome::SwapRoutes(SwapRoutesOutcome {
            routes_swapped: result.routes_swapped,
            old_app_downsized: result.old_app_downsized,
            final_application_name: result.final_application_name,
        });
        env.publish(SWAP_ROUTES_OUTCOME, outcome.clone(), OutputScope::Stage)
            .await?;
        publish_instances(env, result.instances).await?;
        Ok(StepResponse::succeeded(Some(outcome), units))
    }
}
