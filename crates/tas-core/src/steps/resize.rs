//! Resize
//!
//! Scales the new application up and the previous one down according to
//! the planner, against the total the setup recorded.

use crate::chain::{Dispatch, Preparation, StepResponse, TasStep};
use crate::command::{CommandResult, PlatformCommand, ResizeCommand};
use crate::error::{TasError, TasResult};
use crate::outcome::{
    DeploymentSetupOutcome, OutputScope, ResizeOutcome, StepOutcome, RESIZE_OUTCOME,
};
use crate::planner::{plan_resize, validate_request, InstanceRequest, ResizePlan};
use crate::progress::UnitProgress;
use crate::runtime::StepEnv;
use crate::sequencer::resize_units;
use crate::steps::{
    missing_outcome, publish_instances, read_setup, resolve_target, unexpected_result,
};
use crate::types::{InstanceRecord, SetupVariant, StepKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tas_manifest::FetchedManifests;

/// Resize parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResizeParams {
    /// Path of the setup step whose outcome is resized
    pub setup_step_path: String,
    pub upsize: InstanceRequest,
    pub downsize: Option<InstanceRequest>,
    #[serde(default)]
    pub ignore_manifest_instance_count: bool,
}

impl ResizeParams {
    pub fn new(setup_step_path: impl Into<String>, upsize: InstanceRequest) -> TasResult<Self> {
        let params = Self {
            setup_step_path: setup_step_path.into(),
            upsize,
            downsize: None,
            ignore_manifest_instance_count: false,
        };
        params.validate()?;
        Ok(params)
    }

    /// With explicit downsize target
    pub fn with_downsize(mut self, downsize: InstanceRequest) -> TasResult<Self> {
        self.downsize = Some(downsize);
        self.validate()?;
        Ok(self)
    }

    /// Size the new application to the upsize count alone
    pub fn ignoring_manifest_count(mut self) -> TasResult<Self> {
        self.ignore_manifest_instance_count = true;
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> TasResult<()> {
        if self.setup_step_path.trim().is_empty() {
            return Err(TasError::configuration("resize requires the setup step path"));
        }
        if self.upsize.value < 0 || self.downsize.is_some_and(|d| d.value < 0) {
            return Err(TasError::configuration("instance counts cannot be negative"));
        }
        validate_request(self.upsize, self.ignore_manifest_instance_count)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResizeStep;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResizePrepared {
    setup: DeploymentSetupOutcome,
    plan: ResizePlan,
}

/// Instances of the new version first, flagged as upsized
fn tag_instances(new: Vec<InstanceRecord>, old: Vec<InstanceRecord>) -> Vec<InstanceRecord> {
    new.into_iter()
        .map(|mut i| {
            i.upsize = true;
            i
        })
        .chain(old.into_iter().map(|mut i| {
            i.upsize = false;
            i
        }))
        .collect()
}

#[async_trait]
impl TasStep for ResizeStep {
    type Params = ResizeParams;
    type Prepared = ResizePrepared;
    type InFlight = ResizePlan;

    fn kind(&self) -> StepKind {
        StepKind::Resize
    }

    async fn prepare(
        &self,
        params: &ResizeParams,
        env: &StepEnv<'_>,
    ) -> TasResult<Preparation<ResizePrepared>> {
        params.validate()?;
        let Some(setup) = read_setup(env, &params.setup_step_path).await? else {
            return Ok(Preparation::Skip(missing_outcome("tas setup", &params.setup_step_path)));
        };
        setup.cli_version().ensure_supported()?;

        let plan = plan_resize(
            params.upsize,
            params.downsize,
            setup.total_desired_count(),
            params.ignore_manifest_instance_count,
            setup.variant(),
        )?;
        tracing::info!(
            total = plan.total_desired_count,
            upsize = plan.upsize_count,
            downsize = plan.downsize_count,
            "resize planned"
        );
        Ok(Preparation::proceed(ResizePrepared { setup, plan }))
    }

    async fn dispatch(
        &self,
        _params: &ResizeParams,
        env: &StepEnv<'_>,
        context: ResizePrepared,
        _manifests: FetchedManifests,
    ) -> TasResult<Dispatch<ResizePlan>> {
        let ResizePrepared { setup, plan } = context;
        let target = resolve_target(env).await?;
        let command = PlatformCommand::Resize(ResizeCommand {
            target,
            new_application: setup.new_application().clone(),
            downsize_application: setup.active_application().cloned(),
            plan,
            resize_strategy: setup.resize_strategy(),
            standard_blue_green: setup.variant() == SetupVariant::BlueGreen,
            autoscaler_yml: setup.bundle().autoscaler_yml().map(str::to_string),
            cli_version: setup.cli_version(),
            timeout_mins: env.timeout_mins(),
        });
        Ok(Dispatch {
            command,
            context: plan,
            units: resize_units(setup.resize_strategy()),
        })
    }

    async fn finalize(
        &self,
        _params: &ResizeParams,
        env: &StepEnv<'_>,
        plan: ResizePlan,
        result: Option<CommandResult>,
        units: Vec<UnitProgress>,
    ) -> TasResult<StepResponse> {
        let result = match result {
            Some(CommandResult::Resize(result)) => result,
            other => return Err(unexpected_result("resize", other.as_ref())),
        };

        let outcome = StepOutcome::Resize(ResizeOutcome {
            total_desired_count: plan.total_desired_count,
            upsize_count: plan.upsize_count,
            downsize_count: plan.downsize_count,
            instance_changes: result.instance_changes,
        });
        env.publish(RESIZE_OUTCOME, outcome.clone(), OutputScope::Stage)
            .await?;
        publish_instances(env, tag_instances(result.new_instances, result.old_instances)).await?;
        Ok(StepResponse::succeeded(Some(outcome), units))
    }
}
