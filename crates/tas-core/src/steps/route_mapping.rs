//! Route mapping
//!
//! Maps or unmaps routes on one application. The application defaults to
//! the new application of a setup step.

use crate::chain::{Dispatch, Preparation, StepResponse, TasStep};
use crate::command::{CommandResult, PlatformCommand, RouteMappingCommand, RouteOperation};
use crate::error::{TasError, TasResult};
use crate::progress::UnitProgress;
use crate::runtime::StepEnv;
use crate::sequencer::route_mapping_units;
use crate::steps::{missing_outcome, read_setup, resolve_target};
use crate::types::{CfCliVersion, StepKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tas_manifest::FetchedManifests;

/// Route mapping parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteMappingParams {
    pub operation: RouteOperation,
    pub routes: Vec<String>,
    /// Application to act on; the setup's new application when absent
    pub application_name: Option<String>,
    pub setup_step_path: Option<String>,
}

impl RouteMappingParams {
    /// Act on a named application
    pub fn for_application(
        operation: RouteOperation,
        routes: Vec<String>,
        application_name: impl Into<String>,
    ) -> TasResult<Self> {
        let params = Self {
            operation,
            routes,
            application_name: Some(application_name.into()),
            setup_step_path: None,
        };
        params.validate()?;
        Ok(params)
    }

    /// Act on the new application of a setup step
    pub fn for_setup(
        operation: RouteOperation,
        routes: Vec<String>,
        setup_step_path: impl Into<String>,
    ) -> TasResult<Self> {
        let params = Self {
            operation,
            routes,
            application_name: None,
            setup_step_path: Some(setup_step_path.into()),
        };
        params.validate()?;
        Ok(params)
    }

    /// Routes with blanks dropped
    #[must_use]
    pub fn routes(&self) -> Vec<String> {
        self.routes
            .iter()
            .map(|r| r.trim())
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn validate(&self) -> TasResult<()> {
        if self.routes().is_empty() {
            return Err(TasError::configuration("route mapping requires at least one route"));
        }
        let named = self
            .application_name
            .as_deref()
            .is_some_and(|n| !n.trim().is_empty());
        if !named && self.setup_step_path.is_none() {
            return Err(TasError::configuration(
                "route mapping requires an application name or a setup step",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteMappingStep;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteMappingPrepared {
    application_name: String,
    cli_version: CfCliVersion,
}

#[async_trait]
impl TasStep for RouteMappingStep {
    type Params = RouteMappingParams;
    type Prepared = RouteMappingPrepared;
    type InFlight = ();

    fn kind(&self) -> StepKind {
        StepKind::RouteMapping
    }

    async fn prepare(
        &self,
        params: &RouteMappingParams,
        env: &StepEnv<'_>,
    ) -> TasResult<Preparation<RouteMappingPrepared>> {
        params.validate()?;
        let explicit = params
            .application_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());

        let context = match (explicit, params.setup_step_path.as_deref()) {
            (Some(name), _) => RouteMappingPrepared {
                application_name: name.to_string(),
                cli_version: env.config.cli_version.ensure_supported()?,
            },
            (None, Some(path)) => {
                let Some(setup) = read_setup(env, path).await? else {
                    return Ok(Preparation::Skip(missing_outcome("tas setup", path)));
                };
                RouteMappingPrepared {
                    application_name: setup.new_application().application_name.clone(),
                    cli_version: setup.cli_version().ensure_supported()?,
                }
            }
            (None, None) => {
                return Err(TasError::configuration(
                    "route mapping requires an application name or a setup step",
                ))
            }
        };
        Ok(Preparation::proceed(context))
    }

    async fn dispatch(
        &self,
        params: &RouteMappingParams,
        env: &StepEnv<'_>,
        context: RouteMappingPrepared,
        _manifests: FetchedManifests,
    ) -> TasResult<Dispatch<()>> {
        let target = resolve_target(env).await?;
        tracing::info!(
            application = %context.application_name,
            operation = ?params.operation,
            "route mapping dispatched"
        );
        Ok(Dispatch {
            command: PlatformCommand::RouteMapping(RouteMappingCommand {
                target,
                application_name: context.application_name,
                routes: params.routes(),
                operation: params.operation,
                cli_version: context.cli_version,
                timeout_mins: env.timeout_mins(),
            }),
            context: (),
            units: route_mapping_units(),
        })
    }

    async fn finalize(
        &self,
        _params: &RouteMappingParams,
        _env: &StepEnv<'_>,
        _context: (),
        _result: Option<CommandResult>,
        units: Vec<UnitProgress>,
    ) -> TasResult<StepResponse> {
        Ok(StepResponse::succeeded(None, units))
    }
}
