//! Arbitrary command
//!
//! Runs a user script against the target space. Manifests referenced by the
//! script through `${service.manifest}` are fetched first and shipped with
//! the command; exported variables become the step's outcome.

use crate::chain::{Dispatch, Preparation, StepResponse, TasStep};
use crate::command::{CommandResult, ExecuteCommand, PlatformCommand};
use crate::error::{TasError, TasResult};
use crate::outcome::{CommandOutcome, OutputScope, StepOutcome, COMMAND_OUTCOME};
use crate::progress::UnitProgress;
use crate::runtime::StepEnv;
use crate::sequencer::{command_units, FETCH_COMMAND_SCRIPT};
use crate::steps::{resolve_target, unexpected_result};
use crate::types::{CfCliVersion, StepKind};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tas_manifest::{
    load_script, plan_script_fetch, prepare_script, select_manifests, FetchedFile,
    FetchedManifests, ManifestDescriptor, ManifestStore, PreparedScript,
};

/// Arbitrary command parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandParams {
    pub script: ManifestStore,
    #[serde(default)]
    pub manifests: Vec<ManifestDescriptor>,
    #[serde(default)]
    pub input_variables: IndexMap<String, String>,
    /// Variable names the script exports
    #[serde(default)]
    pub output_variables: Vec<String>,
}

impl CommandParams {
    #[must_use]
    pub fn new(script: ManifestStore) -> Self {
        Self {
            script,
            manifests: Vec::new(),
            input_variables: IndexMap::new(),
            output_variables: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_manifests(mut self, manifests: Vec<ManifestDescriptor>) -> Self {
        self.manifests = manifests;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_input_variable(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.input_variables.insert(name.into(), value.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_output_variables(mut self, names: Vec<String>) -> Self {
        self.output_variables = names;
        self
    }

    pub fn validate(&self) -> TasResult<()> {
        if !matches!(
            self.script,
            ManifestStore::Inline(_) | ManifestStore::InternalFileStore(_)
        ) {
            return Err(TasError::configuration(
                "command script must be inline or come from the file store",
            ));
        }
        if self.output_variables.iter().any(|v| v.trim().is_empty()) {
            return Err(TasError::configuration("output variable names cannot be blank"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandStep;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandPrepared {
    script: PreparedScript,
    cli_version: CfCliVersion,
}

#[async_trait]
impl TasStep for CommandStep {
    type Params = CommandParams;
    type Prepared = CommandPrepared;
    type InFlight = ();

    fn kind(&self) -> StepKind {
        StepKind::Command
    }

    async fn prepare(
        &self,
        params: &CommandParams,
        env: &StepEnv<'_>,
    ) -> TasResult<Preparation<CommandPrepared>> {
        params.validate()?;
        let cli_version = env.config.cli_version.ensure_supported()?;
        let file_store = env.runtime.file_store();
        let text = load_script(&params.script, file_store)?;
        let units = vec![UnitProgress::succeeded(FETCH_COMMAND_SCRIPT)];

        let primary = if params.manifests.is_empty() {
            None
        } else {
            Some(select_manifests(&env.ctx.stage, &params.manifests)?.primary)
        };
        let script = prepare_script(&text, primary.as_ref())?;

        let fetch = match primary.as_ref() {
            Some(primary) if script.has_paths() => Some(plan_script_fetch(
                primary,
                &script.paths,
                file_store,
                &env.ctx.account_id,
            )?),
            _ => None,
        };
        tracing::info!(
            paths = script.paths.len(),
            repo_root = %script.repo_root,
            "command script prepared"
        );

        Ok(Preparation::Proceed {
            context: CommandPrepared {
                script,
                cli_version,
            },
            fetch,
            units,
        })
    }

    async fn dispatch(
        &self,
        params: &CommandParams,
        env: &StepEnv<'_>,
        context: CommandPrepared,
        manifests: FetchedManifests,
    ) -> TasResult<Dispatch<()>> {
        let files: Vec<FetchedFile> = manifests.all_files().map(|(_, f)| f.clone()).collect();
        let target = resolve_target(env).await?;
        Ok(Dispatch {
            command: PlatformCommand::Execute(ExecuteCommand {
                target,
                script: context.script.raw,
                repo_root: context.script.repo_root,
                files,
                input_variables: params.input_variables.clone(),
                output_variables: params.output_variables.clone(),
                cli_version: context.cli_version,
                timeout_mins: env.timeout_mins(),
            }),
            context: (),
            units: command_units(),
        })
    }

    async fn finalize(
        &self,
        _params: &CommandParams,
        env: &StepEnv<'_>,
        _context: (),
        result: Option<CommandResult>,
        units: Vec<UnitProgress>,
    ) -> TasResult<StepResponse> {
        let result = match result {
            Some(CommandResult::Execute(result)) => result,
            other => return Err(unexpected_result("execute", other.as_ref())),
        };
        let outcome = StepOutcome::Command(CommandOutcome {
            output_variables: result.output_variables,
        });
        env.publish(COMMAND_OUTCOME, outcome.clone(), OutputScope::Stage)
            .await?;
        Ok(StepResponse::succeeded(Some(outcome), units))
    }
}
