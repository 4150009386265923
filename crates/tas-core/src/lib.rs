//! TAS Core (tas-core)
//!
//! Deployment orchestration for applications on a Tanzu / Cloud Foundry
//! space. Work runs on a remote worker; this crate decides what to ask for
//! and threads results between steps:
//! 1. **Task chain**: a step suspends on every remote sub-task (manifest
//!    fetches, then one platform command) and resumes from a serialisable
//!    state when the response arrives
//! 2. **Planner**: absolute and percentage instance targets become concrete
//!    upsize and downsize counts, and recorded changes invert for rollback
//! 3. **Steps**: setup (basic, canary, blue-green), rolling deploy, resize,
//!    route mapping, swap routes, the three rollbacks and arbitrary command
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use tas_core::prelude::*;
//!
//! let env = StepEnv::new(&ctx, &runtime, &config);
//! let chain = TaskChain::new(&ResizeStep, env);
//! let params = ResizeParams::new("stage.steps.setup", InstanceRequest::percentage(50))?;
//!
//! match chain.start(&params).await? {
//!     StepProgress::Suspended { state, handle } => persist(state, handle),
//!     StepProgress::Completed(response) => report(response),
//! }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod chain;
pub mod command;
pub mod config;
pub mod error;
pub mod observability;
pub mod outcome;
pub mod planner;
pub mod progress;
pub mod runtime;
pub mod sequencer;
pub mod steps;
pub mod types;

pub use chain::{ChainPhase, ChainState, StepProgress, StepResponse, StepStatus, TaskChain, TasStep};
pub use config::TasConfig;
pub use error::{ChainStateError, ErrorKind, PlanError, RuntimeError, TasError, TasResult};
pub use outcome::{OutputKey, OutputScope, StepOutcome};
pub use progress::{UnitProgress, UnitStatus};
pub use runtime::{ConnectorConfig, PipelineRuntime, StepContext, StepEnv, SubTaskRequest};
pub use types::*;

/// Common imports for driving steps
pub mod prelude {
    pub use crate::chain::{
        ChainPhase, ChainState, Dispatch, Preparation, StepProgress, StepResponse, StepStatus,
        TaskChain, TasStep,
    };
    pub use crate::command::{
        CommandResponse, CommandResult, CommandStatus, PlatformCommand, SubTaskPayload,
        SubTaskResponse,
    };
    pub use crate::config::TasConfig;
    pub use crate::error::{TasError, TasResult};
    pub use crate::outcome::{
        DeploymentSetupOutcome, InstancesOutcome, OutputKey, OutputScope, ResizeOutcome,
        StepOutcome,
    };
    pub use crate::planner::{plan_resize, InstanceRequest, ResizePlan};
    pub use crate::progress::{UnitProgress, UnitStatus};
    pub use crate::runtime::{DispatchHandle, PipelineRuntime, StepContext, StepEnv, SubTaskRequest};
    pub use crate::steps::{
        CommandParams, CommandStep, ResizeParams, ResizeStep, RollbackParams, RollbackStep,
        RollingDeployParams, RollingDeployStep, RollingRollbackParams, RollingRollbackStep,
        RouteMappingParams, RouteMappingStep, SetupParams, SetupStep, SwapRollbackParams,
        SwapRollbackStep, SwapRoutesParams, SwapRoutesStep,
    };
    pub use crate::types::{
        CfCliVersion, InstanceCountPolicy, ResizeStrategy, SetupVariant, StepKind,
        TasInfrastructure,
    };
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
