//! Task chaining
//!
//! Continuation-passing driver that takes a step from its first call,
//! through zero or more fetch sub-tasks, to one platform command and a
//! final response.

pub mod orchestrator;
pub mod phase;
pub mod state;
pub mod step;

pub use orchestrator::{Progress, StepProgress, StepState, TaskChain};
pub use phase::{allowed_transitions, validate_transition, ChainPhase};
pub use state::{AwaitingFetch, ChainState, DispatchedCommand, FetchSource, FetchTask};
pub use step::{Dispatch, Preparation, StepResponse, StepStatus, TasStep};
