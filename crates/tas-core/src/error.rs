//! Error types for TAS orchestration
//!
//! Every error maps onto one of the failure classes a step can end in:
//! - Configuration: rejected before any sub-task is dispatched
//! - Fetch: a manifest fetch sub-task reported failure
//! - Remote command: the platform command failed or answered unexpectedly
//! - Resolution: manifest content could not be parsed or resolved
//! - Runtime: the surrounding runtime could not do its part
//!
//! Only runtime errors escape a step as `Err`; the rest become a FAILED
//! step response.

use crate::chain::phase::ChainPhase;
use crate::types::CfCliVersion;
use serde::{Deserialize, Serialize};
use tas_manifest::ManifestError;

/// Result alias used throughout the crate
pub type TasResult<T> = Result<T, TasError>;

/// Main TAS error type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TasError {
    /// Invalid step configuration
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Manifest declaration, lookup or content error
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// Instance planning rejected the request
    #[error(transparent)]
    Plan(#[from] PlanError),

    /// Step gated off for this account
    #[error("feature flag {0} is not enabled for this account")]
    FeatureDisabled(String),

    /// Continuation handed back in a state that cannot accept the response
    #[error(transparent)]
    Chain(#[from] ChainStateError),

    /// Fetch sub-task reported failure
    #[error("failed to fetch manifests: {0}")]
    FetchFailed(String),

    /// Platform command reported failure
    #[error("{0}")]
    CommandFailed(String),

    /// Platform command succeeded with a result of the wrong shape
    #[error("unexpected command result: expected {expected}, got {actual}")]
    UnexpectedResult { expected: String, actual: String },

    /// Surrounding runtime failure
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    /// Artifact source cannot be deployed to TAS
    #[error("artifact type {0} is not yet supported in TAS")]
    UnsupportedArtifact(String),

    /// CLI version not supported
    #[error("cf cli version {0} is not supported, only v7 is supported")]
    UnsupportedCliVersion(CfCliVersion),
}

/// Failure class of an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    Configuration,
    Fetch,
    RemoteCommand,
    Resolution,
    Runtime,
}

impl TasError {
    /// Build a configuration error
    #[inline]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Failure class of this error
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_)
            | Self::Plan(_)
            | Self::FeatureDisabled(_)
            | Self::UnsupportedArtifact(_)
            | Self::UnsupportedCliVersion(_) => ErrorKind::Configuration,
            Self::Manifest(e) if e.is_configuration() => ErrorKind::Configuration,
            Self::Manifest(_) => ErrorKind::Resolution,
            Self::FetchFailed(_) => ErrorKind::Fetch,
            Self::CommandFailed(_) | Self::UnexpectedResult { .. } => ErrorKind::RemoteCommand,
            Self::Chain(_) => ErrorKind::Runtime,
            Self::Runtime(e) => e.kind(),
        }
    }

    /// Check if error is retryable by the surrounding runtime
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Runtime(RuntimeError::PublishFailed(_) | RuntimeError::DispatchFailed(_))
        )
    }

    /// Whether the error must propagate instead of ending the step as FAILED
    #[inline]
    #[must_use]
    pub fn escapes_step(&self) -> bool {
        self.kind() == ErrorKind::Runtime
    }
}

/// Instance planning errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    /// Ignoring the manifest count needs an absolute target
    #[error("ignore instance count in manifest can only be used with count as the instance unit, not percentage")]
    PercentageWithIgnoreManifestCount,
}

/// Continuation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainStateError {
    /// Phase change not allowed by the chain state machine
    #[error("invalid chain transition from {from:?} to {to:?}")]
    InvalidTransition { from: ChainPhase, to: ChainPhase },

    /// Response does not match what the continuation is waiting for
    #[error("chain in phase {phase:?} cannot accept a {response} response")]
    UnexpectedResponse { phase: ChainPhase, response: String },
}

/// Errors raised at the boundary to the surrounding runtime
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeError {
    /// Output could not be published
    #[error("failed to publish output: {0}")]
    PublishFailed(String),

    /// Sub-task could not be dispatched
    #[error("failed to dispatch sub-task: {0}")]
    DispatchFailed(String),

    /// Connector reference does not resolve
    #[error("connector not found: {0}")]
    ConnectorNotFound(String),

    /// Output lookup failed (distinct from the output being absent)
    #[error("failed to resolve output {0}")]
    ResolutionFailed(String),
}

impl RuntimeError {
    /// Failure class of this error
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ConnectorNotFound(_) => ErrorKind::Configuration,
            Self::PublishFailed(_) | Self::DispatchFailed(_) | Self::ResolutionFailed(_) => {
                ErrorKind::Runtime
            }
        }
    }
}
