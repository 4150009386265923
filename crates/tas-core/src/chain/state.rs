//! Continuation handed back to the caller at every suspension
//!
//! A chain keeps no state between calls. Whatever must survive a sub-task
//! round trip travels inside [`ChainState`], which the caller stores and
//! passes back with the sub-task's response.

use crate::chain::phase::ChainPhase;
use crate::progress::UnitProgress;
use crate::sequencer::{FETCH_CUSTOM_FILES, FETCH_FILES};
use serde::{Deserialize, Serialize};
use tas_manifest::{CustomFetchRequest, FetchedManifests, GitFetchRequest};

/// Fetch sub-task kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FetchSource {
    Custom,
    Git,
}

impl FetchSource {
    /// Progress unit the fetch reports under
    #[inline]
    #[must_use]
    pub fn unit_name(self) -> &'static str {
        match self {
            Self::Custom => FETCH_CUSTOM_FILES,
            Self::Git => FETCH_FILES,
        }
    }
}

/// Fetch sub-task still to run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", content = "request", rename_all = "camelCase")]
pub enum FetchTask {
    Custom(CustomFetchRequest),
    Git(GitFetchRequest),
}

impl FetchTask {
    #[inline]
    #[must_use]
    pub fn source(&self) -> FetchSource {
        match self {
            Self::Custom(_) => FetchSource::Custom,
            Self::Git(_) => FetchSource::Git,
        }
    }
}

/// Waiting on a fetch sub-task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwaitingFetch<P> {
    pub context: P,
    pub in_flight: FetchSource,
    /// Fetches queued behind the one in flight
    pub remaining: Vec<FetchTask>,
    pub fetched: FetchedManifests,
    pub units: Vec<UnitProgress>,
}

/// Waiting on the platform command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchedCommand<D> {
    pub context: D,
    pub units: Vec<UnitProgress>,
}

/// Suspended chain
///
/// `P` is what a step carries from preparation to dispatch, `D` what it
/// carries from dispatch to finalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum ChainState<P, D> {
    AwaitingFetch(AwaitingFetch<P>),
    Dispatched(DispatchedCommand<D>),
}

impl<P, D> ChainState<P, D> {
    #[must_use]
    pub fn phase(&self) -> ChainPhase {
        match self {
            Self::AwaitingFetch(_) => ChainPhase::AwaitingFetch,
            Self::Dispatched(_) => ChainPhase::Dispatched,
        }
    }

    /// Progress recorded so far
    #[must_use]
    pub fn units(&self) -> &[UnitProgress] {
        match self {
            Self::AwaitingFetch(state) => &state.units,
            Self::Dispatched(state) => &state.units,
        }
    }
}
