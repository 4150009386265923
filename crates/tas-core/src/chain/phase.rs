//! Chain phase state machine
//!
//! A chain starts, waits on zero or more fetch sub-tasks, dispatches one
//! platform command and completes:
//!
//! ```text
//! Start ──► AwaitingFetch ──► Dispatched ──► Done
//!   │            │  ▲                         ▲
//!   │            └──┘ (next fetch)            │
//!   └──────────────────────────────────────────┘ (skip, failure)
//! ```

use crate::error::ChainStateError;
use serde::{Deserialize, Serialize};

/// Phase of one step invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChainPhase {
    Start,
    AwaitingFetch,
    Dispatched,
    Done,
}

impl ChainPhase {
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        self == Self::Done
    }
}

/// Phases reachable from `from`
#[must_use]
pub fn allowed_transitions(from: ChainPhase) -> Vec<ChainPhase> {
    use ChainPhase::{AwaitingFetch, Dispatched, Done, Start};
    match from {
        Start | AwaitingFetch => vec![AwaitingFetch, Dispatched, Done],
        Dispatched => vec![Done],
        Done => Vec::new(),
    }
}

/// Reject a phase change the chain never makes
pub fn validate_transition(from: ChainPhase, to: ChainPhase) -> Result<(), ChainStateError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(ChainStateError::InvalidTransition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_can_repeat() {
        assert!(validate_transition(ChainPhase::AwaitingFetch, ChainPhase::AwaitingFetch).is_ok());
        assert!(validate_transition(ChainPhase::Dispatched, ChainPhase::Dispatched).is_err());
    }

    #[test]
    fn done_is_final() {
        assert!(ChainPhase::Done.is_terminal());
        assert!(allowed_transitions(ChainPhase::Done).is_empty());
    }
}
