//! Retrieval state machine
//!
//! ```text
//! INIT ──► EXPANDING ──► RETRIEVING ──► FUSING ──► DONE
//!   │          │              │            │
//!   │          └──────────────┴────────────┴──► FAILED
//!   ├──► RETRIEVING (no expansion)
//!   ├──► DONE (query has no searchable content)
//!   └──► FAILED
//! ```
//!
//! The only dependency edge is "fusion waits for every retrieval branch".

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stage of a single retrieval call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalState {
    /// Request accepted, nothing started
    Init,
    /// Waiting on the query expander
    Expanding,
    /// Branches fanned out
    Retrieving,
    /// Merging branch output
    Fusing,
    /// Response produced
    Done,
    /// Fatal error returned to the caller
    Failed,
}

impl RetrievalState {
    /// True for `Done` and `Failed`
    pub fn is_terminal(&self) -> bool {
        matches!(self, RetrievalState::Done | RetrievalState::Failed)
    }

    /// Whether `self -> next` is a legal transition
    pub fn can_transition_to(&self, next: RetrievalState) -> bool {
        use RetrievalState::*;
        match (self, next) {
            (Done, _) | (Failed, _) => false,
            (_, Failed) => true,
            (Init, Expanding) | (Init, Retrieving) | (Init, Done) => true,
            (Expanding, Retrieving) => true,
            (Retrieving, Fusing) => true,
            (Fusing, Done) => true,
            _ => false,
        }
    }

    /// Lowercase name
    pub fn name(&self) -> &'static str {
        match self {
            RetrievalState::Init => "init",
            RetrievalState::Expanding => "expanding",
            RetrievalState::Retrieving => "retrieving",
            RetrievalState::Fusing => "fusing",
            RetrievalState::Done => "done",
            RetrievalState::Failed => "failed",
        }
    }
}

impl fmt::Display for RetrievalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Records the path a request takes through the state machine
#[derive(Debug, Clone)]
pub(crate) struct StateTrace {
    states: Vec<RetrievalState>,
}

impl StateTrace {
    pub(crate) fn new() -> Self {
        StateTrace {
            states: vec![RetrievalState::Init],
        }
    }

    pub(crate) fn current(&self) -> RetrievalState {
        self.states
            .last()
            .copied()
            .unwrap_or(RetrievalState::Init)
    }

    pub(crate) fn advance(&mut self, next: RetrievalState) {
        debug_assert!(
            self.current().can_transition_to(next),
            "illegal retrieval transition {} -> {}",
            self.current(),
            next
        );
        self.states.push(next);
    }

    pub(crate) fn into_states(self) -> Vec<RetrievalState> {
        self.states
    }
}
