//! Linear run state machine.
//!
//! Each state means its phase completed: `Staged` after a successful copy,
//! `Built` after a verified native build. A failing phase therefore moves to
//! `Failed` from the state before it.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Init,
    Staged,
    Converted,
    Built,
    Reconciled,
    Reported,
    Done,
    Failed,
}

impl PipelineState {
    /// Successor on the happy path.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Init => Some(Self::Staged),
            Self::Staged => Some(Self::Converted),
            Self::Converted => Some(Self::Built),
            Self::Built => Some(Self::Reconciled),
            Self::Reconciled => Some(Self::Reported),
            Self::Reported => Some(Self::Done),
            Self::Done | Self::Failed => None,
        }
    }

    /// Failure is only possible before anything has been deleted from the
    /// staging tree, i.e. before reconciliation.
    pub fn can_fail(self) -> bool {
        matches!(self, Self::Init | Self::Staged | Self::Converted | Self::Built)
    }

    pub fn can_advance_to(self, to: Self) -> bool {
        if to == Self::Failed {
            self.can_fail()
        } else {
            self.next() == Some(to)
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Current state plus every state visited, starting at `Init`.
#[derive(Debug, Clone)]
pub struct StateMachine {
    history: Vec<PipelineState>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            history: vec![PipelineState::Init],
        }
    }

    pub fn current(&self) -> PipelineState {
        self.history
            .last()
            .copied()
            .unwrap_or(PipelineState::Init)
    }

    pub fn history(&self) -> &[PipelineState] {
        &self.history
    }

    /// Move to `to`. Transitions off the linear path are ignored and logged.
    pub fn advance(&mut self, to: PipelineState) -> bool {
        let from = self.current();
        if !from.can_advance_to(to) {
            tracing::warn!(%from, %to, "ignoring invalid pipeline transition");
            return false;
        }
        tracing::debug!(%from, %to, "pipeline transition");
        self.history.push(to);
        true
    }

    pub fn fail(&mut self) -> bool {
        self.advance(PipelineState::Failed)
    }
}
