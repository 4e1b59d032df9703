//! Workflow state machine.
//!
//! ```text
//! fetching ─(empty)─▶ done
//!    │
//!    ▼
//! personalizing ▶ grounding ▶ gating ─(pass)─▶ applying ─┐
//!    ▲                           └─(fail)─▶ skipping ────┤
//!    └───────────────(continue)──────────────────────────┘
//!                                                 (stop)─▶ done
//! ```
//!
//! Transitions are a pure function of the current step and the run state.

use serde::Serialize;

use crate::workflow::state::RunState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Fetching,
    Personalizing,
    Grounding,
    Gating,
    Applying,
    Skipping,
    Done,
}

impl Step {
    pub const INITIAL: Step = Step::Fetching;

    pub fn next(self, state: &RunState) -> Step {
        match self {
            Step::Fetching if state.queue.is_empty() => Step::Done,
            Step::Fetching => Step::Personalizing,
            Step::Personalizing => Step::Grounding,
            Step::Grounding => Step::Gating,
            Step::Gating => match &state.verdict {
                Some(verdict) if verdict.passed => Step::Applying,
                _ => Step::Skipping,
            },
            Step::Applying | Step::Skipping if state.should_stop() => Step::Done,
            Step::Applying | Step::Skipping => Step::Personalizing,
            Step::Done => Step::Done,
        }
    }

    /// Leaving this step moves the cursor past the current item.
    pub fn advances_cursor(self) -> bool {
        matches!(self, Step::Applying | Step::Skipping)
    }

    pub fn is_terminal(self) -> bool {
        self == Step::Done
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Step::Fetching => "fetching",
            Step::Personalizing => "personalizing",
            Step::Grounding => "grounding",
            Step::Gating => "gating",
            Step::Applying => "applying",
            Step::Skipping => "skipping",
            Step::Done => "done",
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
