//! Run state threaded through the workflow state machine.
//!
//! Fields fall into two groups. Overwrite fields (queue, cursor, current
//! item, materials, evidence, verdict) are replaced by each update that sets
//! them. Accumulator fields (submissions, errors, logs) only ever grow.
//! [`RunState::merge`] is the single place that applies those rules.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{
    ApplicationRecord, ApplicationStatus, EvidenceEntry, GeneratedMaterials, Policy, Profile,
    QueueItem,
};
use crate::safety::GateVerdict;

/// Shared cancellation flag. Setting it never interrupts in-flight work;
/// the engine observes it before each submission.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Mutable state of one subject's run.
#[derive(Debug)]
pub struct RunState {
    pub run_id: Uuid,
    pub subject: String,
    pub profile: Arc<Profile>,
    pub policy: Arc<Policy>,
    /// Posting ids passed in by the caller as already applied.
    pub applied: HashSet<String>,
    pub cancel: CancelFlag,

    // Overwrite fields
    pub queue: Vec<QueueItem>,
    pub cursor: usize,
    pub current: Option<QueueItem>,
    pub materials: GeneratedMaterials,
    pub evidence: Vec<EvidenceEntry>,
    pub verdict: Option<GateVerdict>,

    // Accumulator fields
    pub submissions: Vec<ApplicationRecord>,
    pub errors: Vec<String>,
    pub logs: Vec<String>,
}

impl RunState {
    pub fn new(
        subject: impl Into<String>,
        profile: Arc<Profile>,
        policy: Arc<Policy>,
        applied: HashSet<String>,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            subject: subject.into(),
            profile,
            policy,
            applied,
            cancel,
            queue: Vec::new(),
            cursor: 0,
            current: None,
            materials: GeneratedMaterials::default(),
            evidence: Vec::new(),
            verdict: None,
            submissions: Vec::new(),
            errors: Vec::new(),
            logs: Vec::new(),
        }
    }

    /// Apply one step's update: overwrite fields replace, accumulators append.
    pub fn merge(&mut self, update: StateUpdate) {
        if let Some(queue) = update.queue {
            self.queue = queue;
        }
        if let Some(cursor) = update.cursor {
            self.cursor = cursor;
        }
        if let Some(current) = update.current {
            self.current = current;
        }
        if let Some(materials) = update.materials {
            self.materials = materials;
        }
        if let Some(evidence) = update.evidence {
            self.evidence = evidence;
        }
        if let Some(verdict) = update.verdict {
            self.verdict = verdict;
        }

        self.submissions.extend(update.submissions);
        self.errors.extend(update.errors);
        self.logs.extend(update.logs);
    }

    pub fn submitted_count(&self) -> usize {
        self.count(ApplicationStatus::Submitted)
    }

    pub fn failed_count(&self) -> usize {
        self.count(ApplicationStatus::Failed)
    }

    fn count(&self, status: ApplicationStatus) -> usize {
        self.submissions.iter().filter(|r| r.status == status).count()
    }

    /// Whether the loop ends here. Checked after the cursor has moved past
    /// the finished item.
    pub fn should_stop(&self) -> bool {
        self.cancel.is_cancelled()
            || self.submitted_count() >= self.policy.max_applications_per_day
            || self.cursor >= self.queue.len()
    }

    pub fn snapshot(&self, status: RunStatus) -> RunSnapshot {
        RunSnapshot {
            run_id: self.run_id,
            subject: self.subject.clone(),
            status,
            queue: self.queue.clone(),
            cursor: self.cursor,
            submissions: self.submissions.clone(),
            logs: self.logs.clone(),
            errors: self.errors.clone(),
        }
    }
}

/// Changes produced by one step.
///
/// `None` leaves an overwrite field untouched. `current` and `verdict` are
/// doubly optional so a step can explicitly clear them.
#[derive(Debug, Default)]
pub struct StateUpdate {
    pub queue: Option<Vec<QueueItem>>,
    pub cursor: Option<usize>,
    pub current: Option<Option<QueueItem>>,
    pub materials: Option<GeneratedMaterials>,
    pub evidence: Option<Vec<EvidenceEntry>>,
    pub verdict: Option<Option<GateVerdict>>,
    pub submissions: Vec<ApplicationRecord>,
    pub errors: Vec<String>,
    pub logs: Vec<String>,
}

impl StateUpdate {
    pub fn log(mut self, line: impl Into<String>) -> Self {
        self.logs.push(line.into());
        self
    }

    pub fn error(mut self, message: impl Into<String>) -> Self {
        self.errors.push(message.into());
        self
    }

    /// Move to the next queue position and clear the per-item fields.
    pub fn advance(cursor: usize) -> Self {
        Self {
            cursor: Some(cursor),
            current: Some(None),
            materials: Some(GeneratedMaterials::default()),
            evidence: Some(Vec::new()),
            verdict: Some(None),
            ..Default::default()
        }
    }
}

/// Read-only view of a run published after every step.
#[derive(Debug, Clone, Serialize)]
pub struct RunSnapshot {
    pub run_id: Uuid,
    pub subject: String,
    pub status: RunStatus,
    pub queue: Vec<QueueItem>,
    pub cursor: usize,
    pub submissions: Vec<ApplicationRecord>,
    pub logs: Vec<String>,
    pub errors: Vec<String>,
}

impl RunSnapshot {
    pub fn submitted(&self) -> usize {
        self.submissions
            .iter()
            .filter(|r| r.status == ApplicationStatus::Submitted)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.submissions
            .iter()
            .filter(|r| r.status == ApplicationStatus::Failed)
            .count()
    }

    /// The last `n` log lines.
    pub fn recent_logs(&self, n: usize) -> &[String] {
        let start = self.logs.len().saturating_sub(n);
        &self.logs[start..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn state() -> RunState {
        RunState::new(
            "alice",
            Arc::new(Profile::default()),
            Arc::new(Policy::default()),
            HashSet::new(),
            CancelFlag::new(),
        )
    }

    fn record(status: ApplicationStatus) -> ApplicationRecord {
        ApplicationRecord {
            subject: "alice".into(),
            posting_id: "p1".into(),
            posting_title: "Dev".into(),
            organization: "Acme".into(),
            status,
            confirmation_id: None,
            submitted_at: None,
            error: None,
            retry_count: 0,
            materials: GeneratedMaterials::default(),
            evidence: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn accumulators_append_and_overwrites_replace() {
        let mut state = state();
        state.merge(StateUpdate {
            cursor: Some(3),
            submissions: vec![record(ApplicationStatus::Submitted)],
            ..Default::default()
        }
        .log("first"));
        state.merge(StateUpdate {
            cursor: Some(4),
            submissions: vec![record(ApplicationStatus::Failed)],
            ..Default::default()
        }
        .log("second")
        .error("boom"));

        assert_eq!(state.cursor, 4);
        assert_eq!(state.logs, vec!["first", "second"]);
        assert_eq!(state.errors, vec!["boom"]);
        assert_eq!(state.submitted_count(), 1);
        assert_eq!(state.failed_count(), 1);
    }

    #[test]
    fn empty_update_changes_nothing() {
        let mut state = state();
        state.merge(StateUpdate {
            materials: Some(GeneratedMaterials {
                summary: "kept".into(),
                ..Default::default()
            }),
            ..Default::default()
        });
        state.merge(StateUpdate::default());
        assert_eq!(state.materials.summary, "kept");
    }

    #[test]
    fn advance_clears_item_fields() {
        let mut state = state();
        state.merge(StateUpdate {
            materials: Some(GeneratedMaterials {
                summary: "old".into(),
                ..Default::default()
            }),
            verdict: Some(Some(GateVerdict::default())),
            ..Default::default()
        });
        state.merge(StateUpdate::advance(1));
        assert_eq!(state.cursor, 1);
        assert!(state.materials.is_empty());
        assert!(state.verdict.is_none());
        assert!(state.current.is_none());
    }

    #[test]
    fn cancel_flag_is_shared() {
        let state = state();
        let handle = state.cancel.clone();
        handle.cancel();
        assert!(state.cancel.is_cancelled());
        assert!(state.should_stop());
    }

    #[test]
    fn recent_logs_takes_tail() {
        let mut state = state();
        for i in 0..5 {
            state.merge(StateUpdate::default().log(format!("line {i}")));
        }
        let snapshot = state.snapshot(RunStatus::Running);
        assert_eq!(snapshot.recent_logs(2), ["line 3", "line 4"]);
        assert_eq!(snapshot.recent_logs(10).len(), 5);
    }
}
