//! Workflow engine: drives one run through the step machine.
//!
//! Steps execute strictly in sequence. Each step reads the current
//! [`RunState`], produces a [`StateUpdate`], and the engine merges it,
//! picks the next step, and publishes a snapshot.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::WorkflowError;
use crate::evidence::{self, GroundingSummary};
use crate::jobboard::JobBoard;
use crate::llm::Personalizer;
use crate::model::{ApplicationStatus, GeneratedMaterials, QueueItem};
use crate::safety;
use crate::scoring::ScoringEngine;
use crate::store::ApplicationStore;
use crate::workflow::events::{EventHub, ProgressEvent};
use crate::workflow::state::{RunSnapshot, RunState, RunStatus, StateUpdate};
use crate::workflow::step::Step;
use crate::workflow::submission::SubmissionCoordinator;

/// Latest published view of a run, shared with the supervisor.
pub type SharedSnapshot = Arc<RwLock<RunSnapshot>>;

pub struct WorkflowEngine {
    board: Arc<dyn JobBoard>,
    store: Arc<dyn ApplicationStore>,
    scoring: Arc<ScoringEngine>,
    personalizer: Arc<Personalizer>,
    submissions: Arc<SubmissionCoordinator>,
    events: Arc<EventHub>,
}

impl WorkflowEngine {
    pub fn new(
        board: Arc<dyn JobBoard>,
        store: Arc<dyn ApplicationStore>,
        scoring: Arc<ScoringEngine>,
        personalizer: Arc<Personalizer>,
        submissions: Arc<SubmissionCoordinator>,
        events: Arc<EventHub>,
    ) -> Self {
        Self {
            board,
            store,
            scoring,
            personalizer,
            submissions,
            events,
        }
    }

    pub fn events(&self) -> &Arc<EventHub> {
        &self.events
    }

    /// Run to the terminal step.
    ///
    /// Per-item failures are recorded in the state and never end the run.
    /// Only a fetch failure or a broken invariant returns an error.
    pub async fn run(
        &self,
        mut state: RunState,
        snapshot: &SharedSnapshot,
    ) -> Result<(), WorkflowError> {
        let mut step = Step::INITIAL;
        info!(subject = %state.subject, run_id = %state.run_id, "Workflow run started");

        while !step.is_terminal() {
            debug!(subject = %state.subject, step = %step, cursor = state.cursor, "Executing step");
            let update = match self.execute(step, &state).await {
                Ok(update) => update,
                Err(e) => {
                    warn!(subject = %state.subject, step = %step, error = %e, "Run aborted");
                    *snapshot.write().await = state.snapshot(RunStatus::Running);
                    return Err(e);
                }
            };
            state.merge(update);
            if step.advances_cursor() {
                let cursor = state.cursor + 1;
                state.merge(StateUpdate::advance(cursor));
            }

            let next = step.next(&state);
            *snapshot.write().await = state.snapshot(RunStatus::Running);
            step = next;
        }

        info!(
            subject = %state.subject,
            submitted = state.submitted_count(),
            failed = state.failed_count(),
            "Workflow run finished"
        );
        Ok(())
    }

    async fn execute(&self, step: Step, state: &RunState) -> Result<StateUpdate, WorkflowError> {
        match step {
            Step::Fetching => self.fetch(state).await,
            Step::Personalizing => self.personalize(state).await,
            Step::Grounding => Ok(self.ground(state)),
            Step::Gating => self.gate(state),
            Step::Applying => self.apply(state).await,
            Step::Skipping => self.skip(state),
            Step::Done => Ok(StateUpdate::default()),
        }
    }

    async fn fetch(&self, state: &RunState) -> Result<StateUpdate, WorkflowError> {
        let postings = self.board.fetch_queue().await?;
        let fetched = postings.len();

        let mut applied: HashSet<String> = state.applied.clone();
        let mut update = StateUpdate::default();
        match self.store.list_by_subject(&state.subject).await {
            Ok(records) => applied.extend(records.into_iter().map(|r| r.posting_id)),
            Err(e) => {
                warn!(subject = %state.subject, error = %e, "Could not load application history");
                update = update.error(format!("Could not load application history: {e}"));
            }
        }

        let ranking = self
            .scoring
            .rank(postings, &state.profile, &state.policy, &applied)
            .await;

        self.events.publish(ProgressEvent::QueueFetched {
            subject: state.subject.clone(),
            total: ranking.queue.len(),
        });

        update = update.log(format!("Fetched {fetched} postings"));
        update.logs.extend(ranking.logs);
        update.queue = Some(ranking.queue);
        update.cursor = Some(0);
        Ok(update)
    }

    async fn personalize(&self, state: &RunState) -> Result<StateUpdate, WorkflowError> {
        let item = state
            .queue
            .get(state.cursor)
            .cloned()
            .ok_or_else(|| {
                WorkflowError::InvalidState(format!(
                    "cursor {} outside queue of {}",
                    state.cursor,
                    state.queue.len()
                ))
            })?;

        self.events.publish(ProgressEvent::ItemProcessing {
            subject: state.subject.clone(),
            posting_id: item.posting.id.clone(),
            title: item.posting.title.clone(),
            organization: item.posting.organization.clone(),
            index: state.cursor,
            total: state.queue.len(),
        });

        let title = describe(&item);
        let mut update = match self.personalizer.personalize(&item.posting, &state.profile).await {
            Ok(p) => StateUpdate {
                materials: Some(p.materials),
                evidence: Some(p.evidence),
                ..Default::default()
            }
            .log(format!("Generated materials for {title}")),
            Err(e) => {
                warn!(subject = %state.subject, posting_id = %item.posting.id, error = %e, "Personalization failed");
                StateUpdate {
                    materials: Some(GeneratedMaterials::default()),
                    evidence: Some(Vec::new()),
                    ..Default::default()
                }
                .error(format!("Personalization failed for {title}: {e}"))
                .log(format!("Personalization failed for {title}, continuing with empty materials"))
            }
        };
        update.current = Some(Some(item));
        Ok(update)
    }

    fn ground(&self, state: &RunState) -> StateUpdate {
        let grounded = evidence::ground(
            &state.evidence,
            &state.profile.fact_bank,
            &state.profile.proof_set,
        );
        let summary = GroundingSummary::of(&grounded);
        StateUpdate {
            evidence: Some(grounded),
            ..Default::default()
        }
        .log(format!(
            "Evidence grounded: {}/{} claims",
            summary.grounded, summary.total
        ))
    }

    fn gate(&self, state: &RunState) -> Result<StateUpdate, WorkflowError> {
        let item = current(state)?;
        let verdict = safety::check(
            item,
            &state.materials,
            &state.evidence,
            &state.policy,
            &state.profile.fact_bank,
        );

        let mut update = StateUpdate::default();
        for warning in &verdict.warnings {
            debug!(subject = %state.subject, posting_id = %item.posting.id, warning = %warning, "Gate warning");
            update = update.log(format!("Warning: {warning}"));
        }
        let title = describe(item);
        if verdict.passed {
            update = update.log(format!("Safety checks passed for {title}"));
        } else {
            for failure in &verdict.errors {
                update = update.error(format!("{title}: {failure}"));
            }
            update = update.log(format!(
                "Safety checks failed for {title} ({} blocking)",
                verdict.errors.len()
            ));
        }
        update.verdict = Some(Some(verdict));
        Ok(update)
    }

    async fn apply(&self, state: &RunState) -> Result<StateUpdate, WorkflowError> {
        let item = current(state)?;

        if state.cancel.is_cancelled() {
            info!(subject = %state.subject, posting_id = %item.posting.id, "Run cancelled before submission");
            self.events.publish(ProgressEvent::ItemSkipped {
                subject: state.subject.clone(),
                posting_id: item.posting.id.clone(),
                title: item.posting.title.clone(),
                reason: "run cancelled".to_string(),
            });
            return Ok(StateUpdate::default().log(format!(
                "Run cancelled, {} not submitted",
                describe(item)
            )));
        }

        let record = self
            .submissions
            .submit(
                &state.subject,
                item,
                &state.profile,
                &state.materials,
                &state.evidence,
            )
            .await;

        self.events.publish(ProgressEvent::ItemResult {
            subject: state.subject.clone(),
            posting_id: record.posting_id.clone(),
            title: record.posting_title.clone(),
            organization: record.organization.clone(),
            status: record.status,
            confirmation_id: record.confirmation_id.clone(),
            error: record.error.clone(),
        });

        let title = describe(item);
        let update = match record.status {
            ApplicationStatus::Submitted => StateUpdate::default().log(format!(
                "Applied to {title} (confirmation: {})",
                record.confirmation_id.as_deref().unwrap_or_default()
            )),
            ApplicationStatus::AlreadyApplied => {
                StateUpdate::default().log(format!("Already applied to {title}, skipping"))
            }
            ApplicationStatus::Failed => {
                let error = record.error.clone().unwrap_or_default();
                StateUpdate::default()
                    .error(format!(
                        "Failed to apply to {title} after {} attempts: {error}",
                        record.retry_count
                    ))
                    .log(format!("Failed to apply to {title}: {error}"))
            }
        };
        Ok(StateUpdate {
            submissions: vec![record],
            ..update
        })
    }

    fn skip(&self, state: &RunState) -> Result<StateUpdate, WorkflowError> {
        let item = current(state)?;
        let reason = state
            .verdict
            .as_ref()
            .and_then(|v| v.primary_error())
            .unwrap_or("blocked by policy gate")
            .to_string();

        info!(subject = %state.subject, posting_id = %item.posting.id, reason = %reason, "Item skipped");
        self.events.publish(ProgressEvent::ItemSkipped {
            subject: state.subject.clone(),
            posting_id: item.posting.id.clone(),
            title: item.posting.title.clone(),
            reason: reason.clone(),
        });
        Ok(StateUpdate::default().log(format!("Skipped {}: {reason}", describe(item))))
    }
}

fn current(state: &RunState) -> Result<&QueueItem, WorkflowError> {
    state
        .current
        .as_ref()
        .ok_or_else(|| WorkflowError::InvalidState("no current item".to_string()))
}

fn describe(item: &QueueItem) -> String {
    format!("{} at {}", item.posting.title, item.posting.organization)
}
