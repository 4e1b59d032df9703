//! Run supervisor: one background run per subject.
//!
//! The registry of subject -> run handle is the only state shared between
//! callers. Each run owns its [`RunState`]; callers only ever see the
//! published [`RunSnapshot`].

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::{SupervisorError, WorkflowError};
use crate::model::{ApplicationRecord, Policy, Profile, QueueItem};
use crate::workflow::engine::{SharedSnapshot, WorkflowEngine};
use crate::workflow::events::{EventSubscription, ProgressEvent};
use crate::workflow::state::{CancelFlag, RunState, RunStatus};

/// Parameters for a new run.
#[derive(Debug, Clone, Deserialize)]
pub struct StartRequest {
    pub subject: String,
    pub profile: Profile,
    #[serde(default)]
    pub policy: Policy,
    #[serde(default)]
    pub applied_posting_ids: Vec<String>,
}

/// Progress counts for a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunStatusReport {
    pub run_id: Uuid,
    pub subject: String,
    pub status: RunStatus,
    pub submitted: usize,
    pub failed: usize,
    pub cursor: usize,
    pub total: usize,
    pub logs: Vec<String>,
    pub errors: Vec<String>,
}

/// Everything a run accumulated.
#[derive(Debug, Clone, Serialize)]
pub struct RunResults {
    pub run_id: Uuid,
    pub subject: String,
    pub status: RunStatus,
    pub queue: Vec<QueueItem>,
    pub submissions: Vec<ApplicationRecord>,
    pub logs: Vec<String>,
    pub errors: Vec<String>,
}

struct RunHandle {
    cancel: CancelFlag,
    snapshot: SharedSnapshot,
    task: Option<JoinHandle<()>>,
}

pub struct RunSupervisor {
    engine: Arc<WorkflowEngine>,
    runs: RwLock<HashMap<String, RunHandle>>,
    status_log_lines: usize,
}

impl RunSupervisor {
    pub fn new(engine: Arc<WorkflowEngine>, status_log_lines: usize) -> Self {
        Self {
            engine,
            runs: RwLock::new(HashMap::new()),
            status_log_lines,
        }
    }

    /// Launch a run for `request.subject`.
    ///
    /// Rejects when that subject already has a running run. A finished run
    /// is replaced.
    pub async fn start(&self, request: StartRequest) -> Result<Uuid, SupervisorError> {
        request.profile.validate()?;
        let subject = request.subject;

        let mut runs = self.runs.write().await;
        if let Some(existing) = runs.get(&subject) {
            if existing.snapshot.read().await.status == RunStatus::Running {
                return Err(SupervisorError::AlreadyRunning { subject });
            }
        }

        let cancel = CancelFlag::new();
        let state = RunState::new(
            subject.clone(),
            Arc::new(request.profile),
            Arc::new(request.policy),
            request.applied_posting_ids.into_iter().collect::<HashSet<_>>(),
            cancel.clone(),
        );
        let run_id = state.run_id;
        let snapshot: SharedSnapshot = Arc::new(RwLock::new(state.snapshot(RunStatus::Running)));

        let events = Arc::clone(self.engine.events());
        events.publish(ProgressEvent::RunStarted {
            subject: subject.clone(),
            run_id,
        });
        info!(subject = %subject, run_id = %run_id, "Run started");

        let engine = Arc::clone(&self.engine);
        let published = Arc::clone(&snapshot);
        let task = tokio::spawn(async move {
            let inner = {
                let published = Arc::clone(&published);
                tokio::spawn(async move { engine.run(state, &published).await })
            };
            let outcome = match inner.await {
                Ok(result) => result,
                Err(join) => Err(WorkflowError::Panicked(panic_message(join))),
            };

            let mut snapshot = published.write().await;
            match outcome {
                Ok(()) => {
                    snapshot.status = RunStatus::Completed;
                    info!(subject = %snapshot.subject, submitted = snapshot.submitted(), "Run completed");
                }
                Err(e) => {
                    snapshot.status = RunStatus::Failed;
                    snapshot.errors.push(e.to_string());
                    error!(subject = %snapshot.subject, error = %e, "Run failed");
                }
            }
            if let Some(event) = ProgressEvent::terminal_for(&snapshot) {
                events.publish(event);
            }
        });

        runs.insert(
            subject,
            RunHandle {
                cancel,
                snapshot,
                task: Some(task),
            },
        );
        Ok(run_id)
    }

    pub async fn status(&self, subject: &str) -> Result<RunStatusReport, SupervisorError> {
        let snapshot = self.snapshot(subject).await?;
        let snapshot = snapshot.read().await;
        Ok(RunStatusReport {
            run_id: snapshot.run_id,
            subject: snapshot.subject.clone(),
            status: snapshot.status,
            submitted: snapshot.submitted(),
            failed: snapshot.failed(),
            cursor: snapshot.cursor,
            total: snapshot.queue.len(),
            logs: snapshot.recent_logs(self.status_log_lines).to_vec(),
            errors: snapshot.errors.clone(),
        })
    }

    pub async fn results(&self, subject: &str) -> Result<RunResults, SupervisorError> {
        let snapshot = self.snapshot(subject).await?;
        let snapshot = snapshot.read().await;
        Ok(RunResults {
            run_id: snapshot.run_id,
            subject: snapshot.subject.clone(),
            status: snapshot.status,
            queue: snapshot.queue.clone(),
            submissions: snapshot.submissions.clone(),
            logs: snapshot.logs.clone(),
            errors: snapshot.errors.clone(),
        })
    }

    /// Request cancellation. Returns without waiting for the run to stop.
    pub async fn cancel(&self, subject: &str) -> Result<(), SupervisorError> {
        let runs = self.runs.read().await;
        let handle = runs.get(subject).ok_or_else(|| not_found(subject))?;
        handle.cancel.cancel();
        info!(subject = %subject, "Cancellation requested");
        Ok(())
    }

    /// Observe a subject's progress events.
    ///
    /// Subscribing to a finished run yields its terminal event and ends,
    /// unless a new run for the subject has published by the first read.
    pub async fn subscribe(&self, subject: &str) -> EventSubscription {
        let subscription = self.engine.events().subscribe(subject);
        let finished = match self.snapshot(subject).await {
            Ok(snapshot) => ProgressEvent::terminal_for(&*snapshot.read().await),
            Err(_) => None,
        };
        match finished {
            Some(event) => subscription.with_replay(event),
            None => subscription,
        }
    }

    /// Wait for the subject's current run to finish and return its status.
    pub async fn join(&self, subject: &str) -> Result<RunStatus, SupervisorError> {
        let (task, snapshot) = {
            let mut runs = self.runs.write().await;
            let handle = runs.get_mut(subject).ok_or_else(|| not_found(subject))?;
            (handle.task.take(), Arc::clone(&handle.snapshot))
        };
        if let Some(task) = task {
            let _ = task.await;
        }
        let status = snapshot.read().await.status;
        Ok(status)
    }

    async fn snapshot(&self, subject: &str) -> Result<SharedSnapshot, SupervisorError> {
        let runs = self.runs.read().await;
        runs.get(subject)
            .map(|h| Arc::clone(&h.snapshot))
            .ok_or_else(|| not_found(subject))
    }
}

fn not_found(subject: &str) -> SupervisorError {
    SupervisorError::NotFound {
        subject: subject.to_string(),
    }
}

fn panic_message(join: tokio::task::JoinError) -> String {
    if join.is_cancelled() {
        return "run task was cancelled".to_string();
    }
    let payload: Box<dyn Any + Send> = join.into_panic();
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
