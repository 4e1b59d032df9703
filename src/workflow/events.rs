//! Progress events and per-subject fan-out.
//!
//! Each subject gets its own broadcast channel, created on first
//! subscription. An [`EventSubscription`] tears the channel down when it
//! sees a terminal event or is dropped, provided it was the last receiver.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::model::ApplicationStatus;
use crate::workflow::state::{RunSnapshot, RunStatus};

const CHANNEL_CAPACITY: usize = 256;

/// Events streamed to observers of a run, in transition order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    RunStarted {
        subject: String,
        run_id: Uuid,
    },
    QueueFetched {
        subject: String,
        total: usize,
    },
    ItemProcessing {
        subject: String,
        posting_id: String,
        title: String,
        organization: String,
        index: usize,
        total: usize,
    },
    ItemResult {
        subject: String,
        posting_id: String,
        title: String,
        organization: String,
        status: ApplicationStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        confirmation_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    ItemSkipped {
        subject: String,
        posting_id: String,
        title: String,
        reason: String,
    },
    RunCompleted {
        subject: String,
        run_id: Uuid,
        submitted: usize,
        failed: usize,
    },
    RunFailed {
        subject: String,
        run_id: Uuid,
        error: String,
    },
}

impl ProgressEvent {
    pub fn subject(&self) -> &str {
        match self {
            Self::RunStarted { subject, .. }
            | Self::QueueFetched { subject, .. }
            | Self::ItemProcessing { subject, .. }
            | Self::ItemResult { subject, .. }
            | Self::ItemSkipped { subject, .. }
            | Self::RunCompleted { subject, .. }
            | Self::RunFailed { subject, .. } => subject,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::RunCompleted { .. } | Self::RunFailed { .. })
    }

    /// Matches the serde tag.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::RunStarted { .. } => "run_started",
            Self::QueueFetched { .. } => "queue_fetched",
            Self::ItemProcessing { .. } => "item_processing",
            Self::ItemResult { .. } => "item_result",
            Self::ItemSkipped { .. } => "item_skipped",
            Self::RunCompleted { .. } => "run_completed",
            Self::RunFailed { .. } => "run_failed",
        }
    }

    /// The terminal event describing a finished run, if it has finished.
    pub fn terminal_for(snapshot: &RunSnapshot) -> Option<Self> {
        match snapshot.status {
            RunStatus::Running => None,
            RunStatus::Completed => Some(Self::RunCompleted {
                subject: snapshot.subject.clone(),
                run_id: snapshot.run_id,
                submitted: snapshot.submitted(),
                failed: snapshot.failed(),
            }),
            RunStatus::Failed => Some(Self::RunFailed {
                subject: snapshot.subject.clone(),
                run_id: snapshot.run_id,
                error: snapshot
                    .errors
                    .last()
                    .cloned()
                    .unwrap_or_else(|| "run failed".to_string()),
            }),
        }
    }
}

/// Registry of per-subject broadcast channels.
#[derive(Debug, Default)]
pub struct EventHub {
    channels: Mutex<HashMap<String, broadcast::Sender<ProgressEvent>>>,
}

impl EventHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Subscribe to a subject's events, creating its channel if needed.
    pub fn subscribe(self: &Arc<Self>, subject: &str) -> EventSubscription {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        let rx = channels
            .entry(subject.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe();
        debug!(subject = %subject, "Progress subscriber attached");

        EventSubscription {
            hub: Arc::clone(self),
            subject: subject.to_string(),
            rx: Some(rx),
            replay: None,
        }
    }

    /// Deliver an event to the subject's observers. Dropped when nobody
    /// is subscribed.
    pub fn publish(&self, event: ProgressEvent) {
        let channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(tx) = channels.get(event.subject()) {
            let _ = tx.send(event);
        }
    }

    pub fn has_channel(&self, subject: &str) -> bool {
        self.channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(subject)
    }

    fn release(&self, subject: &str) {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        if channels
            .get(subject)
            .is_some_and(|tx| tx.receiver_count() == 0)
        {
            channels.remove(subject);
            debug!(subject = %subject, "Progress channel torn down");
        }
    }
}

/// One observer's view of a subject's events.
pub struct EventSubscription {
    hub: Arc<EventHub>,
    subject: String,
    rx: Option<broadcast::Receiver<ProgressEvent>>,
    replay: Option<ProgressEvent>,
}

impl EventSubscription {
    /// Deliver `event` first, unless the channel already holds newer events
    /// when the subscription is first read. A run started after the
    /// snapshot was taken supersedes the replay.
    pub fn with_replay(mut self, event: ProgressEvent) -> Self {
        self.replay = Some(event);
        self
    }

    /// Next event, or `None` once a terminal event has been delivered.
    pub async fn next(&mut self) -> Option<ProgressEvent> {
        if let Some(replay) = self.replay.take() {
            match self.rx.as_mut().map(|rx| rx.try_recv()) {
                Some(Ok(event)) => {
                    debug!(subject = %self.subject, "Newer run in progress, replay dropped");
                    return Some(self.deliver(event));
                }
                Some(Err(broadcast::error::TryRecvError::Lagged(n))) => {
                    warn!(subject = %self.subject, missed = n, "Progress subscriber lagged");
                }
                _ => return Some(self.deliver(replay)),
            }
        }

        loop {
            let rx = self.rx.as_mut()?;
            match rx.recv().await {
                Ok(event) => return Some(self.deliver(event)),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(subject = %self.subject, missed = n, "Progress subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    self.finish();
                    return None;
                }
            }
        }
    }

    fn deliver(&mut self, event: ProgressEvent) -> ProgressEvent {
        if event.is_terminal() {
            self.finish();
        }
        event
    }

    fn finish(&mut self) {
        if self.rx.take().is_some() {
            self.hub.release(&self.subject);
        }
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        self.finish();
    }
}
