//! Per-subject application workflow.
//!
//! - `state`: run state with its central merge
//! - `step`: the step machine and its transition function
//! - `engine`: executes steps against the collaborators
//! - `submission`: retrying submission coordinator
//! - `events`: progress events and per-subject fan-out
//! - `supervisor`: registry of runs keyed by subject

pub mod engine;
pub mod events;
pub mod state;
pub mod step;
pub mod submission;
pub mod supervisor;

pub use engine::{SharedSnapshot, WorkflowEngine};
pub use events::{EventHub, EventSubscription, ProgressEvent};
pub use state::{CancelFlag, RunSnapshot, RunState, RunStatus, StateUpdate};
pub use step::Step;
pub use submission::{RetryConfig, SubmissionCoordinator, build_resume_text};
pub use supervisor::{RunResults, RunStatusReport, RunSupervisor, StartRequest};
