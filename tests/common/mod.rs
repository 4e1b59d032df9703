//! Stub collaborators shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use autoapply::app::Services;
use autoapply::error::{JobBoardError, LlmError, SubmitError};
use autoapply::jobboard::{ApplicationPayload, JobBoard, SubmitReceipt};
use autoapply::llm::{CompletionRequest, CompletionResponse, LlmProvider, PersonalizerConfig};
use autoapply::model::{Constraints, Fact, Policy, Posting, Profile};
use autoapply::scoring::ScoringEngine;
use autoapply::store::{ApplicationStore, InMemoryStore};
use autoapply::workflow::RetryConfig;

/// Maximum time any test is allowed to run before we consider it hung.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

pub const MATERIALS_JSON: &str = r#"{
    "tailored_resume_sections": {
        "summary": "Backend engineer who ships Python and Go services",
        "selected_bullets": ["f1"],
        "skills_to_highlight": ["python", "go"]
    },
    "cover_letter": "I would love to help your team ship reliable services.",
    "requirement_evidence_map": [
        {"requirement": "Python", "evidence": "Built a Python ingestion service", "evidence_source": "f1", "confidence": "strong"},
        {"requirement": "Kubernetes", "evidence": "Ran clusters", "evidence_source": "nowhere", "confidence": "weak"}
    ]
}"#;

/// Lets a test hold a collaborator call until it says go.
#[derive(Default)]
pub struct Hold {
    pub entered: Notify,
    pub release: Notify,
}

impl Hold {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    async fn pass(&self) {
        self.entered.notify_one();
        self.release.notified().await;
    }
}

pub enum LlmBehavior {
    Materials,
    Fail,
    Panic,
}

/// Stub generation service.
pub struct StubLlm {
    behavior: LlmBehavior,
    hold: Option<Arc<Hold>>,
}

impl StubLlm {
    pub fn new(behavior: LlmBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            hold: None,
        })
    }

    /// Every call waits on `hold` before answering.
    pub fn held(hold: Arc<Hold>) -> Arc<Self> {
        Arc::new(Self {
            behavior: LlmBehavior::Materials,
            hold: Some(hold),
        })
    }
}

#[async_trait]
impl LlmProvider for StubLlm {
    fn model_name(&self) -> &str {
        "stub"
    }

    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        if let Some(hold) = &self.hold {
            hold.pass().await;
        }
        match self.behavior {
            LlmBehavior::Materials => Ok(CompletionResponse {
                content: MATERIALS_JSON.to_string(),
                input_tokens: 0,
                output_tokens: 0,
            }),
            LlmBehavior::Fail => Err(LlmError::RequestFailed {
                provider: "stub".into(),
                reason: "generation service unavailable".into(),
            }),
            LlmBehavior::Panic => panic!("stub generator exploded"),
        }
    }
}

/// Stub job board with a scripted submit sequence.
///
/// Once the script runs out every submission succeeds.
pub struct StubBoard {
    postings: Vec<Posting>,
    fail_fetch: bool,
    script: Mutex<VecDeque<Result<SubmitReceipt, SubmitError>>>,
    submitted: Mutex<Vec<String>>,
    hold_first_submit: Option<Arc<Hold>>,
}

impl StubBoard {
    pub fn new(postings: Vec<Posting>) -> Self {
        Self {
            postings,
            fail_fetch: false,
            script: Mutex::new(VecDeque::new()),
            submitted: Mutex::new(Vec::new()),
            hold_first_submit: None,
        }
    }

    pub fn failing_fetch() -> Self {
        Self {
            fail_fetch: true,
            ..Self::new(Vec::new())
        }
    }

    pub fn with_script(self, script: Vec<Result<SubmitReceipt, SubmitError>>) -> Self {
        *self.script.lock().unwrap() = script.into();
        self
    }

    pub fn with_hold(mut self, hold: Arc<Hold>) -> Self {
        self.hold_first_submit = Some(hold);
        self
    }

    pub fn posting_count(&self) -> usize {
        self.postings.len()
    }

    /// Posting ids of every submit call, in order.
    pub fn submit_calls(&self) -> Vec<String> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobBoard for StubBoard {
    async fn fetch_queue(&self) -> Result<Vec<Posting>, JobBoardError> {
        if self.fail_fetch {
            return Err(JobBoardError::Status {
                status: 503,
                body: "maintenance".into(),
            });
        }
        Ok(self.postings.clone())
    }

    async fn submit(&self, payload: &ApplicationPayload) -> Result<SubmitReceipt, SubmitError> {
        let first = {
            let mut submitted = self.submitted.lock().unwrap();
            submitted.push(payload.job_id.clone());
            submitted.len() == 1
        };
        if first {
            if let Some(hold) = &self.hold_first_submit {
                hold.pass().await;
            }
        }

        let scripted = self.script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| {
            Ok(SubmitReceipt {
                confirmation_id: format!("conf_{}", payload.job_id),
            })
        })
    }
}

pub fn profile() -> Profile {
    Profile {
        full_name: "Ada Lovelace".into(),
        email: "ada@example.com".into(),
        skills: vec!["python".into(), "go".into()],
        fact_bank: vec![Fact {
            id: "f1".into(),
            text: "Built a Python ingestion service handling 1M events per day".into(),
            source: "Acme internship".into(),
            skills_demonstrated: vec!["python".into()],
            ..Default::default()
        }],
        constraints: Constraints {
            open_to_remote: true,
            ..Default::default()
        },
        ..Default::default()
    }
}

/// A posting the default profile matches well (score >= 85).
pub fn posting(id: &str, organization: &str) -> Posting {
    Posting {
        id: id.into(),
        title: "Backend Engineer".into(),
        organization: organization.into(),
        description: "We build services in python and go.".into(),
        requirements: vec!["Python".into()],
        location: "Remote".into(),
        remote: true,
        experience_required: 0,
    }
}

pub fn policy(max: usize, threshold: f64) -> Policy {
    Policy {
        max_applications_per_day: max,
        min_match_threshold: threshold,
        ..Default::default()
    }
}

pub fn services(
    board: Arc<dyn JobBoard>,
    llm: Arc<dyn LlmProvider>,
    store: Arc<dyn ApplicationStore>,
) -> Services {
    Services {
        board,
        store,
        llm,
        scoring: ScoringEngine::rules_only(),
        personalizer: PersonalizerConfig::default(),
        retry: RetryConfig {
            max_attempts: 3,
            base_delay: Duration::ZERO,
            max_wait: Duration::ZERO,
        },
        status_log_lines: 20,
        keepalive: Duration::from_secs(15),
    }
}

pub fn memory_store() -> Arc<InMemoryStore> {
    Arc::new(InMemoryStore::new())
}
