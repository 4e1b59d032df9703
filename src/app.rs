//! Service wiring: collaborators in, routable state out.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::api::ApiState;
use crate::config::AppConfig;
use crate::error::Result;
use crate::jobboard::{HttpJobBoard, JobBoard};
use crate::llm::{AnthropicProvider, LlmProvider, OpenAiEmbeddings, Personalizer, PersonalizerConfig};
use crate::scoring::{EmbeddingSimilarity, ScoringEngine};
use crate::store::{ApplicationStore, FallbackStore, LibSqlBackend};
use crate::workflow::{EventHub, RetryConfig, RunSupervisor, SubmissionCoordinator, WorkflowEngine};

/// The collaborators and tunables a running service is built from.
pub struct Services {
    pub board: Arc<dyn JobBoard>,
    pub store: Arc<dyn ApplicationStore>,
    pub llm: Arc<dyn LlmProvider>,
    pub scoring: ScoringEngine,
    pub personalizer: PersonalizerConfig,
    pub retry: RetryConfig,
    pub status_log_lines: usize,
    pub keepalive: Duration,
}

impl Services {
    /// Open the database and build the HTTP collaborators.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let primary = LibSqlBackend::new_local(&config.db_path).await?;
        let store: Arc<dyn ApplicationStore> = Arc::new(FallbackStore::new(Arc::new(primary)));

        let board: Arc<dyn JobBoard> = Arc::new(HttpJobBoard::new(config.job_board.clone())?);
        let llm: Arc<dyn LlmProvider> = Arc::new(AnthropicProvider::new(&config.llm)?);

        let scoring = match &config.embeddings {
            Some(embedding_config) => {
                let embedder = Arc::new(OpenAiEmbeddings::new(embedding_config)?);
                info!(model = %embedding_config.model, "Semantic scoring enabled");
                ScoringEngine::hybrid(
                    Arc::new(EmbeddingSimilarity::new(embedder)),
                    config.calibration,
                )
            }
            None => {
                info!("No embedding key configured, using rule-based scoring only");
                ScoringEngine::rules_only()
            }
        };

        Ok(Self {
            board,
            store,
            llm,
            scoring,
            personalizer: config.personalizer.clone(),
            retry: config.retry.clone(),
            status_log_lines: config.status_log_lines,
            keepalive: config.stream_keepalive,
        })
    }

    /// Assemble the engine and supervisor.
    pub fn into_state(self) -> ApiState {
        let events = EventHub::new();
        let submissions = Arc::new(SubmissionCoordinator::new(
            Arc::clone(&self.board),
            Arc::clone(&self.store),
            self.retry,
        ));
        let engine = Arc::new(WorkflowEngine::new(
            Arc::clone(&self.board),
            Arc::clone(&self.store),
            Arc::new(self.scoring),
            Arc::new(Personalizer::new(self.llm, self.personalizer)),
            submissions,
            events,
        ));

        ApiState {
            supervisor: Arc::new(RunSupervisor::new(engine, self.status_log_lines)),
            store: self.store,
            board: self.board,
            keepalive: self.keepalive,
        }
    }
}
