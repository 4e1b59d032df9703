//! Postings fetched from the job board and their ranked queue form.

use serde::{Deserialize, Serialize};

/// An opportunity. Immutable once fetched into a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    pub id: String,
    pub title: String,
    pub organization: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub remote: bool,
    /// Required experience in years.
    #[serde(default)]
    pub experience_required: u32,
}

/// A posting annotated with its score and rationale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    pub posting: Posting,
    pub score: f64,
    pub rationale: String,
}

impl QueueItem {
    pub fn id(&self) -> &str {
        &self.posting.id
    }
}
