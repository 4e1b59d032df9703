//! Semantic scoring channel.
//!
//! Cosine similarity between profile and posting embeddings, linearly
//! remapped into a score. The remap range and hybrid weights live in
//! [`SemanticCalibration`] so they can be tuned from configuration.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::llm::EmbeddingProvider;
use crate::model::{Posting, Profile};

const EMBEDDING_CACHE_LIMIT: usize = 1000;

/// Remap and weighting parameters for the semantic channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SemanticCalibration {
    /// Similarity mapped to `floor`.
    pub low: f64,
    /// Similarity mapped to `ceiling`.
    pub high: f64,
    pub floor: f64,
    pub ceiling: f64,
    /// Weight of the semantic score in the hybrid; rules get `1 - weight`.
    pub weight: f64,
}

impl Default for SemanticCalibration {
    fn default() -> Self {
        Self {
            low: 0.3,
            high: 0.9,
            floor: 20.0,
            ceiling: 100.0,
            weight: 0.6,
        }
    }
}

impl SemanticCalibration {
    /// Map a cosine similarity onto the score scale, clamped to [0, 100].
    pub fn remap(&self, similarity: f64) -> f64 {
        let span = self.high - self.low;
        if span <= f64::EPSILON {
            return self.floor.clamp(0.0, 100.0);
        }
        let scaled = (similarity - self.low) * ((self.ceiling - self.floor) / span) + self.floor;
        scaled.clamp(0.0, 100.0)
    }

    pub fn combine(&self, semantic: f64, rules: f64) -> f64 {
        let w = self.weight.clamp(0.0, 1.0);
        w * semantic + (1.0 - w) * rules
    }
}

/// Human-readable label for a remapped semantic score.
pub fn explain(score: f64, similarity: f64) -> String {
    let label = if score >= 80.0 {
        "Excellent semantic match"
    } else if score >= 60.0 {
        "Strong semantic match"
    } else if score >= 40.0 {
        "Moderate semantic match"
    } else {
        "Low semantic match"
    };
    format!("{label} ({similarity:.2})")
}

/// Cosine similarity, or `None` for mismatched lengths or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let (mut dot, mut na, mut nb) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return None;
    }
    Some(dot / (na.sqrt() * nb.sqrt()))
}

/// Source of a profile/posting similarity in [-1, 1].
///
/// `None` means the signal is unavailable and scoring falls back to rules.
#[async_trait]
pub trait SimilaritySignal: Send + Sync {
    async fn similarity(&self, profile: &Profile, posting: &Posting) -> Option<f64>;
}

/// Similarity backed by an embedding provider, with a bounded text cache.
pub struct EmbeddingSimilarity {
    provider: Arc<dyn EmbeddingProvider>,
    cache: RwLock<HashMap<String, Arc<Vec<f32>>>>,
}

impl EmbeddingSimilarity {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            cache: RwLock::new(HashMap::new()),
        }
    }

    async fn embed(&self, text: &str) -> Option<Arc<Vec<f32>>> {
        if let Some(hit) = self.cache.read().await.get(text) {
            return Some(Arc::clone(hit));
        }

        let vector = match self.provider.embed(text).await {
            Ok(v) => Arc::new(v),
            Err(e) => {
                warn!(error = %e, "Embedding request failed, semantic channel unavailable");
                return None;
            }
        };

        let mut cache = self.cache.write().await;
        if cache.len() < EMBEDDING_CACHE_LIMIT {
            cache.insert(text.to_string(), Arc::clone(&vector));
        }
        Some(vector)
    }
}

#[async_trait]
impl SimilaritySignal for EmbeddingSimilarity {
    async fn similarity(&self, profile: &Profile, posting: &Posting) -> Option<f64> {
        let profile_vec = self.embed(&profile_text(profile)).await?;
        let posting_vec = self.embed(&posting_text(posting)).await?;
        let sim = cosine_similarity(&profile_vec, &posting_vec);
        debug!(posting_id = %posting.id, similarity = ?sim, "Semantic similarity computed");
        sim
    }
}

/// Text rendering of a profile for embedding.
pub fn profile_text(profile: &Profile) -> String {
    let mut parts = Vec::new();
    if !profile.full_name.is_empty() {
        parts.push(format!("Candidate: {}", profile.full_name));
    }
    if !profile.skills.is_empty() {
        parts.push(format!("Technical skills: {}", profile.skills.join(", ")));
    }
    for exp in profile.experience.iter().take(3) {
        parts.push(format!(
            "Work experience: {} at {}. {}",
            exp.role,
            exp.organization,
            truncate(&exp.description, 200)
        ));
    }
    for edu in profile.education.iter().take(2) {
        if !edu.degree.is_empty() || !edu.field.is_empty() {
            parts.push(format!(
                "Education: {} in {} from {}",
                edu.degree, edu.field, edu.institution
            ));
        }
    }
    for proj in profile.projects.iter().take(3) {
        let tech = if proj.technologies.is_empty() {
            String::new()
        } else {
            format!(" using {}", proj.technologies.join(", "))
        };
        parts.push(format!(
            "Project: {}{tech}. {}",
            proj.name,
            truncate(&proj.description, 150)
        ));
    }
    if !profile.constraints.preferred_locations.is_empty() {
        parts.push(format!(
            "Preferred locations: {}",
            profile.constraints.preferred_locations.join(", ")
        ));
    }
    if profile.constraints.open_to_remote {
        parts.push("Open to remote work".to_string());
    }
    parts.join(" ")
}

/// Text rendering of a posting for embedding.
pub fn posting_text(posting: &Posting) -> String {
    let mut parts = vec![format!("Job: {} at {}", posting.title, posting.organization)];
    if !posting.description.is_empty() {
        parts.push(format!("Description: {}", truncate(&posting.description, 500)));
    }
    parts.push(format!("Requirements: {}", posting.requirements.join(", ")));
    let mut location = format!("Location: {}", posting.location);
    if posting.remote {
        location.push_str(" (Remote available)");
    }
    parts.push(location);
    if posting.experience_required > 0 {
        parts.push(format!(
            "Experience required: {} years",
            posting.experience_required
        ));
    }
    parts.join(" ")
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
