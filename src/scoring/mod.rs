//! Posting scoring and queue ranking.
//!
//! - `rules`: deterministic skill/experience/location/education channel
//! - `semantic`: embedding similarity channel with configurable remap
//!
//! [`ScoringEngine`] combines both when a similarity signal is available and
//! falls back to rules alone otherwise.

pub mod rules;
pub mod semantic;

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info};

use crate::model::{Policy, Posting, Profile, QueueItem};

pub use semantic::{EmbeddingSimilarity, SemanticCalibration, SimilaritySignal};

/// A score with its human-readable rationale.
#[derive(Debug, Clone, PartialEq)]
pub struct Score {
    pub value: f64,
    pub rationale: String,
}

/// Outcome of ranking a fetched batch.
#[derive(Debug, Clone, Default)]
pub struct Ranking {
    pub queue: Vec<QueueItem>,
    pub logs: Vec<String>,
}

pub struct ScoringEngine {
    signal: Option<Arc<dyn SimilaritySignal>>,
    calibration: SemanticCalibration,
}

impl ScoringEngine {
    /// Rules-only scoring.
    pub fn rules_only() -> Self {
        Self {
            signal: None,
            calibration: SemanticCalibration::default(),
        }
    }

    pub fn hybrid(signal: Arc<dyn SimilaritySignal>, calibration: SemanticCalibration) -> Self {
        Self {
            signal: Some(signal),
            calibration,
        }
    }

    pub async fn score(&self, posting: &Posting, profile: &Profile, policy: &Policy) -> Score {
        let rule = rules::score(posting, profile, policy);
        if rule.blocked {
            return Score {
                value: 0.0,
                rationale: rule.rationale,
            };
        }

        let similarity = match &self.signal {
            Some(signal) => signal.similarity(profile, posting).await,
            None => None,
        };

        match similarity {
            Some(sim) => {
                let semantic = self.calibration.remap(sim);
                Score {
                    value: self.calibration.combine(semantic, rule.value),
                    rationale: format!("{} | {}", semantic::explain(semantic, sim), rule.rationale),
                }
            }
            None => Score {
                value: rule.value,
                rationale: rule.rationale,
            },
        }
    }

    /// Exclude already-applied postings, score, drop those under the
    /// threshold, stable-sort descending, and truncate to the per-run cap.
    pub async fn rank(
        &self,
        postings: Vec<Posting>,
        profile: &Profile,
        policy: &Policy,
        applied: &HashSet<String>,
    ) -> Ranking {
        let mut logs = Vec::new();
        let mut seen = HashSet::new();
        let mut queue = Vec::with_capacity(postings.len());

        for posting in postings {
            if applied.contains(&posting.id) {
                logs.push(format!("Skipping {} - already applied", posting.title));
                continue;
            }
            if !seen.insert(posting.id.clone()) {
                debug!(posting_id = %posting.id, "Duplicate posting in fetched batch");
                continue;
            }

            let score = self.score(&posting, profile, policy).await;
            if score.value < policy.min_match_threshold {
                logs.push(format!(
                    "Skipping {} - score {:.1} below threshold {:.1}",
                    posting.title, score.value, policy.min_match_threshold
                ));
                continue;
            }

            queue.push(QueueItem {
                posting,
                score: score.value,
                rationale: score.rationale,
            });
        }

        // `sort_by` is stable: equal scores keep fetch order.
        queue.sort_by(|a, b| b.score.total_cmp(&a.score));
        queue.truncate(policy.max_applications_per_day);

        info!(queued = queue.len(), "Ranked posting queue");
        logs.push(format!("Apply queue ready: {} postings", queue.len()));
        Ranking { queue, logs }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedSimilarity(Option<f64>);

    #[async_trait]
    impl SimilaritySignal for FixedSimilarity {
        async fn similarity(&self, _profile: &Profile, _posting: &Posting) -> Option<f64> {
            self.0
        }
    }

    fn posting(id: &str, description: &str) -> Posting {
        Posting {
            id: id.into(),
            title: format!("Engineer {id}"),
            organization: "Acme".into(),
            description: description.into(),
            location: "Remote".into(),
            remote: true,
            ..Default::default()
        }
    }

    fn profile() -> Profile {
        Profile {
            full_name: "Ada".into(),
            skills: vec!["rust".into(), "sql".into()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn hybrid_combines_channels() {
        let engine = ScoringEngine::hybrid(
            Arc::new(FixedSimilarity(Some(0.9))),
            SemanticCalibration::default(),
        );
        let p = posting("1", "rust");
        let rule = rules::score(&p, &profile(), &Policy::default()).value;
        let score = engine.score(&p, &profile(), &Policy::default()).await;
        assert!((score.value - (0.6 * 100.0 + 0.4 * rule)).abs() < 1e-9);
        assert!(score.rationale.starts_with("Excellent semantic match"));
    }

    #[tokio::test]
    async fn missing_signal_falls_back_to_rules() {
        let engine = ScoringEngine::hybrid(
            Arc::new(FixedSimilarity(None)),
            SemanticCalibration::default(),
        );
        let p = posting("1", "rust");
        let rule = rules::score(&p, &profile(), &Policy::default());
        let score = engine.score(&p, &profile(), &Policy::default()).await;
        assert_eq!(score.value, rule.value);
        assert_eq!(score.rationale, rule.rationale);
    }

    #[tokio::test]
    async fn blocked_stays_zero_with_semantic_signal() {
        let engine = ScoringEngine::hybrid(
            Arc::new(FixedSimilarity(Some(0.95))),
            SemanticCalibration::default(),
        );
        let policy = Policy {
            blocked_companies: vec!["Acme".into()],
            ..Default::default()
        };
        let score = engine.score(&posting("1", "rust"), &profile(), &policy).await;
        assert_eq!(score.value, 0.0);
        assert!(score.rationale.starts_with("BLOCKED"));
    }

    #[tokio::test]
    async fn rank_filters_sorts_stably_and_truncates() {
        let engine = ScoringEngine::rules_only();
        let postings = vec![
            posting("low", ""),
            posting("a", "rust"),
            posting("applied", "rust sql"),
            posting("b", "rust"),
            posting("top", "rust sql"),
        ];
        let policy = Policy {
            min_match_threshold: 55.0,
            max_applications_per_day: 10,
            ..Default::default()
        };
        let applied: HashSet<String> = ["applied".to_string()].into();

        let ranking = engine.rank(postings, &profile(), &policy, &applied).await;
        let ids: Vec<&str> = ranking.queue.iter().map(|q| q.id()).collect();
        assert_eq!(ids, vec!["top", "a", "b"]);
        assert!(ranking.queue.iter().all(|q| q.score >= 55.0));
        assert!(ranking.logs.iter().any(|l| l.contains("already applied")));

        let capped = Policy {
            max_applications_per_day: 2,
            ..policy
        };
        let ranking = engine
            .rank(
                vec![posting("a", "rust"), posting("b", "rust"), posting("c", "rust")],
                &profile(),
                &capped,
                &HashSet::new(),
            )
            .await;
        let ids: Vec<&str> = ranking.queue.iter().map(|q| q.id()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
