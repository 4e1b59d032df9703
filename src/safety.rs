//! Policy gate.
//!
//! Re-checks the run policy after content generation. Every hard check is
//! evaluated; any failure blocks submission. Soft findings are returned as
//! warnings and never block.

use std::collections::HashSet;

use crate::model::{Confidence, EvidenceEntry, Fact, GeneratedMaterials, Policy, QueueItem};

/// Result of gating one queue item.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GateVerdict {
    pub passed: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl GateVerdict {
    /// The first hard failure, surfaced as the skip reason.
    pub fn primary_error(&self) -> Option<&str> {
        self.errors.first().map(String::as_str)
    }
}

pub fn check(
    item: &QueueItem,
    materials: &GeneratedMaterials,
    evidence: &[EvidenceEntry],
    policy: &Policy,
    fact_bank: &[Fact],
) -> GateVerdict {
    let posting = &item.posting;
    let mut errors = Vec::new();

    if policy.blocked_company(&posting.organization).is_some() {
        errors.push(format!(
            "SAFETY BLOCK: {} is in blocked companies list",
            posting.organization
        ));
    }

    if let Some(role) = policy.blocked_role(&posting.title) {
        errors.push(format!("SAFETY BLOCK: Role type '{role}' is blocked"));
    }

    if item.score < policy.min_match_threshold {
        errors.push(format!(
            "SAFETY BLOCK: Match score {:.1} below threshold {:.1}",
            item.score, policy.min_match_threshold
        ));
    }

    if policy.require_remote && !posting.remote {
        errors.push("SAFETY BLOCK: Job is not remote but remote is required".to_string());
    }

    if let Some(required) = policy
        .required_location
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
    {
        if !posting.location.to_lowercase().contains(&required.to_lowercase()) {
            errors.push(format!(
                "SAFETY BLOCK: Job location '{}' doesn't match required '{required}'",
                posting.location
            ));
        }
    }

    let mut warnings = Vec::new();
    for entry in evidence {
        if entry.confidence == Confidence::Strong && !entry.grounded {
            warnings.push(format!(
                "Evidence source '{}' not found in fact bank or proof set",
                entry.evidence_source
            ));
        }
    }

    let fact_ids: HashSet<&str> = fact_bank.iter().map(|f| f.id.as_str()).collect();
    for id in &materials.selected_fact_ids {
        if !fact_ids.contains(id.as_str()) {
            warnings.push(format!("Selected fact '{id}' not found in fact bank"));
        }
    }

    GateVerdict {
        passed: errors.is_empty(),
        errors,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Posting;

    fn item(score: f64) -> QueueItem {
        QueueItem {
            posting: Posting {
                id: "j1".into(),
                title: "Data Engineer".into(),
                organization: "Acme".into(),
                location: "Berlin, DE".into(),
                remote: false,
                ..Default::default()
            },
            score,
            rationale: String::new(),
        }
    }

    #[test]
    fn clean_item_passes() {
        let verdict = check(
            &item(70.0),
            &GeneratedMaterials::default(),
            &[],
            &Policy::default(),
            &[],
        );
        assert!(verdict.passed);
        assert!(verdict.errors.is_empty());
        assert!(verdict.warnings.is_empty());
    }

    #[test]
    fn all_hard_failures_are_retained_in_order() {
        let policy = Policy {
            blocked_companies: vec!["ACME".into()],
            blocked_role_types: vec!["data".into()],
            min_match_threshold: 50.0,
            require_remote: true,
            required_location: Some("Paris".into()),
            ..Default::default()
        };
        let verdict = check(&item(10.0), &GeneratedMaterials::default(), &[], &policy, &[]);
        assert!(!verdict.passed);
        assert_eq!(verdict.errors.len(), 5);
        assert_eq!(
            verdict.primary_error(),
            Some("SAFETY BLOCK: Acme is in blocked companies list")
        );
        assert!(verdict.errors[2].contains("below threshold"));
    }

    #[test]
    fn score_threshold_is_rechecked() {
        let policy = Policy {
            min_match_threshold: 30.0,
            ..Default::default()
        };
        let verdict = check(&item(29.9), &GeneratedMaterials::default(), &[], &policy, &[]);
        assert!(!verdict.passed);
    }

    #[test]
    fn required_location_is_case_insensitive() {
        let policy = Policy {
            required_location: Some("berlin".into()),
            ..Default::default()
        };
        let verdict = check(&item(70.0), &GeneratedMaterials::default(), &[], &policy, &[]);
        assert!(verdict.passed);
    }

    #[test]
    fn warnings_do_not_block() {
        let materials = GeneratedMaterials {
            selected_fact_ids: vec!["b1".into(), "ghost".into()],
            ..Default::default()
        };
        let evidence = vec![
            EvidenceEntry {
                requirement: "SQL".into(),
                evidence: "built warehouse".into(),
                evidence_source: "b7".into(),
                confidence: Confidence::Strong,
                grounded: false,
                source_detail: None,
            },
            EvidenceEntry {
                requirement: "Python".into(),
                evidence: "scripts".into(),
                evidence_source: "b8".into(),
                confidence: Confidence::Weak,
                grounded: false,
                source_detail: None,
            },
        ];
        let facts = vec![Fact {
            id: "b1".into(),
            text: "x".into(),
            ..Default::default()
        }];
        let verdict = check(&item(70.0), &materials, &evidence, &Policy::default(), &facts);
        assert!(verdict.passed);
        assert_eq!(verdict.warnings.len(), 2);
        assert!(verdict.warnings[0].contains("b7"));
        assert!(verdict.warnings[1].contains("ghost"));
    }
}
