//! Evidence grounding.
//!
//! Resolves each generated requirement-to-evidence claim against the
//! candidate's fact bank and proof set. Grounding is advisory: it never
//! fails the pipeline, it only feeds the policy gate.

use tracing::info;

use crate::model::{EvidenceEntry, Fact, ProofItem, SourceDetail};

/// Grounded vs. total counts for one mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GroundingSummary {
    pub grounded: usize,
    pub total: usize,
}

impl GroundingSummary {
    pub fn of(entries: &[EvidenceEntry]) -> Self {
        Self {
            grounded: entries.iter().filter(|e| e.grounded).count(),
            total: entries.len(),
        }
    }
}

/// Ground every entry. Each verdict is recomputed from scratch, so running
/// this on its own output yields the same verdicts.
pub fn ground(entries: &[EvidenceEntry], fact_bank: &[Fact], proof_set: &[ProofItem]) -> Vec<EvidenceEntry> {
    let grounded: Vec<EvidenceEntry> = entries
        .iter()
        .map(|entry| ground_entry(entry, fact_bank, proof_set))
        .collect();

    let summary = GroundingSummary::of(&grounded);
    info!(
        grounded = summary.grounded,
        total = summary.total,
        "Evidence mapped: {}/{} claims grounded",
        summary.grounded,
        summary.total
    );
    grounded
}

fn ground_entry(entry: &EvidenceEntry, fact_bank: &[Fact], proof_set: &[ProofItem]) -> EvidenceEntry {
    let mut out = EvidenceEntry {
        grounded: false,
        source_detail: None,
        ..entry.clone()
    };
    let cited = entry.evidence_source.trim();

    if let Some(fact) = fact_bank.iter().find(|f| !cited.is_empty() && f.id == cited) {
        out.grounded = true;
        out.source_detail = Some(fact_detail(fact, false));
        return out;
    }

    if let Some(proof) = proof_set.iter().find(|p| !cited.is_empty() && p.url == cited) {
        out.grounded = true;
        out.source_detail = Some(SourceDetail::Proof {
            title: proof.title.clone(),
            url: proof.url.clone(),
        });
        return out;
    }

    let claim = entry.evidence.trim().to_lowercase();
    if claim.is_empty() {
        return out;
    }
    if let Some(fact) = fact_bank
        .iter()
        .find(|f| f.text.to_lowercase().contains(&claim))
    {
        out.evidence_source = fact.id.clone();
        out.grounded = true;
        out.source_detail = Some(fact_detail(fact, true));
    }
    out
}

fn fact_detail(fact: &Fact, matched_by_text: bool) -> SourceDetail {
    SourceDetail::Fact {
        fact_id: fact.id.clone(),
        source: fact.source.clone(),
        category: fact.category.clone(),
        matched_by_text,
    }
}
