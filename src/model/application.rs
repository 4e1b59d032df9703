//! Generated materials, evidence mappings, and application records.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tailored content for one queue item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneratedMaterials {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub skill_highlights: Vec<String>,
    #[serde(default)]
    pub selected_fact_ids: Vec<String>,
    #[serde(default)]
    pub cover_note: String,
}

impl GeneratedMaterials {
    pub fn is_empty(&self) -> bool {
        self.summary.is_empty()
            && self.skill_highlights.is_empty()
            && self.selected_fact_ids.is_empty()
            && self.cover_note.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Strong,
    Moderate,
    #[default]
    #[serde(other)]
    Weak,
}

/// Where a grounded evidence citation resolved to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceDetail {
    Fact {
        fact_id: String,
        source: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        category: Option<String>,
        /// True when resolved by matching the claimed text, not the cited id.
        #[serde(default)]
        matched_by_text: bool,
    },
    Proof {
        title: String,
        url: String,
    },
}

/// One requirement-to-evidence claim made by the generator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceEntry {
    pub requirement: String,
    pub evidence: String,
    #[serde(default)]
    pub evidence_source: String,
    #[serde(default)]
    pub confidence: Confidence,
    #[serde(default)]
    pub grounded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_detail: Option<SourceDetail>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Submitted,
    Failed,
    AlreadyApplied,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Failed => "failed",
            Self::AlreadyApplied => "already_applied",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "submitted" => Some(Self::Submitted),
            "failed" => Some(Self::Failed),
            "already_applied" => Some(Self::AlreadyApplied),
            _ => None,
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of submitting one posting for one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub subject: String,
    pub posting_id: String,
    pub posting_title: String,
    pub organization: String,
    pub status: ApplicationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub retry_count: u32,
    pub materials: GeneratedMaterials,
    #[serde(default)]
    pub evidence: Vec<EvidenceEntry>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_confidence_is_weak() {
        let entry: EvidenceEntry = serde_json::from_str(
            r#"{"requirement": "Rust", "evidence": "wrote a parser", "confidence": "certain"}"#,
        )
        .unwrap();
        assert_eq!(entry.confidence, Confidence::Weak);
        assert!(!entry.grounded);
    }

    #[test]
    fn status_strings_roundtrip_through_parse() {
        for status in [
            ApplicationStatus::Submitted,
            ApplicationStatus::Failed,
            ApplicationStatus::AlreadyApplied,
        ] {
            assert_eq!(ApplicationStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ApplicationStatus::parse("queued"), None);
    }

    #[test]
    fn source_detail_is_tagged() {
        let detail = SourceDetail::Proof {
            title: "Demo".into(),
            url: "https://demo.dev".into(),
        };
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["type"], "proof");
        assert_eq!(json["url"], "https://demo.dev");
    }
}
