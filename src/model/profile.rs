//! Candidate profile (artifact pack).
//!
//! The profile is immutable input for the duration of one run. The fact bank
//! and proof set are what generated content is grounded against.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::ProfileError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Profile {
    pub full_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub education: Vec<Education>,
    #[serde(default)]
    pub experience: Vec<Experience>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub fact_bank: Vec<Fact>,
    #[serde(default)]
    pub proof_set: Vec<ProofItem>,
    #[serde(default)]
    pub constraints: Constraints,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Education {
    pub institution: String,
    pub degree: String,
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub graduation_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpa: Option<f32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Experience {
    pub organization: String,
    pub role: String,
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub bullets: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub technologies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub bullets: Vec<String>,
}

/// An atomic, sourced achievement statement.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fact {
    pub id: String,
    pub text: String,
    /// Where the claim comes from, e.g. "Acme Corp internship".
    #[serde(default)]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<String>,
    #[serde(default)]
    pub skills_demonstrated: Vec<String>,
}

/// A URL-backed artifact. The URL is its identifier.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProofItem {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub related_to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constraints {
    #[serde(default)]
    pub preferred_locations: Vec<String>,
    #[serde(default = "default_true")]
    pub open_to_remote: bool,
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            preferred_locations: Vec::new(),
            open_to_remote: true,
        }
    }
}

fn default_true() -> bool {
    true
}

impl Profile {
    /// Check that fact ids and proof urls are unique.
    pub fn validate(&self) -> Result<(), ProfileError> {
        let mut ids = HashSet::new();
        for fact in &self.fact_bank {
            if fact.id.trim().is_empty() {
                return Err(ProfileError::EmptyFactId);
            }
            if !ids.insert(fact.id.as_str()) {
                return Err(ProfileError::DuplicateFactId(fact.id.clone()));
            }
        }

        let mut urls = HashSet::new();
        for proof in &self.proof_set {
            if !urls.insert(proof.url.as_str()) {
                return Err(ProfileError::DuplicateProofUrl(proof.url.clone()));
            }
        }
        Ok(())
    }

    pub fn fact(&self, id: &str) -> Option<&Fact> {
        self.fact_bank.iter().find(|f| f.id == id)
    }

    pub fn proof(&self, url: &str) -> Option<&ProofItem> {
        self.proof_set.iter().find(|p| p.url == url)
    }

    /// Coarse experience estimate: one year per experience entry.
    pub fn experience_months(&self) -> u32 {
        (self.experience.len() as u32).saturating_mul(12)
    }
}
