//! Tailored materials generation.
//!
//! Builds the personalization prompt from the posting, profile, fact bank,
//! and proof set, and parses the JSON the model returns into
//! [`GeneratedMaterials`] plus an ungrounded evidence mapping.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::LlmError;
use crate::llm::provider::{ChatMessage, CompletionRequest, LlmProvider};
use crate::model::{Confidence, EvidenceEntry, GeneratedMaterials, Posting, Profile};

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json)?\s*(.*?)```").expect("valid fence regex")
});

const SYSTEM_PROMPT: &str = "You are a resume tailoring assistant. You help personalize applications while following strict rules:

CRITICAL RULES:
1. ONLY use information from the provided candidate profile and fact bank
2. NEVER invent achievements, metrics, or experiences
3. You can REPHRASE facts but cannot change them
4. Select the MOST RELEVANT facts for this specific posting
5. Map each posting requirement to specific evidence from the fact bank or proof set

Return a JSON object with:
{
    \"tailored_resume_sections\": {
        \"summary\": \"A 2-3 sentence summary highlighting relevant experience for THIS role\",
        \"selected_bullets\": [\"fact_id1\", \"fact_id2\"],
        \"skills_to_highlight\": [\"skill1\", \"skill2\"]
    },
    \"cover_letter\": \"A short 3-4 sentence recruiter note referencing specific projects or achievements.\",
    \"requirement_evidence_map\": [
        {
            \"requirement\": \"the posting requirement\",
            \"evidence\": \"the fact or proof that demonstrates it\",
            \"evidence_source\": \"fact id or proof url\",
            \"confidence\": \"strong|moderate|weak\"
        }
    ]
}";

#[derive(Debug, Clone)]
pub struct PersonalizerConfig {
    pub temperature: f32,
    pub max_tokens: u32,
    /// Deadline for one generation call.
    pub timeout: Duration,
}

impl Default for PersonalizerConfig {
    fn default() -> Self {
        Self {
            temperature: 0.4,
            max_tokens: 2048,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Materials and the raw (not yet grounded) evidence mapping for one item.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Personalization {
    pub materials: GeneratedMaterials,
    pub evidence: Vec<EvidenceEntry>,
}

pub struct Personalizer {
    llm: Arc<dyn LlmProvider>,
    config: PersonalizerConfig,
}

impl Personalizer {
    pub fn new(llm: Arc<dyn LlmProvider>, config: PersonalizerConfig) -> Self {
        Self { llm, config }
    }

    pub async fn personalize(
        &self,
        posting: &Posting,
        profile: &Profile,
    ) -> Result<Personalization, LlmError> {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(user_prompt(posting, profile)),
        ])
        .with_temperature(self.config.temperature)
        .with_max_tokens(self.config.max_tokens);

        let response = tokio::time::timeout(self.config.timeout, self.llm.complete(request))
            .await
            .map_err(|_| LlmError::Timeout {
                provider: self.llm.model_name().to_string(),
                timeout: self.config.timeout,
            })??;

        let personalization = parse_personalization(&response.content)?;
        info!(
            posting_id = %posting.id,
            facts = personalization.materials.selected_fact_ids.len(),
            claims = personalization.evidence.len(),
            "Personalized materials generated"
        );
        Ok(personalization)
    }
}

fn user_prompt(posting: &Posting, profile: &Profile) -> String {
    let facts = profile
        .fact_bank
        .iter()
        .map(|f| {
            format!(
                "- [{}] {} (from: {}, skills: {})",
                f.id,
                f.text,
                f.source,
                f.skills_demonstrated.join(", ")
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    let proofs = profile
        .proof_set
        .iter()
        .map(|p| format!("- {}: {} - {}", p.title, p.url, p.description))
        .collect::<Vec<_>>()
        .join("\n");
    let profile_json = serde_json::to_string_pretty(&ProfileView::from(profile)).unwrap_or_default();

    format!(
        "Personalize application for:\n\n\
         POSTING: {title} at {org}\n\n\
         DESCRIPTION:\n{description}\n\n\
         REQUIREMENTS:\n{requirements}\n\n\
         CANDIDATE PROFILE:\n{profile_json}\n\n\
         FACT BANK (use these IDs):\n{facts}\n\n\
         PROOF SET (linkable evidence):\n{proofs}\n\n\
         Create a tailored application package. Only use facts from above.",
        title = posting.title,
        org = posting.organization,
        description = posting.description,
        requirements = posting.requirements.join("\n"),
    )
}

/// Profile fields shown to the model; the fact bank and proof set are
/// rendered separately with their identifiers.
#[derive(serde::Serialize)]
struct ProfileView<'a> {
    full_name: &'a str,
    summary: Option<&'a str>,
    skills: &'a [String],
    experience: &'a [crate::model::Experience],
    projects: &'a [crate::model::Project],
    education: &'a [crate::model::Education],
}

impl<'a> From<&'a Profile> for ProfileView<'a> {
    fn from(p: &'a Profile) -> Self {
        Self {
            full_name: &p.full_name,
            summary: p.summary.as_deref(),
            skills: &p.skills,
            experience: &p.experience,
            projects: &p.projects,
            education: &p.education,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawPersonalization {
    #[serde(default)]
    tailored_resume_sections: RawSections,
    #[serde(default)]
    cover_letter: String,
    #[serde(default)]
    requirement_evidence_map: Vec<RawEvidence>,
}

#[derive(Debug, Default, Deserialize)]
struct RawSections {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    selected_bullets: Vec<String>,
    #[serde(default)]
    skills_to_highlight: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawEvidence {
    #[serde(default)]
    requirement: String,
    #[serde(default)]
    evidence: String,
    #[serde(default)]
    evidence_source: Option<String>,
    #[serde(default)]
    confidence: Option<Confidence>,
}

/// Strip a markdown code fence if present.
fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();
    if trimmed.starts_with('{') {
        return trimmed;
    }
    if let Some(inner) = FENCED_BLOCK.captures(trimmed).and_then(|c| c.get(1)) {
        return inner.as_str().trim();
    }
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if end > start => &trimmed[start..=end],
        _ => trimmed,
    }
}

pub fn parse_personalization(text: &str) -> Result<Personalization, LlmError> {
    let json = extract_json(text);
    let raw: RawPersonalization = serde_json::from_str(json)?;
    debug!(claims = raw.requirement_evidence_map.len(), "Parsed personalization");

    Ok(Personalization {
        materials: GeneratedMaterials {
            summary: raw.tailored_resume_sections.summary,
            skill_highlights: raw.tailored_resume_sections.skills_to_highlight,
            selected_fact_ids: raw.tailored_resume_sections.selected_bullets,
            cover_note: raw.cover_letter,
        },
        evidence: raw
            .requirement_evidence_map
            .into_iter()
            .map(|e| EvidenceEntry {
                requirement: e.requirement,
                evidence: e.evidence,
                evidence_source: e.evidence_source.unwrap_or_default(),
                confidence: e.confidence.unwrap_or_default(),
                grounded: false,
                source_detail: None,
            })
            .collect(),
    })
}
