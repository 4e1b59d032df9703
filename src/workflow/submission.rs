//! Submission coordinator.
//!
//! Submits one queue item with bounded retries and persists the terminal
//! outcome. Retry behaviour branches on the classified [`SubmitError`]:
//!
//! - `Duplicate`: stop immediately, record `already_applied`
//! - `RateLimited`: wait `base_delay * attempt`, stretched by the board's
//!   `Retry-After` hint up to `max_wait`
//! - `Transient`: wait `base_delay`
//!
//! There is no wait after the final attempt.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use crate::error::SubmitError;
use crate::jobboard::{ApplicationPayload, JobBoard};
use crate::model::{
    ApplicationRecord, ApplicationStatus, EvidenceEntry, GeneratedMaterials, Profile, QueueItem,
};
use crate::store::ApplicationStore;

const MAX_RESUME_SKILLS: usize = 15;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Upper bound on how far a `Retry-After` hint may stretch a wait.
    pub max_wait: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            max_wait: Duration::from_secs(10),
        }
    }
}

impl RetryConfig {
    /// Wait before retrying after a rate limit on 0-based `attempt`.
    ///
    /// Never shorter than the linear backoff; a hint only lengthens it,
    /// and never past `max_wait`.
    pub fn rate_limit_wait(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let backoff = self.base_delay * (attempt + 1);
        match retry_after {
            Some(hint) => backoff.max(hint.min(self.max_wait)),
            None => backoff,
        }
    }
}

pub struct SubmissionCoordinator {
    board: Arc<dyn JobBoard>,
    store: Arc<dyn ApplicationStore>,
    retry: RetryConfig,
}

impl SubmissionCoordinator {
    pub fn new(
        board: Arc<dyn JobBoard>,
        store: Arc<dyn ApplicationStore>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            board,
            store,
            retry,
        }
    }

    /// Submit `item` for `subject` and persist the outcome.
    ///
    /// Never fails: every terminal outcome is an [`ApplicationRecord`].
    pub async fn submit(
        &self,
        subject: &str,
        item: &QueueItem,
        profile: &Profile,
        materials: &GeneratedMaterials,
        evidence: &[EvidenceEntry],
    ) -> ApplicationRecord {
        let payload = ApplicationPayload {
            job_id: item.posting.id.clone(),
            applicant_name: profile.full_name.clone(),
            applicant_email: profile.email.clone(),
            phone: profile.phone.clone(),
            resume: build_resume_text(profile, materials),
            cover_letter: materials.cover_note.clone(),
        };

        let (status, confirmation_id, error, retry_count) = self.attempt_all(&payload).await;

        let now = Utc::now();
        let record = ApplicationRecord {
            subject: subject.to_string(),
            posting_id: item.posting.id.clone(),
            posting_title: item.posting.title.clone(),
            organization: item.posting.organization.clone(),
            status,
            confirmation_id,
            submitted_at: (status == ApplicationStatus::Submitted).then_some(now),
            error,
            retry_count,
            materials: materials.clone(),
            evidence: evidence.to_vec(),
            updated_at: now,
        };

        if let Err(e) = self.store.upsert(&record).await {
            warn!(
                subject = %subject,
                posting_id = %record.posting_id,
                error = %e,
                "Failed to persist application record"
            );
        }
        record
    }

    async fn attempt_all(
        &self,
        payload: &ApplicationPayload,
    ) -> (ApplicationStatus, Option<String>, Option<String>, u32) {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 0..max_attempts {
            let wait = match self.board.submit(payload).await {
                Ok(receipt) => {
                    info!(
                        job_id = %payload.job_id,
                        confirmation_id = %receipt.confirmation_id,
                        attempt,
                        "Application submitted"
                    );
                    return (
                        ApplicationStatus::Submitted,
                        Some(receipt.confirmation_id),
                        None,
                        attempt,
                    );
                }
                Err(SubmitError::Duplicate) => {
                    info!(job_id = %payload.job_id, "Posting already applied to");
                    return (
                        ApplicationStatus::AlreadyApplied,
                        None,
                        Some(SubmitError::Duplicate.to_string()),
                        attempt,
                    );
                }
                Err(SubmitError::RateLimited { retry_after }) => {
                    last_error = SubmitError::RateLimited { retry_after }.to_string();
                    self.retry.rate_limit_wait(attempt, retry_after)
                }
                Err(SubmitError::Transient(message)) => {
                    last_error = message;
                    self.retry.base_delay
                }
            };

            warn!(
                job_id = %payload.job_id,
                attempt = attempt + 1,
                max_attempts,
                error = %last_error,
                "Submission attempt failed"
            );
            if attempt + 1 < max_attempts && !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }
        }

        (
            ApplicationStatus::Failed,
            None,
            Some(last_error),
            max_attempts,
        )
    }
}

/// Flatten the profile and tailored materials into a plain-text resume.
///
/// Order: contact header, summary, skills (highlighted first, capped),
/// experience, projects, education.
pub fn build_resume_text(profile: &Profile, materials: &GeneratedMaterials) -> String {
    let mut lines: Vec<String> = vec![
        profile.full_name.clone(),
        profile.email.clone(),
        profile.phone.clone().unwrap_or_default(),
        String::new(),
    ];

    let summary = if materials.summary.is_empty() {
        profile.summary.as_deref().unwrap_or_default()
    } else {
        materials.summary.as_str()
    };
    if !summary.is_empty() {
        lines.extend(["SUMMARY".to_string(), summary.to_string(), String::new()]);
    }

    let mut skills: Vec<&str> = materials.skill_highlights.iter().map(String::as_str).collect();
    for skill in &profile.skills {
        if !skills.contains(&skill.as_str()) {
            skills.push(skill);
        }
    }
    skills.truncate(MAX_RESUME_SKILLS);
    if !skills.is_empty() {
        lines.extend(["SKILLS".to_string(), skills.join(", "), String::new()]);
    }

    if !profile.experience.is_empty() {
        lines.push("EXPERIENCE".to_string());
        for exp in &profile.experience {
            if exp.duration.is_empty() {
                lines.push(format!("{} at {}", exp.role, exp.organization));
            } else {
                lines.push(format!("{} at {} ({})", exp.role, exp.organization, exp.duration));
            }
            lines.extend(exp.bullets.iter().map(|b| format!("  • {b}")));
            lines.push(String::new());
        }
    }

    if !profile.projects.is_empty() {
        lines.push("PROJECTS".to_string());
        for project in &profile.projects {
            lines.push(format!("{} - {}", project.name, project.technologies.join(", ")));
            if let Some(url) = &project.url {
                lines.push(format!("  {url}"));
            }
            lines.extend(project.bullets.iter().map(|b| format!("  • {b}")));
            lines.push(String::new());
        }
    }

    if !profile.education.is_empty() {
        lines.push("EDUCATION".to_string());
        for edu in &profile.education {
            lines.push(format!(
                "{} in {} - {} ({})",
                edu.degree, edu.field, edu.institution, edu.graduation_date
            ));
            if let Some(gpa) = edu.gpa {
                lines.push(format!("  GPA: {gpa}"));
            }
            lines.push(String::new());
        }
    }

    lines.join("\n")
}
