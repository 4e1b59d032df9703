//! HTTP job board client.
//!
//! `GET /api/jobs?limit=N` lists postings (bare array or `{jobs: [...]}`),
//! `POST /api/applications` submits. Submit failures are classified from
//! the status code and the board's error code.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{JobBoardError, SubmitError};
use crate::jobboard::{ApplicationPayload, JobBoard, SubmitReceipt};
use crate::model::Posting;

const DUPLICATE_CODE: &str = "duplicate_application";

#[derive(Debug, Clone)]
pub struct JobBoardConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    pub fetch_limit: usize,
}

impl Default for JobBoardConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            request_timeout: Duration::from_secs(30),
            fetch_limit: 100,
        }
    }
}

pub struct HttpJobBoard {
    client: Client,
    config: JobBoardConfig,
}

impl HttpJobBoard {
    pub fn new(config: JobBoardConfig) -> Result<Self, JobBoardError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| JobBoardError::Request(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }
}

// ── Wire types ──────────────────────────────────────────────────────

/// Posting as the board serves it; several fields have aliases.
#[derive(Debug, Deserialize)]
struct WireJob {
    #[serde(deserialize_with = "string_or_number")]
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    company: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    requirements: Vec<String>,
    #[serde(default)]
    location: String,
    #[serde(default)]
    is_remote: bool,
    #[serde(default)]
    remote: bool,
    #[serde(default)]
    experience_required: Option<u32>,
    #[serde(default)]
    experience_years: Option<u32>,
}

impl From<WireJob> for Posting {
    fn from(job: WireJob) -> Self {
        Posting {
            id: job.id,
            title: job.title,
            organization: job.company,
            description: job.description,
            requirements: job.requirements,
            location: job.location,
            remote: job.is_remote || job.remote,
            experience_required: job
                .experience_required
                .or(job.experience_years)
                .unwrap_or(0),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JobsResponse {
    List(Vec<WireJob>),
    Wrapped {
        #[serde(default, alias = "data")]
        jobs: Vec<WireJob>,
    },
}

#[derive(Debug, Default, Deserialize)]
struct SubmitResponse {
    #[serde(default)]
    confirmation_id: Option<String>,
    #[serde(default)]
    application_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("invalid id: {other}"))),
    }
}

/// Classify a non-success submit response.
pub(crate) fn classify_failure(
    status: StatusCode,
    retry_after: Option<Duration>,
    body: &str,
) -> SubmitError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    if status == StatusCode::CONFLICT || parsed.error.as_deref() == Some(DUPLICATE_CODE) {
        return SubmitError::Duplicate;
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        return SubmitError::RateLimited { retry_after };
    }
    let detail = parsed.message.or(parsed.error).unwrap_or_else(|| body.to_string());
    SubmitError::Transient(format!(
        "Application submission failed: {} - {detail}",
        status.as_u16()
    ))
}

fn retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl JobBoard for HttpJobBoard {
    async fn fetch_queue(&self) -> Result<Vec<Posting>, JobBoardError> {
        let response = self
            .client
            .get(self.url("/api/jobs"))
            .query(&[("limit", self.config.fetch_limit)])
            .send()
            .await
            .map_err(|e| JobBoardError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(JobBoardError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: JobsResponse = response
            .json()
            .await
            .map_err(|e| JobBoardError::InvalidResponse(e.to_string()))?;
        let jobs = match parsed {
            JobsResponse::List(jobs) | JobsResponse::Wrapped { jobs } => jobs,
        };

        info!(count = jobs.len(), "Fetched postings from job board");
        Ok(jobs.into_iter().map(Posting::from).collect())
    }

    async fn submit(&self, payload: &ApplicationPayload) -> Result<SubmitReceipt, SubmitError> {
        let response = self
            .client
            .post(self.url("/api/applications"))
            .json(payload)
            .send()
            .await
            .map_err(|e| SubmitError::Transient(format!("Connection error during submission: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            let error = classify_failure(status, retry_after, &body);
            warn!(job_id = %payload.job_id, status = status.as_u16(), error = %error, "Submission rejected");
            return Err(error);
        }

        let parsed: SubmitResponse = response.json().await.unwrap_or_default();
        let confirmation_id = parsed
            .confirmation_id
            .filter(|s| !s.is_empty())
            .or(parsed.application_id.filter(|s| !s.is_empty()))
            .unwrap_or_else(|| format!("conf_{}", payload.job_id));

        debug!(job_id = %payload.job_id, %confirmation_id, "Application accepted");
        Ok(SubmitReceipt { confirmation_id })
    }

    async fn health_check(&self) -> bool {
        match self.client.get(self.url("/health")).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(error = %e, "Job board health check failed");
                false
            }
        }
    }
}
