//! Job board client contract.
//!
//! The job board supplies postings and accepts applications. Submit
//! failures come back already classified as [`SubmitError`] so the
//! submission coordinator can branch on the variant.

pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{JobBoardError, SubmitError};
use crate::model::Posting;

pub use http::{HttpJobBoard, JobBoardConfig};

/// Body of one application submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationPayload {
    pub job_id: String,
    pub applicant_name: String,
    pub applicant_email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub resume: String,
    pub cover_letter: String,
}

/// Successful submission acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReceipt {
    pub confirmation_id: String,
}

/// Must be safe for concurrent use by many runs.
#[async_trait]
pub trait JobBoard: Send + Sync {
    async fn fetch_queue(&self) -> Result<Vec<Posting>, JobBoardError>;

    async fn submit(&self, payload: &ApplicationPayload) -> Result<SubmitReceipt, SubmitError>;

    /// Whether the board is reachable.
    async fn health_check(&self) -> bool {
        true
    }
}
