//! Backend-agnostic record store trait.

use async_trait::async_trait;

use crate::error::DatabaseError;
use crate::model::ApplicationRecord;

/// Persistent store of application records keyed by `(subject, posting_id)`.
///
/// Implementations must be safe for concurrent use across subjects.
#[async_trait]
pub trait ApplicationStore: Send + Sync {
    /// Insert or replace the record for `(record.subject, record.posting_id)`.
    async fn upsert(&self, record: &ApplicationRecord) -> Result<(), DatabaseError>;

    /// All records for a subject, most recently updated first.
    async fn list_by_subject(&self, subject: &str) -> Result<Vec<ApplicationRecord>, DatabaseError>;

    async fn get(
        &self,
        subject: &str,
        posting_id: &str,
    ) -> Result<Option<ApplicationRecord>, DatabaseError>;

    /// Purge every record for a subject. Returns the number removed.
    async fn delete_by_subject(&self, subject: &str) -> Result<usize, DatabaseError>;
}
