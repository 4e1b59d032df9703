//! Degrade-to-memory store wrapper.
//!
//! Writes go to the primary store. When the primary fails, the record is
//! kept in memory instead and a warning is logged; reads merge both so a
//! record written during an outage stays visible for the rest of the
//! process lifetime.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::error::DatabaseError;
use crate::model::ApplicationRecord;
use crate::store::memory::InMemoryStore;
use crate::store::traits::ApplicationStore;

pub struct FallbackStore {
    primary: Arc<dyn ApplicationStore>,
    memory: InMemoryStore,
}

impl FallbackStore {
    pub fn new(primary: Arc<dyn ApplicationStore>) -> Self {
        Self {
            primary,
            memory: InMemoryStore::new(),
        }
    }

    /// Number of records currently held only in memory.
    pub async fn pending_in_memory(&self) -> usize {
        self.memory.len().await
    }
}

#[async_trait]
impl ApplicationStore for FallbackStore {
    async fn upsert(&self, record: &ApplicationRecord) -> Result<(), DatabaseError> {
        match self.primary.upsert(record).await {
            Ok(()) => {
                self.memory.remove(&record.subject, &record.posting_id).await;
                Ok(())
            }
            Err(e) => {
                warn!(
                    subject = %record.subject,
                    posting_id = %record.posting_id,
                    error = %e,
                    "Primary store upsert failed, keeping record in memory"
                );
                self.memory.upsert(record).await
            }
        }
    }

    async fn list_by_subject(&self, subject: &str) -> Result<Vec<ApplicationRecord>, DatabaseError> {
        let in_memory = self.memory.list_by_subject(subject).await?;
        let mut records = match self.primary.list_by_subject(subject).await {
            Ok(records) => records,
            Err(e) => {
                warn!(subject, error = %e, "Primary store list failed, serving memory only");
                return Ok(in_memory);
            }
        };

        if in_memory.is_empty() {
            return Ok(records);
        }
        // Memory copies are newer than anything the primary has for the same key.
        let overridden: HashSet<&str> = in_memory.iter().map(|r| r.posting_id.as_str()).collect();
        records.retain(|r| !overridden.contains(r.posting_id.as_str()));
        records.extend(in_memory);
        records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(records)
    }

    async fn get(
        &self,
        subject: &str,
        posting_id: &str,
    ) -> Result<Option<ApplicationRecord>, DatabaseError> {
        if let Some(record) = self.memory.get(subject, posting_id).await? {
            return Ok(Some(record));
        }
        match self.primary.get(subject, posting_id).await {
            Ok(found) => Ok(found),
            Err(e) => {
                warn!(subject, posting_id, error = %e, "Primary store get failed");
                Ok(None)
            }
        }
    }

    /// Memory copies are dropped only after the primary delete succeeds.
    async fn delete_by_subject(&self, subject: &str) -> Result<usize, DatabaseError> {
        let from_primary = self.primary.delete_by_subject(subject).await?;
        let from_memory = self.memory.delete_by_subject(subject).await?;
        Ok(from_primary + from_memory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use chrono::Utc;

    use crate::model::{ApplicationStatus, GeneratedMaterials};

    /// Primary store that can be switched into a failing mode.
    struct FlakyStore {
        inner: InMemoryStore,
        failing: AtomicBool,
    }

    impl FlakyStore {
        fn new() -> Self {
            Self {
                inner: InMemoryStore::new(),
                failing: AtomicBool::new(false),
            }
        }

        fn check(&self) -> Result<(), DatabaseError> {
            if self.failing.load(Ordering::SeqCst) {
                Err(DatabaseError::Pool("connection refused".into()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl ApplicationStore for FlakyStore {
        async fn upsert(&self, record: &ApplicationRecord) -> Result<(), DatabaseError> {
            self.check()?;
            self.inner.upsert(record).await
        }
        async fn list_by_subject(
            &self,
            subject: &str,
        ) -> Result<Vec<ApplicationRecord>, DatabaseError> {
            self.check()?;
            self.inner.list_by_subject(subject).await
        }
        async fn get(
            &self,
            subject: &str,
            posting_id: &str,
        ) -> Result<Option<ApplicationRecord>, DatabaseError> {
            self.check()?;
            self.inner.get(subject, posting_id).await
        }
        async fn delete_by_subject(&self, subject: &str) -> Result<usize, DatabaseError> {
            self.check()?;
            self.inner.delete_by_subject(subject).await
        }
    }

    fn record(posting_id: &str) -> ApplicationRecord {
        ApplicationRecord {
            subject: "u1".into(),
            posting_id: posting_id.into(),
            posting_title: "Engineer".into(),
            organization: "Acme".into(),
            status: ApplicationStatus::Submitted,
            confirmation_id: None,
            submitted_at: None,
            error: None,
            retry_count: 0,
            materials: GeneratedMaterials::default(),
            evidence: vec![],
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn failed_writes_land_in_memory_and_stay_visible() {
        let primary = Arc::new(FlakyStore::new());
        let store = FallbackStore::new(primary.clone());

        store.upsert(&record("j1")).await.unwrap();
        primary.failing.store(true, Ordering::SeqCst);
        store.upsert(&record("j2")).await.unwrap();
        assert_eq!(store.pending_in_memory().await, 1);

        // Primary down: only the memory copy is visible.
        let ids: Vec<String> = store
            .list_by_subject("u1")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.posting_id)
            .collect();
        assert_eq!(ids, vec!["j2".to_string()]);

        // Primary back: both are visible.
        primary.failing.store(false, Ordering::SeqCst);
        let all = store.list_by_subject("u1").await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(store.get("u1", "j2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn failed_purge_keeps_memory_records() {
        let primary = Arc::new(FlakyStore::new());
        let store = FallbackStore::new(primary.clone());

        store.upsert(&record("j1")).await.unwrap();
        primary.failing.store(true, Ordering::SeqCst);
        store.upsert(&record("j2")).await.unwrap();

        assert!(store.delete_by_subject("u1").await.is_err());
        assert_eq!(store.pending_in_memory().await, 1);

        primary.failing.store(false, Ordering::SeqCst);
        assert_eq!(store.delete_by_subject("u1").await.unwrap(), 2);
        assert_eq!(store.pending_in_memory().await, 0);
        assert!(store.list_by_subject("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn successful_write_clears_memory_copy() {
        let primary = Arc::new(FlakyStore::new());
        let store = FallbackStore::new(primary.clone());

        primary.failing.store(true, Ordering::SeqCst);
        store.upsert(&record("j1")).await.unwrap();
        primary.failing.store(false, Ordering::SeqCst);
        store.upsert(&record("j1")).await.unwrap();

        assert_eq!(store.pending_in_memory().await, 0);
        assert_eq!(store.list_by_subject("u1").await.unwrap().len(), 1);
    }
}
