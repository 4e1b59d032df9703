//! In-memory application store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::DatabaseError;
use crate::model::ApplicationRecord;
use crate::store::traits::ApplicationStore;

type Key = (String, String);

/// Process-lifetime record store.
#[derive(Default)]
pub struct InMemoryStore {
    records: RwLock<HashMap<Key, ApplicationRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop one record, returning it if present.
    pub async fn remove(&self, subject: &str, posting_id: &str) -> Option<ApplicationRecord> {
        self.records
            .write()
            .await
            .remove(&(subject.to_string(), posting_id.to_string()))
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl ApplicationStore for InMemoryStore {
    async fn upsert(&self, record: &ApplicationRecord) -> Result<(), DatabaseError> {
        self.records.write().await.insert(
            (record.subject.clone(), record.posting_id.clone()),
            record.clone(),
        );
        Ok(())
    }

    async fn list_by_subject(&self, subject: &str) -> Result<Vec<ApplicationRecord>, DatabaseError> {
        let mut records: Vec<ApplicationRecord> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.subject == subject)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(records)
    }

    async fn get(
        &self,
        subject: &str,
        posting_id: &str,
    ) -> Result<Option<ApplicationRecord>, DatabaseError> {
        Ok(self
            .records
            .read()
            .await
            .get(&(subject.to_string(), posting_id.to_string()))
            .cloned())
    }

    async fn delete_by_subject(&self, subject: &str) -> Result<usize, DatabaseError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|(s, _), _| s != subject);
        Ok(before - records.len())
    }
}
