//! libSQL backend for application records.
//!
//! Supports local file and in-memory databases. Materials and evidence are
//! stored as JSON text columns.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info, warn};

use crate::error::DatabaseError;
use crate::model::{ApplicationRecord, ApplicationStatus};
use crate::store::migrations;
use crate::store::traits::ApplicationStore;

/// libSQL database backend.
///
/// Holds a single connection reused for all operations.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db).await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database.
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;
        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Fixed-width RFC 3339 so that text ordering matches time ordering.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn opt_text(s: Option<String>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s),
        None => libsql::Value::Null,
    }
}

const RECORD_COLUMNS: &str = "subject, posting_id, posting_title, organization, status, confirmation_id, submitted_at, error, retry_count, materials, evidence, updated_at";

fn row_to_record(row: &libsql::Row) -> Result<ApplicationRecord, DatabaseError> {
    let status_str: String = row
        .get(4)
        .map_err(|e| DatabaseError::Query(format!("status column: {e}")))?;
    let status = ApplicationStatus::parse(&status_str)
        .ok_or_else(|| DatabaseError::Serialization(format!("unknown status '{status_str}'")))?;

    let materials_json: String = row
        .get(9)
        .map_err(|e| DatabaseError::Query(format!("materials column: {e}")))?;
    let evidence_json: String = row
        .get(10)
        .map_err(|e| DatabaseError::Query(format!("evidence column: {e}")))?;
    let submitted_at: Option<String> = row.get(6).ok();
    let updated_at: String = row
        .get(11)
        .map_err(|e| DatabaseError::Query(format!("updated_at column: {e}")))?;
    let retry_count: i64 = row
        .get(8)
        .map_err(|e| DatabaseError::Query(format!("retry_count column: {e}")))?;

    Ok(ApplicationRecord {
        subject: row
            .get(0)
            .map_err(|e| DatabaseError::Query(format!("subject column: {e}")))?,
        posting_id: row
            .get(1)
            .map_err(|e| DatabaseError::Query(format!("posting_id column: {e}")))?,
        posting_title: row.get(2).unwrap_or_default(),
        organization: row.get(3).unwrap_or_default(),
        status,
        confirmation_id: row.get(5).ok(),
        submitted_at: submitted_at.as_deref().map(parse_datetime),
        error: row.get(7).ok(),
        retry_count: u32::try_from(retry_count).unwrap_or(0),
        materials: serde_json::from_str(&materials_json)
            .map_err(|e| DatabaseError::Serialization(format!("materials: {e}")))?,
        evidence: serde_json::from_str(&evidence_json)
            .map_err(|e| DatabaseError::Serialization(format!("evidence: {e}")))?,
        updated_at: parse_datetime(&updated_at),
    })
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl ApplicationStore for LibSqlBackend {
    async fn upsert(&self, record: &ApplicationRecord) -> Result<(), DatabaseError> {
        let materials = serde_json::to_string(&record.materials)
            .map_err(|e| DatabaseError::Serialization(format!("materials: {e}")))?;
        let evidence = serde_json::to_string(&record.evidence)
            .map_err(|e| DatabaseError::Serialization(format!("evidence: {e}")))?;
        let now = format_datetime(&Utc::now());
        let updated_at = format_datetime(&record.updated_at);

        self.conn()
            .execute(
                "INSERT INTO applications (subject, posting_id, posting_title, organization, status, confirmation_id, submitted_at, error, retry_count, materials, evidence, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                 ON CONFLICT(subject, posting_id) DO UPDATE SET
                    posting_title = excluded.posting_title,
                    organization = excluded.organization,
                    status = excluded.status,
                    confirmation_id = excluded.confirmation_id,
                    submitted_at = excluded.submitted_at,
                    error = excluded.error,
                    retry_count = excluded.retry_count,
                    materials = excluded.materials,
                    evidence = excluded.evidence,
                    updated_at = excluded.updated_at",
                params![
                    record.subject.clone(),
                    record.posting_id.clone(),
                    record.posting_title.clone(),
                    record.organization.clone(),
                    record.status.as_str(),
                    opt_text(record.confirmation_id.clone()),
                    opt_text(record.submitted_at.as_ref().map(format_datetime)),
                    opt_text(record.error.clone()),
                    i64::from(record.retry_count),
                    materials,
                    evidence,
                    now,
                    updated_at
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("upsert application: {e}")))?;

        debug!(
            subject = %record.subject,
            posting_id = %record.posting_id,
            status = %record.status,
            "Application record upserted"
        );
        Ok(())
    }

    async fn list_by_subject(&self, subject: &str) -> Result<Vec<ApplicationRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {RECORD_COLUMNS} FROM applications WHERE subject = ?1 ORDER BY updated_at DESC, rowid DESC"
                ),
                params![subject],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list applications: {e}")))?;

        let mut records = Vec::new();
        loop {
            match rows.next().await {
                Ok(Some(row)) => match row_to_record(&row) {
                    Ok(record) => records.push(record),
                    Err(e) => warn!(subject, "Skipping application row: {e}"),
                },
                Ok(None) => break,
                Err(e) => return Err(DatabaseError::Query(format!("list applications: {e}"))),
            }
        }
        Ok(records)
    }

    async fn get(
        &self,
        subject: &str,
        posting_id: &str,
    ) -> Result<Option<ApplicationRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {RECORD_COLUMNS} FROM applications WHERE subject = ?1 AND posting_id = ?2"
                ),
                params![subject, posting_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get application: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => row_to_record(&row).map(Some),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get application: {e}"))),
        }
    }

    async fn delete_by_subject(&self, subject: &str) -> Result<usize, DatabaseError> {
        let removed = self
            .conn()
            .execute("DELETE FROM applications WHERE subject = ?1", params![subject])
            .await
            .map_err(|e| DatabaseError::Query(format!("delete applications: {e}")))?;
        info!(subject, removed, "Application records purged");
        Ok(removed as usize)
    }
}
