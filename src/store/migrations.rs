//! Version-tracked database migrations for the libSQL backend.
//!
//! `_migrations` holds one row per applied version; anything newer than the
//! highest row is applied in order on open.

use libsql::Connection;

use crate::error::DatabaseError;

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. Add new versions to the end.
static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "applications",
        sql: r#"
            CREATE TABLE IF NOT EXISTS applications (
                subject TEXT NOT NULL,
                posting_id TEXT NOT NULL,
                posting_title TEXT NOT NULL,
                organization TEXT NOT NULL,
                status TEXT NOT NULL,
                confirmation_id TEXT,
                submitted_at TEXT,
                error TEXT,
                retry_count INTEGER NOT NULL DEFAULT 0,
                materials TEXT NOT NULL DEFAULT '{}',
                evidence TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (subject, posting_id)
            );
        "#,
    },
    Migration {
        version: 2,
        name: "applications_subject_index",
        sql: r#"
            CREATE INDEX IF NOT EXISTS idx_applications_subject_updated
                ON applications(subject, updated_at);
            CREATE INDEX IF NOT EXISTS idx_applications_status
                ON applications(status);
        "#,
    },
];

/// Run all pending migrations against the given connection.
pub async fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        (),
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("Failed to create _migrations table: {e}")))?;

    let applied = get_current_version(conn).await?;
    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > applied).collect();
    if pending.is_empty() {
        tracing::debug!(version = applied, "Application schema up to date");
        return Ok(());
    }

    for migration in pending {
        apply(conn, migration).await?;
    }
    Ok(())
}

async fn apply(conn: &Connection, migration: &Migration) -> Result<(), DatabaseError> {
    tracing::info!(
        version = migration.version,
        name = migration.name,
        "Applying schema migration"
    );
    conn.execute_batch(migration.sql).await.map_err(|e| {
        DatabaseError::Migration(format!("V{} {}: {e}", migration.version, migration.name))
    })?;
    conn.execute(
        "INSERT OR IGNORE INTO _migrations (version, name) VALUES (?1, ?2)",
        libsql::params![migration.version, migration.name],
    )
    .await
    .map_err(|e| {
        DatabaseError::Migration(format!("recording V{}: {e}", migration.version))
    })?;
    Ok(())
}

/// Highest applied migration version, or 0 if none.
pub(crate) async fn get_current_version(conn: &Connection) -> Result<i64, DatabaseError> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM _migrations", ())
        .await
        .map_err(|e| DatabaseError::Migration(format!("Failed to query migration version: {e}")))?;

    let row = rows
        .next()
        .await
        .map_err(|e| DatabaseError::Migration(format!("Failed to read migration version: {e}")))?;

    match row {
        Some(row) => row.get::<i64>(0).map_err(|e| {
            DatabaseError::Migration(format!("Failed to parse migration version: {e}"))
        }),
        None => Ok(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_conn() -> Connection {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .unwrap();
        db.connect().unwrap()
    }

    #[tokio::test]
    async fn migrations_create_applications_table() {
        let conn = test_conn().await;
        run_migrations(&conn).await.unwrap();

        let mut rows = conn
            .query(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='applications'",
                (),
            )
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();
        assert_eq!(row.get::<i64>(0).unwrap(), 1);
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let conn = test_conn().await;
        run_migrations(&conn).await.unwrap();
        run_migrations(&conn).await.unwrap();
        let latest = MIGRATIONS.last().map(|m| m.version).unwrap_or(0);
        assert_eq!(get_current_version(&conn).await.unwrap(), latest);
    }
}
