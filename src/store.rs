use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

/// Persisted mirror of who is online. Advisory only: the broadcast count
/// comes from the in-memory directory, this table exists for crash
/// recovery and debugging.
#[derive(Clone)]
pub struct VisitorStore {
    pool: SqlitePool,
}

impl VisitorStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn ensure_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS active_visitors (
                 visitor_id TEXT PRIMARY KEY,
                 page       TEXT,
                 last_seen  TEXT NOT NULL,
                 created_at TEXT NOT NULL
             )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert or refresh a presence row; `created_at` keeps its first value.
    pub async fn upsert(
        &self,
        visitor_id: &str,
        page: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO active_visitors (visitor_id, page, last_seen, created_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(visitor_id)
             DO UPDATE SET page = excluded.page, last_seen = excluded.last_seen",
        )
        .bind(visitor_id)
        .bind(page)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Refresh `last_seen` (and the page, when sent) of an existing row.
    pub async fn touch(
        &self,
        visitor_id: &str,
        page: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE active_visitors
             SET page = COALESCE(?, page), last_seen = ?
             WHERE visitor_id = ?",
        )
        .bind(page)
        .bind(now)
        .bind(visitor_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// No-op when the row is already gone.
    pub async fn delete(&self, visitor_id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM active_visitors WHERE visitor_id = ?")
            .bind(visitor_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Visitor ids whose `last_seen` is older than `cutoff`.
    pub async fn stale_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>, sqlx::Error> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT visitor_id FROM active_visitors WHERE last_seen < ?")
                .bind(cutoff)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
