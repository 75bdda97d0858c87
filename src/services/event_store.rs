use sqlx::AnyPool;

use crate::error::RelayError;

// The host relay's message table, as far as this crate touches it.
#[derive(Clone)]
pub struct EventStore {
    pool: AnyPool,
}

impl EventStore {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }

    pub async fn init(&self) -> Result<(), RelayError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS event (
                id TEXT PRIMARY KEY,
                pubkey TEXT NOT NULL,
                created_at BIGINT NOT NULL,
                kind BIGINT NOT NULL,
                tags TEXT NOT NULL,
                content TEXT NOT NULL,
                sig TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS event_created_at_idx ON event (created_at)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete_older_than(&self, cutoff: i64) -> Result<u64, RelayError> {
        let result = sqlx::query("DELETE FROM event WHERE created_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
impl EventStore {
    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    pub async fn insert(&self, event: &crate::models::Event) -> Result<(), RelayError> {
        let tags = serde_json::to_string(&event.tags)
            .map_err(|e| RelayError::Internal(format!("encoding tags: {e}")))?;

        sqlx::query(
            "INSERT INTO event (id, pubkey, created_at, kind, tags, content, sig)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&event.id)
        .bind(&event.pubkey)
        .bind(event.created_at)
        .bind(event.kind)
        .bind(tags)
        .bind(&event.content)
        .bind(&event.sig)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn ids(&self) -> Result<Vec<String>, RelayError> {
        use sqlx::Row;

        let rows = sqlx::query("SELECT id FROM event ORDER BY created_at")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| row.try_get::<String, _>("id").map_err(RelayError::from))
            .collect()
    }
}
