use chrono::Duration;
use sqlx::{AnyPool, Row};

use crate::{error::RelayError, models::PaymentRecord, services::cache::EntitlementCache};

pub const DEFAULT_ENTITLEMENT_DAYS: i64 = 30;

#[derive(Clone)]
pub struct PaymentStore {
    pool: AnyPool,
    window: Duration,
    cache: EntitlementCache,
}

impl PaymentStore {
    pub fn new(pool: AnyPool, window: Duration, cache: EntitlementCache) -> Self {
        Self {
            pool,
            window,
            cache,
        }
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    pub async fn init(&self) -> Result<(), RelayError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS payment (
                pubkey TEXT NOT NULL,
                created_at BIGINT NOT NULL,
                expiration_at BIGINT NOT NULL,
                tx_hash TEXT UNIQUE NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS payment_pubkey_created_at_idx
                ON payment (pubkey, created_at)",
        )
        .execute(&self.pool)
        .await?;

        tracing::info!("Payment table ready");
        Ok(())
    }

    // tx_hash UNIQUE is what keeps a transaction from being credited twice
    pub async fn save(
        &self,
        identity: &str,
        tx_reference: &str,
        now: i64,
    ) -> Result<PaymentRecord, RelayError> {
        let record = PaymentRecord::new(identity, tx_reference, now, self.window);
        self.insert(&record).await?;
        Ok(record)
    }

    pub async fn insert(&self, record: &PaymentRecord) -> Result<(), RelayError> {
        let result = sqlx::query(
            "INSERT INTO payment (pubkey, created_at, expiration_at, tx_hash)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(&record.identity)
        .bind(record.created_at)
        .bind(record.expiration_at)
        .bind(&record.tx_reference)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                self.cache.invalidate(&record.identity).await;
                tracing::info!(
                    identity = %record.identity,
                    tx = %record.tx_reference,
                    expiration_at = record.expiration_at,
                    "Payment saved"
                );
                Ok(())
            }
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(RelayError::DuplicateTransaction(record.tx_reference.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    // Only records at the identity's MAX(created_at) count, even when an older
    // one would still be unexpired.
    pub async fn latest_expiration(&self, identity: &str) -> Result<Option<i64>, RelayError> {
        let row = sqlx::query(
            "SELECT MAX(expiration_at) AS expiration_at
             FROM payment
             WHERE pubkey = $1
               AND created_at = (SELECT MAX(created_at) FROM payment WHERE pubkey = $2)",
        )
        .bind(identity)
        .bind(identity)
        .fetch_one(&self.pool)
        .await?;

        let expiration_at: Option<i64> = row.try_get("expiration_at")?;
        if let Some(expiration_at) = expiration_at {
            self.cache.set(identity, expiration_at).await;
        }
        Ok(expiration_at)
    }

    pub async fn is_entitled(&self, identity: &str, now: i64) -> Result<bool, RelayError> {
        // A newer record always expires later, so only a live cached expiration
        // can be trusted. A lapsed one may predate a renewal.
        if let Some(expiration_at) = self.cache.get(identity).await {
            if is_active(expiration_at, now) {
                return Ok(true);
            }
        }

        Ok(self
            .latest_expiration(identity)
            .await?
            .is_some_and(|expiration_at| is_active(expiration_at, now)))
    }
}

fn is_active(expiration_at: i64, now: i64) -> bool {
    expiration_at > now
}

#[cfg(test)]
impl PaymentStore {
    pub async fn find_by_tx(&self, tx_reference: &str) -> Result<Option<PaymentRecord>, RelayError> {
        let row = sqlx::query(
            "SELECT pubkey, created_at, expiration_at, tx_hash FROM payment WHERE tx_hash = $1",
        )
        .bind(tx_reference)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| -> Result<PaymentRecord, RelayError> {
            Ok(PaymentRecord {
                identity: row.try_get("pubkey")?,
                created_at: row.try_get("created_at")?,
                expiration_at: row.try_get("expiration_at")?,
                tx_reference: row.try_get("tx_hash")?,
            })
        })
        .transpose()
    }

    pub async fn count_for(&self, identity: &str) -> Result<i64, RelayError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM payment WHERE pubkey = $1")
            .bind(identity)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("n")?)
    }
}
