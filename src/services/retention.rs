use std::time::Duration;

use chrono::{DateTime, Months, Utc};
use tokio::task::JoinHandle;

use crate::{error::RelayError, services::event_store::EventStore};

pub const DEFAULT_RETENTION_MONTHS: u32 = 3;
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

// Oldest `created_at` that survives a sweep run at `now`.
pub fn retention_cutoff(now: DateTime<Utc>, retention: Months) -> Result<i64, RelayError> {
    now.checked_sub_months(retention)
        .map(|cutoff| cutoff.timestamp())
        .ok_or_else(|| RelayError::Internal(format!("retention cutoff underflow at {now}")))
}

pub struct RetentionSweeper {
    events: EventStore,
    retention: Months,
    interval: Duration,
}

impl RetentionSweeper {
    pub fn new(events: EventStore, retention_months: u32, interval: Duration) -> Self {
        Self {
            events,
            retention: Months::new(retention_months),
            interval,
        }
    }

    pub fn cutoff(&self, now: DateTime<Utc>) -> Result<i64, RelayError> {
        retention_cutoff(now, self.retention)
    }

    pub async fn sweep_at(&self, now: DateTime<Utc>) -> Result<u64, RelayError> {
        let cutoff = self.cutoff(now)?;
        let deleted = self.events.delete_older_than(cutoff).await?;
        tracing::info!(cutoff, deleted, "Retention sweep finished");
        Ok(deleted)
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    async fn run(self) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "Retention sweeper started"
        );
        loop {
            tokio::time::sleep(self.interval).await;
            if let Err(e) = self.sweep_at(Utc::now()).await {
                tracing::error!("Retention sweep failed: {}", e);
            }
        }
    }
}
