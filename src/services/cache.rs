use moka::future::Cache;
use std::time::Duration;

// Newest expiration_at per identity. Only trusted while it is still in the future.
#[derive(Clone)]
pub struct EntitlementCache {
    memory: Cache<String, i64>,
}

impl EntitlementCache {
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        let memory = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();
        Self { memory }
    }

    pub async fn get(&self, identity: &str) -> Option<i64> {
        let cached = self.memory.get(identity).await;
        if cached.is_some() {
            tracing::debug!("Entitlement cache hit for {}", identity);
        }
        cached
    }

    pub async fn set(&self, identity: &str, expiration_at: i64) {
        self.memory.insert(identity.to_string(), expiration_at).await;
    }

    pub async fn invalidate(&self, identity: &str) {
        self.memory.invalidate(identity).await;
    }
}

impl Default for EntitlementCache {
    fn default() -> Self {
        Self::new(10_000, Duration::from_secs(60))
    }
}
