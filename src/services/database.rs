use std::time::Duration;

use sqlx::any::{install_default_drivers, AnyPoolOptions};
use sqlx::AnyPool;

use crate::error::RelayError;

// Opens the shared pool. PostgreSQL in production; `sqlite:` URLs work for
// local runs and tests.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<AnyPool, RelayError> {
    install_default_drivers();

    let pool = AnyPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await?;

    tracing::info!(max_connections, "Database pool ready");
    Ok(pool)
}

pub async fn ping(pool: &AnyPool) -> bool {
    match sqlx::query("SELECT 1").execute(pool).await {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!("Database ping failed: {}", e);
            false
        }
    }
}
