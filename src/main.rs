use anyhow::{Context, Result};
use axum::{routing::get, Router};
use chrono::Duration as ChronoDuration;
use paid_relay::{
    config::Config,
    handlers::{health_check, HealthState},
    middleware::AdmissionController,
    relay::PaidRelay,
    services::*,
};
use std::sync::Arc;
use std::time::Instant;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    tracing::info!("Starting paid relay v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Environment: {:?}", config.environment);

    // Storage
    let pool = database::connect(&config.database_url, config.database_max_connections)
        .await
        .context("failed to connect to database")?;
    let payments = PaymentStore::new(
        pool.clone(),
        ChronoDuration::days(config.entitlement_days),
        EntitlementCache::default(),
    );
    payments.init().await.context("failed to init payment table")?;
    let events = EventStore::new(pool);
    events.init().await.context("failed to init event table")?;

    // Chain
    let registry = EndpointRegistry::new(&config.chain_registry_url, config.rpc_timeout)?;
    let chain = ChainClient::connect(
        &config.chain_name,
        config.rpc_url.as_deref(),
        &registry,
        config.infura_api_key.as_deref(),
        config.rpc_timeout,
    )
    .await
    .context("init eth client failed")?;

    let verifier = IdentityVerifier::new(
        config.required_amount,
        config.payment_address,
        config.identity_binding,
    );
    tracing::info!(
        amount = %config.payment_amount,
        minimal_units = %config.required_amount,
        address = ?config.payment_address,
        binding = ?config.identity_binding,
        "Payment requirements"
    );

    let admission = Arc::new(
        AdmissionController::new(Arc::new(chain), verifier, payments)
            .with_max_event_bytes(config.max_event_bytes),
    );

    let relay = PaidRelay::new(
        admission.clone(),
        RetentionSweeper::new(events, config.retention_months, config.sweep_interval),
    );
    let _sweeper = relay.init();

    let health_state = HealthState {
        admission,
        started_at: Instant::now(),
    };

    // Build router
    let app: Router = Router::new()
        .route("/health", get(health_check))
        .with_state(health_state);
    let app = relay
        .on_initialized(app)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(true)),
        )
        .layer(CorsLayer::permissive());

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("{} listening on http://{}", relay.name(), addr);
    tracing::info!("Payments: POST http://{}/payments", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for ctrl+c: {}", e);
        return;
    }
    tracing::info!("Shutting down gracefully...");
}
