//! Marketplace Core - order placement and inventory server

use anyhow::Result;
use marketplace_core::config::Config;
use marketplace_core::domain::events::{EventPublisher, NatsPublisher, TracingPublisher};
use marketplace_core::http::{router, AppState};
use marketplace_core::services::PricingPolicy;
use marketplace_core::storage::{InMemoryStore, PgStore, Store};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();
    let config = Config::from_env().inspect_err(|e| tracing::error!(error = %e, "invalid configuration"))?;

    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => {
            let store = PgStore::connect(url, config.database_max_connections).await?;
            store.migrate().await?;
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store");
            Arc::new(InMemoryStore::new())
        }
    };

    let events: Arc<dyn EventPublisher> = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Arc::new(NatsPublisher::new(client, config.nats_subject_prefix.clone())),
            Err(e) => {
                tracing::warn!(error = %e, "NATS unavailable, domain events will only be logged");
                Arc::new(TracingPublisher)
            }
        },
        None => Arc::new(TracingPublisher),
    };

    let state = AppState::new(store, events, PricingPolicy { delivery_charge: config.delivery_charge });
    let app = router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("marketplace-core listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(&addr).await?, app).await?;
    Ok(())
}
