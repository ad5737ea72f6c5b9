//! da-hi Marketplace - multi-seller marketplace API

use std::sync::Arc;

use anyhow::Result;
use dahi_marketplace::api::{router, AppState};
use dahi_marketplace::config::Config;
use dahi_marketplace::notify::{LogNotifier, NatsNotifier, Notifier};
use dahi_marketplace::store::{MemoryStore, PgStore, Store};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    let config = Config::from_env()?;

    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => {
            let pg = PgStore::connect(url, config.database_max_connections).await?;
            pg.migrate().await?;
            Arc::new(pg)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let notifier: Arc<dyn Notifier> = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Arc::new(NatsNotifier::new(client, config.notify_subject_prefix.clone())),
            Err(e) => {
                tracing::warn!(error = %e, "NATS unavailable, notifications will only be logged");
                Arc::new(LogNotifier)
            }
        },
        None => Arc::new(LogNotifier),
    };

    let app = router(AppState::new(store, notifier, &config));
    tracing::info!("da-hi Marketplace listening on 0.0.0.0:{}", config.port);
    axum::serve(tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?, app).await?;
    Ok(())
}
