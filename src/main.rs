use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use bizhub_api::config::AppConfig;
use bizhub_api::database::DatabaseManager;
use bizhub_api::policy::PolicyEngine;
use bizhub_api::session::{MemorySessionStore, PgSessionStore, SessionStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::load().context("invalid configuration")?;
    info!("Starting bizhub API in {:?} mode", config.environment);

    let policy = PolicyEngine::from_paths(
        config.policy.model_path.as_deref(),
        config.policy.rules_path.as_deref(),
    )
    .await
    .context("failed to load access policy")?;

    let (sessions, db): (Arc<dyn SessionStore>, Option<DatabaseManager>) = match config.database.url {
        Some(_) => {
            let db = DatabaseManager::connect(&config.database).await?;
            let store = PgSessionStore::new(db.pool().clone());
            store.ensure_schema().await?;
            (Arc::new(store), Some(db))
        }
        None => {
            warn!("DATABASE_URL not set; sessions are kept in memory and lost on restart");
            (Arc::new(MemorySessionStore::new()), None)
        }
    };

    let state = bizhub_api::build_state(&config.security, sessions, Arc::new(policy))?;
    let mut app = bizhub_api::router(state);
    if config.security.enable_cors {
        app = app.layer(bizhub_api::cors_layer(&config.security));
    }

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    info!("bizhub API listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(db) = db {
        db.close().await;
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
