mod config;

use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use campustalk_api::{MessagingService, SessionManager, routes};
use campustalk_db::Database;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "campustalk=debug,campustalk_api=debug,campustalk_db=info,tower_http=debug".into()
            }),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db = Arc::new(Database::open(&config.db_path)?);

    let sessions = SessionManager::new(&config.jwt_secret, config.session_ttl);
    let service =
        MessagingService::new(db, sessions).with_store_timeout(config.store_timeout);

    let app = routes::router(Arc::new(service))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    info!("CampusTalk server listening on {}", config.addr);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
