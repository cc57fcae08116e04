use axum::{routing::get, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{trace::TraceLayer, cors::{Any, CorsLayer}};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use learnpath::config::{Config, StoreBackend};
use learnpath::store::{MemoryStore, PgStore, Store};
use learnpath::{db, routes, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "learnpath=info,axum=info".into())
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = Config::from_env()?;
    let store: Arc<dyn Store> = match &cfg.store {
        StoreBackend::Postgres { url } => Arc::new(PgStore::new(db::connect(url).await?)),
        StoreBackend::Memory => {
            tracing::warn!("using in-memory store; nothing survives a restart");
            Arc::new(MemoryStore::new())
        }
    };
    let state = AppState::new(store).with_quiz_reset_delay(cfg.quiz_reset_delay);

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .merge(routes::router(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any));

    let addr = format!("0.0.0.0:{}", cfg.port);
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("listening on http://0.0.0.0:{}", cfg.port);

    axum::serve(listener, app).await?;
    Ok(())
}
