mod bootstrap;
mod caller;
mod chat;
mod error;
mod health;
mod logging;
mod notifications;

use std::time::Duration;

use anyhow::Result;
use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::Router;
use carebook_core::config::{AppConfig, LoadOptions, ServerConfig};
use tokio::sync::oneshot;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use crate::bootstrap::Application;

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    logging::init_logging(&config.logging);

    let app = bootstrap::bootstrap_with_config(config).await?;
    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    let router = app_router(&app);

    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "carebook-server listening"
    );

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                let _ = stop_rx.await;
            })
            .await
    });

    wait_for_shutdown().await?;
    info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        grace_secs = grace.as_secs(),
        "carebook-server draining in-flight requests"
    );
    let _ = stop_tx.send(());

    match tokio::time::timeout(grace, server).await {
        Ok(joined) => joined??,
        Err(_) => warn!(
            event_name = "system.server.shutdown_timeout",
            correlation_id = "shutdown",
            "in-flight requests did not finish within the grace period"
        ),
    }

    app.db_pool.close().await;
    info!(event_name = "system.server.stopped", correlation_id = "shutdown", "carebook-server stopped");
    Ok(())
}

fn app_router(app: &Application) -> Router {
    Router::new()
        .merge(health::router(app.db_pool.clone(), app.audit.clone()))
        .nest("/api/v1/chat", chat::router(app.runtime.clone()))
        .merge(notifications::router(app.runtime.clone(), app.notifications.clone(), app.clock))
        .layer(cors_layer(&app.config.server))
}

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let origins = server
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(event_name = "system.server.cors_origin_skipped", origin = %origin, "invalid CORS origin");
                None
            }
        })
        .collect::<Vec<_>>();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static(caller::USER_ID_HEADER)])
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
