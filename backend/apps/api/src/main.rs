//! API Server Entry Point
//!
//! Application entry point and server initialization.
//! Uses `anyhow` for startup errors; request-level errors are
//! rendered by the auth crate.

mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use auth::{
    AuthServices, LogMailer, MailOutbox, PgAuthStore, PgRateLimitStore, auth_router,
    spawn_mail_worker,
};
use axum::{
    Router,
    http::{HeaderName, Method, header},
};
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ServerConfig;

/// Response headers the browser frontend may read cross-origin
const EXPOSED_HEADERS: [&str; 5] = [
    "x-request-id",
    "retry-after",
    "x-ratelimit-limit",
    "x-ratelimit-remaining",
    "x-ratelimit-reset",
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "portal_api=info,auth=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;
    tracing::info!(
        app_env = ?config.app_env,
        trusted_proxies = config.auth.trusted_proxies.len(),
        "Configuration loaded"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;

    tracing::info!("Connected to database");

    // Run migrations
    sqlx::migrate!("../../../database/migrations")
        .run(&pool)
        .await?;

    tracing::info!("Migrations completed");

    // Startup cleanup: errors here should not prevent server startup
    let auth_store = PgAuthStore::new(pool.clone());
    match auth_store.cleanup_expired().await {
        Ok((sessions, reset_tokens)) => {
            tracing::info!(
                sessions_deleted = sessions,
                reset_tokens_deleted = reset_tokens,
                "Auth token cleanup completed"
            );
        }
        Err(e) => {
            tracing::warn!(error = %e, "Auth token cleanup failed, continuing anyway");
        }
    }

    let rate_limit_store = PgRateLimitStore::new(pool.clone());
    match rate_limit_store.cleanup_expired().await {
        Ok(windows) => {
            tracing::info!(windows_deleted = windows, "Rate limit cleanup completed");
        }
        Err(e) => {
            tracing::warn!(error = %e, "Rate limit cleanup failed, continuing anyway");
        }
    }

    // Reset mails leave the request path through a bounded outbox
    let (outbox, mail_rx) = MailOutbox::channel(config.auth.outbox_capacity);
    spawn_mail_worker(mail_rx, Arc::new(LogMailer));

    let services = Arc::new(AuthServices::new(
        Arc::new(auth_store),
        Arc::new(rate_limit_store),
        outbox,
        config.auth,
    ));

    let cors = CorsLayer::new()
        .allow_origin(config.frontend_origins)
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            HeaderName::from_static("x-request-id"),
        ]))
        .expose_headers(EXPOSED_HEADERS.map(HeaderName::from_static))
        .allow_credentials(true);

    // Build router
    let app = Router::new()
        .nest("/auth", auth_router(services))
        .layer(cors);

    // Start server
    tracing::info!("Listening on {}", config.bind_addr);

    let listener = TcpListener::bind(config.bind_addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Gracefully shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_headers_are_exposed() {
        for name in ["x-ratelimit-limit", "x-ratelimit-remaining", "x-ratelimit-reset"] {
            assert!(EXPOSED_HEADERS.contains(&name), "{name}");
        }
        // from_static panics on invalid names
        let _ = EXPOSED_HEADERS.map(HeaderName::from_static);
    }
}
