//! HTTP server initialization and routing

use axum::{middleware, routing::get, Router};
use log::{info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

use crate::api_router::configure_api_routes;
use crate::audit::audit_middleware;
use crate::core::shared::state::AppState;
use crate::security::{
    auth_middleware, create_cors_layer_with_origins, create_rate_limit_layer,
    create_security_headers_layer, rate_limit_middleware, request_id_middleware,
    security_headers_middleware, AuthConfig, AuthMiddlewareState, ClinicRateLimiter,
    HttpRateLimitConfig, SecurityHeadersConfig,
};

use super::health_check;

const RATE_LIMIT_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

/// Full application router with the middleware stack applied.
///
/// Layers run outermost first: CORS, trace, request id, security headers,
/// rate limit, authentication, audit, then the handler.
pub fn build_router(state: Arc<AppState>) -> (Router, Arc<ClinicRateLimiter>) {
    let auth_state = AuthMiddlewareState::new(
        Arc::new(AuthConfig::default()),
        Arc::clone(&state.jwt),
    );
    let (rate_limit_extension, limiter) =
        create_rate_limit_layer(&HttpRateLimitConfig::from(&state.config.rate_limit));
    let security_headers_extension = create_security_headers_layer(SecurityHeadersConfig::default());
    let cors = create_cors_layer_with_origins(state.config.server.cors_origins.clone());

    let app = Router::new()
        .route("/health", get(health_check))
        .merge(configure_api_routes())
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            audit_middleware,
        ))
        .layer(middleware::from_fn_with_state(auth_state, auth_middleware))
        .layer(middleware::from_fn(rate_limit_middleware))
        .layer(rate_limit_extension)
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(security_headers_extension)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    (app, limiter)
}

pub async fn run_server(state: Arc<AppState>) -> anyhow::Result<()> {
    let host = state.config.server.host.clone();
    let port = state.config.server.port;

    #[cfg(feature = "automation")]
    {
        let scheduler = crate::backup::BackupScheduler::new(Arc::clone(&state.backup));
        tokio::spawn(scheduler.spawn());
        info!("Backup scheduler started");
    }

    let (app, limiter) = build_router(state);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(RATE_LIMIT_CLEANUP_INTERVAL);
        loop {
            ticker.tick().await;
            limiter.cleanup();
        }
    });

    let listener = tokio::net::TcpListener::bind((host.as_str(), port)).await?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped");
    Ok(())
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}
