//! Gatekeeper - Token Authentication Backend
//! Mission: Issue short-lived access tokens backed by rotating refresh tokens

use anyhow::{Context, Result};
use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::interval;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gatekeeper_backend::auth::{
    api as auth_api, auth_middleware, AuthService, AuthState, JwtHandler, RefreshTokenStore,
    UserStore,
};
use gatekeeper_backend::middleware::request_logging;
use gatekeeper_backend::models::Config;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = Config::from_env()?;
    info!("🚀 Starting gatekeeper on port {}", config.port);

    let user_store =
        Arc::new(UserStore::new(&config.database_path).context("Failed to open user store")?);
    let refresh_store = Arc::new(
        RefreshTokenStore::new(&config.database_path, config.refresh_token_ttl_secs)
            .context("Failed to open refresh token store")?,
    );
    let jwt_handler = Arc::new(JwtHandler::new(
        config.jwt_secret.clone(),
        config.access_token_ttl_secs,
    ));

    let auth_service = Arc::new(AuthService::new(
        user_store.clone(),
        refresh_store.clone(),
        jwt_handler.clone(),
    ));
    let auth_state = AuthState::new(auth_service, user_store, jwt_handler.clone());

    // Periodic sweep of expired refresh tokens, detached from request handling
    tokio::spawn(refresh_token_sweeper(
        refresh_store,
        Duration::from_secs(config.sweep_interval_secs),
    ));

    // Public auth routes
    let auth_router = Router::new()
        .route("/api/auth/login", post(auth_api::login))
        .route("/api/auth/refresh", post(auth_api::refresh))
        .route("/api/auth/logout", post(auth_api::logout))
        .with_state(auth_state.clone());

    // Protected routes (Bearer JWT required)
    let protected_routes = Router::new()
        .route("/api/auth/me", get(auth_api::get_current_user))
        .route(
            "/api/admin/users",
            get(auth_api::list_users).post(auth_api::create_user),
        )
        .route("/api/admin/users/:id", delete(auth_api::delete_user))
        .route_layer(middleware::from_fn_with_state(
            jwt_handler.clone(),
            auth_middleware,
        ))
        .with_state(auth_state);

    let public_routes = Router::new().route("/health", get(health_check));

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(auth_router)
        .layer(middleware::from_fn(request_logging))
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("🎯 API server listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

async fn health_check() -> &'static str {
    "ok"
}

/// Delete expired refresh token records on a fixed interval.
///
/// Runs for the lifetime of the process; rotation safety against a
/// concurrent sweep comes from the store's connection lock.
async fn refresh_token_sweeper(store: Arc<RefreshTokenStore>, period: Duration) {
    let mut ticker = interval(period);

    loop {
        ticker.tick().await;

        match store.sweep_expired(Utc::now()) {
            Ok(0) => {}
            Ok(removed) => info!("🧹 Swept {} expired refresh token(s)", removed),
            Err(e) => warn!("Refresh token sweep failed: {}", e),
        }
    }
}

/// Initialize tracing with env-filter overrides
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gatekeeper_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
