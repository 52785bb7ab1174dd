//! # quizctl: Authorization Core for the Quiz Platform
//!
//! `quizctl` decides who is calling and what they may do. Every request is resolved to an
//! optional [`AuthorizationContext`](auth::context::AuthorizationContext) carrying the caller's
//! identity, the scopes they hold, and the channel those were established through. Handlers
//! then gate work on scopes and resource ownership through a shared
//! [`PermissionGate`](auth::gate::PermissionGate).
//!
//! ## Overview
//!
//! Callers authenticate through one of two channels:
//!
//! - **API key** in the `x-api-key` header. The key carries its own stored permissions.
//! - **Session cookie** established by signing in through the identity provider. Members of the
//!   configured admin group receive every scope, everyone else a fixed baseline.
//!
//! The API key channel is tried first. A channel that fails for any reason (missing header,
//! revoked key, store outage) falls through to the next, and a request matching neither is
//! unauthenticated.
//!
//! API keys themselves are managed through guarded operations in
//! [`auth::key_lifecycle`]: only administrators may create or delete them, and creation
//! requests are validated against the scope catalog before the key store is contacted.
//!
//! ## Architecture
//!
//! The HTTP layer is built on [Axum](https://github.com/tokio-rs/axum). Credentials are stored
//! behind the [`store::ApiKeyStore`] and [`store::SessionStore`] traits, with a PostgreSQL
//! adapter for production and an in-memory adapter used when no database is configured.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use quizctl::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = quizctl::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     quizctl::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

pub mod api;
pub mod auth;
pub mod config;
mod crypto;
pub mod errors;
mod openapi;
pub mod store;
pub mod telemetry;
mod types;

#[cfg(test)]
mod test_utils;

use crate::{
    auth::{gate::PermissionGate, resolver::AuthContextResolver, roles::RoleDeriver},
    config::CorsOrigin,
    openapi::ApiDoc,
    store::{ApiKeyStore, CredentialSettings, SessionStore, in_memory::InMemoryStore, postgres::PostgresStore},
};
use axum::{
    Json, Router,
    http::{self, HeaderName, HeaderValue},
    routing::{delete, get},
};
use bon::Builder;
pub use config::Config;
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument, warn};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use types::{ApiKeyId, Channel, UserId};

/// Application state shared across all request handlers.
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .config(config)
///     .resolver(resolver)
///     .gate(gate)
///     .api_keys(api_keys)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub resolver: AuthContextResolver,
    pub gate: PermissionGate,
    pub api_keys: Arc<dyn ApiKeyStore>,
}

impl AppState {
    /// Wire the resolver and gate over the given stores, using the role and credential
    /// settings from `config`.
    pub fn from_stores(config: Config, api_keys: Arc<dyn ApiKeyStore>, sessions: Arc<dyn SessionStore>) -> anyhow::Result<Self> {
        let roles = RoleDeriver::new(config.auth.admin_group.clone());
        let settings = CredentialSettings::from_config(&config)?;
        let resolver = AuthContextResolver::new(
            api_keys.clone(),
            sessions,
            roles.clone(),
            settings,
            config.auth.store_timeout,
        );

        Ok(AppState::builder()
            .config(config)
            .resolver(resolver)
            .gate(PermissionGate::new(roles))
            .api_keys(api_keys)
            .build())
    }
}

/// Get the quizctl database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let allowed = &config.auth.security.cors.allowed_origins;
    let origins = if allowed.iter().any(|origin| matches!(origin, CorsOrigin::Wildcard)) {
        AllowOrigin::any()
    } else {
        let mut origins = Vec::new();
        for origin in allowed {
            if let CorsOrigin::Url(url) = origin {
                origins.push(url.as_str().trim_end_matches('/').parse::<HeaderValue>()?);
            }
        }
        AllowOrigin::list(origins)
    };

    let mut cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(config.auth.security.cors.allow_credentials)
        .allow_methods([http::Method::GET, http::Method::POST, http::Method::DELETE])
        .allow_headers([
            http::header::CONTENT_TYPE,
            HeaderName::try_from(config.auth.api_key_header.as_str())?,
        ])
        .expose_headers(vec![http::header::LOCATION]);

    if let Some(max_age) = config.auth.security.cors.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router.
///
/// - `/healthz`: liveness
/// - `/api/v1/*`: scope catalog, auth context and API key management
/// - `/api/v1/openapi.json` and `/api/docs`: API documentation
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    let api_routes = Router::new()
        .route("/scopes", get(api::handlers::scopes::list_scopes))
        .route("/auth/context", get(api::handlers::auth::get_auth_context))
        .route(
            "/api-keys",
            get(api::handlers::api_keys::list_api_keys).post(api::handlers::api_keys::create_api_key),
        )
        .route("/api-keys/{key_id}", delete(api::handlers::api_keys::delete_api_key))
        .route("/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .with_state(state.clone());

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .nest("/api/v1", api_routes)
        .merge(Scalar::with_url("/api/docs", ApiDoc::openapi()))
        .layer(create_cors_layer(&state.config)?)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    Ok(router)
}

/// Connect to PostgreSQL and run migrations when configured to.
async fn setup_database(config: &Config, url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(url)
        .await?;

    if config.database.run_migrations {
        info!("Running database migrations");
        migrator().run(&pool).await?;
    }

    Ok(pool)
}

pub struct Application {
    router: Router,
    config: Config,
    pool: Option<PgPool>,
}

impl Application {
    /// Create a new application instance with all resources initialized.
    ///
    /// Credentials are read from PostgreSQL when `database.url` is set, otherwise from an
    /// empty in-memory store.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting quizctl with configuration: {:#?}", config);

        let settings = CredentialSettings::from_config(&config)?;
        let api_keys: Arc<dyn ApiKeyStore>;
        let sessions: Arc<dyn SessionStore>;
        let pool = match config.database.url.as_deref() {
            Some(url) => {
                info!("Using PostgreSQL credential store");
                let pool = setup_database(&config, url).await?;
                let store = Arc::new(PostgresStore::new(pool.clone(), settings));
                api_keys = store.clone();
                sessions = store;
                Some(pool)
            }
            None => {
                warn!("No database configured; credentials are held in memory and lost on shutdown");
                let store = Arc::new(InMemoryStore::new(settings));
                api_keys = store.clone();
                sessions = store;
                None
            }
        };

        let state = AppState::from_stores(config.clone(), api_keys, sessions)?;
        let router = build_router(&state)?;

        Ok(Self { router, config, pool })
    }

    /// Create an application over caller-supplied stores.
    pub fn from_stores(config: Config, api_keys: Arc<dyn ApiKeyStore>, sessions: Arc<dyn SessionStore>) -> anyhow::Result<Self> {
        let state = AppState::from_stores(config.clone(), api_keys, sessions)?;
        let router = build_router(&state)?;
        Ok(Self {
            router,
            config,
            pool: None,
        })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router.into_make_service()).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("quizctl listening on http://{}", bind_addr);

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        if let Some(pool) = self.pool {
            info!("Closing database connections...");
            pool.close().await;
        }

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
