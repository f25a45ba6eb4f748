//! # tabula-rest - HTTP API of the Tabula server
//!
//! This crate exposes the tables governed by `tabula-persistence` as a JSON
//! API, filters every row through the owner/group/guest permission model and
//! routes requests between tenant sites and the dashboard application.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tabula_rest::{ServerConfig, build_snapshot, auth::StoreAuthenticator, tenant::TenantRouter};
//! use tabula_persistence::backends::sqlite::SqliteBackend;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let backend = Arc::new(SqliteBackend::open("tabula.db")?);
//!     let registry = Arc::new(backend.reconcile(Vec::new())?);
//!     let config = ServerConfig::default();
//!
//!     let snapshot = build_snapshot(Arc::clone(&backend), registry, config.clone()).await?;
//!     let router = TenantRouter::new(snapshot, Arc::new(StoreAuthenticator::new(backend)));
//!
//!     let listener = tokio::net::TcpListener::bind(config.socket_addr()).await?;
//!     axum::serve(listener, axum::ServiceExt::into_make_service(router)).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## API Endpoints
//!
//! | Interaction | HTTP Method | URL Pattern |
//! |------------|-------------|-------------|
//! | list | GET | `/api/{table}?page=&size=` |
//! | create | POST | `/api/{table}` |
//! | read | GET | `/api/{table}/{reference_id}` |
//! | update | PATCH, PUT | `/api/{table}/{reference_id}` |
//! | delete | DELETE | `/api/{table}/{reference_id}` |
//! | tables | GET | `/meta` |
//! | table model | GET | `/jsmodel/{table}` |
//! | liveness | GET | `/ping`, `/health` |
//!
//! Request bodies and responses are documents of the form
//! `{"data": ..., "included": [...]}`.
//!
//! ## Error Handling
//!
//! | HTTP Status | Code | Description |
//! |-------------|------|-------------|
//! | 400 | invalid | Unknown column or failed validation |
//! | 401 | unauthorized | Invalid credentials, or a guest denied access |
//! | 403 | forbidden | An authenticated actor denied access |
//! | 404 | not-found | Unknown table or row |
//! | 409 | conflict | Unique constraint violated |
//! | 500 | exception | Internal server error |
//!
//! ## Architecture
//!
//! - [`error`] - Error types and the JSON error document
//! - [`config`] - Server configuration
//! - [`state`] - Application state (storage, tables, configuration)
//! - [`auth`] - Token authentication
//! - [`handlers`] - HTTP request handlers
//! - [`middleware`] - The access interceptor
//! - [`extractors`] - Axum extractors
//! - [`responses`] - Response documents
//! - [`routing`] - Route configuration
//! - [`tenant`] - Tenant sites and the tenant router

#![warn(rustdoc::missing_crate_level_docs)]

pub mod auth;
pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod responses;
pub mod routing;
pub mod state;
pub mod tenant;

// Re-export commonly used types
pub use config::ServerConfig;
pub use error::{RestError, RestResult};
pub use state::{AppState, StorageBackend};

use std::sync::Arc;

use axum::Router;
use tabula_persistence::error::StorageResult;
use tabula_persistence::schema::TableRegistry;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

use crate::tenant::{RouterSnapshot, load_sites};

/// Creates the dashboard application with default configuration.
///
/// This is a convenience function that creates the app with default settings.
/// For more control, use [`create_app_with_config`].
pub fn create_app<S>(storage: Arc<S>, registry: Arc<TableRegistry>) -> Router
where
    S: StorageBackend,
{
    create_app_with_config(storage, registry, ServerConfig::default())
}

/// Creates the dashboard application with custom configuration.
///
/// This function sets up the complete API with all handlers, middleware, and
/// configuration.
///
/// # Example
///
/// ```rust,ignore
/// use tabula_rest::{create_app_with_config, ServerConfig};
///
/// let config = ServerConfig {
///     port: 3000,
///     enable_cors: true,
///     ..Default::default()
/// };
/// let app = create_app_with_config(backend, registry, config);
/// ```
pub fn create_app_with_config<S>(
    storage: Arc<S>,
    registry: Arc<TableRegistry>,
    config: ServerConfig,
) -> Router
where
    S: StorageBackend,
{
    info!(
        backend = storage.backend_name(),
        tables = registry.len(),
        "Creating dashboard application"
    );

    // Create application state
    let state = AppState::new(storage, registry, config.clone());

    // Build the router with all API routes
    let router = routing::create_routes(state);

    // Build middleware stack
    let service_builder = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            axum::http::StatusCode::REQUEST_TIMEOUT,
            std::time::Duration::from_secs(config.request_timeout),
        ));

    // Add CORS if enabled
    let router = if config.enable_cors {
        let cors = build_cors_layer(&config);
        router.layer(cors)
    } else {
        router
    };

    // Apply remaining middleware
    router.layer(service_builder)
}

/// Loads the sites and builds the routing snapshot around a fresh dashboard
/// application.
pub async fn build_snapshot<S>(
    storage: Arc<S>,
    registry: Arc<TableRegistry>,
    config: ServerConfig,
) -> StorageResult<RouterSnapshot>
where
    S: StorageBackend,
{
    let sites = load_sites(storage.as_ref(), registry.as_ref()).await?;
    let dashboard = create_app_with_config(storage, registry, config);
    Ok(RouterSnapshot::build(sites, dashboard))
}

/// Builds the CORS layer based on configuration.
fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let mut cors = CorsLayer::new();

    // Configure origins
    if config.cors_origins == "*" {
        cors = cors.allow_origin(Any);
    } else {
        let origins: Vec<_> = config
            .cors_origins
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors = cors.allow_origin(origins);
    }

    // Configure methods
    if config.cors_methods == "*" {
        cors = cors.allow_methods(Any);
    } else {
        let methods: Vec<_> = config
            .cors_methods
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors = cors.allow_methods(methods);
    }

    // Configure headers
    if config.cors_headers == "*" {
        cors = cors.allow_headers(Any);
    } else {
        let headers: Vec<_> = config
            .cors_headers
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors = cors.allow_headers(headers);
    }

    cors
}

/// Initializes the tracing subscriber for logging.
///
/// This should be called once at application startup.
///
/// # Arguments
///
/// * `level` - The log level (error, warn, info, debug, trace)
pub fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "tabula={level},tabula_rest={level},tabula_persistence={level},tower_http=debug"
        ))
    });

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}
