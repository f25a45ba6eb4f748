//! Dashboard API route configuration.

use axum::{
    Router, middleware,
    routing::get,
};
use tower_http::services::{ServeDir, ServeFile};

use crate::auth::authenticate_request;
use crate::handlers;
use crate::state::{AppState, StorageBackend};

/// Creates all dashboard API routes.
///
/// # Routes
///
/// ## System-level
/// - `GET /ping` - Liveness
/// - `GET /health` - Health check
/// - `GET /meta` - Tables and columns
/// - `GET /jsmodel/{table}` - One table's model
///
/// ## Table-level
/// - `GET /api/{table}` - List
/// - `POST /api/{table}` - Create
///
/// ## Row-level
/// - `GET /api/{table}/{reference_id}` - Read
/// - `PATCH /api/{table}/{reference_id}` - Update
/// - `PUT /api/{table}/{reference_id}` - Update
/// - `DELETE /api/{table}/{reference_id}` - Delete
///
/// Every route runs behind [`authenticate_request`]. When a dashboard root is
/// configured, other paths are served from it with `index.html` as fallback.
pub fn create_routes<S>(state: AppState<S>) -> Router
where
    S: StorageBackend,
{
    let router = Router::new()
        // System-level routes
        .route("/ping", get(handlers::ping_handler))
        .route("/health", get(handlers::health_handler::<S>))
        .route("/meta", get(handlers::meta_handler::<S>))
        .route("/jsmodel/{table}", get(handlers::jsmodel_handler::<S>))
        // Table-level routes
        .route(
            "/api/{table}",
            get(handlers::list_handler::<S>).post(handlers::create_handler::<S>),
        )
        // Row-level routes
        .route(
            "/api/{table}/{reference_id}",
            get(handlers::read_handler::<S>)
                .patch(handlers::update_handler::<S>)
                .put(handlers::update_handler::<S>)
                .delete(handlers::delete_handler::<S>),
        );

    let router = match &state.config().dashboard_root {
        Some(root) => router.fallback_service(
            ServeDir::new(root).fallback(ServeFile::new(root.join("index.html"))),
        ),
        None => router,
    };

    router
        .layer(middleware::from_fn_with_state(
            state.clone(),
            authenticate_request::<S>,
        ))
        .with_state(state)
}
