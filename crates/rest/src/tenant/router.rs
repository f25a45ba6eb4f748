//! Host and path based dispatch between tenant sites and the dashboard.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::{
    Router,
    extract::Request,
    http::{StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use parking_lot::RwLock;
use tabula_persistence::permission::{Actor, Capability};
use tower::{Service, ServiceExt};
use tracing::{debug, error, info};

use crate::auth::{AuthOutcome, Authenticator};
use crate::error::error_document;

use super::site::strip_port;
use super::snapshot::{RouterSnapshot, TenantHandler};

/// First path segments that always belong to the dashboard API.
pub const RESERVED_PATHS: &[&str] = &["api", "action", "meta", "jsmodel"];

/// Host prefixes that never fall through to the default handler.
const DASHBOARD_HOST_PREFIXES: &[&str] = &["dashboard.", "api."];

/// Where one request goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// The tenant registered for the request's host.
    Host { host: String },
    /// The tenant registered for the first path segment, with the path that
    /// remains after stripping it.
    PathPrefix { prefix: String, path: String },
    /// The default handler.
    Default,
    /// The dashboard application.
    Dashboard,
}

/// Classifies a request by host (port already stripped) and path.
pub fn classify(host: &str, path: &str, snapshot: &RouterSnapshot) -> RouteDecision {
    let mut segments = path.trim_start_matches('/').split('/');
    let first = segments.next().unwrap_or_default();
    let reserved = RESERVED_PATHS.contains(&first);

    if !reserved && snapshot.by_host(host).is_some() {
        return RouteDecision::Host {
            host: host.to_string(),
        };
    }

    if !reserved && !first.is_empty() && snapshot.by_path(first).is_some() {
        let rest: Vec<&str> = segments.collect();
        return RouteDecision::PathPrefix {
            prefix: first.to_string(),
            path: format!("/{}", rest.join("/")),
        };
    }

    let dashboard_host = DASHBOARD_HOST_PREFIXES
        .iter()
        .any(|prefix| host.starts_with(prefix));
    if !dashboard_host && snapshot.default_handler().is_some() {
        return RouteDecision::Default;
    }

    RouteDecision::Dashboard
}

/// The root service of the listener.
///
/// Each request reads the current [`RouterSnapshot`] once and is served
/// entirely from it. [`swap`](Self::swap) publishes a new snapshot for later
/// requests without disturbing requests in flight.
#[derive(Clone)]
pub struct TenantRouter {
    snapshot: Arc<RwLock<Arc<RouterSnapshot>>>,
    authenticator: Arc<dyn Authenticator>,
}

impl TenantRouter {
    pub fn new(snapshot: RouterSnapshot, authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            snapshot: Arc::new(RwLock::new(Arc::new(snapshot))),
            authenticator,
        }
    }

    /// The snapshot new requests are served from.
    pub fn snapshot(&self) -> Arc<RouterSnapshot> {
        let current = self.snapshot.read();
        Arc::clone(&*current)
    }

    /// Publishes `snapshot` and returns the one it replaces.
    pub fn swap(&self, snapshot: RouterSnapshot) -> Arc<RouterSnapshot> {
        let previous = std::mem::replace(&mut *self.snapshot.write(), Arc::new(snapshot));
        info!(snapshot = ?previous, "Replaced tenant routing snapshot");
        previous
    }

    /// Replaces the authenticator used for tenant requests.
    pub fn with_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = authenticator;
        self
    }

    /// Serves one request.
    pub async fn serve(&self, request: Request) -> Response {
        let snapshot = self.snapshot();
        let host = request_host(&request);
        let decision = classify(&host, request.uri().path(), &snapshot);
        debug!(host = %host, path = %request.uri().path(), ?decision, "Routing request");

        match decision {
            RouteDecision::Host { host } => match snapshot.by_host(&host) {
                Some(tenant) => self.serve_host(tenant, &host, request).await,
                None => dashboard_missing(),
            },
            RouteDecision::PathPrefix { prefix, path } => match snapshot.by_path(&prefix) {
                Some(tenant) => self.serve_prefixed(tenant, &path, request).await,
                None => dashboard_missing(),
            },
            RouteDecision::Default => match snapshot.default_handler() {
                Some(handler) => call(handler, request).await,
                None => dashboard_missing(),
            },
            RouteDecision::Dashboard => match snapshot.dashboard() {
                Some(handler) => call(handler, request).await,
                None => dashboard_missing(),
            },
        }
    }

    async fn serve_host(&self, tenant: &TenantHandler, host: &str, mut request: Request) -> Response {
        let actor = match self.authenticator.authenticate(request.headers()) {
            AuthOutcome::Invalid => {
                debug!(host = %host, "Invalid credentials for tenant host");
                return challenge(host);
            }
            outcome => outcome.actor(),
        };
        if !may_execute(tenant, &actor) {
            debug!(host = %host, site = %tenant.site.name, actor = %actor.reference_id, "Site access denied");
            return challenge(host);
        }
        request.extensions_mut().insert(actor);
        call(&tenant.handler, request).await
    }

    async fn serve_prefixed(&self, tenant: &TenantHandler, path: &str, mut request: Request) -> Response {
        let actor = match self.authenticator.authenticate(request.headers()) {
            AuthOutcome::Invalid => return forbidden(),
            outcome => outcome.actor(),
        };
        if !may_execute(tenant, &actor) {
            debug!(site = %tenant.site.name, actor = %actor.reference_id, "Site access denied");
            return forbidden();
        }
        let uri = build_uri_with_new_path(request.uri(), path);
        *request.uri_mut() = uri;
        request.extensions_mut().insert(actor);
        call(&tenant.handler, request).await
    }
}

impl Service<Request> for TenantRouter {
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let router = self.clone();
        Box::pin(async move { Ok(router.serve(request).await) })
    }
}

fn may_execute(tenant: &TenantHandler, actor: &Actor) -> bool {
    tenant.site.permission.allows(actor, Capability::EXECUTE)
}

async fn call(handler: &Router, request: Request) -> Response {
    match handler.clone().oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    }
}

/// The request's host, lowercased and without port.
fn request_host(request: &Request) -> String {
    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| request.uri().host())
        .unwrap_or_default();
    strip_port(host).to_ascii_lowercase()
}

fn challenge(host: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, format!("Basic realm=\"{}\"", host))],
        "Unauthorized\n",
    )
        .into_response()
}

fn forbidden() -> Response {
    (StatusCode::FORBIDDEN, "Forbidden\n").into_response()
}

fn dashboard_missing() -> Response {
    error!("No handler registered for request, dashboard missing");
    let status = StatusCode::INTERNAL_SERVER_ERROR;
    let body = error_document(status, "exception", "No handler available");
    (status, axum::Json(body)).into_response()
}

/// Builds a new URI with a different path but same query.
fn build_uri_with_new_path(original: &Uri, new_path: &str) -> Uri {
    let path_and_query = match original.query() {
        Some(query) => format!("{}?{}", new_path, query),
        None => new_path.to_string(),
    };

    let mut parts = original.clone().into_parts();
    match path_and_query.parse() {
        Ok(pq) => parts.path_and_query = Some(pq),
        Err(_) => return original.clone(),
    }
    Uri::from_parts(parts).unwrap_or_else(|_| original.clone())
}
