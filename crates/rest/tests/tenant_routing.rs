//! Integration tests for tenant routing.
//!
//! Tests the dispatch between sites and the dashboard application:
//! - Sites by hostname, with a Basic challenge when access is denied
//! - Sites by first path segment, with the prefix stripped
//! - Reserved API paths and the default site
//! - Snapshot replacement

mod common;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::http::{HeaderValue, Request, StatusCode, header};
use axum::response::Response;
use serde_json::{Value, json};
use tabula_persistence::permission::PermissionCode;
use tabula_rest::auth::StoreAuthenticator;
use tabula_rest::tenant::{RouterSnapshot, TenantRouter};
use tabula_rest::{ServerConfig, build_snapshot};
use tempfile::TempDir;
use tower::ServiceExt;

use common::fixtures::{OWNER_TOKEN, STRANGER_TOKEN, seed};
use common::harness::{TestWorld, basic, bearer};

/// Writes `<root>/<dir>/index.html`.
fn write_site(root: &Path, dir: &str, contents: &str) {
    let dir = root.join(dir);
    fs::create_dir_all(&dir).expect("Failed to create site directory");
    fs::write(dir.join("index.html"), contents).expect("Failed to write index.html");
}

/// A world with a local cloud store and four sites:
///
/// | Site | Routed by | Access |
/// |------|-----------|--------|
/// | blog | blog.example.com | public |
/// | private | private.example.com | owner only |
/// | handbook | /handbook | public |
/// | vault | /vault | owner only |
async fn setup() -> (TestWorld, TempDir, String) {
    let world = TestWorld::new();
    let root = TempDir::new().expect("Failed to create temp dir");
    for (dir, contents) in [
        ("blog", "blog home"),
        ("private", "private home"),
        ("handbook", "handbook home"),
        ("vault", "vault home"),
        ("fallback", "default home"),
    ] {
        write_site(root.path(), dir, contents);
    }

    let store = seed(
        &world.backend,
        &world.registry,
        "cloud_store",
        Some(&world.owner),
        json!({"name": "local", "root_path": root.path().display().to_string()}),
    )
    .await;

    let private = PermissionCode::DEFAULT_ROW.to_i64();
    for site in [
        json!({"name": "blog", "hostname": "Blog.Example.com", "storage_root": "blog"}),
        json!({"name": "private", "hostname": "private.example.com", "storage_root": "private", "permission": private}),
        json!({"name": "handbook", "path": "/handbook/", "storage_root": "handbook"}),
        json!({"name": "vault", "path": "vault", "storage_root": "vault", "permission": private}),
    ] {
        let mut site = site;
        site["cloud_store_id"] = Value::String(store.clone());
        seed(&world.backend, &world.registry, "site", Some(&world.owner), site).await;
    }

    (world, root, store)
}

async fn router(world: &TestWorld) -> TenantRouter {
    let snapshot = snapshot(world).await;
    TenantRouter::new(snapshot, Arc::new(StoreAuthenticator::new(Arc::clone(&world.backend))))
}

async fn snapshot(world: &TestWorld) -> RouterSnapshot {
    build_snapshot(
        Arc::clone(&world.backend),
        Arc::clone(&world.registry),
        ServerConfig::for_testing(),
    )
    .await
    .expect("Failed to build snapshot")
}

async fn send(
    router: &TenantRouter,
    host: &str,
    path: &str,
    authorization: Option<HeaderValue>,
) -> Response {
    let mut builder = Request::builder().uri(path).header(header::HOST, host);
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    let request = builder.body(Body::empty()).expect("Failed to build request");
    router
        .clone()
        .oneshot(request)
        .await
        .expect("Tenant router is infallible")
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    String::from_utf8(bytes.to_vec()).expect("Body is not UTF-8")
}

// =============================================================================
// Host Routing Tests
// =============================================================================

mod host_routing {
    use super::*;

    #[tokio::test]
    async fn test_public_site_by_host() {
        let (world, _root, _store) = setup().await;
        let router = router(&world).await;

        let response = send(&router, "blog.example.com", "/", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "blog home");
    }

    #[tokio::test]
    async fn test_host_port_and_case_are_ignored() {
        let (world, _root, _store) = setup().await;
        let router = router(&world).await;

        let response = send(&router, "BLOG.example.com:8080", "/index.html", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "blog home");
    }

    #[tokio::test]
    async fn test_unknown_file_falls_back_to_index() {
        let (world, _root, _store) = setup().await;
        let router = router(&world).await;

        let response = send(&router, "blog.example.com", "/posts/42", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "blog home");
    }

    #[tokio::test]
    async fn test_private_site_challenges_guest() {
        let (world, _root, _store) = setup().await;
        let router = router(&world).await;

        let response = send(&router, "private.example.com", "/", None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Basic realm=\"private.example.com\""
        );
    }

    #[tokio::test]
    async fn test_private_site_challenges_stranger_and_bad_credentials() {
        let (world, _root, _store) = setup().await;
        let router = router(&world).await;

        let response = send(
            &router,
            "private.example.com",
            "/",
            Some(basic("stranger@example.com", STRANGER_TOKEN)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = send(&router, "private.example.com", "/", Some(basic("x", "wrong"))).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));
    }

    #[tokio::test]
    async fn test_private_site_serves_owner() {
        let (world, _root, _store) = setup().await;
        let router = router(&world).await;

        let response = send(
            &router,
            "private.example.com",
            "/",
            Some(basic("owner@example.com", OWNER_TOKEN)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "private home");
    }

    #[tokio::test]
    async fn test_reserved_paths_reach_dashboard() {
        let (world, _root, _store) = setup().await;
        let router = router(&world).await;

        let response = send(&router, "blog.example.com", "/meta", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert!(body["data"].is_array());

        let response = send(&router, "private.example.com", "/api/note", None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}

// =============================================================================
// Path Prefix Routing Tests
// =============================================================================

mod path_routing {
    use super::*;

    #[tokio::test]
    async fn test_public_site_by_path_prefix() {
        let (world, _root, _store) = setup().await;
        let router = router(&world).await;

        let response = send(&router, "localhost", "/handbook/index.html", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "handbook home");
    }

    #[tokio::test]
    async fn test_private_path_site_is_forbidden() {
        let (world, _root, _store) = setup().await;
        let router = router(&world).await;

        let response = send(&router, "localhost", "/vault/", None).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(!response.headers().contains_key(header::WWW_AUTHENTICATE));

        let response = send(&router, "localhost", "/vault/", Some(bearer("wrong"))).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = send(&router, "localhost", "/vault/", Some(bearer(OWNER_TOKEN))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "vault home");
    }

    #[tokio::test]
    async fn test_unmatched_requests_reach_dashboard() {
        let (world, _root, _store) = setup().await;
        let router = router(&world).await;

        let response = send(&router, "localhost", "/ping", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "pong");
    }
}

// =============================================================================
// Snapshot Tests
// =============================================================================

mod snapshots {
    use super::*;

    #[tokio::test]
    async fn test_sites_without_storage_are_not_served() {
        let (world, _root, _store) = setup().await;
        seed(
            &world.backend,
            &world.registry,
            "site",
            Some(&world.owner),
            json!({"name": "ghost", "hostname": "ghost.example.com"}),
        )
        .await;
        let router = router(&world).await;

        assert!(router.snapshot().by_host("ghost.example.com").is_none());
        let response = send(&router, "ghost.example.com", "/ping", None).await;
        assert_eq!(body_text(response).await, "pong");
    }

    #[tokio::test]
    async fn test_swap_publishes_new_sites() {
        let (world, _root, store) = setup().await;
        let router = router(&world).await;

        let response = send(&router, "localhost", "/ping", None).await;
        assert_eq!(body_text(response).await, "pong");

        seed(
            &world.backend,
            &world.registry,
            "site",
            Some(&world.owner),
            json!({
                "name": "fallback",
                "hostname": "default",
                "storage_root": "fallback",
                "cloud_store_id": store
            }),
        )
        .await;
        let previous = router.swap(snapshot(&world).await);
        assert!(previous.default_handler().is_none());
        assert!(router.snapshot().default_handler().is_some());

        let response = send(&router, "localhost", "/ping", None).await;
        assert_eq!(body_text(response).await, "default home");

        let response = send(&router, "dashboard.example.com", "/ping", None).await;
        assert_eq!(body_text(response).await, "pong");
    }
}
