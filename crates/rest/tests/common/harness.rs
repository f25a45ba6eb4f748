//! API test harness.

use std::sync::Arc;

use axum::http::HeaderValue;
use axum_test::TestServer;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tabula_persistence::backends::sqlite::SqliteBackend;
use tabula_persistence::schema::TableRegistry;
use tabula_rest::{ServerConfig, create_app_with_config};

use super::fixtures::{MEMBER_TOKEN, OWNER_TOKEN, STRANGER_TOKEN, configured_tables};

/// A reconciled in-memory database with three accounts.
pub struct TestWorld {
    pub backend: Arc<SqliteBackend>,
    pub registry: Arc<TableRegistry>,
    pub owner: String,
    pub member: String,
    pub stranger: String,
}

impl TestWorld {
    pub fn new() -> Self {
        let backend = SqliteBackend::in_memory().expect("Failed to create SQLite backend");
        let registry = backend
            .reconcile(configured_tables())
            .expect("Failed to reconcile schema");

        let owner = backend
            .ensure_account("owner@example.com", OWNER_TOKEN)
            .expect("Failed to create owner");
        let member = backend
            .ensure_account("member@example.com", MEMBER_TOKEN)
            .expect("Failed to create member");
        let stranger = backend
            .ensure_account("stranger@example.com", STRANGER_TOKEN)
            .expect("Failed to create stranger");

        Self {
            backend: Arc::new(backend),
            registry: Arc::new(registry),
            owner,
            member,
            stranger,
        }
    }

    /// The dashboard application over this world.
    pub fn app(&self) -> axum::Router {
        create_app_with_config(
            Arc::clone(&self.backend),
            Arc::clone(&self.registry),
            ServerConfig::for_testing(),
        )
    }

    pub fn server(&self) -> TestServer {
        TestServer::new(self.app()).expect("Failed to create test server")
    }
}

pub fn bearer(token: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {}", token)).expect("Invalid header value")
}

pub fn basic(user: &str, token: &str) -> HeaderValue {
    let encoded = STANDARD.encode(format!("{}:{}", user, token));
    HeaderValue::from_str(&format!("Basic {}", encoded)).expect("Invalid header value")
}
