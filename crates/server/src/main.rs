//! Tabula server.
//!
//! Reconciles the configured schema, loads the tenant sites and serves them
//! next to the dashboard API. On Unix, `SIGHUP` reloads the table
//! configuration and the sites without dropping connections.

use std::sync::Arc;

use axum::extract::Request;
use clap::Parser;
use tabula_persistence::backends::sqlite::SqliteBackend;
use tabula_persistence::schema::load_schema_dir;
use tabula_rest::auth::StoreAuthenticator;
use tabula_rest::tenant::{RouterSnapshot, TenantRouter};
use tabula_rest::{ServerConfig, build_snapshot, init_logging};
use tracing::{error, info};

#[cfg(not(feature = "sqlite"))]
compile_error!("The tabula server requires the 'sqlite' feature");

/// Opens the SQLite database named by the configuration.
fn open_backend(config: &ServerConfig) -> anyhow::Result<SqliteBackend> {
    match config.database_url.as_deref() {
        Some(path) if path != ":memory:" => {
            info!(database = %path, "Opening SQLite database");
            Ok(SqliteBackend::open(path)?)
        }
        _ => {
            info!("Using in-memory SQLite database");
            Ok(SqliteBackend::in_memory()?)
        }
    }
}

/// Reconciles the schema, issues the bootstrap token and builds the routing
/// snapshot. Any error aborts the boot.
async fn boot(backend: &Arc<SqliteBackend>, config: &ServerConfig) -> anyhow::Result<RouterSnapshot> {
    let configured = load_schema_dir(config.schema_dir.as_deref())?;
    let registry = Arc::new(backend.reconcile(configured)?);

    if let Some(token) = config.bootstrap_token.as_deref() {
        let user = backend.ensure_account(&config.bootstrap_email, token)?;
        info!(user = %user, email = %config.bootstrap_email, "Bootstrap token issued");
    }

    let snapshot = build_snapshot(Arc::clone(backend), registry, config.clone()).await?;
    Ok(snapshot)
}

/// Rebuilds the snapshot on every `SIGHUP`. A failed reload keeps serving the
/// previous snapshot.
#[cfg(unix)]
fn spawn_reload(
    router: TenantRouter,
    backend: Arc<SqliteBackend>,
    config: ServerConfig,
) -> anyhow::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangups = signal(SignalKind::hangup())?;
    tokio::spawn(async move {
        while hangups.recv().await.is_some() {
            info!("Received SIGHUP, reloading sites");
            match boot(&backend, &config).await {
                Ok(snapshot) => {
                    router.swap(snapshot);
                }
                Err(e) => error!(error = %e, "Reload failed, keeping current sites"),
            }
        }
    });
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, stopping server");
}

/// Starts the HTTP server.
async fn serve(router: TenantRouter, config: &ServerConfig) -> anyhow::Result<()> {
    let addr = config.socket_addr();
    info!(address = %addr, "Server listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let service = axum::ServiceExt::<Request>::into_make_service(router);
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::parse();
    init_logging(&config.log_level);

    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("Configuration error: {}", error);
        }
        std::process::exit(1);
    }

    info!(
        port = config.port,
        host = %config.host,
        schema_dir = ?config.schema_dir,
        "Starting Tabula server"
    );

    let backend = Arc::new(open_backend(&config)?);
    let snapshot = boot(&backend, &config).await?;

    let authenticator = Arc::new(StoreAuthenticator::new(Arc::clone(&backend)));
    let router = TenantRouter::new(snapshot, authenticator);

    #[cfg(unix)]
    spawn_reload(router.clone(), Arc::clone(&backend), config.clone())?;

    serve(router, &config).await?;
    info!("Server stopped");
    Ok(())
}
