//! SQLite backend implementation.

use std::fmt::Debug;
use std::path::Path;
use std::time::Duration;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{BackendError, StorageError, StorageResult};
use crate::schema::{TableDefinition, TableRegistry, merge_tables, prepare_tables, system_tables};

use super::schema;

/// SQLite backend for governed tables.
pub struct SqliteBackend {
    pool: Pool<SqliteConnectionManager>,
    config: SqliteBackendConfig,
    is_memory: bool,
}

impl Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("config", &self.config)
            .field("is_memory", &self.is_memory)
            .finish_non_exhaustive()
    }
}

/// Configuration for the SQLite backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqliteBackendConfig {
    /// Maximum number of connections in the pool. In-memory databases always
    /// use a single connection.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of idle connections.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in milliseconds.
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,

    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u32,

    /// Enable WAL mode for better concurrency.
    #[serde(default = "default_true")]
    pub enable_wal: bool,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_connection_timeout_ms() -> u64 {
    30000
}

fn default_busy_timeout_ms() -> u32 {
    5000
}

fn default_true() -> bool {
    true
}

impl Default for SqliteBackendConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connection_timeout_ms: default_connection_timeout_ms(),
            busy_timeout_ms: default_busy_timeout_ms(),
            enable_wal: true,
        }
    }
}

impl SqliteBackend {
    /// Creates a new in-memory SQLite backend.
    pub fn in_memory() -> StorageResult<Self> {
        Self::with_config(":memory:", SqliteBackendConfig::default())
    }

    /// Opens or creates a file-based SQLite database.
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        Self::with_config(path, SqliteBackendConfig::default())
    }

    /// Creates a backend with custom configuration.
    pub fn with_config<P: AsRef<Path>>(
        path: P,
        config: SqliteBackendConfig,
    ) -> StorageResult<Self> {
        let path_str = path.as_ref().to_string_lossy();
        let is_memory = path_str == ":memory:";

        let busy_timeout = Duration::from_millis(u64::from(config.busy_timeout_ms));
        let manager = SqliteConnectionManager::file(path.as_ref())
            .with_init(move |conn| conn.busy_timeout(busy_timeout));

        // Every connection to ":memory:" opens a separate database.
        let (max_size, min_idle) = if is_memory {
            (1, 1)
        } else {
            (
                config.max_connections.max(1),
                config.min_connections.min(config.max_connections),
            )
        };

        let pool = Pool::builder()
            .max_size(max_size)
            .min_idle(Some(min_idle))
            .connection_timeout(Duration::from_millis(config.connection_timeout_ms))
            .build(manager)
            .map_err(|e| {
                StorageError::Backend(BackendError::ConnectionFailed {
                    backend_name: "sqlite".to_string(),
                    message: e.to_string(),
                })
            })?;

        let backend = Self {
            pool,
            config,
            is_memory,
        };

        backend.configure_connection()?;
        debug!(path = %path_str, is_memory, "Opened SQLite database");

        Ok(backend)
    }

    /// Creates the `world` metadata table if it does not exist yet.
    pub fn init_schema(&self) -> StorageResult<()> {
        let conn = self.get_connection()?;
        schema::initialize_schema(&conn)
    }

    /// Reads every table definition recorded in the `world` table, in the
    /// order the tables were first created.
    pub fn reflect_tables(&self) -> StorageResult<Vec<TableDefinition>> {
        let conn = self.get_connection()?;
        schema::reflect_tables(&conn)
    }

    /// Creates and extends the governed tables so they match `tables`, and
    /// records every definition in the `world` table.
    ///
    /// All changes are applied in one transaction; on error nothing changes.
    pub fn apply_schema(&self, tables: &[TableDefinition]) -> StorageResult<()> {
        let mut conn = self.get_connection()?;
        schema::apply_schema(&mut conn, tables)
    }

    /// Reconciles the configured tables with the database at boot.
    ///
    /// The system tables are extended by `configured`, merged into the
    /// definitions recorded in `world`, completed with standard columns and
    /// relations, and applied. An error here leaves the schema untouched and
    /// must abort the boot.
    pub fn reconcile(&self, configured: Vec<TableDefinition>) -> StorageResult<TableRegistry> {
        self.init_schema()?;
        let existing = self.reflect_tables()?;
        let configured = merge_tables(system_tables(), configured);
        let tables = prepare_tables(merge_tables(existing, configured));
        self.apply_schema(&tables)?;
        info!(tables = tables.len(), "Schema reconciled");
        Ok(TableRegistry::new(tables))
    }

    /// Runs a trivial query to check that the database answers.
    pub fn health_check(&self) -> StorageResult<()> {
        let conn = self.get_connection()?;
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }

    /// Get a connection from the pool.
    ///
    /// Callers must not hold two connections at once: an in-memory pool has
    /// exactly one.
    pub(crate) fn get_connection(
        &self,
    ) -> StorageResult<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| {
            StorageError::Backend(BackendError::ConnectionFailed {
                backend_name: "sqlite".to_string(),
                message: e.to_string(),
            })
        })
    }

    /// Configure database-wide settings.
    fn configure_connection(&self) -> StorageResult<()> {
        if !self.config.enable_wal || self.is_memory {
            return Ok(());
        }

        let conn = self.get_connection()?;
        conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))
            .map_err(|e| {
                StorageError::Backend(BackendError::Internal {
                    backend_name: "sqlite".to_string(),
                    message: format!("Failed to enable WAL mode: {}", e),
                    source: None,
                })
            })?;

        Ok(())
    }

    /// Returns whether this is an in-memory database.
    pub fn is_memory(&self) -> bool {
        self.is_memory
    }

    /// Returns the backend configuration.
    pub fn config(&self) -> &SqliteBackendConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_backend() {
        let backend = SqliteBackend::in_memory().unwrap();
        assert!(backend.is_memory());
        backend.health_check().unwrap();
    }

    #[test]
    fn test_backend_initialization() {
        let backend = SqliteBackend::in_memory().unwrap();
        backend.init_schema().unwrap();
        backend.init_schema().unwrap();
        assert!(backend.reflect_tables().unwrap().is_empty());
    }

    #[test]
    fn test_file_backend_uses_wal() {
        let dir = tempfile::tempdir().unwrap();
        let backend = SqliteBackend::open(dir.path().join("tabula.db")).unwrap();
        assert!(!backend.is_memory());

        let conn = backend.get_connection().unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }

    #[test]
    fn test_reconcile_creates_system_tables() {
        let backend = SqliteBackend::in_memory().unwrap();
        let registry = backend.reconcile(Vec::new()).unwrap();
        for table in ["user_account", "usergroup", "site", "cloud_store"] {
            assert!(registry.contains(table), "{table}");
        }
        assert_eq!(backend.reflect_tables().unwrap(), registry.tables().to_vec());
    }

    #[test]
    fn test_config_defaults() {
        let config: SqliteBackendConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.busy_timeout_ms, 5000);
        assert!(config.enable_wal);
    }
}
