//! Application state for the dashboard API.
//!
//! This module defines the shared application state that is available to all
//! request handlers: the storage backend, the table registry built at boot and
//! the server configuration.

use std::sync::Arc;

use tabula_persistence::core::{CredentialStore, ObjectStore, RowStorage};
use tabula_persistence::permission::PermissionResolver;
use tabula_persistence::schema::{TableDefinition, TableRegistry};

use crate::config::ServerConfig;
use crate::error::{RestError, RestResult};

/// Everything the API needs from a storage backend.
pub trait StorageBackend: RowStorage + ObjectStore + CredentialStore + 'static {}

impl<T> StorageBackend for T where T: RowStorage + ObjectStore + CredentialStore + 'static {}

/// Shared application state for the API.
///
/// # Type Parameters
///
/// * `S` - The storage backend type (must implement [`StorageBackend`])
///
/// # Example
///
/// ```rust,ignore
/// use tabula_rest::{AppState, ServerConfig};
/// use tabula_persistence::backends::sqlite::SqliteBackend;
/// use tabula_persistence::schema::TableRegistry;
/// use std::sync::Arc;
///
/// let backend = SqliteBackend::in_memory()?;
/// let registry = TableRegistry::new(tables);
/// let state = AppState::new(Arc::new(backend), Arc::new(registry), ServerConfig::default());
/// ```
pub struct AppState<S> {
    /// The storage backend.
    storage: Arc<S>,

    /// Table definitions in effect since boot.
    registry: Arc<TableRegistry>,

    /// Server configuration.
    config: Arc<ServerConfig>,
}

// Manually implement Clone since S is wrapped in Arc and doesn't need to be Clone
impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            registry: Arc::clone(&self.registry),
            config: Arc::clone(&self.config),
        }
    }
}

impl<S: StorageBackend> AppState<S> {
    /// Creates a new AppState.
    pub fn new(storage: Arc<S>, registry: Arc<TableRegistry>, config: ServerConfig) -> Self {
        Self {
            storage,
            registry,
            config: Arc::new(config),
        }
    }

    /// Returns a reference to the storage backend.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Returns a clone of the storage Arc.
    pub fn storage_arc(&self) -> Arc<S> {
        Arc::clone(&self.storage)
    }

    /// Returns the table registry.
    pub fn registry(&self) -> &TableRegistry {
        &self.registry
    }

    /// Returns a reference to the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// A permission resolver over this state's storage and table defaults.
    pub fn resolver(&self) -> PermissionResolver<'_> {
        PermissionResolver::new(self.storage.as_ref(), self.registry.as_ref())
    }

    /// Looks up a governed table, rejecting unknown names.
    pub fn table(&self, table: &str) -> RestResult<&TableDefinition> {
        self.registry.get(table).ok_or_else(|| RestError::UnknownTable {
            table: table.to_string(),
        })
    }
}
