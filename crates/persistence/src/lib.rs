//! Tabula persistence layer
//!
//! This crate holds the authorization and schema-governance core of the Tabula
//! API server, plus the SQLite storage backend it runs on.
//!
//! # Modules
//!
//! - [`permission`] - the owner/group/guest permission bitmask, resolved
//!   permission instances and the resolver that builds them from rows
//! - [`schema`] - table definitions, reconciliation of configured tables with
//!   persisted ones, relation expansion and the table registry
//! - [`core`] - rows and the store traits the rest of the server depends on
//! - [`backends`] - storage backend implementations
//! - [`error`] - the error hierarchy
//!
//! # Backend Features
//!
//! - `sqlite` (default) - SQLite with in-memory and file modes
//!
//! # Quick Start
//!
//! ```no_run
//! use tabula_persistence::backends::sqlite::SqliteBackend;
//! use tabula_persistence::schema::load_schema_dir;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = SqliteBackend::open("tabula.db")?;
//!
//! let configured = load_schema_dir(None)?;
//! let registry = backend.reconcile(configured)?;
//! assert!(registry.contains("usergroup"));
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod core;
pub mod error;
pub mod permission;
pub mod schema;

// Re-export commonly used types at crate root
pub use error::{StorageError, StorageResult};
pub use permission::{
    Actor, Capability, GroupPermission, PermissionCode, PermissionInstance, PermissionResolver,
    Scope,
};

// Re-export core traits
pub use core::{CredentialStore, ListQuery, ObjectStore, Row, RowStorage, TableDefaults};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
