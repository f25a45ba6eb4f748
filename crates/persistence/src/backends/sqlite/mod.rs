//! SQLite backend implementation.
//!
//! This module implements every storage trait of the crate on top of SQLite.
//! It supports both in-memory databases (used by the tests) and file-based
//! databases.
//!
//! # Features
//!
//! - In-memory and file-based modes
//! - Schema reconciliation in a single transaction
//! - Row CRUD with reference ids, default permissions and default groups
//! - Object lookups for the permission resolver
//! - API token lookups for authentication
//!
//! # Example
//!
//! ```no_run
//! use tabula_persistence::backends::sqlite::SqliteBackend;
//! use tabula_persistence::schema::{load_schema_dir, merge_tables, prepare_tables};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = SqliteBackend::open("./data/tabula.db")?;
//! backend.init_schema()?;
//!
//! let stored = backend.reflect_tables()?;
//! let configured = load_schema_dir(None)?;
//! let tables = prepare_tables(merge_tables(stored, configured));
//! backend.apply_schema(&tables)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Schema
//!
//! The `world` table holds one row per governed table: its name and its
//! complete [`TableDefinition`](crate::schema::TableDefinition) as JSON.
//! Reflection reads it back at boot. Governed tables are plain SQLite tables
//! whose columns follow their definition; columns are only ever added.

mod backend;
mod credentials;
pub(crate) mod schema;
mod sql;
mod storage;
mod store;

pub use backend::{SqliteBackend, SqliteBackendConfig};
pub use schema::WORLD_TABLE;
