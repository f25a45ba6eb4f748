//! Core storage traits and abstractions.
//!
//! - [`Row`] - Typed access to one table row
//! - [`ObjectStore`] - Synchronous lookups used by the permission resolver
//! - [`TableDefaults`] - Per-table defaults for rows without explicit values
//! - [`RowStorage`] - CRUD execution behind the HTTP handlers
//! - [`CredentialStore`] - API token lookups
//!
//! None of these traits authorize anything. Authorization is layered on top
//! by the [`permission`](crate::permission) module.

mod credentials;
mod row;
mod storage;
mod store;

pub use credentials::{CredentialStore, hash_token};
pub use row::Row;
pub use storage::{ListQuery, RowStorage};
pub use store::{ObjectStore, TableDefaults};
