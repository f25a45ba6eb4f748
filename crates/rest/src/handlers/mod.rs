//! HTTP request handlers.
//!
//! - [`health`] - `/ping` and `/health`
//! - [`list`] - List rows of a table
//! - [`create`] - Create a row
//! - [`read`] - Read one row with its included rows
//! - [`update`] - Update a row
//! - [`delete`] - Delete a row
//! - [`meta`] - Table and column metadata
//!
//! Every row handler runs the access interceptor's before phase ahead of the
//! storage operation and its after phase on what is returned.

pub mod create;
pub mod delete;
pub mod health;
pub mod list;
pub mod meta;
pub mod read;
pub mod update;

mod rows;

// Re-export handlers for convenience
pub use create::create_handler;
pub use delete::delete_handler;
pub use health::{health_handler, ping_handler};
pub use list::list_handler;
pub use meta::{jsmodel_handler, meta_handler};
pub use read::read_handler;
pub use update::update_handler;
pub use rows::RowPayload;
