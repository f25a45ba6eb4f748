//! HTTP middleware for the dashboard API.
//!
//! - [`object_access`] - Row-level access filtering around CRUD operations
//!
//! Authentication lives in [`crate::auth`].

pub mod object_access;

pub use object_access::AccessInterceptor;
