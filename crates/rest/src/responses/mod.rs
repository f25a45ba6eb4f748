//! Response formatting for the API.
//!
//! - [`document`] - The `{"data": ..., "included": [...]}` document and the
//!   presentation of rows inside it

pub mod document;

pub use document::{ResponseDocument, RowPresenter};
