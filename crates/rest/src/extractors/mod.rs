//! Axum extractors for API requests.
//!
//! - [`CurrentActor`] - The actor attached by the authentication middleware
//! - [`Pagination`] - Page parameters of list requests

mod actor;
mod pagination;

pub use actor::CurrentActor;
pub use pagination::Pagination;
