//! Pagination extractor.
//!
//! Extracts `page` and `size` query parameters from list requests.

use axum::{
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use serde::Deserialize;
use tabula_persistence::core::ListQuery;

use crate::config::ServerConfig;
use crate::error::RestError;

/// Axum extractor for pagination parameters.
///
/// Pages are numbered from 1. The page size is clamped by the server
/// configuration when the [`ListQuery`] is built.
///
/// # Example
///
/// ```rust,ignore
/// use tabula_rest::extractors::Pagination;
///
/// async fn list_handler(pagination: Pagination) {
///     let query = pagination.list_query(&config);
/// }
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pagination {
    page: Option<usize>,
    size: Option<usize>,
}

/// Query parameters for pagination.
#[derive(Debug, Deserialize)]
struct PaginationQuery {
    page: Option<usize>,
    size: Option<usize>,
}

impl Pagination {
    /// Creates a Pagination with the given values.
    pub fn new(page: Option<usize>, size: Option<usize>) -> Self {
        Self { page, size }
    }

    /// Returns the requested page number (1-indexed).
    pub fn page(&self) -> usize {
        self.page.unwrap_or(1).max(1)
    }

    /// Builds the storage query, applying the configured page size limits.
    pub fn list_query(&self, config: &ServerConfig) -> ListQuery {
        ListQuery::new(self.page(), config.page_size(self.size))
    }
}

impl<S> FromRequestParts<S> for Pagination
where
    S: Send + Sync,
{
    type Rejection = RestError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(query) = Query::<PaginationQuery>::from_request_parts(parts, state)
            .await
            .map_err(|_| RestError::BadRequest {
                message: "Invalid pagination parameters".to_string(),
            })?;

        Ok(Pagination::new(query.page, query.size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[test]
    fn test_page_defaults_to_first() {
        assert_eq!(Pagination::default().page(), 1);
        assert_eq!(Pagination::new(Some(0), None).page(), 1);
    }

    #[test]
    fn test_list_query_clamps_size() {
        let config = ServerConfig::for_testing();
        let query = Pagination::new(Some(3), Some(1000)).list_query(&config);
        assert_eq!(query.page, 3);
        assert_eq!(query.size, config.max_page_size);
        assert_eq!(query.offset(), 2 * config.max_page_size);
    }

    #[tokio::test]
    async fn test_extracts_query_parameters() {
        let (mut parts, _) = Request::builder()
            .uri("/api/invoice?page=2&size=5")
            .body(())
            .unwrap()
            .into_parts();
        let pagination = Pagination::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(pagination, Pagination::new(Some(2), Some(5)));
    }

    #[tokio::test]
    async fn test_rejects_invalid_parameters() {
        let (mut parts, _) = Request::builder()
            .uri("/api/invoice?page=two")
            .body(())
            .unwrap()
            .into_parts();
        assert!(Pagination::from_request_parts(&mut parts, &()).await.is_err());
    }
}
