//! Actor extractor.

use axum::{extract::FromRequestParts, http::request::Parts};
use tabula_persistence::permission::Actor;

/// The actor of the current request.
///
/// Reads the [`Actor`] inserted by
/// [`authenticate_request`](crate::auth::authenticate_request). Requests that
/// did not pass through it run as the guest.
#[derive(Debug, Clone)]
pub struct CurrentActor(pub Actor);

impl<S> FromRequestParts<S> for CurrentActor
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let actor = parts
            .extensions
            .get::<Actor>()
            .cloned()
            .unwrap_or_else(Actor::guest);
        Ok(CurrentActor(actor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[tokio::test]
    async fn test_defaults_to_guest() {
        let (mut parts, _) = Request::new(()).into_parts();
        let CurrentActor(actor) = CurrentActor::from_request_parts(&mut parts, &()).await.unwrap();
        assert!(actor.is_guest());
    }

    #[tokio::test]
    async fn test_reads_attached_actor() {
        let (mut parts, _) = Request::new(()).into_parts();
        parts.extensions.insert(Actor::new("u1", vec![]));
        let CurrentActor(actor) = CurrentActor::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(actor.reference_id, "u1");
    }
}
