//! Request authentication.
//!
//! Requests carry an API token either as `Authorization: Bearer <token>` or
//! as the password of `Authorization: Basic`. The token's SHA-256 hash is
//! looked up in `user_account.api_token_hash`; the matching account becomes
//! the request's [`Actor`], together with the groups it belongs to.
//!
//! A request without credentials is anonymous and runs as the guest actor.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tabula_persistence::core::{CredentialStore, ObjectStore, hash_token};
use tabula_persistence::permission::Actor;
use tabula_persistence::schema::tables;
use tracing::{debug, error, warn};

use crate::error::RestError;
use crate::state::{AppState, StorageBackend};

/// Result of authenticating one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Valid credentials for a known account.
    Authenticated(Actor),
    /// No credentials at all.
    Anonymous,
    /// Credentials were present but malformed or unknown.
    Invalid,
}

impl AuthOutcome {
    /// The actor to run as; guests for anything but a successful login.
    pub fn actor(self) -> Actor {
        match self {
            AuthOutcome::Authenticated(actor) => actor,
            AuthOutcome::Anonymous | AuthOutcome::Invalid => Actor::guest(),
        }
    }
}

/// Turns request headers into an [`AuthOutcome`].
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, headers: &HeaderMap) -> AuthOutcome;
}

#[derive(Debug, PartialEq, Eq)]
enum Credential {
    Missing,
    Token(String),
    Malformed,
}

fn credential(headers: &HeaderMap) -> Credential {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Credential::Missing;
    };
    let Ok(value) = value.to_str() else {
        return Credential::Malformed;
    };

    let (scheme, rest) = value.trim().split_once(' ').unwrap_or((value, ""));
    let rest = rest.trim();
    if scheme.eq_ignore_ascii_case("bearer") && !rest.is_empty() {
        return Credential::Token(rest.to_string());
    }
    if scheme.eq_ignore_ascii_case("basic") {
        let decoded = STANDARD
            .decode(rest)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok());
        if let Some((_, password)) = decoded.as_deref().and_then(|d| d.split_once(':')) {
            if !password.is_empty() {
                return Credential::Token(password.to_string());
            }
        }
    }
    Credential::Malformed
}

/// Authenticates against API tokens stored in the database.
pub struct StoreAuthenticator<S> {
    store: Arc<S>,
}

impl<S> StoreAuthenticator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

impl<S> Authenticator for StoreAuthenticator<S>
where
    S: CredentialStore + ObjectStore,
{
    fn authenticate(&self, headers: &HeaderMap) -> AuthOutcome {
        let token = match credential(headers) {
            Credential::Missing => return AuthOutcome::Anonymous,
            Credential::Malformed => return AuthOutcome::Invalid,
            Credential::Token(token) => token,
        };

        let user = match self.store.find_user_by_token_hash(&hash_token(&token)) {
            Ok(Some(user)) => user,
            Ok(None) => {
                debug!("Unknown API token");
                return AuthOutcome::Invalid;
            }
            Err(e) => {
                error!(error = %e, "Token lookup failed");
                return AuthOutcome::Invalid;
            }
        };
        let Ok(reference_id) = user.reference_id() else {
            return AuthOutcome::Invalid;
        };

        let groups = self
            .store
            .query_groups_for_object(tables::USER_ACCOUNT, reference_id)
            .unwrap_or_else(|e| {
                warn!(user = %reference_id, error = %e, "Group lookup failed, continuing without groups");
                Vec::new()
            });

        AuthOutcome::Authenticated(Actor::new(reference_id, groups))
    }
}

/// Middleware attaching the request's [`Actor`].
///
/// Invalid credentials are rejected with 401; anonymous requests continue as
/// the guest.
pub async fn authenticate_request<S>(
    State(state): State<AppState<S>>,
    mut request: Request,
    next: Next,
) -> Response
where
    S: StorageBackend,
{
    let authenticator = StoreAuthenticator::new(state.storage_arc());
    let actor = match authenticator.authenticate(request.headers()) {
        AuthOutcome::Invalid => {
            return RestError::Unauthorized {
                message: "Invalid credentials".to_string(),
            }
            .into_response();
        }
        outcome => outcome.actor(),
    };
    request.extensions_mut().insert(actor);
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_missing_credentials() {
        assert_eq!(credential(&HeaderMap::new()), Credential::Missing);
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(
            credential(&headers("Bearer abc123")),
            Credential::Token("abc123".to_string())
        );
        assert_eq!(credential(&headers("Bearer ")), Credential::Malformed);
    }

    #[test]
    fn test_basic_password_is_the_token() {
        let encoded = STANDARD.encode("ann:abc123");
        assert_eq!(
            credential(&headers(&format!("Basic {}", encoded))),
            Credential::Token("abc123".to_string())
        );
        assert_eq!(credential(&headers("Basic !!!")), Credential::Malformed);
    }

    #[test]
    fn test_unknown_scheme_is_malformed() {
        assert_eq!(credential(&headers("Digest xyz")), Credential::Malformed);
    }

    #[test]
    fn test_outcome_actor() {
        let actor = Actor::new("u1", vec![]);
        assert_eq!(AuthOutcome::Authenticated(actor.clone()).actor(), actor);
        assert!(AuthOutcome::Invalid.actor().is_guest());
        assert!(AuthOutcome::Anonymous.actor().is_guest());
    }
}
