//! API token lookups for the authentication collaborator.

use sha2::{Digest, Sha256};

use crate::error::StorageResult;

use super::row::Row;

/// Finds user accounts by their API token.
pub trait CredentialStore: Send + Sync {
    /// Returns the `user_account` row whose `api_token_hash` equals
    /// `token_hash`, if any.
    fn find_user_by_token_hash(&self, token_hash: &str) -> StorageResult<Option<Row>>;
}

/// Hex-encoded SHA-256 of a bearer token, the form tokens are stored in.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
