//! [`CredentialStore`] implementation for SQLite.

use chrono::Utc;
use rusqlite::{OptionalExtension, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::core::{CredentialStore, Row, hash_token};
use crate::error::{LookupError, StorageResult};
use crate::permission::PermissionCode;
use crate::schema::tables;

use super::SqliteBackend;
use super::sql::query_rows;

impl CredentialStore for SqliteBackend {
    fn find_user_by_token_hash(&self, token_hash: &str) -> StorageResult<Option<Row>> {
        if token_hash.is_empty() {
            return Ok(None);
        }
        let conn = self.get_connection()?;
        let rows = query_rows(
            &conn,
            tables::USER_ACCOUNT,
            "SELECT * FROM user_account WHERE api_token_hash = ?1 LIMIT 1",
            [token_hash],
        )?;
        Ok(rows.into_iter().next())
    }
}

impl SqliteBackend {
    /// Stores the hash of `token` as the API token of a user account,
    /// replacing any previous token.
    pub fn set_api_token(&self, user_reference_id: &str, token: &str) -> StorageResult<()> {
        let conn = self.get_connection()?;
        let changed = conn.execute(
            "UPDATE user_account SET api_token_hash = ?1 WHERE reference_id = ?2",
            params![hash_token(token), user_reference_id],
        )?;
        if changed == 0 {
            return Err(LookupError::NotFound {
                table: tables::USER_ACCOUNT.to_string(),
                reference_id: user_reference_id.to_string(),
            }
            .into());
        }
        debug!(user = %user_reference_id, "Stored API token");
        Ok(())
    }

    /// Makes sure an account with `email` exists, owns itself and holds
    /// `token`. Returns the account's reference id.
    pub fn ensure_account(&self, email: &str, token: &str) -> StorageResult<String> {
        let email = email.trim().to_lowercase();
        let conn = self.get_connection()?;
        let existing: Option<String> = conn
            .query_row(
                "SELECT reference_id FROM user_account WHERE email = ?1",
                [&email],
                |row| row.get(0),
            )
            .optional()?;

        let reference_id = match existing {
            Some(reference_id) => reference_id,
            None => {
                let reference_id = Uuid::new_v4().to_string();
                let timestamp = Utc::now().to_rfc3339();
                conn.execute(
                    "INSERT INTO user_account (reference_id, name, email, permission, created_at, updated_at)
                     VALUES (?1, ?2, ?2, ?3, ?4, ?4)",
                    params![
                        reference_id,
                        email,
                        PermissionCode::DEFAULT_ROW.to_i64(),
                        timestamp
                    ],
                )?;
                let id = conn.last_insert_rowid();
                conn.execute("UPDATE user_account SET user_id = ?1 WHERE id = ?1", [id])?;
                info!(email = %email, user = %reference_id, "Created account");
                reference_id
            }
        };
        drop(conn);

        self.set_api_token(&reference_id, token)?;
        Ok(reference_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::schema::{prepare_tables, system_tables};

    fn backend() -> SqliteBackend {
        let backend = SqliteBackend::in_memory().unwrap();
        backend.init_schema().unwrap();
        backend.apply_schema(&prepare_tables(system_tables())).unwrap();
        let conn = backend.get_connection().unwrap();
        conn.execute(
            "INSERT INTO user_account (reference_id, permission, email) VALUES ('u1', 0, 'a@b.io')",
            [],
        )
        .unwrap();
        drop(conn);
        backend
    }

    #[test]
    fn test_token_lookup() {
        let backend = backend();
        backend.set_api_token("u1", "secret").unwrap();

        let user = backend
            .find_user_by_token_hash(&hash_token("secret"))
            .unwrap()
            .unwrap();
        assert_eq!(user.reference_id().unwrap(), "u1");
        assert!(backend
            .find_user_by_token_hash(&hash_token("other"))
            .unwrap()
            .is_none());
        assert!(backend.find_user_by_token_hash("").unwrap().is_none());
    }

    #[test]
    fn test_ensure_account_is_idempotent() {
        let backend = backend();
        let first = backend.ensure_account(" Admin@Example.com ", "one").unwrap();
        let second = backend.ensure_account("admin@example.com", "two").unwrap();
        assert_eq!(first, second);

        assert!(backend
            .find_user_by_token_hash(&hash_token("one"))
            .unwrap()
            .is_none());
        let user = backend
            .find_user_by_token_hash(&hash_token("two"))
            .unwrap()
            .unwrap();
        assert_eq!(user.text("email").unwrap(), "admin@example.com");
        assert_eq!(user.integer("user_id").unwrap(), user.integer("id").unwrap());
    }

    #[test]
    fn test_existing_account_keeps_reference() {
        let backend = backend();
        let reference_id = backend.ensure_account("a@b.io", "secret").unwrap();
        assert_eq!(reference_id, "u1");
    }

    #[test]
    fn test_token_for_unknown_user() {
        let backend = backend();
        assert!(matches!(
            backend.set_api_token("nobody", "secret"),
            Err(StorageError::Lookup(LookupError::NotFound { .. }))
        ));
    }
}
