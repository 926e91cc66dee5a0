//! Refresh Token Storage
//! Mission: Persist one active refresh token per user with SQLite

use crate::auth::models::RefreshToken;
use anyhow::{Context, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use rand::RngCore;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;
use uuid::Uuid;

/// Refresh token store with SQLite backend
///
/// Single-session model: `user_id` is unique, so creating a token for a
/// user replaces whatever token they had. The connection lock plus
/// per-call transactions serialize concurrent rotations — two refreshes
/// racing on the same token cannot both win.
pub struct RefreshTokenStore {
    conn: Mutex<Connection>,
    ttl_secs: i64,
}

impl RefreshTokenStore {
    /// Open the store and initialize the schema
    pub fn new(db_path: &str, ttl_secs: i64) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS refresh_tokens (
                token TEXT PRIMARY KEY,
                user_id TEXT UNIQUE NOT NULL,
                expires_at INTEGER NOT NULL
            )",
            [],
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
            ttl_secs,
        })
    }

    /// Create a refresh token for a user, replacing any existing one
    pub fn create(&self, user_id: &Uuid) -> Result<RefreshToken> {
        let record = RefreshToken {
            token: generate_token(),
            user_id: *user_id,
            expires_at: Utc::now() + Duration::seconds(self.ttl_secs),
        };

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM refresh_tokens WHERE user_id = ?1",
            params![user_id.to_string()],
        )?;
        tx.execute(
            "INSERT INTO refresh_tokens (token, user_id, expires_at) VALUES (?1, ?2, ?3)",
            params![
                record.token,
                record.user_id.to_string(),
                record.expires_at.timestamp(),
            ],
        )
        .context("Failed to insert refresh token")?;
        tx.commit()?;

        debug!("Created refresh token for user {}", user_id);

        Ok(record)
    }

    /// Look up a refresh token record by its token string
    pub fn find_by_token(&self, token: &str) -> Result<Option<RefreshToken>> {
        let conn = self.conn.lock();

        let mut stmt = conn.prepare(
            "SELECT token, user_id, expires_at FROM refresh_tokens WHERE token = ?1",
        )?;

        let record = stmt
            .query_row(params![token], Self::row_to_record)
            .optional()?;

        Ok(record)
    }

    /// Look up the active refresh token record for a user
    pub fn find_by_user(&self, user_id: &Uuid) -> Result<Option<RefreshToken>> {
        let conn = self.conn.lock();

        let mut stmt = conn.prepare(
            "SELECT token, user_id, expires_at FROM refresh_tokens WHERE user_id = ?1",
        )?;

        let record = stmt
            .query_row(params![user_id.to_string()], Self::row_to_record)
            .optional()?;

        Ok(record)
    }

    /// Atomically replace `old_token` with a freshly generated one
    ///
    /// Returns `None` if the old token is no longer present — either it was
    /// already rotated by a concurrent refresh or removed by sweep/revoke.
    /// The delete and insert share one transaction, so the old token is
    /// consumed exactly once.
    pub fn rotate(&self, old_token: &str, user_id: &Uuid) -> Result<Option<RefreshToken>> {
        let record = RefreshToken {
            token: generate_token(),
            user_id: *user_id,
            expires_at: Utc::now() + Duration::seconds(self.ttl_secs),
        };

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let consumed = tx.execute(
            "DELETE FROM refresh_tokens WHERE token = ?1 AND user_id = ?2",
            params![old_token, user_id.to_string()],
        )?;
        if consumed == 0 {
            return Ok(None);
        }

        tx.execute(
            "INSERT INTO refresh_tokens (token, user_id, expires_at) VALUES (?1, ?2, ?3)",
            params![
                record.token,
                record.user_id.to_string(),
                record.expires_at.timestamp(),
            ],
        )
        .context("Failed to insert rotated refresh token")?;
        tx.commit()?;

        debug!("Rotated refresh token for user {}", user_id);

        Ok(Some(record))
    }

    /// Delete the refresh token for a user; no error if absent
    pub fn revoke(&self, user_id: &Uuid) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            "DELETE FROM refresh_tokens WHERE user_id = ?1",
            params![user_id.to_string()],
        )?;

        Ok(())
    }

    /// Delete a single token record; no error if absent
    pub fn delete_token(&self, token: &str) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            "DELETE FROM refresh_tokens WHERE token = ?1",
            params![token],
        )?;

        Ok(())
    }

    /// Delete all records expired as of `now`, returning the count removed
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let conn = self.conn.lock();

        let removed = conn.execute(
            "DELETE FROM refresh_tokens WHERE expires_at < ?1",
            params![now.timestamp()],
        )?;

        Ok(removed)
    }

    fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<RefreshToken> {
        let user_id_str: String = row.get(1)?;
        let expires_ts: i64 = row.get(2)?;
        Ok(RefreshToken {
            token: row.get(0)?,
            user_id: Uuid::parse_str(&user_id_str).unwrap_or_default(),
            expires_at: Utc
                .timestamp_opt(expires_ts, 0)
                .single()
                .unwrap_or_else(Utc::now),
        })
    }

    #[cfg(test)]
    fn insert_raw(&self, record: &RefreshToken) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO refresh_tokens (token, user_id, expires_at)
             VALUES (?1, ?2, ?3)",
            params![
                record.token,
                record.user_id.to_string(),
                record.expires_at.timestamp(),
            ],
        )?;
        Ok(())
    }
}

/// Generate a cryptographically random opaque token
/// (32 bytes, base64url without padding)
fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn create_test_store() -> (RefreshTokenStore, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap();
        let store = RefreshTokenStore::new(db_path, 3600).unwrap();
        (store, temp_file)
    }

    #[test]
    fn test_generated_tokens_are_unique_and_url_safe() {
        let t1 = generate_token();
        let t2 = generate_token();

        assert_ne!(t1, t2);
        // 32 bytes -> 43 base64url chars, no padding
        assert_eq!(t1.len(), 43);
        assert!(t1
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_create_and_lookup() {
        let (store, _temp) = create_test_store();
        let user_id = Uuid::new_v4();

        let record = store.create(&user_id).unwrap();

        let by_token = store.find_by_token(&record.token).unwrap().unwrap();
        assert_eq!(by_token.user_id, user_id);

        let by_user = store.find_by_user(&user_id).unwrap().unwrap();
        assert_eq!(by_user.token, record.token);
    }

    #[test]
    fn test_create_replaces_existing_token() {
        let (store, _temp) = create_test_store();
        let user_id = Uuid::new_v4();

        let first = store.create(&user_id).unwrap();
        let second = store.create(&user_id).unwrap();
        assert_ne!(first.token, second.token);

        // Only the second token remains
        assert!(store.find_by_token(&first.token).unwrap().is_none());
        let current = store.find_by_user(&user_id).unwrap().unwrap();
        assert_eq!(current.token, second.token);
    }

    #[test]
    fn test_rotate_consumes_old_token() {
        let (store, _temp) = create_test_store();
        let user_id = Uuid::new_v4();

        let original = store.create(&user_id).unwrap();

        let rotated = store.rotate(&original.token, &user_id).unwrap().unwrap();
        assert_ne!(rotated.token, original.token);
        assert!(store.find_by_token(&original.token).unwrap().is_none());

        // Second rotation with the consumed token loses
        let replay = store.rotate(&original.token, &user_id).unwrap();
        assert!(replay.is_none());
    }

    #[test]
    fn test_rotate_requires_matching_user() {
        let (store, _temp) = create_test_store();
        let user_id = Uuid::new_v4();

        let record = store.create(&user_id).unwrap();

        let other_user = Uuid::new_v4();
        let result = store.rotate(&record.token, &other_user).unwrap();
        assert!(result.is_none());

        // Original record untouched
        assert!(store.find_by_token(&record.token).unwrap().is_some());
    }

    #[test]
    fn test_revoke_is_idempotent() {
        let (store, _temp) = create_test_store();
        let user_id = Uuid::new_v4();

        store.create(&user_id).unwrap();
        store.revoke(&user_id).unwrap();
        assert!(store.find_by_user(&user_id).unwrap().is_none());

        // Second revoke is a no-op
        store.revoke(&user_id).unwrap();
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let (store, _temp) = create_test_store();
        let now = Utc::now();

        let expired1 = RefreshToken {
            token: "expired-1".to_string(),
            user_id: Uuid::new_v4(),
            expires_at: now - Duration::hours(2),
        };
        let expired2 = RefreshToken {
            token: "expired-2".to_string(),
            user_id: Uuid::new_v4(),
            expires_at: now - Duration::seconds(1),
        };
        let live = RefreshToken {
            token: "live-1".to_string(),
            user_id: Uuid::new_v4(),
            expires_at: now + Duration::hours(2),
        };
        store.insert_raw(&expired1).unwrap();
        store.insert_raw(&expired2).unwrap();
        store.insert_raw(&live).unwrap();

        let removed = store.sweep_expired(now).unwrap();
        assert_eq!(removed, 2);

        assert!(store.find_by_token("expired-1").unwrap().is_none());
        assert!(store.find_by_token("expired-2").unwrap().is_none());
        assert!(store.find_by_token("live-1").unwrap().is_some());
    }

    #[test]
    fn test_sweep_on_empty_store() {
        let (store, _temp) = create_test_store();
        assert_eq!(store.sweep_expired(Utc::now()).unwrap(), 0);
    }
}
