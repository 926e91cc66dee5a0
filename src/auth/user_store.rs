//! User Storage
//! Mission: Store and verify user credentials with SQLite

use crate::auth::models::{User, UserRole};
use anyhow::{Context, Result};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use tracing::{info, warn};
use uuid::Uuid;

/// Credential store with SQLite backend
///
/// The auth core only reads credential records; writes happen through the
/// admin endpoints. Lookups never reveal whether an email exists — callers
/// get `Option<User>` and must collapse both failure modes themselves.
pub struct UserStore {
    conn: Mutex<Connection>,
}

impl UserStore {
    /// Open the store and initialize the schema
    pub fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_db()?;
        Ok(store)
    }

    fn init_db(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL,
                is_admin INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        self.create_default_admin(&conn)?;

        Ok(())
    }

    /// Create default admin user for initial setup
    fn create_default_admin(&self, conn: &Connection) -> Result<()> {
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM users WHERE is_admin = 1", [], |row| {
                row.get(0)
            })
            .context("Failed to check for admin users")?;

        if count == 0 {
            let password_hash =
                hash("admin123", DEFAULT_COST).context("Failed to hash password")?;

            let admin = User {
                id: Uuid::new_v4(),
                email: "admin@localhost".to_string(),
                password_hash,
                role: UserRole::Admin,
                is_admin: true,
                created_at: Utc::now().to_rfc3339(),
            };

            conn.execute(
                "INSERT INTO users (id, email, password_hash, role, is_admin, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    admin.id.to_string(),
                    admin.email,
                    admin.password_hash,
                    admin.role.as_str(),
                    admin.is_admin,
                    admin.created_at,
                ],
            )
            .context("Failed to insert admin user")?;

            info!("🔐 Default admin user created (email: admin@localhost, password: admin123)");
            warn!("⚠️  CHANGE DEFAULT PASSWORD IN PRODUCTION!");
        }

        Ok(())
    }

    /// Get user by email
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn.lock();

        let mut stmt = conn.prepare(
            "SELECT id, email, password_hash, role, is_admin, created_at
             FROM users WHERE email = ?1",
        )?;

        let user_result = stmt.query_row(params![email], Self::row_to_user);

        match user_result {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Verify a password against a stored credential
    ///
    /// bcrypt::verify does the constant-time hash comparison.
    pub fn verify_password(&self, password: &str, password_hash: &str) -> Result<bool> {
        verify(password, password_hash).context("Failed to verify password")
    }

    /// Create a new user
    pub fn create_user(&self, email: &str, password: &str, role: UserRole) -> Result<User> {
        let password_hash = hash(password, DEFAULT_COST).context("Failed to hash password")?;

        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash,
            is_admin: role == UserRole::Admin,
            role,
            created_at: Utc::now().to_rfc3339(),
        };

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO users (id, email, password_hash, role, is_admin, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user.id.to_string(),
                user.email,
                user.password_hash,
                user.role.as_str(),
                user.is_admin,
                user.created_at,
            ],
        )
        .context("Failed to insert user")?;

        info!("✅ Created user: {} ({})", user.email, user.role.as_str());

        Ok(user)
    }

    /// List all users (admin only)
    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn.lock();

        let mut stmt = conn
            .prepare("SELECT id, email, password_hash, role, is_admin, created_at FROM users")?;

        let users = stmt
            .query_map([], Self::row_to_user)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(users)
    }

    /// Delete a user by ID (admin only)
    pub fn delete_user(&self, user_id: &Uuid) -> Result<()> {
        let conn = self.conn.lock();

        let rows_affected = conn.execute(
            "DELETE FROM users WHERE id = ?1",
            params![user_id.to_string()],
        )?;

        if rows_affected == 0 {
            anyhow::bail!("User not found");
        }

        info!("🗑️  Deleted user: {}", user_id);
        Ok(())
    }

    fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
        let id_str: String = row.get(0)?;
        let role_str: String = row.get(3)?;
        Ok(User {
            id: Uuid::parse_str(&id_str).unwrap_or_default(),
            email: row.get(1)?,
            password_hash: row.get(2)?,
            role: UserRole::from_str(&role_str).unwrap_or(UserRole::Viewer),
            is_admin: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn create_test_store() -> (UserStore, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap();
        let store = UserStore::new(db_path).unwrap();
        (store, temp_file)
    }

    #[test]
    fn test_default_admin_created() {
        let (store, _temp) = create_test_store();

        let admin = store.get_user_by_email("admin@localhost").unwrap();
        assert!(admin.is_some());

        let admin = admin.unwrap();
        assert_eq!(admin.role, UserRole::Admin);
        assert!(admin.is_admin);
    }

    #[test]
    fn test_password_verification() {
        let (store, _temp) = create_test_store();

        let admin = store.get_user_by_email("admin@localhost").unwrap().unwrap();

        assert!(store
            .verify_password("admin123", &admin.password_hash)
            .unwrap());
        assert!(!store
            .verify_password("wrongpassword", &admin.password_hash)
            .unwrap());
    }

    #[test]
    fn test_create_and_retrieve_user() {
        let (store, _temp) = create_test_store();

        let user = store
            .create_user("a@x.com", "password123", UserRole::Member)
            .unwrap();
        assert_eq!(user.email, "a@x.com");
        assert_eq!(user.role, UserRole::Member);
        assert!(!user.is_admin);

        let retrieved = store.get_user_by_email("a@x.com").unwrap();
        assert!(retrieved.is_some());

        let retrieved = retrieved.unwrap();
        assert_eq!(retrieved.id, user.id);
        assert_eq!(retrieved.role, UserRole::Member);
    }

    #[test]
    fn test_unknown_email_is_none() {
        let (store, _temp) = create_test_store();

        assert!(store.get_user_by_email("nobody@x.com").unwrap().is_none());
    }

    #[test]
    fn test_list_users() {
        let (store, _temp) = create_test_store();

        store
            .create_user("m1@x.com", "pass", UserRole::Member)
            .unwrap();
        store
            .create_user("v1@x.com", "pass", UserRole::Viewer)
            .unwrap();

        let users = store.list_users().unwrap();
        assert_eq!(users.len(), 3); // default admin + m1 + v1
    }

    #[test]
    fn test_delete_user() {
        let (store, _temp) = create_test_store();

        let user = store
            .create_user("temp@x.com", "pass", UserRole::Viewer)
            .unwrap();

        assert!(store.get_user_by_email("temp@x.com").unwrap().is_some());

        store.delete_user(&user.id).unwrap();

        assert!(store.get_user_by_email("temp@x.com").unwrap().is_none());

        // Deleting again reports not found
        assert!(store.delete_user(&user.id).is_err());
    }
}
