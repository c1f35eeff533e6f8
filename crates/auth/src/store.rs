//! User store collaborator
//!
//! The authentication core does not own the user table or its migrations; it
//! only needs three operations from whatever store the application wires in.
//! Each call is a single attempt against the backend; transactional retry is
//! the store's business, not ours.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use nazonexus_shared::UserRecord;

use crate::error::AuthResult;

/// Operations the authentication core requires from the external user store.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> AuthResult<Option<UserRecord>>;

    async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<UserRecord>>;

    /// Persist a new password hash (when present) together with the last-login
    /// timestamp in one logical update.
    async fn update_password_and_last_login(
        &self,
        id: Uuid,
        new_hash: Option<&str>,
        at: OffsetDateTime,
    ) -> AuthResult<()>;
}

/// Postgres-backed user store.
///
/// Reads and writes the application's `users` table; the schema is defined and
/// migrated elsewhere.
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_username(&self, username: &str) -> AuthResult<Option<UserRecord>> {
        let user: Option<UserRecord> = sqlx::query_as(
            r#"
            SELECT id, username, password_hash, email,
                   is_active, is_admin, is_superuser, last_login
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<UserRecord>> {
        let user: Option<UserRecord> = sqlx::query_as(
            r#"
            SELECT id, username, password_hash, email,
                   is_active, is_admin, is_superuser, last_login
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn update_password_and_last_login(
        &self,
        id: Uuid,
        new_hash: Option<&str>,
        at: OffsetDateTime,
    ) -> AuthResult<()> {
        // COALESCE keeps the stored hash when no upgrade is being persisted,
        // so both cases stay a single atomic statement.
        sqlx::query(
            r#"
            UPDATE users
            SET password_hash = COALESCE($2, password_hash),
                last_login = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(new_hash)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// In-memory user store for tests and embedded use.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<Uuid, UserRecord>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a user record.
    pub fn insert(&self, user: UserRecord) {
        if let Ok(mut users) = self.users.write() {
            users.insert(user.id, user);
        }
    }

    pub fn remove(&self, id: Uuid) {
        if let Ok(mut users) = self.users.write() {
            users.remove(&id);
        }
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_username(&self, username: &str) -> AuthResult<Option<UserRecord>> {
        let users = self.users.read().map_err(|_| poisoned())?;
        Ok(users.values().find(|u| u.username == username).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<UserRecord>> {
        let users = self.users.read().map_err(|_| poisoned())?;
        Ok(users.get(&id).cloned())
    }

    async fn update_password_and_last_login(
        &self,
        id: Uuid,
        new_hash: Option<&str>,
        at: OffsetDateTime,
    ) -> AuthResult<()> {
        let mut users = self.users.write().map_err(|_| poisoned())?;
        if let Some(user) = users.get_mut(&id) {
            if let Some(hash) = new_hash {
                user.password_hash = hash.to_string();
            }
            user.last_login = Some(at);
        }
        Ok(())
    }
}

fn poisoned() -> crate::error::AuthError {
    crate::error::AuthError::Store("user store lock poisoned".to_string())
}
