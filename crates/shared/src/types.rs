//! Common types used across NazoNexus

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// A user row as stored by the external user store.
///
/// The schema itself (table definition, migrations) is owned elsewhere; the
/// authentication core only reads records and asks the store to persist an
/// updated password hash and/or last-login timestamp.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub email: String,
    pub is_active: bool,
    pub is_admin: bool,
    pub is_superuser: bool,
    pub last_login: Option<OffsetDateTime>,
}

/// The resolved identity of the caller making a request.
///
/// Derived from a verified token's subject plus a user-store lookup. Does not
/// carry the stored password hash, so cached identities never hold credential
/// material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub is_active: bool,
    pub is_admin: bool,
    pub is_superuser: bool,
}

impl From<&UserRecord> for Identity {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            is_active: user.is_active,
            is_admin: user.is_admin,
            is_superuser: user.is_superuser,
        }
    }
}
