//! Authentication service
//!
//! Orchestrates header parsing, the identity cache, token verification, the
//! user store, and credential checks. Handlers own routing and request
//! parsing; this service owns everything between "raw `Authorization` header"
//! and "resolved identity".

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use uuid::Uuid;

use nazonexus_shared::{Identity, UserRecord};

use crate::{
    cache::IdentityCache,
    config::AuthConfig,
    error::{AuthError, AuthResult},
    keys::SigningKeys,
    password::PasswordHasher,
    store::UserStore,
    token::TokenCodec,
};

const BEARER_PREFIX: &str = "Bearer ";

/// The authentication core, constructed once at startup and shared across
/// request handlers.
pub struct AuthService {
    codec: TokenCodec,
    cache: IdentityCache,
    hasher: PasswordHasher,
    store: Arc<dyn UserStore>,
}

impl AuthService {
    /// Assemble the service from validated configuration, a loaded key pair,
    /// and the application's user store.
    pub fn new(
        config: &AuthConfig,
        keys: SigningKeys,
        store: Arc<dyn UserStore>,
    ) -> AuthResult<Self> {
        let hasher = PasswordHasher::new(
            config.password_min_length,
            config.password_max_length,
            config.argon2_memory_kib,
            config.argon2_iterations,
            config.argon2_parallelism,
        )?;
        let codec = TokenCodec::new(
            Arc::new(keys),
            config.issuer.as_str(),
            config.token_lifetime_hours,
        );
        let cache = IdentityCache::new(
            config.cache_capacity,
            Duration::from_secs(config.cache_max_ttl_secs),
        );

        Ok(Self {
            codec,
            cache,
            hasher,
            store,
        })
    }

    /// Resolve the identity behind an `Authorization` header value.
    ///
    /// Missing or non-`Bearer` headers yield `Ok(None)` (anonymous, not an
    /// error) so endpoints that tolerate unauthenticated access can proceed
    /// while protected endpoints enforce presence themselves. Token failures
    /// likewise collapse to `Ok(None)` and are only logged at debug level. A
    /// verified token whose subject no longer exists is the one hard failure:
    /// [`AuthError::UserNotFound`].
    pub async fn authenticate(&self, authorization: Option<&str>) -> AuthResult<Option<Identity>> {
        let Some(value) = authorization else {
            return Ok(None);
        };
        let Some(token) = value.strip_prefix(BEARER_PREFIX) else {
            tracing::debug!(
                "Authorization header does not start with `Bearer `, ignoring it"
            );
            return Ok(None);
        };

        if let Some(identity) = self.cache.get(token) {
            return Ok(Some(identity));
        }

        let claims = match self.codec.verify(token) {
            Ok(claims) => claims,
            Err(reason) => {
                tracing::debug!(%reason, "Rejected bearer token");
                return Ok(None);
            }
        };

        let user = self
            .store
            .find_by_id(claims.sub)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let identity = Identity::from(&user);
        let remaining = claims.exp - OffsetDateTime::now_utc().unix_timestamp();
        if remaining > 0 {
            self.cache
                .put(token, identity.clone(), Duration::from_secs(remaining as u64));
        }

        Ok(Some(identity))
    }

    /// Check a username/password pair, returning the subject id on success.
    ///
    /// Returns `Ok(None)` both when the username is unknown and when the
    /// password is wrong; the two cases are indistinguishable to the caller.
    /// On success the last-login timestamp is persisted, together with an
    /// upgraded password hash when the stored one was produced with
    /// out-of-date cost parameters.
    pub async fn login(&self, username: &str, password: &str) -> AuthResult<Option<Uuid>> {
        let Some(user) = self.store.find_by_username(username).await? else {
            tracing::debug!("Login failed: no matching credentials");
            return Ok(None);
        };

        let valid = match self.hasher.verify(&user.password_hash, password) {
            Ok(valid) => valid,
            Err(_) => {
                // A corrupt stored hash must read as plain "no match" here;
                // hash validation errors belong to registration flows only.
                tracing::error!(user_id = %user.id, "Stored password hash is unreadable");
                return Ok(None);
            }
        };
        if !valid {
            tracing::debug!("Login failed: no matching credentials");
            return Ok(None);
        }

        let new_hash = if self.hasher.needs_rehash(&user.password_hash).unwrap_or(true) {
            tracing::info!(user_id = %user.id, "Upgrading password hash on login");
            Some(self.hasher.hash_unchecked(password)?)
        } else {
            None
        };

        self.store
            .update_password_and_last_login(user.id, new_hash.as_deref(), OffsetDateTime::now_utc())
            .await?;

        Ok(Some(user.id))
    }

    /// Issue a fresh wire token for a subject (typically right after a
    /// successful [`login`](Self::login)).
    pub fn issue_token(&self, subject: Uuid) -> AuthResult<String> {
        self.codec.issue(subject)
    }

    /// Build a user record with its password hash already computed.
    ///
    /// This is the only way the core produces a record from a plaintext
    /// password; there is deliberately no "set the password field" path.
    pub fn new_user_record(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> AuthResult<UserRecord> {
        let password_hash = self.hasher.hash(password)?;
        Ok(UserRecord {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash,
            email: email.to_string(),
            is_active: true,
            is_admin: false,
            is_superuser: false,
            last_login: None,
        })
    }

    /// The hasher, for password-change flows that need validation + hashing
    /// outside a login.
    pub fn hasher(&self) -> &PasswordHasher {
        &self.hasher
    }
}
