//! NazoNexus authentication core
//!
//! Issues, verifies, and caches signed identity tokens for the NazoNexus API,
//! and authenticates user credentials against stored password hashes.
//!
//! The crate is framework-light by design: handlers hand in the raw
//! `Authorization` header value and get back a resolved [`Identity`] (or
//! nothing, for anonymous requests). The only external collaborator is a
//! [`UserStore`], which fetches user records and persists password-hash /
//! last-login updates.
//!
//! ```no_run
//! use std::sync::Arc;
//! use nazonexus_auth::{AuthConfig, AuthService, SigningKeys, MemoryUserStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AuthConfig::from_env()?;
//! let keys = SigningKeys::load_or_create(&config.key_dir)?;
//! let store = Arc::new(MemoryUserStore::new());
//! let auth = AuthService::new(&config, keys, store)?;
//!
//! if let Some(subject) = auth.login("alice", "correct horse").await? {
//!     let token = auth.issue_token(subject)?;
//!     let identity = auth.authenticate(Some(&format!("Bearer {token}"))).await?;
//!     assert!(identity.is_some());
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod keys;
pub mod password;
pub mod service;
pub mod store;
pub mod token;

pub use cache::IdentityCache;
pub use config::{AuthConfig, ConfigError};
pub use error::AuthError;
pub use http::{AuthUser, MaybeAuthUser};
pub use keys::SigningKeys;
pub use password::PasswordHasher;
pub use service::AuthService;
pub use store::{MemoryUserStore, PgUserStore, UserStore};
pub use token::{TokenClaims, TokenCodec};

pub use nazonexus_shared::{Identity, UserRecord};
