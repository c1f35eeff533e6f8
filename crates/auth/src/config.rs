//! Authentication configuration

use std::{env, path::PathBuf};

/// Authentication configuration loaded from environment variables.
///
/// Validated once at load time and immutable for the process lifetime.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Issuer claim stamped into every token and enforced on verification
    pub issuer: String,
    /// Token lifetime in hours
    pub token_lifetime_hours: i64,
    /// Directory holding the Ed25519 private key file
    pub key_dir: PathBuf,
    /// Maximum number of identity-cache entries
    pub cache_capacity: usize,
    /// Ceiling on identity-cache entry lifetime in seconds, independent of
    /// how long the token itself remains valid
    pub cache_max_ttl_secs: u64,
    /// Password length bounds (characters)
    pub password_min_length: usize,
    pub password_max_length: usize,
    /// Argon2id cost parameters
    pub argon2_memory_kib: u32,
    pub argon2_iterations: u32,
    pub argon2_parallelism: u32,
}

impl AuthConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            issuer: {
                let issuer =
                    env::var("TOKEN_ISSUER").map_err(|_| ConfigError::Missing("TOKEN_ISSUER"))?;
                if issuer.trim().is_empty() {
                    return Err(ConfigError::Invalid("TOKEN_ISSUER must not be empty"));
                }
                issuer
            },
            token_lifetime_hours: parse_var("TOKEN_LIFETIME_HOURS", 24)?,
            key_dir: env::var("SIGNING_KEY_DIR")
                .unwrap_or_else(|_| "secret".to_string())
                .into(),
            cache_capacity: parse_var("AUTH_CACHE_CAPACITY", 256)?,
            cache_max_ttl_secs: parse_var("AUTH_CACHE_MAX_TTL_SECS", 3600)?,
            password_min_length: parse_var("PASSWORD_MIN_LENGTH", 6)?,
            password_max_length: parse_var("PASSWORD_MAX_LENGTH", 128)?,
            argon2_memory_kib: parse_var("ARGON2_MEMORY_KIB", 19456)?,
            argon2_iterations: parse_var("ARGON2_ITERATIONS", 2)?,
            argon2_parallelism: parse_var("ARGON2_PARALLELISM", 1)?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.token_lifetime_hours < 1 {
            return Err(ConfigError::Invalid("TOKEN_LIFETIME_HOURS must be at least 1"));
        }
        if self.cache_capacity == 0 {
            return Err(ConfigError::Invalid("AUTH_CACHE_CAPACITY must be at least 1"));
        }
        if self.cache_max_ttl_secs == 0 {
            return Err(ConfigError::Invalid("AUTH_CACHE_MAX_TTL_SECS must be at least 1"));
        }
        if self.password_min_length == 0 {
            return Err(ConfigError::Invalid("PASSWORD_MIN_LENGTH must be at least 1"));
        }
        if self.password_max_length < self.password_min_length {
            return Err(ConfigError::Invalid(
                "PASSWORD_MAX_LENGTH must not be below PASSWORD_MIN_LENGTH",
            ));
        }
        if self.password_max_length > 1024 {
            return Err(ConfigError::Invalid("PASSWORD_MAX_LENGTH must be at most 1024"));
        }
        if self.argon2_parallelism == 0 {
            return Err(ConfigError::Invalid("ARGON2_PARALLELISM must be at least 1"));
        }
        if self.argon2_iterations == 0 {
            return Err(ConfigError::Invalid("ARGON2_ITERATIONS must be at least 1"));
        }
        // Argon2 rejects memory below 8 KiB per lane
        if self.argon2_memory_kib < 8 * self.argon2_parallelism {
            return Err(ConfigError::Invalid(
                "ARGON2_MEMORY_KIB must be at least 8 KiB per parallelism lane",
            ));
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::Unparseable(name)),
        Err(_) => Ok(default),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Could not parse environment variable: {0}")]
    Unparseable(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}
