//! Password hashing with Argon2id
//!
//! Hashes are PHC strings, so every stored hash self-describes its algorithm,
//! parameters, and salt; verification never needs out-of-band parameter
//! lookup. Pure hashing (no HMAC pepper) keeps stored credentials independent
//! of the token signing key, and lets cost parameters be upgraded one login at
//! a time via [`PasswordHasher::needs_rehash`].

use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as Argon2PasswordHasher, PasswordVerifier,
        SaltString,
    },
    Algorithm, Argon2, Params, Version,
};

use crate::error::{AuthError, AuthResult};

/// Argon2id password hasher with configured cost parameters and length bounds.
pub struct PasswordHasher {
    argon2: Argon2<'static>,
    params: Params,
    min_length: usize,
    max_length: usize,
}

impl PasswordHasher {
    /// Build a hasher from configured cost parameters.
    ///
    /// Fails with [`AuthError::Hashing`] when the parameter combination is
    /// rejected by Argon2 (caught again at startup by config validation).
    pub fn new(
        min_length: usize,
        max_length: usize,
        memory_kib: u32,
        iterations: u32,
        parallelism: u32,
    ) -> AuthResult<Self> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| AuthError::Hashing(e.to_string()))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params.clone());

        Ok(Self {
            argon2,
            params,
            min_length,
            max_length,
        })
    }

    /// Hash a plaintext password, enforcing the configured length bounds.
    ///
    /// Length is counted in characters, not bytes, so multibyte passwords are
    /// not penalized.
    pub fn hash(&self, password: &str) -> AuthResult<String> {
        let length = password.chars().count();
        if length < self.min_length {
            return Err(AuthError::PasswordTooShort(self.min_length));
        }
        if length > self.max_length {
            return Err(AuthError::PasswordTooLong(self.max_length));
        }
        self.hash_unchecked(password)
    }

    /// Hash without length validation.
    ///
    /// Used on the login rehash path, where the password already verified
    /// against the stored hash and validation errors must never surface.
    pub(crate) fn hash_unchecked(&self, password: &str) -> AuthResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::Hashing(e.to_string()))
    }

    /// Verify a candidate password against a stored PHC hash.
    ///
    /// Returns `Ok(false)` on mismatch; fails with [`AuthError::CorruptHash`]
    /// only when `stored` is not a recognized encoding.
    pub fn verify(&self, stored: &str, candidate: &str) -> AuthResult<bool> {
        let parsed = PasswordHash::new(stored).map_err(|_| AuthError::CorruptHash)?;
        Ok(self
            .argon2
            .verify_password(candidate.as_bytes(), &parsed)
            .is_ok())
    }

    /// Report whether `stored` was produced with weaker-than-current
    /// parameters (or a different algorithm) and should be regenerated on the
    /// next successful login.
    pub fn needs_rehash(&self, stored: &str) -> AuthResult<bool> {
        let parsed = PasswordHash::new(stored).map_err(|_| AuthError::CorruptHash)?;

        if parsed.algorithm != Algorithm::Argon2id.ident() {
            return Ok(true);
        }

        let stored_params = Params::try_from(&parsed).map_err(|_| AuthError::CorruptHash)?;
        Ok(stored_params.m_cost() != self.params.m_cost()
            || stored_params.t_cost() != self.params.t_cost()
            || stored_params.p_cost() != self.params.p_cost())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    // Deliberately cheap parameters so the test suite stays fast.
    fn hasher_with_iterations(t_cost: u32) -> PasswordHasher {
        PasswordHasher::new(6, 128, 1024, t_cost, 1).unwrap()
    }

    fn hasher() -> PasswordHasher {
        hasher_with_iterations(2)
    }

    #[test]
    fn hash_and_verify_round_trip() {
        let hasher = hasher();
        let hash = hasher.hash("correct horse").unwrap();

        assert!(hasher.verify(&hash, "correct horse").unwrap());
        assert!(!hasher.verify(&hash, "wrong battery staple").unwrap());
    }

    #[test]
    fn hashes_are_salted() {
        let hasher = hasher();
        let a = hasher.hash("same password").unwrap();
        let b = hasher.hash("same password").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn length_bounds_are_enforced_in_characters() {
        let hasher = hasher();

        assert!(matches!(
            hasher.hash("short"),
            Err(AuthError::PasswordTooShort(6))
        ));
        let long = "x".repeat(129);
        assert!(matches!(
            hasher.hash(&long),
            Err(AuthError::PasswordTooLong(128))
        ));

        // Six multibyte characters pass the minimum even though the byte
        // length differs.
        assert!(hasher.hash("λλλλλλ").is_ok());
    }

    #[test]
    fn corrupt_stored_hash_is_detected() {
        let hasher = hasher();
        assert!(matches!(
            hasher.verify("not-a-phc-string", "anything"),
            Err(AuthError::CorruptHash)
        ));
        assert!(matches!(
            hasher.needs_rehash("not-a-phc-string"),
            Err(AuthError::CorruptHash)
        ));
    }

    #[test]
    fn needs_rehash_detects_cost_factor_upgrade() {
        let old = hasher_with_iterations(4);
        let current = hasher_with_iterations(10);

        let stored = old.hash("correct horse").unwrap();
        assert!(current.needs_rehash(&stored).unwrap());

        let upgraded = current.hash("correct horse").unwrap();
        assert!(!current.needs_rehash(&upgraded).unwrap());
    }

    #[test]
    fn needs_rehash_is_false_for_current_parameters() {
        let hasher = hasher();
        let stored = hasher.hash("correct horse").unwrap();
        assert!(!hasher.needs_rehash(&stored).unwrap());
    }

    #[test]
    fn foreign_algorithm_triggers_rehash() {
        let hasher = hasher();
        // Argon2i instead of Argon2id: recognized encoding, wrong algorithm.
        let argon2i = Argon2::new(
            Algorithm::Argon2i,
            Version::V0x13,
            Params::new(1024, 2, 1, None).unwrap(),
        );
        let salt = SaltString::generate(&mut OsRng);
        let stored = argon2i
            .hash_password(b"correct horse", &salt)
            .unwrap()
            .to_string();

        assert!(hasher.needs_rehash(&stored).unwrap());
    }
}
