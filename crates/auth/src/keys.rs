//! Ed25519 signing key pair with load-or-create persistence
//!
//! The private key lives as unencrypted PKCS#8 PEM in a protected directory.
//! First run generates and persists it; later runs load it. Ed25519 is used
//! because verification speed dominates for API-token signing and signatures
//! stay small.

use std::{
    fs,
    io::{ErrorKind, Write},
    path::Path,
    sync::Mutex,
};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use ed25519_dalek::{
    pkcs8::{spki::der::pem::LineEnding, DecodePrivateKey, EncodePrivateKey},
    SigningKey,
};
use jsonwebtoken::{DecodingKey, EncodingKey};
use rand::rngs::OsRng;

use crate::error::{AuthError, AuthResult};

/// File name of the persisted private key inside the key directory
const PRIVATE_KEY_FILE: &str = "private.key";

// Serializes first-time initialization so concurrent callers cannot race to
// generate two different key pairs. The filesystem `create_new` below covers
// the cross-process case: the loser of that race re-reads the winner's file.
static INIT_LOCK: Mutex<()> = Mutex::new(());

/// The process-lifetime Ed25519 key pair.
///
/// Constructed once at startup via [`load_or_create`](Self::load_or_create),
/// shared behind an `Arc`, and read-only afterwards. Never regenerated while
/// the process lives.
pub struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    public_key_b64: String,
}

impl SigningKeys {
    /// Load the key pair from `dir`, generating and persisting a fresh one if
    /// no key file exists yet.
    ///
    /// Fails with [`AuthError::KeyStorage`] when the directory cannot be
    /// created or the key file cannot be read/written, and with
    /// [`AuthError::KeyCorrupt`] when an existing file is not valid Ed25519
    /// PKCS#8 PEM.
    pub fn load_or_create(dir: &Path) -> AuthResult<Self> {
        let _guard = INIT_LOCK
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        fs::create_dir_all(dir)
            .map_err(|e| AuthError::KeyStorage(format!("create {}: {e}", dir.display())))?;

        let path = dir.join(PRIVATE_KEY_FILE);
        let pem = if path.exists() {
            tracing::debug!(path = %path.display(), "Loading existing Ed25519 key pair");
            fs::read_to_string(&path)
                .map_err(|e| AuthError::KeyStorage(format!("read {}: {e}", path.display())))?
        } else {
            restrict_dir_permissions(dir);
            generate_and_persist(&path)?
        };

        Self::from_pem(&pem)
    }

    fn from_pem(pem: &str) -> AuthResult<Self> {
        let signing_key = SigningKey::from_pkcs8_pem(pem)
            .map_err(|e| AuthError::KeyCorrupt(e.to_string()))?;
        let public_key_b64 = URL_SAFE_NO_PAD.encode(signing_key.verifying_key().as_bytes());

        let encoding = EncodingKey::from_ed_pem(pem.as_bytes())
            .map_err(|e| AuthError::KeyCorrupt(e.to_string()))?;
        let decoding = DecodingKey::from_ed_components(&public_key_b64)
            .map_err(|e| AuthError::KeyCorrupt(e.to_string()))?;

        Ok(Self {
            encoding,
            decoding,
            public_key_b64,
        })
    }

    pub(crate) fn encoding(&self) -> &EncodingKey {
        &self.encoding
    }

    pub(crate) fn decoding(&self) -> &DecodingKey {
        &self.decoding
    }

    /// Base64url (no padding) encoding of the raw 32-byte public key
    pub fn public_key_base64(&self) -> &str {
        &self.public_key_b64
    }
}

impl std::fmt::Debug for SigningKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Private key material is never printed
        f.debug_struct("SigningKeys")
            .field("public_key_b64", &self.public_key_b64)
            .finish_non_exhaustive()
    }
}

/// Generate a fresh key pair and persist the PEM at `path`.
///
/// Uses `create_new` so two processes racing on a fresh installation write
/// exactly one file; the loser reads back whatever the winner persisted.
fn generate_and_persist(path: &Path) -> AuthResult<String> {
    let signing_key = SigningKey::generate(&mut OsRng);
    let pem = signing_key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| AuthError::KeyStorage(format!("encode private key: {e}")))?;

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    match options.open(path) {
        Ok(mut file) => {
            file.write_all(pem.as_bytes())
                .map_err(|e| AuthError::KeyStorage(format!("write {}: {e}", path.display())))?;
            tracing::info!(path = %path.display(), "Generated new Ed25519 key pair");
            Ok(pem.to_string())
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            // Another process won the race; use its key.
            fs::read_to_string(path)
                .map_err(|e| AuthError::KeyStorage(format!("read {}: {e}", path.display())))
        }
        Err(e) => Err(AuthError::KeyStorage(format!(
            "create {}: {e}",
            path.display()
        ))),
    }
}

fn restrict_dir_permissions(dir: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = fs::set_permissions(dir, fs::Permissions::from_mode(0o700)) {
            tracing::warn!(dir = %dir.display(), error = %e, "Could not restrict key directory permissions");
        }
    }
    #[cfg(not(unix))]
    let _ = dir;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn generates_then_reloads_same_key() {
        let dir = tempfile::tempdir().unwrap();

        let first = SigningKeys::load_or_create(dir.path()).unwrap();
        let second = SigningKeys::load_or_create(dir.path()).unwrap();

        assert_eq!(first.public_key_base64(), second.public_key_base64());
        assert!(dir.path().join(PRIVATE_KEY_FILE).exists());
    }

    #[test]
    fn creates_missing_key_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested").join("secret");

        let keys = SigningKeys::load_or_create(&nested).unwrap();
        assert!(!keys.public_key_base64().is_empty());
        assert!(nested.join(PRIVATE_KEY_FILE).exists());
    }

    #[test]
    fn concurrent_first_time_initialization_yields_one_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_path_buf();

        let mut public_keys: Vec<String> = Vec::new();
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let path = path.clone();
                    scope.spawn(move || {
                        SigningKeys::load_or_create(&path)
                            .map(|k| k.public_key_base64().to_string())
                    })
                })
                .collect();
            for handle in handles {
                public_keys.push(handle.join().unwrap().unwrap());
            }
        });

        assert_eq!(public_keys.len(), 4);
        assert!(
            public_keys.iter().all(|k| k == &public_keys[0]),
            "all initializers must observe the same key material"
        );

        let files: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1, "exactly one private-key file must exist");
    }

    #[test]
    fn corrupt_key_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(PRIVATE_KEY_FILE), "not a pem at all").unwrap();

        let result = SigningKeys::load_or_create(dir.path());
        assert!(matches!(result, Err(AuthError::KeyCorrupt(_))));
    }

    #[test]
    fn unwritable_key_directory_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the directory should be makes create_dir_all fail.
        let blocked = dir.path().join("occupied");
        fs::write(&blocked, b"").unwrap();

        let result = SigningKeys::load_or_create(&blocked);
        assert!(matches!(result, Err(AuthError::KeyStorage(_))));
    }

    #[cfg(unix)]
    #[test]
    fn key_file_permissions_are_restrictive() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        SigningKeys::load_or_create(dir.path()).unwrap();

        let mode = fs::metadata(dir.path().join(PRIVATE_KEY_FILE))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn debug_output_omits_private_material() {
        let dir = tempfile::tempdir().unwrap();
        let keys = SigningKeys::load_or_create(dir.path()).unwrap();
        let rendered = format!("{keys:?}");
        assert!(rendered.contains("public_key_b64"));
        assert!(!rendered.contains("PRIVATE"));
    }
}
