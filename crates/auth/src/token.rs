//! Token issuance and verification
//!
//! Wire format is the standard three-segment JWS (`header.payload.signature`,
//! base64url without padding), signed with the Ed25519 key pair. The header
//! must declare `EdDSA` exactly; tokens carrying any other algorithm are
//! rejected before their claims are ever looked at.

use std::sync::Arc;

use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::{
    error::{AuthError, AuthResult},
    keys::SigningKeys,
};

/// Claims carried by every NazoNexus-issued token.
///
/// Immutable once issued; `exp - iat` equals the configured token lifetime at
/// issuance time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (user ID)
    pub sub: Uuid,
    /// Issuer
    pub iss: String,
    /// Expiration time (seconds since epoch, UTC)
    pub exp: i64,
    /// Issued at (seconds since epoch, UTC)
    pub iat: i64,
    /// Token ID, fresh per issuance (v7 UUID); kept for audit trails, not
    /// currently checked against any blocklist
    pub jti: Uuid,
}

/// Builds, signs, parses, and validates wire tokens.
pub struct TokenCodec {
    keys: Arc<SigningKeys>,
    issuer: String,
    lifetime: Duration,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(keys: Arc<SigningKeys>, issuer: impl Into<String>, lifetime_hours: i64) -> Self {
        let issuer = issuer.into();

        let mut validation = Validation::new(Algorithm::EdDSA);
        validation.set_issuer(&[&issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        // The expiry property is exact: exp < now is expired, no grace window.
        validation.leeway = 0;

        Self {
            keys,
            issuer,
            lifetime: Duration::hours(lifetime_hours),
            validation,
        }
    }

    /// Issue a signed wire token for `subject`.
    pub fn issue(&self, subject: Uuid) -> AuthResult<String> {
        let now = OffsetDateTime::now_utc();
        let claims = TokenClaims {
            sub: subject,
            iss: self.issuer.clone(),
            exp: (now + self.lifetime).unix_timestamp(),
            iat: now.unix_timestamp(),
            jti: Uuid::now_v7(),
        };
        self.sign(&claims)
    }

    pub(crate) fn sign(&self, claims: &TokenClaims) -> AuthResult<String> {
        let token = encode(&Header::new(Algorithm::EdDSA), claims, self.keys.encoding())
            .map_err(|e| AuthError::TokenEncoding(e.to_string()))?;
        tracing::debug!(subject = %claims.sub, jti = %claims.jti, "Issued token");
        Ok(token)
    }

    /// Parse and verify a wire token, returning its claims.
    ///
    /// Order matters: structure is parsed first, the signature is verified
    /// second, and only then are claim values (issuer, expiry) validated.
    /// Claim values are never trusted before the signature checks out.
    pub fn verify(&self, token: &str) -> AuthResult<TokenClaims> {
        decode::<TokenClaims>(token, self.keys.decoding(), &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                ErrorKind::InvalidIssuer => AuthError::TokenIssuerMismatch,
                ErrorKind::InvalidSignature => AuthError::TokenSignatureInvalid,
                ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                    AuthError::TokenMalformed
                }
                ErrorKind::MissingRequiredClaim(_) => AuthError::TokenMalformed,
                ErrorKind::InvalidToken
                | ErrorKind::Base64(_)
                | ErrorKind::Json(_)
                | ErrorKind::Utf8(_) => AuthError::TokenMalformed,
                _ => AuthError::TokenSignatureInvalid,
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const SUBJECT: &str = "11111111-1111-1111-1111-111111111111";

    fn codec_with(issuer: &str, lifetime_hours: i64) -> TokenCodec {
        let dir = tempfile::tempdir().unwrap();
        let keys = SigningKeys::load_or_create(dir.path()).unwrap();
        TokenCodec::new(Arc::new(keys), issuer, lifetime_hours)
    }

    fn codec() -> TokenCodec {
        codec_with("nazonexus", 1)
    }

    #[test]
    fn issue_then_verify_round_trips() {
        let codec = codec();
        let subject: Uuid = SUBJECT.parse().unwrap();

        let token = codec.issue(subject).unwrap();
        let claims = codec.verify(&token).unwrap();

        assert_eq!(claims.sub, subject);
        assert_eq!(claims.iss, "nazonexus");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn wire_token_has_three_base64url_segments() {
        let codec = codec();
        let token = codec.issue(Uuid::new_v4()).unwrap();

        let segments: Vec<&str> = token.split('.').collect();
        assert_eq!(segments.len(), 3);
        assert!(!token.contains('='), "segments must not carry padding");
    }

    #[test]
    fn jti_is_fresh_per_issuance() {
        let codec = codec();
        let subject = Uuid::new_v4();

        let a = codec.verify(&codec.issue(subject).unwrap()).unwrap();
        let b = codec.verify(&codec.issue(subject).unwrap()).unwrap();
        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn expired_token_is_rejected() {
        let codec = codec();
        let now = OffsetDateTime::now_utc().unix_timestamp();
        // Validly signed, but expired an hour ago.
        let claims = TokenClaims {
            sub: Uuid::new_v4(),
            iss: "nazonexus".to_string(),
            exp: now - 3600,
            iat: now - 7200,
            jti: Uuid::now_v7(),
        };
        let token = codec.sign(&claims).unwrap();

        assert!(matches!(codec.verify(&token), Err(AuthError::TokenExpired)));
    }

    #[test]
    fn issuer_mismatch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let keys = Arc::new(SigningKeys::load_or_create(dir.path()).unwrap());
        let issuing = TokenCodec::new(Arc::clone(&keys), "someone-else", 1);
        let verifying = TokenCodec::new(keys, "nazonexus", 1);

        let token = issuing.issue(Uuid::new_v4()).unwrap();
        assert!(matches!(
            verifying.verify(&token),
            Err(AuthError::TokenIssuerMismatch)
        ));
    }

    #[test]
    fn flipped_signature_bit_is_rejected() {
        let codec = codec();
        let token = codec.issue(Uuid::new_v4()).unwrap();

        let (head, signature) = token.rsplit_once('.').unwrap();
        let mut chars: Vec<char> = signature.chars().collect();
        // Swap one base64url character for a different one.
        chars[10] = if chars[10] == 'A' { 'B' } else { 'A' };
        let tampered = format!("{head}.{}", chars.into_iter().collect::<String>());

        assert!(matches!(
            codec.verify(&tampered),
            Err(AuthError::TokenSignatureInvalid)
        ));
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let codec = codec();
        let token = codec.issue(Uuid::new_v4()).unwrap();

        use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
        let mut segments: Vec<String> = token.split('.').map(String::from).collect();
        let mut payload: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(&segments[1]).unwrap()).unwrap();
        payload["sub"] = serde_json::json!(Uuid::new_v4());
        segments[1] = URL_SAFE_NO_PAD.encode(payload.to_string().as_bytes());

        let result = codec.verify(&segments.join("."));
        assert!(matches!(result, Err(AuthError::TokenSignatureInvalid)));
    }

    #[test]
    fn structural_garbage_is_malformed() {
        let codec = codec();

        for bad in ["", "only.two", "not-a-jwt", "a.b.c.d", "!!!.!!!.!!!"] {
            let result = codec.verify(bad);
            assert!(
                matches!(result, Err(AuthError::TokenMalformed)),
                "expected TokenMalformed for {bad:?}, got {result:?}"
            );
        }
    }

    #[test]
    fn foreign_algorithm_header_is_rejected() {
        let codec = codec();
        // HS256 token signed with a shared secret: the header does not declare
        // EdDSA, so it must be rejected without consulting its claims.
        let claims = TokenClaims {
            sub: Uuid::new_v4(),
            iss: "nazonexus".to_string(),
            exp: OffsetDateTime::now_utc().unix_timestamp() + 3600,
            iat: OffsetDateTime::now_utc().unix_timestamp(),
            jti: Uuid::now_v7(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &jsonwebtoken::EncodingKey::from_secret(b"shared-secret-of-32-bytes-at-least"),
        )
        .unwrap();

        assert!(matches!(
            codec.verify(&token),
            Err(AuthError::TokenMalformed)
        ));
    }

    #[test]
    fn missing_required_claims_are_malformed() {
        use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

        let codec = codec();
        let token = codec.issue(Uuid::new_v4()).unwrap();
        let segments: Vec<&str> = token.split('.').collect();

        // Re-sign a payload without `sub` using the same key so only the
        // missing claim can be at fault.
        let payload: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(segments[1]).unwrap()).unwrap();

        #[derive(Serialize)]
        struct PartialClaims<'a> {
            iss: &'a str,
            exp: i64,
            iat: i64,
            jti: Uuid,
        }
        let partial = PartialClaims {
            iss: "nazonexus",
            exp: payload["exp"].as_i64().unwrap(),
            iat: payload["iat"].as_i64().unwrap(),
            jti: Uuid::now_v7(),
        };
        let stripped = codec
            .sign_partial(&partial)
            .expect("signing partial claims for the test");

        let result = codec.verify(&stripped);
        assert!(
            matches!(result, Err(AuthError::TokenMalformed)),
            "expected TokenMalformed, got {result:?}"
        );
    }

    impl TokenCodec {
        // Test-only: sign arbitrary claim sets to build deliberately broken tokens.
        fn sign_partial<T: Serialize>(&self, claims: &T) -> AuthResult<String> {
            encode(&Header::new(Algorithm::EdDSA), claims, self.keys.encoding())
                .map_err(|e| AuthError::TokenEncoding(e.to_string()))
        }
    }

    #[test]
    fn token_from_another_key_pair_is_rejected() {
        let codec = codec();
        let other = codec_with("nazonexus", 1);

        let token = other.issue(Uuid::new_v4()).unwrap();
        assert!(matches!(
            codec.verify(&token),
            Err(AuthError::TokenSignatureInvalid)
        ));
    }
}
