//! Capability token issuance and verification
//!
//! A token is `base64url(payload) . base64url(HMAC-SHA256(secret, payload))`
//! where the payload is a small JSON document carrying the subject (a
//! request or user id) and a Unix expiry timestamp. Possession of the
//! token is the credential; there is no session behind it, so the value
//! must be unforgeable and expiring but needs no header or key rotation
//! machinery.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    /// Bad shape, bad encoding, or a signature that does not verify.
    #[error("token is invalid")]
    Invalid,

    /// Well-formed and authentic, but past its expiry.
    #[error("token has expired")]
    Expired,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    /// Subject: the id the token grants access to.
    sub: String,
    /// Expiry as Unix seconds.
    exp: i64,
}

/// Issues and verifies HMAC-protected capability tokens.
#[derive(Clone)]
pub struct TokenService {
    secret: Vec<u8>,
}

impl TokenService {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    /// Produce a token granting access to `subject` until `expires_at`.
    pub fn issue(&self, subject: &str, expires_at: DateTime<Utc>) -> Result<String, TokenError> {
        let claims = Claims {
            sub: subject.to_string(),
            exp: expires_at.timestamp(),
        };
        let payload_json = serde_json::to_vec(&claims).map_err(|_| TokenError::Invalid)?;
        let payload_b64 = URL_SAFE_NO_PAD.encode(&payload_json);

        let mut mac =
            HmacSha256::new_from_slice(&self.secret).map_err(|_| TokenError::Invalid)?;
        mac.update(payload_b64.as_bytes());
        let signature_b64 = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{}.{}", payload_b64, signature_b64))
    }

    /// Verify a token and return its subject.
    ///
    /// The signature is checked before the payload is parsed, and the
    /// comparison is constant-time (`Mac::verify_slice`).
    pub fn verify(&self, token: &str) -> Result<String, TokenError> {
        let (payload_b64, signature_b64) = token.split_once('.').ok_or(TokenError::Invalid)?;
        if payload_b64.is_empty() || signature_b64.contains('.') {
            return Err(TokenError::Invalid);
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| TokenError::Invalid)?;

        let mut mac =
            HmacSha256::new_from_slice(&self.secret).map_err(|_| TokenError::Invalid)?;
        mac.update(payload_b64.as_bytes());
        mac.verify_slice(&signature).map_err(|_| TokenError::Invalid)?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| TokenError::Invalid)?;
        let claims: Claims = serde_json::from_slice(&payload).map_err(|_| TokenError::Invalid)?;

        if claims.exp < Utc::now().timestamp() {
            return Err(TokenError::Expired);
        }

        Ok(claims.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    fn service() -> TokenService {
        TokenService::new(SECRET)
    }

    #[test]
    fn issue_verify_roundtrip() {
        let svc = service();
        let token = svc
            .issue("req-123", Utc::now() + Duration::days(7))
            .unwrap();
        assert_eq!(svc.verify(&token).unwrap(), "req-123");
    }

    #[test]
    fn expired_token_is_rejected() {
        let svc = service();
        let token = svc
            .issue("req-123", Utc::now() - Duration::minutes(1))
            .unwrap();
        assert_eq!(svc.verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = service()
            .issue("req-123", Utc::now() + Duration::days(1))
            .unwrap();
        let other = TokenService::new("a-completely-different-secret-value");
        assert_eq!(other.verify(&token), Err(TokenError::Invalid));
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        let svc = service();
        for bad in ["", "no-dot", "a.b.c", ".sig", "!!!.???"] {
            assert_eq!(svc.verify(bad), Err(TokenError::Invalid), "input: {bad:?}");
        }
    }

    #[test]
    fn token_is_two_base64url_segments() {
        let token = service()
            .issue("req-123", Utc::now() + Duration::days(1))
            .unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        assert_eq!(parts.len(), 2);
        for part in parts {
            assert!(URL_SAFE_NO_PAD.decode(part).is_ok());
        }
    }

    proptest! {
        /// Any subject survives the roundtrip unchanged.
        #[test]
        fn roundtrip_preserves_subject(sub in "[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}") {
            let svc = service();
            let token = svc.issue(&sub, Utc::now() + Duration::hours(1)).unwrap();
            prop_assert_eq!(svc.verify(&token).unwrap(), sub);
        }

        /// Flipping any character of the signature segment invalidates the token.
        #[test]
        fn tampered_signature_is_rejected(idx in any::<prop::sample::Index>()) {
            let svc = service();
            let token = svc.issue("req-123", Utc::now() + Duration::hours(1)).unwrap();
            let dot = token.find('.').unwrap();
            let sig_start = dot + 1;
            let i = sig_start + idx.index(token.len() - sig_start);

            let mut bytes = token.clone().into_bytes();
            bytes[i] = if bytes[i] == b'A' { b'B' } else { b'A' };
            let tampered = String::from_utf8(bytes).unwrap();
            prop_assume!(tampered != token);

            prop_assert_eq!(svc.verify(&tampered), Err(TokenError::Invalid));
        }

        /// Tampering with the payload segment invalidates the token too.
        #[test]
        fn tampered_payload_is_rejected(idx in any::<prop::sample::Index>()) {
            let svc = service();
            let token = svc.issue("req-123", Utc::now() + Duration::hours(1)).unwrap();
            let dot = token.find('.').unwrap();
            let i = idx.index(dot);

            let mut bytes = token.clone().into_bytes();
            bytes[i] = if bytes[i] == b'A' { b'B' } else { b'A' };
            let tampered = String::from_utf8(bytes).unwrap();
            prop_assume!(tampered != token);

            prop_assert_eq!(svc.verify(&tampered), Err(TokenError::Invalid));
        }
    }
}
