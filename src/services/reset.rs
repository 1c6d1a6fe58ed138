//! Signed, expiring password-reset tokens.
//!
//! A token is a self-contained credential: it carries the user id and an
//! expiry timestamp, HMAC-signed with the application secret. Nothing is
//! stored server-side, so a token cannot be revoked before it expires; the
//! ttl is kept short to compensate.

use std::time::Duration;

use anyhow::{Context, Result};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
struct ResetClaims {
    /// User id the token was issued for
    sub: i32,
    /// Expiry as a unix timestamp
    exp: usize,
}

#[derive(Clone)]
pub struct ResetTokens {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl ResetTokens {
    #[must_use]
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    /// Issue a token for `user_id` that expires `ttl` from now.
    pub fn issue(&self, user_id: i32) -> Result<String> {
        let expires_at = chrono::Utc::now()
            + chrono::Duration::from_std(self.ttl).context("Reset token ttl out of range")?;

        let claims = ResetClaims {
            sub: user_id,
            exp: usize::try_from(expires_at.timestamp()).context("Expiry before unix epoch")?,
        };

        encode(&Header::default(), &claims, &self.encoding).context("Failed to sign reset token")
    }

    /// Decode and check a token. Returns the embedded user id, or `None` if
    /// the signature does not match, the token is malformed, or it has
    /// expired. A bad token is a normal outcome here, not an error.
    #[must_use]
    pub fn verify(&self, token: &str) -> Option<i32> {
        let mut validation = Validation::new(Algorithm::HS256);
        // No clock leeway: a token past its expiry is invalid immediately
        validation.leeway = 0;

        decode::<ResetClaims>(token, &self.decoding, &validation)
            .ok()
            .map(|data| data.claims.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(secret: &str, ttl_seconds: u64) -> ResetTokens {
        ResetTokens::new(secret, Duration::from_secs(ttl_seconds))
    }

    #[test]
    fn issue_then_verify_returns_user_id() {
        let reset = tokens("dev-secret", 600);
        let token = reset.issue(42).expect("issue token");
        assert_eq!(reset.verify(&token), Some(42));
    }

    #[test]
    fn verify_rejects_expired_token() {
        let reset = tokens("dev-secret", 1);
        let token = reset.issue(7).expect("issue token");

        assert_eq!(reset.verify(&token), Some(7));

        std::thread::sleep(Duration::from_secs(2));
        assert_eq!(reset.verify(&token), None);
    }

    #[test]
    fn verify_rejects_wrong_secret() {
        let token = tokens("secret-a", 600).issue(1).expect("issue token");
        assert_eq!(tokens("secret-b", 600).verify(&token), None);
    }

    #[test]
    fn verify_rejects_tampered_token() {
        let reset = tokens("dev-secret", 600);
        let token = reset.issue(1).expect("issue token");

        // Flip one character of the signature
        let mut tampered: Vec<char> = token.chars().collect();
        let last = tampered.len() - 1;
        tampered[last] = if tampered[last] == 'A' { 'B' } else { 'A' };
        let tampered: String = tampered.into_iter().collect();

        assert_eq!(reset.verify(&tampered), None);
    }

    #[test]
    fn verify_rejects_garbage() {
        let reset = tokens("dev-secret", 600);
        assert_eq!(reset.verify(""), None);
        assert_eq!(reset.verify("not-a-token"), None);
        assert_eq!(reset.verify("a.b.c"), None);
    }
}
