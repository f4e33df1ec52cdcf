//! Stateless session tokens.
//!
//! Wire format: `base64url(claims JSON) . base64url(HMAC-SHA256)`, signed
//! with a server-held secret. Any modification of the claims segment
//! invalidates the signature, and the signature is checked (in constant
//! time) before expiry — a tampered-and-expired token reports tampering.
//!
//! Tokens are never stored server-side; there is no revocation list.
//! Validity ends at `exp`, full stop.

use crate::auth::password::constant_time_eq;
use crate::auth::{Role, User};
use crate::error::{Error, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};

type HmacSha256 = Hmac<Sha256>;

/// Default token lifetime: 24 hours (seconds).
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 24 * 3600;

/// Signing secret + lifetime, passed in explicitly at construction so tests
/// can run with deterministic secrets and clocks. No ambient globals.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub secret: String,
    pub ttl_secs: u64,
}

/// Facts embedded in and attested by a session token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Username the token was issued to.
    pub sub: String,
    /// Role snapshot taken at issuance. Live role changes only show up
    /// after re-login.
    pub role: Role,
    /// Issued-at (Unix seconds).
    pub iat: u64,
    /// Expiry (Unix seconds). The token is dead from this instant on, so a
    /// zero TTL produces a token that never validates.
    pub exp: u64,
}

/// Issues and validates signed session tokens.
pub struct TokenService {
    config: TokenConfig,
}

impl TokenService {
    pub fn new(config: TokenConfig) -> Self {
        Self { config }
    }

    /// Issue a token for an authenticated user, valid for the configured TTL.
    pub fn issue(&self, user: &User) -> String {
        self.issue_at(user, epoch_secs())
    }

    /// Issue with an explicit clock. Test seam; `issue` delegates here.
    pub fn issue_at(&self, user: &User, now: u64) -> String {
        let claims = Claims {
            sub: user.username.clone(),
            role: user.role,
            iat: now,
            // Saturate so an absurd configured TTL cannot wrap the expiry.
            exp: now.saturating_add(self.config.ttl_secs),
        };
        // Claims are plain serializable fields; serialization cannot fail.
        let json = serde_json::to_vec(&claims).unwrap_or_default();
        let body = URL_SAFE_NO_PAD.encode(json);
        let sig = self.sign(body.as_bytes());
        format!("{body}.{sig}")
    }

    /// Validate a token and return its claims.
    ///
    /// Pure and side-effect free: validating the same token twice returns
    /// identical claims both times.
    pub fn validate(&self, token: &str) -> Result<Claims> {
        self.validate_at(token, epoch_secs())
    }

    /// Validate with an explicit clock. Signature integrity is checked
    /// before expiry.
    pub fn validate_at(&self, token: &str, now: u64) -> Result<Claims> {
        let (body, sig) = token.split_once('.').ok_or(Error::InvalidToken)?;

        let expected = self.sign(body.as_bytes());
        if !constant_time_eq(sig.as_bytes(), expected.as_bytes()) {
            return Err(Error::InvalidToken);
        }

        let json = URL_SAFE_NO_PAD
            .decode(body)
            .map_err(|_| Error::InvalidToken)?;
        let claims: Claims = serde_json::from_slice(&json).map_err(|_| Error::InvalidToken)?;

        if now >= claims.exp {
            return Err(Error::ExpiredToken);
        }
        Ok(claims)
    }

    fn sign(&self, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(self.config.secret.as_bytes())
            .expect("HMAC can accept any key length");
        mac.update(body);
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }
}

/// Current Unix epoch in seconds.
fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
