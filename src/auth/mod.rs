//! Authentication, authorization, and reputation core.
//!
//! Provides:
//! - User registration + credential verification (iterated SHA-256, 100k
//!   rounds + per-user salt, constant-time comparison)
//! - Stateless session tokens (HMAC-SHA256 signed claims, time-limited,
//!   no server-side session table — logout is client-side discard)
//! - Role-gated authorization decisions with karma side effects
//! - SQLite-backed persistent user storage
//!
//! ## Design Decisions
//! - No external JWT dependency — tokens are base64url claims JSON plus an
//!   HMAC-SHA256 signature over the encoded claims, verified with the
//!   existing `hmac`/`sha2` crates before expiry is even looked at.
//! - The role inside a token is a snapshot taken at issuance. A live role
//!   change takes effect only after re-login; the staleness window is
//!   bounded by the token TTL.
//! - Karma is only ever adjusted through `UserStore::adjust_karma`, and only
//!   by the gate's fixed transitions: -1.0 per denied attempt, +0.2 per
//!   authorized query execution.

pub mod gate;
pub mod karma;
pub mod password;
pub mod store;
pub mod token;

pub use gate::{Decision, DenyReason, Gate};
pub use store::{User, UserStore};
pub use token::{Claims, TokenConfig, TokenService};

use serde::{Deserialize, Serialize};

/// Privilege tier. Lower numeric value = higher privilege.
///
/// The wire and storage encoding is the bare integer (0/1/2), matching the
/// `users.role` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Role {
    Admin,
    Moderator,
    User,
}

impl Role {
    /// All three tiers, most privileged first.
    pub const ALL: [Role; 3] = [Role::Admin, Role::Moderator, Role::User];
}

impl From<Role> for u8 {
    fn from(role: Role) -> u8 {
        match role {
            Role::Admin => 0,
            Role::Moderator => 1,
            Role::User => 2,
        }
    }
}

impl TryFrom<u8> for Role {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(Role::Admin),
            1 => Ok(Role::Moderator),
            2 => Ok(Role::User),
            other => Err(format!("unknown role {other} (expected 0, 1, or 2)")),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Moderator => write!(f, "moderator"),
            Role::User => write!(f, "user"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_u8() {
        for role in Role::ALL {
            assert_eq!(Role::try_from(u8::from(role)).unwrap(), role);
        }
    }

    #[test]
    fn unknown_role_value_rejected() {
        assert!(Role::try_from(3).is_err());
    }

    #[test]
    fn role_serializes_as_integer() {
        assert_eq!(serde_json::to_string(&Role::Moderator).unwrap(), "1");
        let parsed: Role = serde_json::from_str("0").unwrap();
        assert_eq!(parsed, Role::Admin);
    }
}
