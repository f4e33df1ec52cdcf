//! Crate-wide error taxonomy.
//!
//! Every failure here is local to one request; nothing is fatal to the
//! process. Credential, token, and role failures map to caller-visible
//! rejections with no partial state change — except the karma penalty
//! attached to `InsufficientRole`, which is an intentional side effect,
//! not an error artifact.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Unknown username or wrong password. Deliberately indistinguishable
    /// from the outside.
    #[error("invalid username or password")]
    InvalidCredentials,

    /// Registration attempted with a username that already exists.
    #[error("username '{0}' is already taken")]
    DuplicateUsername(String),

    /// Token is malformed, unparseable, or its signature does not verify.
    #[error("invalid session token")]
    InvalidToken,

    /// Token signature verifies but the token is past its expiry.
    #[error("session token has expired")]
    ExpiredToken,

    /// The token subject no longer resolves to a stored user.
    #[error("user '{0}' no longer exists")]
    UserVanished(String),

    /// Authenticated user's role is not in the endpoint's allowed set.
    #[error("role not permitted for this resource")]
    InsufficientRole,

    /// Opaque failure from the query layer, surfaced unmodified. The core
    /// does not retry it and does not adjust karma for it.
    #[error("query execution failed: {0}")]
    Execution(String),

    /// Request input failed validation before reaching the store.
    #[error("{0}")]
    Invalid(String),

    /// Underlying SQLite failure from the credential store.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_caller_presentable() {
        assert_eq!(
            Error::DuplicateUsername("alice".into()).to_string(),
            "username 'alice' is already taken"
        );
        assert_eq!(
            Error::Execution("no such table: ghosts".into()).to_string(),
            "query execution failed: no such table: ghosts"
        );
        assert_eq!(Error::InvalidToken.to_string(), "invalid session token");
    }

    #[test]
    fn storage_errors_convert() {
        let err: Error = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, Error::Storage(_)));
    }
}
