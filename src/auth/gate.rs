//! The authorization gate: policy engine + core facade.
//!
//! The routing layer calls three operations: `register`, `authenticate`,
//! and `authorize`. The original decorator-per-endpoint guard becomes one
//! explicit `authorize` call at the top of each protected handler.
//!
//! Check order inside `authorize` is authenticate → locate → authorize, so
//! karma is only ever charged against a resolvable identity — anonymous or
//! expired-token traffic never moves anyone's score.

use crate::auth::{karma, password, Role, TokenService, User, UserStore};
use crate::error::{Error, Result};
use std::sync::Arc;

/// Maximum accepted username length.
const MAX_USERNAME_LEN: usize = 64;

/// Minimum accepted password length.
const MIN_PASSWORD_LEN: usize = 8;

/// Why a request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// Token missing, tampered, or expired. Not attributable to a located
    /// user, so no karma effect.
    Unauthenticated,
    /// Token was valid but its subject no longer exists. No karma effect.
    UserVanished,
    /// Located user's role is outside the allowed set. Costs karma.
    InsufficientRole,
}

/// Outcome of an authorization check.
///
/// `Allowed` carries the live user record (post-reward karma when the
/// query path rewarded it).
#[derive(Debug, Clone)]
pub enum Decision {
    Allowed(User),
    Denied(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed(_))
    }
}

/// Policy engine gating protected requests, plus the register/login surface.
pub struct Gate {
    store: Arc<UserStore>,
    tokens: TokenService,
}

impl Gate {
    pub fn new(store: Arc<UserStore>, tokens: TokenService) -> Self {
        Self { store, tokens }
    }

    /// Create a new user account with a freshly salted password hash.
    /// Role defaults to the least-privileged tier when the caller passes
    /// `None`.
    pub fn register(
        &self,
        username: &str,
        pass: &str,
        name: Option<&str>,
        role: Option<Role>,
    ) -> Result<User> {
        let username = username.trim();
        if username.is_empty() {
            return Err(Error::Invalid("username cannot be empty".into()));
        }
        if username.len() > MAX_USERNAME_LEN {
            return Err(Error::Invalid(format!(
                "username too long (max {MAX_USERNAME_LEN} characters)"
            )));
        }
        if pass.len() < MIN_PASSWORD_LEN {
            return Err(Error::Invalid(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let hash = password::hash(pass);
        let user = self
            .store
            .create(username, &hash, name, role.unwrap_or(Role::User))?;
        tracing::info!(username = %user.username, role = %user.role, "user registered");
        Ok(user)
    }

    /// Verify credentials and issue a session token.
    pub fn authenticate(&self, username: &str, pass: &str) -> Result<(User, String)> {
        let user = match self.store.find_by_username(username.trim())? {
            Some(user) => user,
            None => {
                // Burn the same hashing work as a real check so unknown
                // usernames take indistinguishable time.
                password::dummy_verify(pass);
                return Err(Error::InvalidCredentials);
            }
        };

        if !password::verify(pass, &user.password_hash) {
            tracing::warn!(username = %user.username, "login failed: wrong password");
            return Err(Error::InvalidCredentials);
        }

        let token = self.tokens.issue(&user);
        tracing::info!(username = %user.username, role = %user.role, "login succeeded");
        Ok((user, token))
    }

    /// Decide whether a bearer token may pass an endpoint guarded by
    /// `allowed`, applying the karma transition the outcome dictates.
    ///
    /// 1. Invalid or expired token → `Denied(Unauthenticated)`, no karma.
    /// 2. Subject no longer stored → `Denied(UserVanished)`, no karma.
    /// 3. Role allowed → `Allowed`; the query-execution path additionally
    ///    pays the reward.
    /// 4. Role not allowed → penalty, then `Denied(InsufficientRole)`.
    ///
    /// Only storage failures surface as `Err`; policy outcomes are all
    /// encoded in the `Decision`.
    pub fn authorize(
        &self,
        token: &str,
        allowed: &[Role],
        is_query_path: bool,
    ) -> Result<Decision> {
        let claims = match self.tokens.validate(token) {
            Ok(claims) => claims,
            Err(Error::InvalidToken | Error::ExpiredToken) => {
                return Ok(Decision::Denied(DenyReason::Unauthenticated));
            }
            Err(e) => return Err(e),
        };

        // Live lookup for identity; the role check below still uses the
        // live record, while the claims carry the issuance-time snapshot.
        let user = match self.store.find_by_username(&claims.sub)? {
            Some(user) => user,
            None => return Ok(Decision::Denied(DenyReason::UserVanished)),
        };

        if !allowed.contains(&user.role) {
            let penalized = karma::penalize(&self.store, &user.username)?;
            tracing::warn!(
                username = %user.username,
                role = %user.role,
                karma = penalized.karma,
                "access denied: insufficient role"
            );
            return Ok(Decision::Denied(DenyReason::InsufficientRole));
        }

        let user = if is_query_path {
            karma::reward(&self.store, &user.username)?
        } else {
            user
        };
        Ok(Decision::Allowed(user))
    }

    /// Shared access to the underlying store.
    pub fn store(&self) -> &Arc<UserStore> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenConfig;

    /// Roles allowed through the query-execution path.
    const QUERY_ROLES: [Role; 2] = [Role::Admin, Role::Moderator];

    fn test_gate(ttl_secs: u64) -> Gate {
        let store = Arc::new(UserStore::open_in_memory().unwrap());
        let tokens = TokenService::new(TokenConfig {
            secret: "test-secret".into(),
            ttl_secs,
        });
        Gate::new(store, tokens)
    }

    fn karma_of(gate: &Gate, username: &str) -> f64 {
        gate.store()
            .find_by_username(username)
            .unwrap()
            .unwrap()
            .karma
    }

    #[test]
    fn register_then_authenticate() {
        let gate = test_gate(3600);
        gate.register("alice", "securepassword123", Some("Alice"), None)
            .unwrap();

        let (user, token) = gate.authenticate("alice", "securepassword123").unwrap();
        assert_eq!(user.role, Role::User);
        assert!(!token.is_empty());

        assert!(matches!(
            gate.authenticate("alice", "wrong_password"),
            Err(Error::InvalidCredentials)
        ));
        assert!(matches!(
            gate.authenticate("ghost", "securepassword123"),
            Err(Error::InvalidCredentials)
        ));
    }

    #[test]
    fn register_rejects_bad_input() {
        let gate = test_gate(3600);
        assert!(matches!(
            gate.register("", "securepassword123", None, None),
            Err(Error::Invalid(_))
        ));
        assert!(matches!(
            gate.register("alice", "short", None, None),
            Err(Error::Invalid(_))
        ));
        gate.register("alice", "securepassword123", None, None)
            .unwrap();
        assert!(matches!(
            gate.register("alice", "securepassword123", None, None),
            Err(Error::DuplicateUsername(_))
        ));
    }

    #[test]
    fn denied_user_loses_one_karma() {
        let gate = test_gate(3600);
        gate.register("alice", "securepassword123", None, Some(Role::User))
            .unwrap();
        let (_, token) = gate.authenticate("alice", "securepassword123").unwrap();

        let decision = gate.authorize(&token, &[Role::Admin], false).unwrap();
        assert!(matches!(
            decision,
            Decision::Denied(DenyReason::InsufficientRole)
        ));
        assert_eq!(karma_of(&gate, "alice"), -1.0);
    }

    #[test]
    fn allowed_query_path_rewards() {
        let gate = test_gate(3600);
        gate.register("bob", "securepassword123", None, Some(Role::Admin))
            .unwrap();
        let (_, token) = gate.authenticate("bob", "securepassword123").unwrap();

        let decision = gate.authorize(&token, &QUERY_ROLES, true).unwrap();
        match decision {
            Decision::Allowed(user) => assert!((user.karma - 0.2).abs() < 1e-9),
            other => panic!("expected Allowed, got {other:?}"),
        }
        assert!((karma_of(&gate, "bob") - 0.2).abs() < 1e-9);
    }

    #[test]
    fn allowed_resource_path_does_not_reward() {
        let gate = test_gate(3600);
        gate.register("bob", "securepassword123", None, Some(Role::Admin))
            .unwrap();
        let (_, token) = gate.authenticate("bob", "securepassword123").unwrap();

        let decision = gate.authorize(&token, &[Role::Admin], false).unwrap();
        assert!(decision.is_allowed());
        assert_eq!(karma_of(&gate, "bob"), 0.0);
    }

    #[test]
    fn invalid_token_denied_without_karma_effect() {
        let gate = test_gate(3600);
        gate.register("alice", "securepassword123", None, None)
            .unwrap();

        let decision = gate
            .authorize("not-a-real.token", &[Role::User], false)
            .unwrap();
        assert!(matches!(
            decision,
            Decision::Denied(DenyReason::Unauthenticated)
        ));
        assert_eq!(karma_of(&gate, "alice"), 0.0);
    }

    #[test]
    fn expired_token_denied_without_karma_effect() {
        let gate = test_gate(0);
        gate.register("alice", "securepassword123", None, None)
            .unwrap();
        let (_, token) = gate.authenticate("alice", "securepassword123").unwrap();

        let decision = gate.authorize(&token, &[Role::User], false).unwrap();
        assert!(matches!(
            decision,
            Decision::Denied(DenyReason::Unauthenticated)
        ));
        assert_eq!(karma_of(&gate, "alice"), 0.0);
    }

    #[test]
    fn vanished_user_denied_without_karma_effect() {
        let store = Arc::new(UserStore::open_in_memory().unwrap());
        let tokens = TokenService::new(TokenConfig {
            secret: "test-secret".into(),
            ttl_secs: 3600,
        });
        // Token for a user the store has never seen.
        let ghost = User {
            id: 99,
            username: "ghost".into(),
            password_hash: String::new(),
            name: None,
            role: Role::Admin,
            karma: 0.0,
        };
        let token = tokens.issue(&ghost);

        let gate = Gate::new(store, tokens);
        let decision = gate.authorize(&token, &[Role::Admin], true).unwrap();
        assert!(matches!(decision, Decision::Denied(DenyReason::UserVanished)));
    }

    #[test]
    fn parallel_denials_each_apply() {
        let gate = Arc::new(test_gate(3600));
        gate.register("alice", "securepassword123", None, Some(Role::User))
            .unwrap();
        let (_, token) = gate.authenticate("alice", "securepassword123").unwrap();

        let n = 8;
        let handles: Vec<_> = (0..n)
            .map(|_| {
                let gate = Arc::clone(&gate);
                let token = token.clone();
                std::thread::spawn(move || {
                    let decision = gate.authorize(&token, &[Role::Admin], false).unwrap();
                    assert!(matches!(
                        decision,
                        Decision::Denied(DenyReason::InsufficientRole)
                    ));
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(karma_of(&gate, "alice"), -(f64::from(n)));
    }

    #[test]
    fn end_to_end_alice_and_bob() {
        let gate = test_gate(3600);

        // alice: plain user probing the query path.
        gate.register("alice", "securepassword123", Some("Alice"), Some(Role::User))
            .unwrap();
        let (alice, token) = gate.authenticate("alice", "securepassword123").unwrap();
        assert_eq!(alice.karma, 0.0);
        let decision = gate.authorize(&token, &QUERY_ROLES, true).unwrap();
        assert!(matches!(
            decision,
            Decision::Denied(DenyReason::InsufficientRole)
        ));
        assert_eq!(karma_of(&gate, "alice"), -1.0);

        // bob: admin using it legitimately.
        gate.register("bob", "securepassword123", Some("Bob"), Some(Role::Admin))
            .unwrap();
        let (_, token) = gate.authenticate("bob", "securepassword123").unwrap();
        let decision = gate.authorize(&token, &QUERY_ROLES, true).unwrap();
        assert!(decision.is_allowed());
        assert!((karma_of(&gate, "bob") - 0.2).abs() < 1e-9);
    }
}
