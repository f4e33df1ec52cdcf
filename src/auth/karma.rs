//! Reputation ledger: the karma state machine.
//!
//! Two fixed transitions, both applied through the credential store:
//! a sharp unit penalty per denied attempt and a smaller reward per
//! authorized query execution. The asymmetry discourages probing while
//! still paying out for legitimate privileged use.
//!
//! Karma is an unbounded running score, not a quota — no clamping, and no
//! deduplication under retry. If a caller retries a request after a network
//! fault, the second application is a separate legitimate event;
//! exactly-once semantics for one logical request belong to the caller.

use crate::auth::{User, UserStore};
use crate::error::Result;

/// Delta applied when a located user is denied for insufficient role.
pub const DENIAL_PENALTY: f64 = -1.0;

/// Delta applied when a user is allowed through the query-execution path.
/// Role-specific resource reads deliberately do not reward.
pub const QUERY_REWARD: f64 = 0.2;

/// Charge the denial penalty against a user.
pub fn penalize(store: &UserStore, username: &str) -> Result<User> {
    let user = store.adjust_karma(username, DENIAL_PENALTY)?;
    tracing::debug!(
        username = username,
        delta = DENIAL_PENALTY,
        karma = user.karma,
        "karma penalty applied"
    );
    Ok(user)
}

/// Pay the query reward to a user.
pub fn reward(store: &UserStore, username: &str) -> Result<User> {
    let user = store.adjust_karma(username, QUERY_REWARD)?;
    tracing::debug!(
        username = username,
        delta = QUERY_REWARD,
        karma = user.karma,
        "karma reward applied"
    );
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;

    #[test]
    fn penalty_and_reward_deltas() {
        let store = UserStore::open_in_memory().unwrap();
        store.create("alice", "h", None, Role::User).unwrap();

        let user = penalize(&store, "alice").unwrap();
        assert_eq!(user.karma, -1.0);

        let user = reward(&store, "alice").unwrap();
        assert!((user.karma - (-0.8)).abs() < 1e-9);
    }

    #[test]
    fn repeated_transitions_accumulate() {
        let store = UserStore::open_in_memory().unwrap();
        store.create("bob", "h", None, Role::Admin).unwrap();

        for _ in 0..5 {
            reward(&store, "bob").unwrap();
        }
        let user = store.find_by_username("bob").unwrap().unwrap();
        assert!((user.karma - 1.0).abs() < 1e-9);
    }
}
