//! Session state: the auth token, the cached user snapshot, and the store
//! that persists them between platform round-trips

mod snapshot;

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::sync::Mutex;

use crate::entitlement::EntitlementDecision;

pub use snapshot::UserSnapshot;

/// A point-in-time view of the session, assembled from the store before
/// each entitlement resolution.
///
/// `server_status` carries the most recent status the platform reported
/// directly; when present it takes precedence over anything derived from
/// the cached snapshot fields.
#[derive(Debug, Clone, Default)]
pub struct Session {
    /// The auth token, if signed in
    pub token: Option<String>,

    /// The cached user snapshot, if fetched
    pub user: Option<UserSnapshot>,

    /// Status reported directly by the platform, if any
    pub server_status: Option<EntitlementDecision>,
}

impl Session {
    /// A session with no token and no snapshot
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Create a session from its parts
    pub fn new(
        token: Option<String>,
        user: Option<UserSnapshot>,
        server_status: Option<EntitlementDecision>,
    ) -> Self {
        Self {
            token,
            user,
            server_status,
        }
    }
}

/// Read/write access to persisted session state.
///
/// The library ships [`MemorySessionStore`]; embedders with durable storage
/// (keychain, browser storage bridges) implement this trait instead.
pub trait SessionStore: Send + Sync {
    /// The persisted auth token, if any
    fn token(&self) -> Option<String>;

    /// Persist or clear the auth token
    fn set_token(&self, token: Option<String>);

    /// The cached user snapshot, if any
    fn cached_user(&self) -> Option<UserSnapshot>;

    /// Replace the cached user snapshot
    fn set_cached_user(&self, user: UserSnapshot);

    /// Drop the token and the snapshot
    fn clear(&self);
}

/// In-memory session store
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    state: Mutex<StoreState>,
}

#[derive(Debug, Default)]
struct StoreState {
    token: Option<String>,
    user: Option<UserSnapshot>,
}

impl MemorySessionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn token(&self) -> Option<String> {
        let state = self.state.lock().unwrap();
        state.token.clone()
    }

    fn set_token(&self, token: Option<String>) {
        let mut state = self.state.lock().unwrap();
        state.token = token;
    }

    fn cached_user(&self) -> Option<UserSnapshot> {
        let state = self.state.lock().unwrap();
        state.user.clone()
    }

    fn set_cached_user(&self, user: UserSnapshot) {
        let mut state = self.state.lock().unwrap();
        state.user = Some(user);
    }

    fn clear(&self) {
        let mut state = self.state.lock().unwrap();
        state.token = None;
        state.user = None;
    }
}

#[derive(Debug, Deserialize)]
struct TokenClaims {
    exp: Option<i64>,
}

/// Check whether a token carries a JWT `exp` claim that has passed.
///
/// The signature is not verified; this is a local freshness check, not a
/// trust decision. Tokens that do not parse as JWTs are opaque to the
/// client and are never rejected here.
pub fn token_expired(token: &str, now: DateTime<Utc>) -> bool {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.required_spec_claims.clear();

    match decode::<TokenClaims>(token, &DecodingKey::from_secret(&[]), &validation) {
        Ok(data) => match data.claims.exp {
            Some(exp) => {
                let expired = exp <= now.timestamp();
                if expired {
                    log::debug!("session token expired at {}", exp);
                }
                expired
            }
            None => false,
        },
        // Opaque token, nothing to check locally
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;

    #[derive(Serialize)]
    struct TestClaims {
        sub: String,
        exp: i64,
    }

    fn make_token(exp: i64) -> String {
        encode(
            &Header::default(),
            &TestClaims {
                sub: "user-1".to_string(),
                exp,
            },
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap()
    }

    #[test]
    fn store_round_trip() {
        let store = MemorySessionStore::new();
        assert!(store.token().is_none());
        assert!(store.cached_user().is_none());

        store.set_token(Some("tok".to_string()));
        store.set_cached_user(UserSnapshot {
            id: "user-1".to_string(),
            ..Default::default()
        });

        assert_eq!(store.token().as_deref(), Some("tok"));
        assert_eq!(store.cached_user().unwrap().id, "user-1");

        store.clear();
        assert!(store.token().is_none());
        assert!(store.cached_user().is_none());
    }

    #[test]
    fn expired_jwt_is_detected() {
        let now = Utc::now();
        let stale = make_token((now - Duration::hours(1)).timestamp());
        assert!(token_expired(&stale, now));
    }

    #[test]
    fn live_jwt_is_kept() {
        let now = Utc::now();
        let live = make_token((now + Duration::hours(1)).timestamp());
        assert!(!token_expired(&live, now));
    }

    #[test]
    fn opaque_token_is_kept() {
        assert!(!token_expired("not-a-jwt", Utc::now()));
    }
}
