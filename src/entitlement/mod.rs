//! Entitlement: the billing client and the pure resolver behind the
//! platform's access gating

mod resolver;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::config::ClientOptions;
use crate::error::Error;
use crate::fetch::Fetch;
use crate::session::{Session, SessionStore, UserSnapshot};

pub use resolver::{
    resolve, AccessInstruction, EntitlementDecision, Resolution, TRIAL_WINDOW_DAYS,
};

/// Billing status as the platform reports it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    /// The refreshed user snapshot
    pub user: UserSnapshot,

    /// The status string, when the platform computed one
    #[serde(default)]
    pub trial_status: Option<String>,

    /// Days left in the trial, when the status is an active trial
    #[serde(default)]
    pub trial_days_remaining: Option<i64>,
}

impl StatusResponse {
    /// Translate the platform's status string into a decision.
    ///
    /// Unknown strings are dropped rather than failing the refresh; the
    /// resolver then falls back to deriving from the snapshot fields.
    pub fn decision(&self) -> Option<EntitlementDecision> {
        let status = self.trial_status.as_deref()?;
        match status {
            "paid" => Some(EntitlementDecision::Paid),
            "active" => Some(EntitlementDecision::TrialActive {
                days_remaining: self.trial_days_remaining.unwrap_or(0),
            }),
            "expired" => Some(EntitlementDecision::TrialExpired),
            "none" => Some(EntitlementDecision::NoTrial),
            other => {
                log::warn!("unknown trial status {:?} from platform, ignoring", other);
                None
            }
        }
    }
}

/// A checkout handle from the payment provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Where to send the user to complete payment
    pub url: String,
}

/// The most recent server-reported status, shared between sub-clients.
///
/// Cleared whenever the session is cleared or the snapshot is mutated
/// locally, so a stale report can never outrank fresher local fields.
#[derive(Debug, Default)]
pub struct StatusCell {
    inner: RwLock<Option<EntitlementDecision>>,
}

impl StatusCell {
    /// Create an empty cell
    pub fn new() -> Self {
        Self::default()
    }

    /// The current server-reported status, if any
    pub fn get(&self) -> Option<EntitlementDecision> {
        *self.inner.read().unwrap()
    }

    /// Replace the server-reported status
    pub fn set(&self, status: Option<EntitlementDecision>) {
        *self.inner.write().unwrap() = status;
    }

    /// Drop the server-reported status
    pub fn clear(&self) {
        *self.inner.write().unwrap() = None;
    }
}

/// Orders concurrent status refreshes so only the latest-issued request
/// may write its response back.
///
/// A refresh takes a ticket before sending; a response is applied only if
/// its ticket is still the newest one issued. Responses from superseded
/// requests are discarded.
#[derive(Debug, Default)]
struct RefreshGate {
    issued: AtomicU64,
}

impl RefreshGate {
    fn begin(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, ticket: u64) -> bool {
        self.issued.load(Ordering::SeqCst) == ticket
    }
}

/// The entitlement service seam, for presentation layers that want to be
/// tested against a fake instead of a live client
#[async_trait]
pub trait EntitlementService: Send + Sync {
    /// Fetch the authoritative billing status
    async fn fetch_status(&self) -> Result<StatusResponse, Error>;

    /// Obtain a checkout handle from the payment provider
    async fn initiate_checkout(&self) -> Result<CheckoutSession, Error>;
}

/// Client for the platform's billing and entitlement endpoints
pub struct Entitlement {
    url: String,
    client: Client,
    options: ClientOptions,
    store: Arc<dyn SessionStore>,
    status: Arc<StatusCell>,
    gate: RefreshGate,
}

impl Entitlement {
    /// Create a new entitlement client
    pub(crate) fn new(
        url: &str,
        client: Client,
        options: ClientOptions,
        store: Arc<dyn SessionStore>,
        status: Arc<StatusCell>,
    ) -> Self {
        Self {
            url: url.to_string(),
            client,
            options,
            store,
            status,
            gate: RefreshGate::default(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/billing{}", self.url, path)
    }

    fn token(&self, now: DateTime<Utc>) -> Option<String> {
        let token = self.store.token()?;
        if crate::session::token_expired(&token, now) {
            // An expired token cannot be trusted; treat it as absent
            return None;
        }
        Some(token)
    }

    /// Assemble the current session from the store, as of `now`
    pub fn current_session(&self, now: DateTime<Utc>) -> Session {
        Session::new(self.token(now), self.store.cached_user(), self.status.get())
    }

    /// Resolve the current session without touching the network
    pub fn resolve_current(&self, now: DateTime<Utc>) -> Resolution {
        resolve(&self.current_session(now), now)
    }

    /// React to the platform's authentication-invalid signal: a 401 on
    /// any authenticated call clears the cached session (when
    /// [`ClientOptions::clear_session_on_unauthorized`] is set) so the
    /// next resolution instructs a fresh login instead of granting access
    /// on a revoked token.
    fn handle_unauthorized(&self, err: &Error) {
        if err.is_unauthorized() && self.options.clear_session_on_unauthorized {
            log::warn!("request rejected as unauthorized, clearing session");
            self.store.clear();
            self.status.clear();
        }
    }

    /// Fetch the authoritative billing status and update the cached
    /// session.
    ///
    /// If a newer refresh was issued while this one was in flight, the
    /// response is returned but not written back. A 401 clears the cached
    /// session so the next resolution instructs a fresh login.
    pub async fn fetch_status(&self) -> Result<StatusResponse, Error> {
        self.refresh(Utc::now()).await
    }

    async fn refresh(&self, now: DateTime<Utc>) -> Result<StatusResponse, Error> {
        let token = self.token(now).ok_or(Error::MissingSession)?;
        let ticket = self.gate.begin();

        let result = Fetch::get(&self.client, &self.endpoint("/status"))
            .header("X-Client-Info", &self.options.client_info)
            .bearer_auth(&token)
            .timeout(self.options.request_timeout)
            .execute::<StatusResponse>()
            .await;

        match result {
            Ok(status) => {
                if !self.gate.is_current(ticket) {
                    log::debug!("status refresh superseded, discarding response");
                    return Ok(status);
                }
                if self.options.persist_session {
                    self.store.set_cached_user(status.user.clone());
                    self.status.set(status.decision());
                }
                Ok(status)
            }
            Err(err) => {
                self.handle_unauthorized(&err);
                Err(err)
            }
        }
    }

    /// Refresh the status, then resolve.
    ///
    /// When the platform is unreachable the last-known cached session is
    /// resolved instead; an unavailable upstream degrades the answer, it
    /// never blocks it.
    pub async fn sync_status(&self, now: DateTime<Utc>) -> Resolution {
        match self.refresh(now).await {
            Ok(_) => {}
            Err(Error::MissingSession) => {}
            Err(err) => {
                log::warn!("status refresh failed, using cached session: {}", err);
            }
        }
        self.resolve_current(now)
    }

    /// Start the free trial for the signed-in user.
    ///
    /// The platform stamps `trial_start` and `trial_used`; the returned
    /// snapshot replaces the cached one.
    pub async fn activate_trial(&self) -> Result<UserSnapshot, Error> {
        let token = self.token(Utc::now()).ok_or(Error::MissingSession)?;

        let user = Fetch::post(&self.client, &self.endpoint("/trial"))
            .header("X-Client-Info", &self.options.client_info)
            .bearer_auth(&token)
            .timeout(self.options.request_timeout)
            .execute::<UserSnapshot>()
            .await
            .map_err(|err| {
                self.handle_unauthorized(&err);
                err
            })?;

        if self.options.persist_session {
            self.store.set_cached_user(user.clone());
            // The new trial fields must not be outranked by an older report
            self.status.clear();
        }

        Ok(user)
    }

    /// Obtain a checkout handle from the payment provider
    pub async fn initiate_checkout(&self) -> Result<CheckoutSession, Error> {
        let token = self.token(Utc::now()).ok_or(Error::MissingSession)?;

        let checkout = Fetch::post(&self.client, &self.endpoint("/checkout"))
            .header("X-Client-Info", &self.options.client_info)
            .bearer_auth(&token)
            .timeout(self.options.request_timeout)
            .execute::<CheckoutSession>()
            .await
            .map_err(|err| {
                self.handle_unauthorized(&err);
                err
            })?;

        Ok(checkout)
    }

    /// Record a confirmed payment optimistically and re-resolve.
    ///
    /// Step one writes `payment_done = true` to the cached snapshot and
    /// drops any stale server-reported status; step two re-resolves so the
    /// caller gets `Allow` immediately instead of a stuck paywall. The next
    /// status refresh reconciles with the server.
    pub fn confirm_payment(&self, now: DateTime<Utc>) -> Result<Resolution, Error> {
        let mut user = self.store.cached_user().ok_or(Error::MissingSession)?;
        user.payment_done = true;
        self.store.set_cached_user(user);
        self.status.clear();

        Ok(self.resolve_current(now))
    }
}

#[async_trait]
impl EntitlementService for Entitlement {
    async fn fetch_status(&self) -> Result<StatusResponse, Error> {
        Entitlement::fetch_status(self).await
    }

    async fn initiate_checkout(&self) -> Result<CheckoutSession, Error> {
        Entitlement::initiate_checkout(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemorySessionStore;
    use chrono::Duration;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;

    #[derive(Serialize)]
    struct TestClaims {
        sub: String,
        exp: i64,
    }

    fn entitlement_with(store: Arc<MemorySessionStore>) -> Entitlement {
        Entitlement::new(
            "http://unused.example",
            Client::new(),
            ClientOptions::default(),
            store,
            Arc::new(StatusCell::new()),
        )
    }

    #[test]
    fn expired_token_resolves_as_signed_out() {
        let now = Utc::now();
        let stale = encode(
            &Header::default(),
            &TestClaims {
                sub: "user-1".to_string(),
                exp: (now - Duration::hours(1)).timestamp(),
            },
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        let store = Arc::new(MemorySessionStore::new());
        store.set_token(Some(stale));
        store.set_cached_user(UserSnapshot {
            id: "user-1".to_string(),
            payment_done: true,
            ..Default::default()
        });

        let entitlement = entitlement_with(store);
        let session = entitlement.current_session(now);
        assert!(session.token.is_none());

        let resolution = entitlement.resolve_current(now);
        assert_eq!(resolution.instruction, AccessInstruction::RequireLogin);
    }

    #[test]
    fn gate_applies_only_the_latest_ticket() {
        let gate = RefreshGate::default();
        let first = gate.begin();
        let second = gate.begin();

        assert!(!gate.is_current(first));
        assert!(gate.is_current(second));

        let third = gate.begin();
        assert!(!gate.is_current(second));
        assert!(gate.is_current(third));
    }

    #[test]
    fn status_strings_map_to_decisions() {
        let base = StatusResponse {
            user: UserSnapshot::default(),
            trial_status: Some("active".to_string()),
            trial_days_remaining: Some(5),
        };
        assert_eq!(
            base.decision(),
            Some(EntitlementDecision::TrialActive { days_remaining: 5 })
        );

        let paid = StatusResponse {
            trial_status: Some("paid".to_string()),
            ..base.clone()
        };
        assert_eq!(paid.decision(), Some(EntitlementDecision::Paid));

        let expired = StatusResponse {
            trial_status: Some("expired".to_string()),
            ..base.clone()
        };
        assert_eq!(expired.decision(), Some(EntitlementDecision::TrialExpired));

        let none = StatusResponse {
            trial_status: Some("none".to_string()),
            ..base.clone()
        };
        assert_eq!(none.decision(), Some(EntitlementDecision::NoTrial));
    }

    #[test]
    fn unknown_status_string_is_dropped() {
        let response = StatusResponse {
            user: UserSnapshot::default(),
            trial_status: Some("grandfathered".to_string()),
            trial_days_remaining: None,
        };
        assert_eq!(response.decision(), None);
    }

    #[test]
    fn absent_status_string_is_dropped() {
        let response = StatusResponse {
            user: UserSnapshot::default(),
            trial_status: None,
            trial_days_remaining: None,
        };
        assert_eq!(response.decision(), None);
    }
}
