//! QueryPrep Access Client Library
//!
//! A Rust client for the QueryPrep platform's access gating: session
//! lifecycle, billing/entitlement status, and a pure resolver that tells
//! the presentation layer whether to render protected content, show the
//! paywall, or send the user to login.

pub mod auth;
pub mod config;
pub mod entitlement;
pub mod error;
pub mod fetch;
pub mod session;

use reqwest::Client;
use std::sync::Arc;

use crate::auth::Auth;
use crate::config::ClientOptions;
use crate::entitlement::{Entitlement, StatusCell};
use crate::session::{MemorySessionStore, SessionStore};

/// The main entry point for the QueryPrep access client
pub struct QueryPrep {
    /// The base URL for the QueryPrep platform
    pub url: String,
    /// HTTP client used for requests
    pub http_client: Client,
    /// Client options
    pub options: ClientOptions,
    store: Arc<dyn SessionStore>,
    auth: Auth,
    entitlement: Entitlement,
}

impl QueryPrep {
    /// Create a new client with an in-memory session store
    ///
    /// # Example
    ///
    /// ```
    /// use queryprep_access::QueryPrep;
    ///
    /// let client = QueryPrep::new("https://app.queryprep.example");
    /// ```
    pub fn new(base_url: &str) -> Self {
        Self::new_with_options(base_url, ClientOptions::default())
    }

    /// Create a new client with custom options
    pub fn new_with_options(base_url: &str, options: ClientOptions) -> Self {
        Self::new_with_store(base_url, options, Arc::new(MemorySessionStore::new()))
    }

    /// Create a new client backed by a custom session store.
    ///
    /// Embedders with durable storage pass their own [`SessionStore`]
    /// implementation here; a persisted token and snapshot are picked up
    /// on the first resolution.
    pub fn new_with_store(
        base_url: &str,
        options: ClientOptions,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        let http_client = Client::new();
        let status = Arc::new(StatusCell::new());

        let auth = Auth::new(
            base_url,
            http_client.clone(),
            options.clone(),
            store.clone(),
            status.clone(),
        );
        let entitlement = Entitlement::new(
            base_url,
            http_client.clone(),
            options.clone(),
            store.clone(),
            status,
        );

        Self {
            url: base_url.to_string(),
            http_client,
            options,
            store,
            auth,
            entitlement,
        }
    }

    /// Get a reference to the auth client for session lifecycle operations
    pub fn auth(&self) -> &Auth {
        &self.auth
    }

    /// Get a reference to the entitlement client for status refreshes,
    /// trial activation, checkout, and resolution
    pub fn entitlement(&self) -> &Entitlement {
        &self.entitlement
    }

    /// Get a reference to the session store
    pub fn session_store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }
}

/// A convenience module for common imports
pub mod prelude {
    pub use crate::config::ClientOptions;
    pub use crate::entitlement::{
        resolve, AccessInstruction, EntitlementDecision, EntitlementService, Resolution,
    };
    pub use crate::error::Error;
    pub use crate::session::{Session, SessionStore, UserSnapshot};
    pub use crate::QueryPrep;
}
