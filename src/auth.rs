//! Account sign-up, sign-in, and sign-out against the platform's auth
//! endpoints; owns the session lifecycle writes

use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::ClientOptions;
use crate::entitlement::StatusCell;
use crate::error::Error;
use crate::fetch::Fetch;
use crate::session::{SessionStore, UserSnapshot};

/// Response to a successful sign-up or sign-in
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    /// The session token
    pub token: String,

    /// The user snapshot as of authentication
    pub user: UserSnapshot,
}

/// Client for the platform's auth endpoints
pub struct Auth {
    url: String,
    client: Client,
    options: ClientOptions,
    store: Arc<dyn SessionStore>,
    status: Arc<StatusCell>,
}

impl Auth {
    /// Create a new auth client
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
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/auth{}", self.url, path)
    }

    /// Register a new account with email and password
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<AuthResponse, Error> {
        self.authenticate("/register", email, password).await
    }

    /// Sign in with email and password
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthResponse, Error> {
        self.authenticate("/login", email, password).await
    }

    async fn authenticate(
        &self,
        path: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse, Error> {
        let mut body = HashMap::new();
        body.insert("email".to_string(), email.to_string());
        body.insert("password".to_string(), password.to_string());

        let result = Fetch::post(&self.client, &self.endpoint(path))
            .header("X-Client-Info", &self.options.client_info)
            .timeout(self.options.request_timeout)
            .json(&body)?
            .execute::<AuthResponse>()
            .await?;

        if self.options.persist_session {
            self.store.set_token(Some(result.token.clone()));
            self.store.set_cached_user(result.user.clone());
            // A previous account's status must not leak into this session
            self.status.clear();
        }

        log::debug!("signed in as {}", result.user.id);
        Ok(result)
    }

    /// Sign out and clear the session.
    ///
    /// The logout call is best effort; the local session is cleared even
    /// when the platform cannot be reached.
    pub async fn sign_out(&self) -> Result<(), Error> {
        if let Some(token) = self.store.token() {
            let result = Fetch::post(&self.client, &self.endpoint("/logout"))
                .header("X-Client-Info", &self.options.client_info)
                .bearer_auth(&token)
                .timeout(self.options.request_timeout)
                .execute_no_content()
                .await;

            if let Err(err) = result {
                log::warn!("logout request failed, clearing session anyway: {}", err);
            }
        }

        self.store.clear();
        self.status.clear();
        Ok(())
    }
}
