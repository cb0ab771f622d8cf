//! Configuration options for the QueryPrep access client

use std::time::Duration;

/// Configuration options for the QueryPrep access client
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Whether successful sign-in and status refreshes write the session store
    pub persist_session: bool,

    /// Whether a 401 from the platform clears the cached session
    pub clear_session_on_unauthorized: bool,

    /// The request timeout
    pub request_timeout: Option<Duration>,

    /// Value sent in the `X-Client-Info` header
    pub client_info: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            persist_session: true,
            clear_session_on_unauthorized: true,
            request_timeout: Some(Duration::from_secs(30)),
            client_info: format!("queryprep-access/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientOptions {
    /// Set whether to persist the session
    pub fn with_persist_session(mut self, value: bool) -> Self {
        self.persist_session = value;
        self
    }

    /// Set whether a 401 clears the cached session
    pub fn with_clear_session_on_unauthorized(mut self, value: bool) -> Self {
        self.clear_session_on_unauthorized = value;
        self
    }

    /// Set the request timeout
    pub fn with_request_timeout(mut self, value: Option<Duration>) -> Self {
        self.request_timeout = value;
        self
    }

    /// Set the client info header value
    pub fn with_client_info(mut self, value: &str) -> Self {
        self.client_info = value.to_string();
        self
    }
}
