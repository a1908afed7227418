//! Outbound API calls on behalf of a session.
//!
//! The gateway is the only reader of access tokens: application code
//! hands it a request and a session id, and gets back the upstream
//! response with the bearer credential attached (refreshed first when
//! close to expiry).

use std::sync::Arc;

use reqwest::header::{HeaderValue, AUTHORIZATION};

use crate::error::Error;
use crate::session::SessionStore;
use crate::types::SessionId;

pub struct Gateway {
    http: reqwest::Client,
    sessions: Arc<SessionStore>,
}

impl Gateway {
    pub(crate) fn new(sessions: Arc<SessionStore>) -> Self {
        Self {
            http: reqwest::Client::new(),
            sessions,
        }
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    /// Execute `request` with the session's bearer credential.
    ///
    /// An access token expired or within the refresh margin is
    /// refreshed before the request goes out. Upstream responses pass
    /// through unmodified, whatever their status.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionInvalid`] if the session is absent or
    /// its tokens could not be refreshed (the caller must force a
    /// re-login), and [`Error::Upstream`] if the downstream request
    /// itself failed in transport.
    pub async fn call(
        &self,
        session_id: &SessionId,
        mut request: reqwest::Request,
    ) -> Result<reqwest::Response, Error> {
        let session = self
            .sessions
            .get(session_id)
            .await
            .ok_or(Error::SessionInvalid)?;

        let session = if session.tokens.expires_within(self.sessions.refresh_margin()) {
            self.sessions.refresh_tokens(session_id).await?
        } else {
            session
        };

        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", session.tokens.access_token))
            .map_err(|_| {
                tracing::warn!(session_id = %session_id, "access token is not a valid header value");
                Error::SessionInvalid
            })?;
        bearer.set_sensitive(true);
        request.headers_mut().insert(AUTHORIZATION, bearer);

        self.http.execute(request).await.map_err(Error::Upstream)
    }
}
