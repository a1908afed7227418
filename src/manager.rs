//! Login orchestration: the commands an embedding application issues.
//!
//! `start_login` → redirect the user to the provider;
//! `handle_callback` → turn the provider's answer into a session;
//! `logout` → destroy it. Everything else (discovery, state, exchange,
//! validation, refresh) happens behind these three calls.

use std::sync::Arc;

use serde::Deserialize;

use crate::attempt::AttemptStore;
use crate::config::ProviderConfig;
use crate::discovery::DiscoveryCache;
use crate::error::{Error, ValidationKind};
use crate::exchange::TokenClient;
use crate::gateway::Gateway;
use crate::pkce;
use crate::session::{Session, SessionStore};
use crate::types::{SessionId, UserInfo};
use crate::validator::TokenValidator;

/// Where to send the user to authenticate.
#[non_exhaustive]
pub struct LoginRedirect {
    /// Fully assembled authorization URL.
    pub url: String,
    /// State parameter of the underlying attempt, for correlation.
    pub state: String,
}

/// Query parameters the provider appends to the callback redirect.
///
/// Deserializes straight from the callback query string; hosting layers
/// with their own routing can fill it in by hand.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl CallbackParams {
    /// Parameters of a successful provider redirect.
    #[must_use]
    pub fn from_code(code: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            state: Some(state.into()),
            ..Self::default()
        }
    }
}

/// The embedding surface: owns every component of the relying party
/// and drives the authorization-code flow across them.
pub struct SessionManager {
    config: ProviderConfig,
    discovery: Arc<DiscoveryCache>,
    attempts: AttemptStore,
    exchange: Arc<TokenClient>,
    validator: TokenValidator,
    sessions: Arc<SessionStore>,
    gateway: Gateway,
}

impl SessionManager {
    #[must_use]
    pub fn new(config: ProviderConfig) -> Self {
        let http = reqwest::Client::new();
        let discovery = Arc::new(
            DiscoveryCache::new(config.metadata_ttl, config.http_timeout)
                .with_http_client(http.clone()),
        );
        let exchange = Arc::new(TokenClient::new(&config).with_http_client(http.clone()));
        let sessions = Arc::new(SessionStore::new(
            exchange.clone(),
            discovery.clone(),
            config.issuer.clone(),
            config.session_ttl,
            config.refresh_margin,
        ));
        let gateway = Gateway::new(sessions.clone()).with_http_client(http);

        Self {
            validator: TokenValidator::new(&config),
            attempts: AttemptStore::new(config.attempt_ttl),
            discovery,
            exchange,
            sessions,
            gateway,
            config,
        }
    }

    /// Begin a login: mint an attempt and build the authorization URL
    /// carrying its state, nonce, and PKCE challenge.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Discovery`] if provider metadata is
    /// unavailable.
    pub async fn start_login(&self) -> Result<LoginRedirect, Error> {
        let metadata = self.discovery.metadata(&self.config.issuer).await?;
        let attempt = self.attempts.create().await;
        let challenge = pkce::generate_code_challenge(&attempt.code_verifier);

        let mut url = metadata.authorization_endpoint().clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", self.config.redirect_uri.as_str())
            .append_pair("scope", &self.config.scopes.join(" "))
            .append_pair("state", attempt.state())
            .append_pair("nonce", attempt.nonce())
            .append_pair("code_challenge", &challenge)
            .append_pair("code_challenge_method", "S256");

        tracing::debug!("login initiated");
        Ok(LoginRedirect {
            url: url.into(),
            state: attempt.state().to_owned(),
        })
    }

    /// Validate the provider's callback and establish a session.
    ///
    /// The state is consumed exactly once; the code is exchanged with
    /// the attempt's PKCE verifier; the identity token must pass every
    /// trust check against the attempt's nonce. On a signature failure
    /// the provider's keys are refetched once, in case of rotation.
    ///
    /// # Errors
    ///
    /// Any of the flow's error taxonomy; none of them leave a partial
    /// session behind.
    pub async fn handle_callback(&self, params: CallbackParams) -> Result<Session, Error> {
        if let Some(error) = params.error {
            let description = params.error_description;
            tracing::warn!(
                %error,
                description = description.as_deref().unwrap_or("none"),
                "provider reported an authorization error"
            );
            return Err(Error::Provider { error, description });
        }

        let code = params.code.ok_or(Error::TokenExchange {
            reason: "callback missing code parameter".into(),
        })?;
        let state = params.state.ok_or(Error::UnknownOrExpiredState)?;

        let attempt = self.attempts.consume(&state).await?;
        let metadata = self.discovery.metadata(&self.config.issuer).await?;

        let tokens = self.exchange.exchange_code(&code, &attempt, &metadata).await?;
        let id_token = tokens.id_token.as_deref().ok_or(Error::TokenExchange {
            reason: "token response missing id_token".into(),
        })?;

        let claims = match self.validator.validate(id_token, &attempt, &metadata) {
            Err(Error::Validation(ValidationKind::BadSignature)) => {
                // The signing key may have rotated since the cached
                // fetch; one fresh key set settles it either way.
                let metadata = self.discovery.refresh(&self.config.issuer).await?;
                self.validator.validate(id_token, &attempt, &metadata)
            }
            other => other,
        };
        let claims = claims.inspect_err(|e| {
            tracing::warn!(error = %e, "identity token rejected");
        })?;

        let session = self.sessions.create(claims, tokens).await;
        tracing::info!(session_id = %session.id(), "login completed");
        Ok(session)
    }

    /// Destroy the session. Safe to call for sessions that are already
    /// gone.
    pub async fn logout(&self, session_id: &SessionId) {
        self.sessions.destroy(session_id).await;
        tracing::info!(session_id = %session_id, "logged out");
    }

    /// Execute an API request with the session's bearer credential.
    /// See [`Gateway::call`].
    pub async fn call(
        &self,
        session_id: &SessionId,
        request: reqwest::Request,
    ) -> Result<reqwest::Response, Error> {
        self.gateway.call(session_id, request).await
    }

    /// Fetch fresh claims from the provider's userinfo endpoint on
    /// behalf of the session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Discovery`] if the provider advertises no
    /// userinfo endpoint, plus anything [`Gateway::call`] can return.
    pub async fn user_info(&self, session_id: &SessionId) -> Result<UserInfo, Error> {
        let metadata = self.discovery.metadata(&self.config.issuer).await?;
        let endpoint = metadata.userinfo_endpoint().cloned().ok_or_else(|| {
            Error::Discovery("provider does not advertise a userinfo endpoint".into())
        })?;

        let request = reqwest::Request::new(reqwest::Method::GET, endpoint);
        let response = self.gateway.call(session_id, request).await?;
        let response = response.error_for_status().map_err(Error::Upstream)?;
        response.json().await.map_err(Error::Upstream)
    }

    /// The session store, for direct lookup/refresh/destroy.
    #[must_use]
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// The request gateway.
    #[must_use]
    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// The configuration this manager was built with.
    #[must_use]
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }
}
