//! Authorization-code and refresh-grant exchanges against the
//! provider's token endpoint.

use std::time::Duration;

use serde::Deserialize;

use crate::attempt::LoginAttempt;
use crate::config::ProviderConfig;
use crate::discovery::ProviderMetadata;
use crate::error::Error;
use crate::net;
use crate::types::TokenSet;

/// Wire response from the token endpoint.
#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Client for the provider's token endpoint.
pub struct TokenClient {
    http: reqwest::Client,
    timeout: Duration,
    client_id: String,
    client_secret: Option<String>,
    redirect_uri: url::Url,
    scopes: Vec<String>,
}

impl TokenClient {
    #[must_use]
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            timeout: config.http_timeout,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            scopes: config.scopes.clone(),
        }
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    /// Exchange an authorization code for tokens, binding the PKCE
    /// verifier from the attempt that initiated the login.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TokenExchange`] on network failure, a
    /// non-success status, or an unparseable response.
    pub async fn exchange_code(
        &self,
        code: &str,
        attempt: &LoginAttempt,
        metadata: &ProviderMetadata,
    ) -> Result<TokenSet, Error> {
        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("client_id", self.client_id.as_str()),
            ("code_verifier", attempt.code_verifier.as_str()),
        ];
        if let Some(secret) = &self.client_secret {
            params.push(("client_secret", secret));
        }

        let response = net::retry_once(|| {
            self.http
                .post(metadata.token_endpoint().clone())
                .form(&params)
                .timeout(self.timeout)
                .send()
        })
        .await
        .map_err(|e| Error::TokenExchange {
            reason: e.to_string(),
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, "token endpoint rejected the code exchange");
            return Err(Error::TokenExchange {
                reason: format!("status {status}: {body}"),
            });
        }

        let wire: TokenResponse = response.json().await.map_err(|e| Error::TokenExchange {
            reason: format!("malformed token response: {e}"),
        })?;

        Ok(TokenSet::from_response(wire, &self.scopes))
    }

    /// Trade the refresh token in `tokens` for a successor token set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Refresh`] (terminal — the caller must force a
    /// re-login) if the provider rejects the grant or no refresh token
    /// was ever issued, and [`Error::Http`] on transport failure, which
    /// leaves the session usable for a later retry.
    pub async fn refresh(
        &self,
        tokens: &TokenSet,
        metadata: &ProviderMetadata,
    ) -> Result<TokenSet, Error> {
        let refresh_token = tokens
            .refresh_token
            .as_deref()
            .ok_or_else(|| Error::Refresh("no refresh token granted".into()))?;

        let mut params = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.as_str()),
        ];
        if let Some(secret) = &self.client_secret {
            params.push(("client_secret", secret));
        }

        let response = net::retry_once(|| {
            self.http
                .post(metadata.token_endpoint().clone())
                .form(&params)
                .timeout(self.timeout)
                .send()
        })
        .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, "token endpoint rejected the refresh grant");
            return Err(Error::Refresh(format!("status {status}: {body}")));
        }

        let wire: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::Refresh(format!("malformed token response: {e}")))?;

        Ok(TokenSet::from_refresh(wire, tokens))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_response_tolerates_minimal_body() {
        let wire: TokenResponse = serde_json::from_value(serde_json::json!({
            "access_token": "access",
            "token_type": "Bearer",
        }))
        .unwrap();

        assert_eq!(wire.access_token, "access");
        assert!(wire.expires_in.is_none());
        assert!(wire.refresh_token.is_none());
        assert!(wire.id_token.is_none());
    }

    #[test]
    fn token_response_reads_full_body() {
        let wire: TokenResponse = serde_json::from_value(serde_json::json!({
            "access_token": "access",
            "token_type": "Bearer",
            "expires_in": 300,
            "refresh_token": "refresh",
            "id_token": "header.payload.sig",
            "scope": "openid api1",
        }))
        .unwrap();

        assert_eq!(wire.expires_in, Some(300));
        assert_eq!(wire.scope.as_deref(), Some("openid api1"));
    }
}
