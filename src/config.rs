use std::time::Duration;

use url::Url;

use crate::error::Error;

/// Relying-party configuration for one identity provider.
///
/// Required fields are constructor parameters — no runtime "missing
/// field" errors. Immutable once built; every component receives it at
/// construction rather than reading ambient state.
///
/// ```rust,ignore
/// use relier::ProviderConfig;
///
/// let config = ProviderConfig::new(
///     "https://accounts.example.com".parse()?,
///     "my-client-id",
///     "https://my-app.com/callback".parse()?,
/// )
/// .with_client_secret("secret")
/// .with_scopes(vec!["openid".into(), "profile".into(), "api1".into()]);
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ProviderConfig {
    pub(crate) issuer: Url,
    pub(crate) client_id: String,
    pub(crate) client_secret: Option<String>,
    pub(crate) redirect_uri: Url,
    pub(crate) scopes: Vec<String>,
    pub(crate) http_timeout: Duration,
    pub(crate) metadata_ttl: Duration,
    pub(crate) attempt_ttl: Duration,
    pub(crate) session_ttl: Duration,
    pub(crate) refresh_margin: Duration,
    pub(crate) clock_skew: Duration,
}

impl ProviderConfig {
    /// Create a configuration for `issuer` with this client's id and
    /// callback URI.
    #[must_use]
    pub fn new(issuer: Url, client_id: impl Into<String>, redirect_uri: Url) -> Self {
        Self {
            issuer,
            client_id: client_id.into(),
            client_secret: None,
            redirect_uri,
            scopes: vec!["openid".into(), "profile".into()],
            http_timeout: Duration::from_secs(10),
            metadata_ttl: Duration::from_secs(3600),
            attempt_ttl: Duration::from_secs(600),
            session_ttl: Duration::from_secs(8 * 3600),
            refresh_margin: Duration::from_secs(60),
            clock_skew: Duration::from_secs(120),
        }
    }

    /// Create a configuration from environment variables.
    ///
    /// # Required env vars
    /// - `RELIER_ISSUER`: provider issuer URL
    /// - `RELIER_CLIENT_ID`: OAuth2 client ID
    /// - `RELIER_REDIRECT_URI`: OAuth2 callback URI
    ///
    /// # Optional env vars
    /// - `RELIER_CLIENT_SECRET`: secret for confidential clients
    /// - `RELIER_SCOPES`: comma-separated OAuth2 scopes
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if required env vars are missing or
    /// URLs are invalid.
    pub fn from_env() -> Result<Self, Error> {
        let issuer: Url = require_env("RELIER_ISSUER")?
            .parse()
            .map_err(|e| Error::Config(format!("RELIER_ISSUER: {e}")))?;
        let client_id = require_env("RELIER_CLIENT_ID")?;
        let redirect_uri: Url = require_env("RELIER_REDIRECT_URI")?
            .parse()
            .map_err(|e| Error::Config(format!("RELIER_REDIRECT_URI: {e}")))?;

        let mut config = Self::new(issuer, client_id, redirect_uri);
        if let Ok(secret) = std::env::var("RELIER_CLIENT_SECRET") {
            config = config.with_client_secret(secret);
        }
        if let Ok(scopes) = std::env::var("RELIER_SCOPES") {
            config = config.with_scopes(scopes.split(',').map(|s| s.trim().to_string()).collect());
        }
        Ok(config)
    }

    /// Secret for confidential clients; omit for public (browser,
    /// native) clients doing PKCE only.
    #[must_use]
    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    /// Override the OAuth2 scopes (default: `["openid", "profile"]`).
    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Timeout applied to each outbound provider/API request.
    #[must_use]
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// How long cached provider metadata stays fresh.
    #[must_use]
    pub fn with_metadata_ttl(mut self, ttl: Duration) -> Self {
        self.metadata_ttl = ttl;
        self
    }

    /// How long an unconsumed login attempt stays redeemable.
    #[must_use]
    pub fn with_attempt_ttl(mut self, ttl: Duration) -> Self {
        self.attempt_ttl = ttl;
        self
    }

    /// Absolute session lifetime.
    #[must_use]
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// How close to expiry an access token is refreshed before use.
    #[must_use]
    pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = margin;
        self
    }

    /// Tolerance for clock drift when checking token time bounds.
    #[must_use]
    pub fn with_clock_skew(mut self, skew: Duration) -> Self {
        self.clock_skew = skew;
        self
    }

    /// Provider issuer URL.
    #[must_use]
    pub fn issuer(&self) -> &Url {
        &self.issuer
    }

    /// `OAuth2` client ID.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// `OAuth2` redirect URI.
    #[must_use]
    pub fn redirect_uri(&self) -> &Url {
        &self.redirect_uri
    }

    /// Requested `OAuth2` scopes.
    #[must_use]
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }
}

fn require_env(name: &'static str) -> Result<String, Error> {
    std::env::var(name).map_err(|_| Error::Config(format!("{name} is required")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ProviderConfig {
        ProviderConfig::new(
            "https://accounts.example.com".parse().unwrap(),
            "test-client",
            "https://my-app.com/callback".parse().unwrap(),
        )
    }

    #[test]
    fn test_config_constructor() {
        let config = test_config();

        assert_eq!(config.client_id(), "test-client");
        assert_eq!(config.redirect_uri().as_str(), "https://my-app.com/callback");
        assert_eq!(config.scopes(), &["openid", "profile"]);
        assert!(config.client_secret.is_none());
    }

    #[test]
    fn test_config_with_overrides() {
        let config = test_config()
            .with_client_secret("secret")
            .with_scopes(vec!["openid".into(), "api1".into()])
            .with_refresh_margin(Duration::from_secs(30));

        assert_eq!(config.client_secret.as_deref(), Some("secret"));
        assert_eq!(config.scopes(), &["openid", "api1"]);
        assert_eq!(config.refresh_margin, Duration::from_secs(30));
    }
}
