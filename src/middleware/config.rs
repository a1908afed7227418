use std::sync::Arc;

use axum_extra::extract::cookie::Key;

use super::error::AuthError;
use crate::config::ProviderConfig;
use crate::manager::SessionManager;

/// Shared web settings used by both config and runtime state.
#[derive(Clone)]
pub(crate) struct WebSettings {
    pub(crate) cookie_key: Key,
    pub(crate) session_cookie_name: String,
    pub(crate) cookie_ttl: time::Duration,
    pub(crate) secure_cookies: bool,
    pub(crate) auth_path: String,
    pub(crate) login_redirect: String,
    pub(crate) logout_redirect: String,
    pub(crate) error_redirect: String,
}

impl WebSettings {
    fn defaults(cookie_ttl: time::Duration) -> Self {
        Self {
            cookie_key: Key::generate(),
            session_cookie_name: "__relier_session".into(),
            cookie_ttl,
            secure_cookies: true,
            auth_path: "/auth".into(),
            login_redirect: "/".into(),
            logout_redirect: "/".into(),
            error_redirect: "/login".into(),
        }
    }
}

/// Web-layer authentication configuration.
///
/// Wraps a [`SessionManager`] with the cookie and redirect settings the
/// mounted routes need. Use [`from_env()`](WebAuthConfig::from_env) for
/// convention-based setup, or [`new()`](WebAuthConfig::new) with
/// `with_*` methods for full control.
pub struct WebAuthConfig {
    pub(super) manager: Arc<SessionManager>,
    pub(super) settings: WebSettings,
}

impl WebAuthConfig {
    /// Create config around an already-built manager.
    ///
    /// The manager arrives shared so the application can keep a handle
    /// for [`resolve_session`](super::resolve_session) and direct API
    /// calls. The session cookie's lifetime follows the manager's
    /// session TTL.
    #[must_use]
    pub fn new(manager: Arc<SessionManager>) -> Self {
        let cookie_ttl = time::Duration::try_from(manager.config().session_ttl)
            .unwrap_or(time::Duration::hours(8));
        Self {
            manager,
            settings: WebSettings::defaults(cookie_ttl),
        }
    }

    /// Create config from environment variables.
    ///
    /// Reads everything [`ProviderConfig::from_env`] reads, plus:
    /// - `RELIER_COOKIE_KEY`: cookie encryption key bytes (optional;
    ///   an ephemeral key is generated when absent)
    /// - `RELIER_INSECURE_COOKIES`: set to `"1"` or `"true"` to drop
    ///   the `Secure` cookie attribute for plain-HTTP development
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if required env vars are missing
    /// or invalid.
    pub fn from_env() -> Result<Self, AuthError> {
        let provider = ProviderConfig::from_env().map_err(|e| AuthError::Config(e.to_string()))?;

        let insecure = matches!(
            std::env::var("RELIER_INSECURE_COOKIES").as_deref(),
            Ok("1") | Ok("true")
        );

        let cookie_key = match std::env::var("RELIER_COOKIE_KEY") {
            Ok(k) => Key::try_from(k.as_bytes()).map_err(|_| {
                AuthError::Config(
                    "RELIER_COOKIE_KEY is set but invalid (must be at least 64 bytes). \
                     Remove the env var to use an ephemeral key, or provide a valid key."
                        .into(),
                )
            })?,
            Err(_) => Key::generate(),
        };

        Ok(Self::new(Arc::new(SessionManager::new(provider)))
            .with_cookie_key(cookie_key)
            .with_secure_cookies(!insecure))
    }

    #[must_use]
    pub fn with_cookie_key(mut self, key: Key) -> Self {
        self.settings.cookie_key = key;
        self
    }

    #[must_use]
    pub fn with_session_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.settings.session_cookie_name = name.into();
        self
    }

    #[must_use]
    pub fn with_cookie_ttl(mut self, ttl: time::Duration) -> Self {
        self.settings.cookie_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.settings.secure_cookies = secure;
        self
    }

    #[must_use]
    pub fn with_auth_path(mut self, path: impl Into<String>) -> Self {
        self.settings.auth_path = path.into();
        self
    }

    #[must_use]
    pub fn with_login_redirect(mut self, path: impl Into<String>) -> Self {
        self.settings.login_redirect = path.into();
        self
    }

    #[must_use]
    pub fn with_logout_redirect(mut self, path: impl Into<String>) -> Self {
        self.settings.logout_redirect = path.into();
        self
    }

    #[must_use]
    pub fn with_error_redirect(mut self, path: impl Into<String>) -> Self {
        self.settings.error_redirect = path.into();
        self
    }
}
