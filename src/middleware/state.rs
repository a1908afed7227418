use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;

use super::config::WebSettings;
use crate::manager::SessionManager;

/// Shared state for auth route handlers.
#[derive(Clone)]
pub struct AuthState {
    pub(super) manager: Arc<SessionManager>,
    pub(super) settings: WebSettings,
}

impl AuthState {
    /// The session manager behind these routes.
    #[must_use]
    pub fn manager(&self) -> &Arc<SessionManager> {
        &self.manager
    }
}

// PrivateCookieJar requires Key to be extractable from state
impl FromRef<AuthState> for Key {
    fn from_ref(state: &AuthState) -> Self {
        state.settings.cookie_key.clone()
    }
}
