use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::cookie::Key;
use axum_extra::extract::PrivateCookieJar;

use super::error::AuthError;
use super::state::AuthState;
use crate::manager::SessionManager;
use crate::types::{ClaimSet, SessionId, Subject};

/// Authenticated session extracted from the session cookie.
///
/// Use as an Axum extractor in route handlers. Returns `401
/// Unauthorized` if no valid session exists.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected(session: CurrentSession) -> impl IntoResponse {
///     format!("Hello, {}", session.subject)
/// }
///
/// // Optional: accessible to both authenticated and anonymous users
/// async fn public(session: Option<CurrentSession>) -> impl IntoResponse {
///     match session {
///         Some(s) => format!("Hello, {}", s.subject),
///         None => "Hello, guest".to_string(),
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentSession {
    /// Session ID (from cookie).
    pub session_id: SessionId,
    /// Provider-issued subject identifier.
    pub subject: Subject,
    /// Identity-token claims validated at login.
    pub claims: ClaimSet,
}

impl FromRequestParts<AuthState> for CurrentSession {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AuthState,
    ) -> Result<Self, Self::Rejection> {
        let jar: PrivateCookieJar<Key> = PrivateCookieJar::from_request_parts(parts, state)
            .await
            .map_err(|_| AuthError::Unauthenticated)?;

        let session_id = session_id_from_jar(&jar, &state.settings.session_cookie_name)
            .ok_or(AuthError::Unauthenticated)?;

        let session = state
            .manager
            .sessions()
            .get(&session_id)
            .await
            .ok_or(AuthError::SessionExpired)?;

        Ok(Self {
            session_id,
            subject: session.subject().clone(),
            claims: session.claims().clone(),
        })
    }
}

/// Resolve the session behind a cookie jar, for custom middleware that
/// does not use the [`CurrentSession`] extractor.
pub async fn resolve_session(
    manager: &SessionManager,
    jar: &PrivateCookieJar,
    cookie_name: &str,
) -> Option<CurrentSession> {
    let session_id = session_id_from_jar(jar, cookie_name)?;
    let session = manager.sessions().get(&session_id).await?;
    Some(CurrentSession {
        session_id,
        subject: session.subject().clone(),
        claims: session.claims().clone(),
    })
}

pub(super) fn session_id_from_jar(jar: &PrivateCookieJar, cookie_name: &str) -> Option<SessionId> {
    jar.get(cookie_name)
        .and_then(|cookie| cookie.value().parse::<SessionId>().ok())
}
