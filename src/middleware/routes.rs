use axum::extract::{Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::Router;
use axum_extra::extract::PrivateCookieJar;

use super::config::WebAuthConfig;
use super::cookies;
use super::extractor::session_id_from_jar;
use super::state::AuthState;
use crate::error::Error;
use crate::manager::CallbackParams;

/// Create the authentication router.
///
/// Mounts `{auth_path}/login`, `{auth_path}/callback`, and
/// `{auth_path}/logout` and returns a router ready to merge into the
/// application.
pub fn auth_routes(config: WebAuthConfig) -> Router {
    let auth_path = config.settings.auth_path.clone();

    let state = AuthState {
        manager: config.manager,
        settings: config.settings,
    };

    Router::new()
        .route(&format!("{auth_path}/login"), get(login))
        .route(&format!("{auth_path}/callback"), get(callback))
        .route(&format!("{auth_path}/logout"), get(logout).post(logout))
        .with_state(state)
}

// ── Login ──────────────────────────────────────────────────────────

async fn login(State(state): State<AuthState>) -> Result<Redirect, Response> {
    let redirect = state.manager.start_login().await.map_err(|e| {
        tracing::error!(error = %e, "login initiation failed");
        login_error(&state.settings.error_redirect, error_code(&e))
    })?;

    Ok(Redirect::to(&redirect.url))
}

// ── Callback ───────────────────────────────────────────────────────

async fn callback(
    State(state): State<AuthState>,
    jar: PrivateCookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<(PrivateCookieJar, Redirect), Response> {
    let manager = state.manager.clone();

    // Run detached: if the browser aborts the request mid-flight, the
    // exchange still finishes instead of leaving the attempt
    // half-consumed; only the response is discarded.
    let session = tokio::spawn(async move { manager.handle_callback(params).await })
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "callback task failed");
            login_error(&state.settings.error_redirect, "internal")
        })?
        .map_err(|e| {
            tracing::warn!(error = %e, "OAuth callback rejected");
            login_error(&state.settings.error_redirect, error_code(&e))
        })?;

    let session_cookie = cookies::session_cookie(
        &state.settings.session_cookie_name,
        &session.id().to_string(),
        state.settings.cookie_ttl,
        state.settings.secure_cookies,
    );

    tracing::info!(session_id = %session.id(), "OAuth2 login successful");

    Ok((
        jar.add(session_cookie),
        Redirect::to(&state.settings.login_redirect),
    ))
}

// ── Logout ─────────────────────────────────────────────────────────

async fn logout(
    State(state): State<AuthState>,
    jar: PrivateCookieJar,
) -> (PrivateCookieJar, Redirect) {
    if let Some(session_id) = session_id_from_jar(&jar, &state.settings.session_cookie_name) {
        state.manager.logout(&session_id).await;
    }

    let clear_cookie = cookies::clear_session_cookie(&state.settings.session_cookie_name);
    (
        jar.remove(clear_cookie),
        Redirect::to(&state.settings.logout_redirect),
    )
}

// ── Helpers ────────────────────────────────────────────────────────

fn login_error(error_redirect: &str, code: &str) -> Response {
    let encoded = urlencoding::encode(code);
    Redirect::to(&format!("{error_redirect}?error={encoded}")).into_response()
}

/// Short stable codes for the error-redirect query string; details stay
/// in the logs.
fn error_code(error: &Error) -> &'static str {
    match error {
        Error::Provider { .. } => "provider_error",
        Error::UnknownOrExpiredState => "state_mismatch",
        Error::TokenExchange { .. } => "token_exchange_failed",
        Error::Validation(_) => "invalid_token",
        Error::Discovery(_) => "discovery_failed",
        Error::Refresh(_) | Error::SessionInvalid => "session_invalid",
        _ => "internal",
    }
}
