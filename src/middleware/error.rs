use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};

/// Authentication errors for the web layer.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No valid session cookie on the request.
    #[error("Not authenticated")]
    Unauthenticated,

    /// Session cookie present but the session is gone.
    #[error("Session expired")]
    SessionExpired,

    /// The login flow itself failed (state mismatch, exchange failure,
    /// token rejected, ...).
    #[error("OAuth error: {0}")]
    OAuth(String),

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthenticated | Self::SessionExpired => {
                (StatusCode::UNAUTHORIZED, self.to_string()).into_response()
            }
            Self::OAuth(ref msg) => {
                let encoded = urlencoding::encode(msg);
                Redirect::to(&format!("/login?error={encoded}")).into_response()
            }
            Self::Config(_) => {
                tracing::error!(error = %self, "Auth internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
            }
        }
    }
}

impl From<crate::error::Error> for AuthError {
    fn from(e: crate::error::Error) -> Self {
        Self::OAuth(e.to_string())
    }
}
