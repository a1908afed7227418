//! Plug-and-play authentication middleware for Axum.
//!
//! Mounts the login/callback/logout routes for the OpenID Connect
//! authorization-code flow and propagates the session id in an
//! HTTP-only, encrypted cookie. Tokens never reach the user agent.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use relier::middleware::{WebAuthConfig, auth_routes, CurrentSession};
//!
//! // 1. Configure from environment
//! let config = WebAuthConfig::from_env()?;
//!
//! // 2. Mount auth routes
//! let app = axum::Router::new().merge(auth_routes(config));
//!
//! // 3. Use the extractor in your handlers
//! async fn profile(session: CurrentSession) -> String {
//!     format!("hello {}", session.subject)
//! }
//! ```

mod config;
mod cookies;
mod error;
mod extractor;
mod routes;
mod state;

pub use config::WebAuthConfig;
pub use error::AuthError;
pub use extractor::{resolve_session, CurrentSession};
pub use routes::auth_routes;
pub use state::AuthState;

/// Re-export cookie key type for builder API.
pub use axum_extra::extract::cookie::Key as CookieKey;
