#![doc = include_str!("../README.md")]

pub mod attempt;
pub mod config;
pub mod discovery;
pub mod error;
pub mod exchange;
pub mod gateway;
pub mod manager;
#[cfg(feature = "axum")]
pub mod middleware;
pub mod pkce;
pub mod session;
pub mod types;
pub mod validator;

mod net;

// Re-exports for convenient access
pub use attempt::{AttemptStore, LoginAttempt};
pub use config::ProviderConfig;
pub use discovery::{DiscoveryCache, DiscoveryDocument, Jwk, JwkSet, ProviderMetadata};
pub use error::{Error, ValidationKind};
pub use exchange::{TokenClient, TokenResponse};
pub use gateway::Gateway;
pub use manager::{CallbackParams, LoginRedirect, SessionManager};
pub use pkce::{generate_code_challenge, generate_code_verifier, generate_nonce, generate_state};
pub use session::{Session, SessionStore};
pub use types::{Audience, ClaimSet, SessionId, Subject, TokenSet, UserInfo};
pub use validator::TokenValidator;
