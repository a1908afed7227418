//! Pending login attempts: the server-side state, nonce, and PKCE
//! verifier minted at login initiation and redeemed exactly once by the
//! matching callback.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::error::Error;
use crate::pkce;

/// One in-flight login, keyed by its `state` parameter.
#[derive(Debug, Clone)]
pub struct LoginAttempt {
    pub(crate) state: String,
    pub(crate) nonce: String,
    pub(crate) code_verifier: String,
    pub(crate) created_at: Instant,
    pub(crate) expires_at: Instant,
}

impl LoginAttempt {
    /// Anti-CSRF state parameter, echoed back on the callback.
    #[must_use]
    pub fn state(&self) -> &str {
        &self.state
    }

    /// Nonce the identity token must echo.
    #[must_use]
    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    /// How long ago the attempt was initiated.
    #[must_use]
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Store of unconsumed login attempts.
///
/// `consume` removes the attempt in the same map operation that looks
/// it up, so two callbacks racing on one state cannot both win.
pub struct AttemptStore {
    ttl: Duration,
    pending: Mutex<HashMap<String, LoginAttempt>>,
}

impl AttemptStore {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Mint a new attempt with fresh random state, nonce, and verifier.
    ///
    /// Attempts left over past their expiry are purged on the way.
    pub async fn create(&self) -> LoginAttempt {
        let now = Instant::now();
        let attempt = LoginAttempt {
            state: pkce::generate_state(),
            nonce: pkce::generate_nonce(),
            code_verifier: pkce::generate_code_verifier(),
            created_at: now,
            expires_at: now + self.ttl,
        };

        let mut pending = self.pending.lock().await;
        pending.retain(|_, a| a.expires_at > now);
        pending.insert(attempt.state.clone(), attempt.clone());
        attempt
    }

    /// Redeem the attempt for `state`, removing it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownOrExpiredState`] if the state was never
    /// issued, was already consumed, or sat unredeemed past its expiry.
    pub async fn consume(&self, state: &str) -> Result<LoginAttempt, Error> {
        let attempt = {
            let mut pending = self.pending.lock().await;
            pending.remove(state)
        };

        match attempt {
            Some(attempt) if !attempt.is_expired() => Ok(attempt),
            Some(_) => {
                tracing::warn!("callback redeemed an expired login attempt");
                Err(Error::UnknownOrExpiredState)
            }
            None => Err(Error::UnknownOrExpiredState),
        }
    }

    /// Number of unconsumed attempts (expired ones included until the
    /// next sweep).
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}
