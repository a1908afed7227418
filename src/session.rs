//! Server-side sessions for authenticated principals.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};
use url::Url;

use crate::discovery::DiscoveryCache;
use crate::error::Error;
use crate::exchange::TokenClient;
use crate::types::{ClaimSet, SessionId, Subject, TokenSet};

/// An authenticated principal and the tokens backing it.
///
/// Claims are readable by the embedding application; the token material
/// is not — only the [`Gateway`](crate::Gateway) inside this crate ever
/// reads the access token.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    subject: Subject,
    claims: ClaimSet,
    pub(crate) tokens: TokenSet,
    created_at: Instant,
    last_refresh: Option<Instant>,
}

impl Session {
    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Provider-issued subject identifier.
    #[must_use]
    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    /// Validated identity-token claims.
    #[must_use]
    pub fn claims(&self) -> &ClaimSet {
        &self.claims
    }

    /// How long ago the session was established.
    #[must_use]
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// When the tokens were last refreshed, if ever.
    #[must_use]
    pub fn last_refresh(&self) -> Option<Instant> {
        self.last_refresh
    }

    /// When the session's access token stops being usable. The token
    /// itself stays out of reach; only its lifetime is observable.
    #[must_use]
    pub fn tokens_expire_at(&self) -> Instant {
        self.tokens.expires_at()
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() >= ttl
    }
}

/// In-memory store of active sessions.
///
/// Per-session operations are atomic: refreshes of one session
/// serialize on a per-session gate while unrelated sessions proceed
/// concurrently.
pub struct SessionStore {
    exchange: Arc<TokenClient>,
    discovery: Arc<DiscoveryCache>,
    issuer: Url,
    session_ttl: Duration,
    refresh_margin: Duration,
    sessions: RwLock<HashMap<SessionId, Session>>,
    refresh_gates: Mutex<HashMap<SessionId, Arc<Mutex<()>>>>,
}

impl SessionStore {
    pub(crate) fn new(
        exchange: Arc<TokenClient>,
        discovery: Arc<DiscoveryCache>,
        issuer: Url,
        session_ttl: Duration,
        refresh_margin: Duration,
    ) -> Self {
        Self {
            exchange,
            discovery,
            issuer,
            session_ttl,
            refresh_margin,
            sessions: RwLock::new(HashMap::new()),
            refresh_gates: Mutex::new(HashMap::new()),
        }
    }

    /// Establish a session for a validated claim set and its tokens.
    pub async fn create(&self, claims: ClaimSet, tokens: TokenSet) -> Session {
        let session = Session {
            id: SessionId::new(),
            subject: claims.sub.clone(),
            claims,
            tokens,
            created_at: Instant::now(),
            last_refresh: None,
        };

        self.sessions
            .write()
            .await
            .insert(*session.id(), session.clone());
        tracing::debug!(session_id = %session.id(), "session created");
        session
    }

    /// Look up a live session. A session past its absolute lifetime is
    /// destroyed on the way and reported absent.
    pub async fn get(&self, id: &SessionId) -> Option<Session> {
        let session = self.sessions.read().await.get(id).cloned()?;
        if session.is_expired(self.session_ttl) {
            tracing::debug!(session_id = %id, "session past absolute lifetime");
            self.destroy(id).await;
            return None;
        }
        Some(session)
    }

    /// Refresh the session's tokens in place.
    ///
    /// Concurrent callers for one session coalesce: whoever wins the
    /// per-session gate performs the exchange, the rest observe the
    /// already-refreshed tokens. The session identity (id, subject,
    /// claims) never changes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionInvalid`] if the session is absent or
    /// the provider rejected the refresh token — the session is
    /// destroyed in that case. Transport failures surface as
    /// [`Error::Http`] and leave the session intact for a later retry.
    pub async fn refresh_tokens(&self, id: &SessionId) -> Result<Session, Error> {
        let gate = self.refresh_gate(id).await;
        let _guard = gate.lock().await;

        let current = self.get(id).await.ok_or(Error::SessionInvalid)?;
        if !current.tokens.expires_within(self.refresh_margin) {
            // A caller queued behind the refresh that already happened.
            return Ok(current);
        }

        let metadata = self.discovery.metadata(&self.issuer).await?;
        match self.exchange.refresh(&current.tokens, &metadata).await {
            Ok(tokens) => {
                let mut sessions = self.sessions.write().await;
                match sessions.get_mut(id) {
                    Some(session) => {
                        session.tokens = tokens;
                        session.last_refresh = Some(Instant::now());
                        tracing::debug!(session_id = %id, "session tokens refreshed");
                        Ok(session.clone())
                    }
                    // Destroyed while we were talking to the provider.
                    None => Err(Error::SessionInvalid),
                }
            }
            Err(Error::Refresh(reason)) => {
                tracing::warn!(session_id = %id, %reason, "refresh rejected, destroying session");
                drop(_guard);
                self.destroy(id).await;
                Err(Error::SessionInvalid)
            }
            Err(e) => Err(e),
        }
    }

    /// Remove the session immediately and irrevocably. Destroying an
    /// absent session is a no-op.
    pub async fn destroy(&self, id: &SessionId) {
        let removed = self.sessions.write().await.remove(id);
        self.refresh_gates.lock().await.remove(id);
        if removed.is_some() {
            tracing::debug!(session_id = %id, "session destroyed");
        }
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    pub(crate) fn refresh_margin(&self) -> Duration {
        self.refresh_margin
    }

    async fn refresh_gate(&self, id: &SessionId) -> Arc<Mutex<()>> {
        let mut gates = self.refresh_gates.lock().await;
        gates.entry(*id).or_default().clone()
    }
}
