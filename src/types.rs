use std::time::{Duration, Instant};

use derive_more::{Display, From, FromStr, Into};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::exchange::TokenResponse;

/// Session identifier (ULID).
///
/// Opaque to the user agent: it carries no claims and is only meaningful
/// as a key into the [`SessionStore`](crate::SessionStore).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, FromStr, From, Into,
)]
#[serde(transparent)]
pub struct SessionId(pub Ulid);

impl SessionId {
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Provider-issued subject identifier (the `sub` claim).
///
/// Stable per user per provider; the sole link between a session and the
/// authenticated principal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct Subject(pub String);

impl Subject {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The `aud` claim: a single audience or a list of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    /// Whether the audience includes `client_id`.
    #[must_use]
    pub fn contains(&self, client_id: &str) -> bool {
        match self {
            Self::One(aud) => aud == client_id,
            Self::Many(auds) => auds.iter().any(|aud| aud == client_id),
        }
    }
}

/// Claims from a fully validated identity token.
///
/// Only constructed by [`TokenValidator`](crate::TokenValidator) after
/// every trust check passed; holding one proves the token was accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct ClaimSet {
    pub iss: String,
    pub sub: Subject,
    pub aud: Audience,
    pub exp: u64,
    pub iat: u64,
    #[serde(default)]
    pub nbf: Option<u64>,
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Remaining provider-issued claims, verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Tokens granted by the provider for one session.
///
/// The access token is deliberately unreadable outside this crate; only
/// the [`Gateway`](crate::Gateway) attaches it to outbound requests.
/// Refresh replaces the access/refresh tokens and expiry in place.
#[derive(Debug, Clone)]
pub struct TokenSet {
    pub(crate) access_token: String,
    pub(crate) refresh_token: Option<String>,
    pub(crate) id_token: Option<String>,
    pub(crate) expires_at: Instant,
    pub(crate) scopes: Vec<String>,
}

impl TokenSet {
    /// Lifetime assumed when the provider omits `expires_in`.
    const DEFAULT_LIFETIME: Duration = Duration::from_secs(3600);

    pub(crate) fn from_response(response: TokenResponse, requested_scopes: &[String]) -> Self {
        let lifetime = response
            .expires_in
            .map_or(Self::DEFAULT_LIFETIME, Duration::from_secs);
        let scopes = match response.scope {
            Some(scope) => scope.split_whitespace().map(str::to_owned).collect(),
            // Per RFC 6749 an omitted scope means the request was granted as-is.
            None => requested_scopes.to_vec(),
        };
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            id_token: response.id_token,
            expires_at: Instant::now() + lifetime,
            scopes,
        }
    }

    /// Successor token set after a refresh grant. Fields the provider
    /// did not re-issue carry over from the predecessor.
    pub(crate) fn from_refresh(response: TokenResponse, previous: &Self) -> Self {
        let mut next = Self::from_response(response, &previous.scopes);
        if next.refresh_token.is_none() {
            next.refresh_token = previous.refresh_token.clone();
        }
        if next.id_token.is_none() {
            next.id_token = previous.id_token.clone();
        }
        next
    }

    /// When the access token stops being usable.
    #[must_use]
    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// Whether the access token expires within `margin` (or already has).
    #[must_use]
    pub fn expires_within(&self, margin: Duration) -> bool {
        self.expires_at <= Instant::now() + margin
    }

    /// Scopes the provider granted.
    #[must_use]
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Whether a refresh grant is possible.
    #[must_use]
    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
    }
}

/// Claims from the provider's userinfo endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct UserInfo {
    pub sub: Subject,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: Option<bool>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(scope: Option<&str>, expires_in: Option<u64>) -> TokenResponse {
        TokenResponse {
            access_token: "access".into(),
            token_type: "Bearer".into(),
            expires_in,
            refresh_token: Some("refresh".into()),
            id_token: Some("id".into()),
            scope: scope.map(str::to_owned),
        }
    }

    #[test]
    fn audience_single_and_list() {
        let one = Audience::One("web".into());
        assert!(one.contains("web"));
        assert!(!one.contains("other"));

        let many = Audience::Many(vec!["api".into(), "web".into()]);
        assert!(many.contains("web"));
        assert!(!many.contains("other"));
    }

    #[test]
    fn audience_deserializes_both_shapes() {
        let one: Audience = serde_json::from_str("\"web\"").unwrap();
        assert!(one.contains("web"));

        let many: Audience = serde_json::from_str("[\"web\", \"api\"]").unwrap();
        assert!(many.contains("api"));
    }

    #[test]
    fn claim_set_keeps_unknown_claims() {
        let claims: ClaimSet = serde_json::from_value(serde_json::json!({
            "iss": "https://accounts.example.com",
            "sub": "user-1",
            "aud": "web",
            "exp": 1_700_000_600,
            "iat": 1_700_000_000,
            "nonce": "n",
            "acr": "urn:mace:incommon:iap:silver",
        }))
        .unwrap();

        assert_eq!(claims.sub.as_str(), "user-1");
        assert_eq!(
            claims.extra.get("acr").and_then(|v| v.as_str()),
            Some("urn:mace:incommon:iap:silver")
        );
    }

    #[test]
    fn token_set_granted_scopes_fall_back_to_requested() {
        let requested = vec!["openid".to_string(), "api1".to_string()];

        let explicit = TokenSet::from_response(response(Some("openid"), Some(60)), &requested);
        assert_eq!(explicit.scopes(), &["openid"]);

        let implied = TokenSet::from_response(response(None, Some(60)), &requested);
        assert_eq!(implied.scopes(), &["openid", "api1"]);
    }

    #[test]
    fn token_set_expiry_margin() {
        let tokens = TokenSet::from_response(response(None, Some(3600)), &[]);
        assert!(!tokens.expires_within(Duration::from_secs(60)));
        assert!(tokens.expires_within(Duration::from_secs(7200)));

        let expired = TokenSet::from_response(response(None, Some(0)), &[]);
        assert!(expired.expires_within(Duration::from_secs(60)));
    }

    #[test]
    fn refresh_carries_over_missing_fields() {
        let first = TokenSet::from_response(response(Some("openid"), Some(60)), &[]);

        let mut rotated = response(None, Some(120));
        rotated.access_token = "access-2".into();
        rotated.refresh_token = None;
        rotated.id_token = None;

        let next = TokenSet::from_refresh(rotated, &first);
        assert_eq!(next.access_token, "access-2");
        assert_eq!(next.refresh_token.as_deref(), Some("refresh"));
        assert_eq!(next.id_token.as_deref(), Some("id"));
        assert_eq!(next.scopes(), &["openid"]);
        assert!(next.expires_at() > first.expires_at());
    }

    #[test]
    fn session_ids_are_unique_and_round_trip() {
        let a = SessionId::new();
        let b = SessionId::new();
        assert_ne!(a, b);

        let parsed: SessionId = a.to_string().parse().unwrap();
        assert_eq!(parsed, a);
    }

    #[test]
    fn newtypes_prevent_mixing() {
        fn takes_subject(_: &Subject) {}
        takes_subject(&Subject::from("sub-1".to_string()));
        // takes_subject(&SessionId::new());  // Compile error!
    }
}
