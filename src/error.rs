/// Identity-token check that failed.
///
/// Checks run in a fixed order and the first violation wins, so the
/// reported kind pinpoints the earliest problem with the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ValidationKind {
    /// Signature did not verify against the provider's published key
    /// for the token's key id (or no such key exists).
    #[error("signature did not verify against a published provider key")]
    BadSignature,
    /// Claims segment is not a decodable claim set.
    #[error("claims are not decodable")]
    Malformed,
    /// `iss` claim does not match the configured issuer.
    #[error("issuer mismatch")]
    IssuerMismatch,
    /// `aud` claim does not contain this client's identifier.
    #[error("audience does not include this client")]
    AudienceMismatch,
    /// Token is past its `exp`, beyond clock-skew tolerance.
    #[error("token expired")]
    Expired,
    /// Token's `nbf` is in the future, beyond clock-skew tolerance.
    #[error("token not yet valid")]
    NotYetValid,
    /// `nonce` claim is absent or does not match the login attempt.
    #[error("nonce mismatch")]
    NonceMismatch,
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Provider metadata could not be fetched or parsed. Recoverable;
    /// retry with backoff.
    #[error("discovery failed: {0}")]
    Discovery(String),

    /// Callback carried a state that is absent, already consumed, or
    /// expired. The login must be restarted.
    #[error("login state unknown, expired, or already used")]
    UnknownOrExpiredState,

    /// Provider reported an error on the authorization callback
    /// (`error` / `error_description` query parameters).
    #[error("provider rejected the authorization: {error}")]
    Provider {
        error: String,
        description: Option<String>,
    },

    /// Token endpoint rejected the code exchange, was unreachable, or
    /// returned an unparseable response.
    #[error("token exchange failed: {reason}")]
    TokenExchange { reason: String },

    /// Provider rejected the refresh token (revoked, expired, reused).
    /// Terminal for the session; the user must log in again.
    #[error("token refresh rejected: {0}")]
    Refresh(String),

    /// Identity token failed a trust check. The offending token yields
    /// no claims.
    #[error("identity token rejected: {0}")]
    Validation(ValidationKind),

    /// Session is absent, expired, or its tokens could not be
    /// refreshed. The user must log in again.
    #[error("session invalid")]
    SessionInvalid,

    /// The downstream API call failed for a non-auth reason. Passed
    /// through, not retried.
    #[error("upstream request failed: {0}")]
    Upstream(#[source] reqwest::Error),

    /// Missing or invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport failure talking to the provider, after the single
    /// retry allowed for transient errors.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
