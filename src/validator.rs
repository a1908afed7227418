//! Identity-token verification.
//!
//! This is the trust boundary of the whole crate: a [`ClaimSet`] exists
//! only because every check here passed, in order — signature, issuer,
//! audience, time bounds, nonce.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use url::Url;

use crate::attempt::LoginAttempt;
use crate::config::ProviderConfig;
use crate::discovery::ProviderMetadata;
use crate::error::{Error, ValidationKind};
use crate::net;
use crate::types::ClaimSet;

/// Verifies identity tokens against provider metadata and the login
/// attempt they must answer.
pub struct TokenValidator {
    issuer: Url,
    client_id: String,
    leeway: u64,
}

impl TokenValidator {
    #[must_use]
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            issuer: config.issuer.clone(),
            client_id: config.client_id.clone(),
            leeway: config.clock_skew.as_secs(),
        }
    }

    /// Validate `id_token` and return its claims.
    ///
    /// Checks run in a fixed order and the first violation wins:
    /// signature (against the published key matching the token's key
    /// id), `iss`, `aud`, `exp`/`nbf` with clock-skew leeway, `nonce`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] naming the failed check. No claims
    /// escape a rejected token.
    pub fn validate(
        &self,
        id_token: &str,
        attempt: &LoginAttempt,
        metadata: &ProviderMetadata,
    ) -> Result<ClaimSet, Error> {
        let claims = self.decode_and_verify_signature(id_token, metadata)?;

        if !issuer_matches(&claims.iss, &self.issuer) {
            tracing::warn!(got = %claims.iss, "identity token issuer mismatch");
            return Err(Error::Validation(ValidationKind::IssuerMismatch));
        }

        if !claims.aud.contains(&self.client_id) {
            tracing::warn!("identity token audience does not include this client");
            return Err(Error::Validation(ValidationKind::AudienceMismatch));
        }

        let now = net::unix_now();
        if now > claims.exp.saturating_add(self.leeway) {
            tracing::warn!(exp = claims.exp, now, "identity token expired");
            return Err(Error::Validation(ValidationKind::Expired));
        }
        if let Some(nbf) = claims.nbf {
            if now.saturating_add(self.leeway) < nbf {
                tracing::warn!(nbf, now, "identity token not yet valid");
                return Err(Error::Validation(ValidationKind::NotYetValid));
            }
        }

        match claims.nonce.as_deref() {
            Some(nonce) if nonce == attempt.nonce() => {}
            _ => {
                tracing::warn!("identity token nonce missing or mismatched");
                return Err(Error::Validation(ValidationKind::NonceMismatch));
            }
        }

        Ok(claims)
    }

    /// Signature check only; claim semantics are judged by the caller
    /// so each violation maps to its own kind.
    fn decode_and_verify_signature(
        &self,
        id_token: &str,
        metadata: &ProviderMetadata,
    ) -> Result<ClaimSet, Error> {
        let header =
            decode_header(id_token).map_err(|_| Error::Validation(ValidationKind::Malformed))?;

        if header.alg != Algorithm::RS256 {
            return Err(Error::Validation(ValidationKind::BadSignature));
        }
        let kid = header
            .kid
            .ok_or(Error::Validation(ValidationKind::BadSignature))?;
        let key = metadata
            .find_key(&kid)
            .ok_or(Error::Validation(ValidationKind::BadSignature))?;

        let decoding_key = DecodingKey::from_rsa_components(&key.n, &key.e)
            .map_err(|_| Error::Validation(ValidationKind::BadSignature))?;

        let mut verify_signature_only = Validation::new(Algorithm::RS256);
        verify_signature_only.validate_exp = false;
        verify_signature_only.validate_nbf = false;
        verify_signature_only.validate_aud = false;
        verify_signature_only.required_spec_claims.clear();

        let data = decode::<serde_json::Value>(id_token, &decoding_key, &verify_signature_only)
            .map_err(|e| match e.kind() {
                ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
                    Error::Validation(ValidationKind::Malformed)
                }
                _ => Error::Validation(ValidationKind::BadSignature),
            })?;

        serde_json::from_value(data.claims)
            .map_err(|_| Error::Validation(ValidationKind::Malformed))
    }
}

fn issuer_matches(claimed: &str, configured: &Url) -> bool {
    claimed.trim_end_matches('/') == configured.as_str().trim_end_matches('/')
}
