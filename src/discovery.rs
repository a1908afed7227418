//! Provider metadata discovery via the `.well-known` endpoint, with a
//! TTL cache and a singleflight refresh guard.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use url::Url;

use crate::error::Error;
use crate::net;

/// Provider discovery document from `.well-known/openid-configuration`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct DiscoveryDocument {
    pub issuer: String,
    pub authorization_endpoint: Url,
    pub token_endpoint: Url,
    pub jwks_uri: Url,
    #[serde(default)]
    pub userinfo_endpoint: Option<Url>,
    #[serde(default)]
    pub response_types_supported: Vec<String>,
    #[serde(default)]
    pub id_token_signing_alg_values_supported: Vec<String>,
    #[serde(default)]
    pub code_challenge_methods_supported: Vec<String>,
}

/// JSON Web Key Set published by the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

impl JwkSet {
    /// Find the RSA signing key with the given key id.
    #[must_use]
    pub fn find_key(&self, kid: &str) -> Option<&Jwk> {
        self.keys
            .iter()
            .filter(|k| k.kty == "RSA")
            .find(|k| k.kid.as_deref() == Some(kid))
    }
}

/// Individual JSON Web Key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct Jwk {
    /// Key type (e.g. "RSA").
    pub kty: String,
    pub kid: Option<String>,
    #[serde(rename = "use")]
    pub use_: Option<String>,
    pub alg: Option<String>,
    /// RSA modulus (base64url encoded).
    #[serde(default)]
    pub n: String,
    /// RSA public exponent (base64url encoded).
    #[serde(default)]
    pub e: String,
}

/// One coherent snapshot of a provider: discovery document plus the
/// signing keys it pointed at, fetched together.
#[derive(Debug, Clone)]
pub struct ProviderMetadata {
    document: DiscoveryDocument,
    jwks: JwkSet,
    fetched_at: Instant,
}

impl ProviderMetadata {
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.document.issuer
    }

    #[must_use]
    pub fn authorization_endpoint(&self) -> &Url {
        &self.document.authorization_endpoint
    }

    #[must_use]
    pub fn token_endpoint(&self) -> &Url {
        &self.document.token_endpoint
    }

    #[must_use]
    pub fn userinfo_endpoint(&self) -> Option<&Url> {
        self.document.userinfo_endpoint.as_ref()
    }

    /// Signing key for `kid`, if the provider currently publishes one.
    #[must_use]
    pub fn find_key(&self, kid: &str) -> Option<&Jwk> {
        self.jwks.find_key(kid)
    }

    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }

    #[cfg(test)]
    pub(crate) fn for_tests(document: DiscoveryDocument, jwks: JwkSet) -> Self {
        Self {
            document,
            jwks,
            fetched_at: Instant::now(),
        }
    }
}

/// TTL cache of [`ProviderMetadata`], keyed by issuer URL.
///
/// A snapshot is replaced wholesale: callers either see the previous
/// complete entry or the new complete entry, never a half-updated one.
/// Concurrent refreshes of one issuer coalesce into a single fetch.
pub struct DiscoveryCache {
    http: reqwest::Client,
    ttl: Duration,
    timeout: Duration,
    entries: RwLock<HashMap<String, Arc<ProviderMetadata>>>,
    // One gate per issuer so a slow refresh of one provider does not
    // serialize lookups of another.
    gates: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl DiscoveryCache {
    #[must_use]
    pub fn new(ttl: Duration, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            ttl,
            timeout,
            entries: RwLock::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
        }
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    /// Metadata for `issuer`, from cache when fresh.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Discovery`] if the metadata or key documents
    /// cannot be fetched or parsed.
    pub async fn metadata(&self, issuer: &Url) -> Result<Arc<ProviderMetadata>, Error> {
        if let Some(entry) = self.fresh_entry(issuer).await {
            return Ok(entry);
        }

        let gate = self.gate(issuer).await;
        let _guard = gate.lock().await;

        // Whoever held the gate before us may have refreshed already.
        if let Some(entry) = self.fresh_entry(issuer).await {
            return Ok(entry);
        }
        self.fetch_and_store(issuer).await
    }

    /// Drop any cached entry for `issuer` and fetch fresh metadata.
    ///
    /// Used when an identity token names a key id the cached snapshot
    /// does not carry — the provider may have rotated keys.
    pub async fn refresh(&self, issuer: &Url) -> Result<Arc<ProviderMetadata>, Error> {
        let gate = self.gate(issuer).await;
        let _guard = gate.lock().await;
        self.fetch_and_store(issuer).await
    }

    async fn fresh_entry(&self, issuer: &Url) -> Option<Arc<ProviderMetadata>> {
        let entries = self.entries.read().await;
        entries
            .get(issuer.as_str())
            .filter(|entry| entry.is_fresh(self.ttl))
            .cloned()
    }

    async fn gate(&self, issuer: &Url) -> Arc<Mutex<()>> {
        let mut gates = self.gates.lock().await;
        gates
            .entry(issuer.as_str().to_owned())
            .or_default()
            .clone()
    }

    async fn fetch_and_store(&self, issuer: &Url) -> Result<Arc<ProviderMetadata>, Error> {
        let metadata = Arc::new(self.fetch(issuer).await?);
        self.entries
            .write()
            .await
            .insert(issuer.as_str().to_owned(), metadata.clone());
        Ok(metadata)
    }

    async fn fetch(&self, issuer: &Url) -> Result<ProviderMetadata, Error> {
        let url = discovery_url(issuer);
        let document: DiscoveryDocument = net::get_json(&self.http, &url, self.timeout)
            .await
            .map_err(|e| Error::Discovery(format!("metadata document: {e}")))?;

        if !issuer_matches(&document.issuer, issuer) {
            return Err(Error::Discovery(format!(
                "issuer mismatch in metadata: expected {issuer}, got {}",
                document.issuer
            )));
        }

        let jwks: JwkSet = net::get_json(&self.http, &document.jwks_uri, self.timeout)
            .await
            .map_err(|e| Error::Discovery(format!("key document: {e}")))?;

        tracing::debug!(issuer = %document.issuer, keys = jwks.keys.len(), "provider metadata fetched");

        Ok(ProviderMetadata {
            document,
            jwks,
            fetched_at: Instant::now(),
        })
    }
}

fn discovery_url(issuer: &Url) -> Url {
    let mut url = issuer.clone();
    let path = format!(
        "{}/.well-known/openid-configuration",
        url.path().trim_end_matches('/')
    );
    url.set_path(&path);
    url.set_query(None);
    url.set_fragment(None);
    url
}

// Urls normalize an empty path to "/", identity tokens usually carry
// the issuer without it.
fn issuer_matches(advertised: &str, configured: &Url) -> bool {
    advertised.trim_end_matches('/') == configured.as_str().trim_end_matches('/')
}
