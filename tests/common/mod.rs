//! Shared fixtures: an RSA signing key and a wiremock identity
//! provider.

#![allow(dead_code)]

use std::sync::OnceLock;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const KID: &str = "test-key";
pub const CLIENT_ID: &str = "web-client";

pub struct ProviderKey {
    pub encoding: EncodingKey,
    pub n: String,
    pub e: String,
}

/// Lazily generated RSA key pair shared by every test in the binary.
pub fn provider_key() -> &'static ProviderKey {
    static KEY: OnceLock<ProviderKey> = OnceLock::new();
    KEY.get_or_init(|| {
        let private =
            RsaPrivateKey::new(&mut rand_core::OsRng, 2048).expect("generate test RSA key");
        let public = RsaPublicKey::from(&private);
        let pem = private
            .to_pkcs1_pem(rsa::pkcs1::LineEnding::LF)
            .expect("encode test key");
        ProviderKey {
            encoding: EncodingKey::from_rsa_pem(pem.as_bytes()).expect("load test key"),
            n: URL_SAFE_NO_PAD.encode(public.n().to_bytes_be()),
            e: URL_SAFE_NO_PAD.encode(public.e().to_bytes_be()),
        }
    })
}

pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before Unix epoch")
        .as_secs()
}

/// Sign an identity token with the shared provider key.
pub fn sign_id_token(claims: &serde_json::Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(KID.into());
    encode(&header, claims, &provider_key().encoding).expect("sign test token")
}

/// Standard good claims for `issuer`, answering `nonce`.
pub fn id_claims(issuer: &str, nonce: &str) -> serde_json::Value {
    let now = unix_now();
    json!({
        "iss": issuer,
        "sub": "user-1",
        "aud": CLIENT_ID,
        "exp": now + 600,
        "iat": now,
        "nonce": nonce,
        "email": "user@example.com",
        "name": "Test User",
    })
}

/// Mount the provider's discovery and key documents on `server`.
pub async fn mount_discovery(server: &MockServer) {
    let issuer = server.uri();

    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "issuer": issuer,
            "authorization_endpoint": format!("{issuer}/authorize"),
            "token_endpoint": format!("{issuer}/token"),
            "userinfo_endpoint": format!("{issuer}/userinfo"),
            "jwks_uri": format!("{issuer}/jwks"),
            "response_types_supported": ["code"],
            "id_token_signing_alg_values_supported": ["RS256"],
            "code_challenge_methods_supported": ["S256"],
        })))
        .mount(server)
        .await;

    let key = provider_key();
    Mock::given(method("GET"))
        .and(path("/jwks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "keys": [{
                "kty": "RSA",
                "kid": KID,
                "use": "sig",
                "alg": "RS256",
                "n": key.n,
                "e": key.e,
            }],
        })))
        .mount(server)
        .await;
}

/// Extract one query parameter from an authorization URL.
pub fn query_param(url: &str, name: &str) -> String {
    let url: url::Url = url.parse().expect("authorization URL parses");
    url.query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
        .unwrap_or_else(|| panic!("missing query parameter {name}"))
}
