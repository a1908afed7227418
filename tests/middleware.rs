//! Mounted auth routes driven end to end: login redirect, callback
//! cookie, session resolution, logout.

#![cfg(feature = "axum")]

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum_extra::extract::cookie::Key;
use axum_extra::extract::PrivateCookieJar;
use serde_json::json;
use tower::ServiceExt;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use relier::middleware::{auth_routes, resolve_session, WebAuthConfig};
use relier::{ProviderConfig, SessionManager};

use common::{id_claims, mount_discovery, query_param, sign_id_token, CLIENT_ID};

const COOKIE_NAME: &str = "__relier_session";

struct TestApp {
    router: axum::Router,
    manager: Arc<SessionManager>,
    key: Key,
}

async fn test_app(server: &MockServer) -> TestApp {
    let provider = ProviderConfig::new(
        server.uri().parse().unwrap(),
        CLIENT_ID,
        "http://localhost:3000/auth/callback".parse().unwrap(),
    )
    .with_client_secret("secret");

    let manager = Arc::new(SessionManager::new(provider));
    let key = Key::generate();
    let config = WebAuthConfig::new(manager.clone())
        .with_cookie_key(key.clone())
        .with_secure_cookies(false);

    TestApp {
        router: auth_routes(config),
        manager,
        key,
    }
}

fn location(response: &axum::response::Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .expect("redirect carries a Location header")
        .to_str()
        .unwrap()
        .to_owned()
}

/// The `name=value` pair of the session cookie set by `response`.
fn session_cookie_pair(response: &axum::response::Response) -> String {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(COOKIE_NAME))
        .expect("callback sets the session cookie")
        .split(';')
        .next()
        .unwrap()
        .to_owned()
}

#[tokio::test]
async fn login_redirects_to_the_provider() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;
    let app = test_app(&server).await;

    let response = app
        .router
        .oneshot(
            Request::builder()
                .uri("/auth/login")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let target = location(&response);
    assert!(target.starts_with(&format!("{}/authorize", server.uri())));
    assert!(!query_param(&target, "state").is_empty());
    assert!(!query_param(&target, "nonce").is_empty());
}

#[tokio::test]
async fn callback_sets_a_resolvable_session_cookie() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;
    let app = test_app(&server).await;

    let login = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/auth/login")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let state = query_param(&location(&login), "state");
    let nonce = query_param(&location(&login), "nonce");

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-1",
            "token_type": "Bearer",
            "expires_in": 300,
            "id_token": sign_id_token(&id_claims(&server.uri(), &nonce)),
        })))
        .mount(&server)
        .await;

    let callback = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/auth/callback?code=auth-code-1&state={state}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(callback.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&callback), "/");
    let cookie_pair = session_cookie_pair(&callback);

    // The encrypted cookie resolves back to the authenticated session.
    let mut headers = axum::http::HeaderMap::new();
    headers.insert(header::COOKIE, cookie_pair.parse().unwrap());
    let jar = PrivateCookieJar::from_headers(&headers, app.key.clone());

    let session = resolve_session(&app.manager, &jar, COOKIE_NAME)
        .await
        .expect("cookie resolves to a live session");
    assert_eq!(session.subject.as_str(), "user-1");

    // Logout destroys it and clears the cookie.
    let logout = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/auth/logout")
                .header(header::COOKIE, &cookie_pair)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(logout.status(), StatusCode::SEE_OTHER);

    assert!(
        resolve_session(&app.manager, &jar, COOKIE_NAME).await.is_none(),
        "logout destroys the session server-side"
    );
}

#[tokio::test]
async fn failed_callback_redirects_to_the_error_page() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;
    let app = test_app(&server).await;

    let response = app
        .router
        .oneshot(
            Request::builder()
                .uri("/auth/callback?code=auth-code-1&state=never-issued")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login?error=state_mismatch");
}

#[tokio::test]
async fn provider_error_on_callback_redirects_to_the_error_page() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;
    let app = test_app(&server).await;

    let response = app
        .router
        .oneshot(
            Request::builder()
                .uri("/auth/callback?error=access_denied&error_description=user+cancelled")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login?error=provider_error");
}
