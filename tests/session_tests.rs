//! Integration tests for the login handshake.
//!
//! Each test stands up a `wiremock` server playing the delivery site (or a
//! bare TCP listener where a broken response is needed), so no real network
//! traffic is made.

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use food_recommendation::config::{Credentials, Endpoints, HttpConfig};
use food_recommendation::session::{HttpSession, LoginProgress, SessionAuthenticator, CSRF_COOKIE};
use food_recommendation::Error;

fn endpoints_for(server: &MockServer) -> Endpoints {
    Endpoints {
        site_url: server.uri(),
        api_url: server.uri(),
        anthropic_url: server.uri(),
    }
}

fn test_session() -> HttpSession {
    let config = HttpConfig {
        timeout_secs: 5,
        ..HttpConfig::default()
    };
    HttpSession::new(&config).expect("failed to build test session")
}

fn credentials() -> Credentials {
    Credentials::new("user@example.com", "hunter2")
}

async fn mount_csrf(server: &MockServer, token: &str) {
    Mock::given(method("GET"))
        .and(path("/giris"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "session=abc123; Path=/")
                .set_body_string("<html></html>"),
        )
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/auth/csrf"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "csrfToken": token })))
        .mount(server)
        .await;
}

fn generic_error_body() -> serde_json::Value {
    json!({
        "errorDetails": [{ "errorMessage": "Beklenmeyen bir hata oluştu" }]
    })
}

#[tokio::test]
async fn authenticate_returns_tokens_and_cookies() {
    let server = MockServer::start().await;
    mount_csrf(&server, "csrf-1").await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_partial_json(json!({
            "csrfToken": "csrf-1",
            "username": "user@example.com",
            "password": "hunter2"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "jwt-token" })))
        .expect(1)
        .mount(&server)
        .await;

    let session = test_session();
    let endpoints = endpoints_for(&server);
    let authenticator = SessionAuthenticator::new(&session, &endpoints, true);

    let tokens = authenticator
        .authenticate(&credentials())
        .await
        .expect("login should succeed");

    assert_eq!(tokens.csrf_token, "csrf-1");
    assert_eq!(tokens.access_token, "jwt-token");
    assert_eq!(tokens.cookies.get(CSRF_COOKIE).map(String::as_str), Some("csrf-1"));
}

#[tokio::test]
async fn missing_csrf_field_is_a_token_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/giris"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/auth/csrf"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let session = test_session();
    let endpoints = endpoints_for(&server);
    let authenticator = SessionAuthenticator::new(&session, &endpoints, true);

    let err = authenticator.request_csrf_token().await.unwrap_err();
    assert!(matches!(err, Error::Token { .. }), "expected Token, got: {err:?}");
}

#[tokio::test]
async fn csrf_endpoint_failure_is_a_token_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/giris"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/auth/csrf"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let session = test_session();
    let endpoints = endpoints_for(&server);
    let authenticator = SessionAuthenticator::new(&session, &endpoints, true);

    let err = authenticator.request_csrf_token().await.unwrap_err();
    match err {
        Error::Token { reason } => assert!(reason.contains("503"), "reason: {reason}"),
        other => panic!("expected Token, got: {other:?}"),
    }
}

#[tokio::test]
async fn rejected_login_is_a_credential_error() {
    let server = MockServer::start().await;
    mount_csrf(&server, "csrf-2").await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "errorDetails": [{ "errorMessage": "Şifre hatalı" }] })),
        )
        .mount(&server)
        .await;

    let session = test_session();
    let endpoints = endpoints_for(&server);
    let authenticator = SessionAuthenticator::new(&session, &endpoints, true);

    let err = authenticator.authenticate(&credentials()).await.unwrap_err();
    match err {
        Error::Credential { status, reason } => {
            assert_eq!(status, Some(401));
            assert!(reason.contains("Şifre hatalı"));
        }
        other => panic!("expected Credential, got: {other:?}"),
    }
}

#[tokio::test]
async fn success_without_access_token_is_a_credential_error() {
    let server = MockServer::start().await;
    mount_csrf(&server, "csrf-3").await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "user": "someone" })))
        .mount(&server)
        .await;

    let session = test_session();
    let endpoints = endpoints_for(&server);
    let authenticator = SessionAuthenticator::new(&session, &endpoints, true);

    let err = authenticator.authenticate(&credentials()).await.unwrap_err();
    assert!(matches!(err, Error::Credential { status: Some(200), .. }), "got: {err:?}");
}

#[tokio::test]
async fn generic_error_retries_alternate_endpoint_once() {
    let server = MockServer::start().await;
    mount_csrf(&server, "csrf-4").await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(403).set_body_json(generic_error_body()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/signin"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "fallback-jwt" })))
        .expect(1)
        .mount(&server)
        .await;

    let session = test_session();
    let endpoints = endpoints_for(&server);
    let authenticator = SessionAuthenticator::new(&session, &endpoints, true);

    let tokens = authenticator
        .authenticate(&credentials())
        .await
        .expect("fallback login should succeed");
    assert_eq!(tokens.access_token, "fallback-jwt");
}

#[tokio::test]
async fn generic_error_without_fallback_is_a_credential_error() {
    let server = MockServer::start().await;
    mount_csrf(&server, "csrf-5").await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(403).set_body_json(generic_error_body()))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/signin"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "unused" })))
        .expect(0)
        .mount(&server)
        .await;

    let session = test_session();
    let endpoints = endpoints_for(&server);
    let authenticator = SessionAuthenticator::new(&session, &endpoints, false);

    let err = authenticator.authenticate(&credentials()).await.unwrap_err();
    assert!(matches!(err, Error::Credential { status: Some(403), .. }), "got: {err:?}");
}

#[tokio::test]
async fn failed_fallback_is_a_credential_error() {
    let server = MockServer::start().await;
    mount_csrf(&server, "csrf-6").await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(403).set_body_json(generic_error_body()))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/signin"))
        .respond_with(ResponseTemplate::new(403).set_body_json(generic_error_body()))
        .expect(1)
        .mount(&server)
        .await;

    let session = test_session();
    let endpoints = endpoints_for(&server);
    let authenticator = SessionAuthenticator::new(&session, &endpoints, true);

    let err = authenticator.authenticate(&credentials()).await.unwrap_err();
    assert!(matches!(err, Error::Credential { status: Some(403), .. }), "got: {err:?}");
}

/// Serve one login response whose body is cut short of its Content-Length
async fn truncated_login_server() -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        // The JSON payload is the last thing the client sends
        while !request.ends_with(b"}") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }
        socket
            .write_all(
                b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 100\r\n\r\n{\"access",
            )
            .await
            .unwrap();
        socket.shutdown().await.unwrap();
    });

    format!("http://{addr}")
}

#[tokio::test]
async fn unreadable_login_body_is_a_credential_error() {
    let site = truncated_login_server().await;
    let endpoints = Endpoints {
        site_url: site.clone(),
        api_url: site.clone(),
        anthropic_url: site,
    };
    let session = test_session();
    let authenticator = SessionAuthenticator::new(&session, &endpoints, true);

    let err = authenticator.login(&credentials(), "csrf").await.unwrap_err();
    match err {
        Error::Credential { status, reason } => {
            assert_eq!(status, Some(200));
            assert!(reason.contains("failed to read login response"), "reason: {reason}");
        }
        other => panic!("expected Credential, got: {other:?}"),
    }
}

#[derive(Default)]
struct CountingProgress {
    calls: std::sync::atomic::AtomicUsize,
}

#[async_trait::async_trait]
impl LoginProgress for CountingProgress {
    async fn csrf_obtained(&self) {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }
}

#[tokio::test]
async fn progress_reports_csrf_step_before_login_failure() {
    let server = MockServer::start().await;
    mount_csrf(&server, "csrf-7").await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "error": "nope" })))
        .mount(&server)
        .await;

    let session = test_session();
    let endpoints = endpoints_for(&server);
    let authenticator = SessionAuthenticator::new(&session, &endpoints, true);
    let progress = CountingProgress::default();

    let err = authenticator
        .authenticate_with_progress(&credentials(), &progress)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Credential { .. }), "got: {err:?}");
    assert_eq!(progress.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    // Cookies from the failed attempt remain available for the diagnostic dump
    assert_eq!(
        session.cookies_for(&endpoints.site_url).get(CSRF_COOKIE).map(String::as_str),
        Some("csrf-7")
    );
}
