//! # Session Authenticator Module
//!
//! Replays the delivery site's browser login sequence: harvest cookies from
//! the login page, read a CSRF token, then post the credentials to obtain a
//! bearer token. The cookie jar lives in [`HttpSession`] so the order fetcher
//! reuses the same cookies afterwards.
//!
//! This is an integration shim against an undocumented API. Any remote-side
//! change breaks it; failures are reported, never papered over.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, Url};
use serde::Serialize;
use serde_json::Value;

use crate::config::{Credentials, Endpoints, HttpConfig};
use crate::errors::{truncate_body, Error, Result};

/// Cookie name the site expects to mirror the CSRF token
pub const CSRF_COOKIE: &str = "tgo-csrf-token";

/// Marker in the site's generic login failure message
pub const GENERIC_LOGIN_ERROR: &str = "Beklenmeyen bir hata";

/// HTTP client with a shared cookie jar
#[derive(Debug, Clone)]
pub struct HttpSession {
    client: Client,
    jar: Arc<Jar>,
}

impl HttpSession {
    /// Build a session with browser-like default headers and a request timeout
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let jar = Arc::new(Jar::default());

        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let client = Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .default_headers(headers)
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, jar })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Add a cookie for the given site
    pub fn add_cookie(&self, site_url: &str, name: &str, value: &str) {
        if let Ok(url) = site_url.parse::<Url>() {
            self.jar.add_cookie_str(&format!("{name}={value}"), &url);
        }
    }

    /// Snapshot of the cookies the jar would send to `site_url`
    pub fn cookies_for(&self, site_url: &str) -> BTreeMap<String, String> {
        let Ok(url) = site_url.parse::<Url>() else {
            return BTreeMap::new();
        };

        self.jar
            .cookies(&url)
            .and_then(|value| value.to_str().ok().map(parse_cookie_header))
            .unwrap_or_default()
    }
}

/// Parse a `Cookie` request header value into name/value pairs
pub fn parse_cookie_header(header: &str) -> BTreeMap<String, String> {
    header
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            let name = name.trim();
            (!name.is_empty()).then(|| (name.to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Tokens produced by a successful login
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthTokens {
    pub csrf_token: String,
    pub cookies: BTreeMap<String, String>,
    pub access_token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginPayload<'a> {
    csrf_token: &'a str,
    password: &'a str,
    username: &'a str,
}

/// Notified between the handshake steps
#[async_trait]
pub trait LoginProgress: Send + Sync {
    /// The CSRF token is in hand and the credential POST is next
    async fn csrf_obtained(&self);
}

/// Progress hook that does nothing
pub struct NoProgress;

#[async_trait]
impl LoginProgress for NoProgress {
    async fn csrf_obtained(&self) {}
}

/// Outcome of a single login POST
enum LoginAttempt {
    Success(String),
    /// Site answered with its generic error; the alternate endpoint may work
    Generic { status: u16, body: String },
    Rejected(Error),
}

/// Performs the login handshake against the delivery site
pub struct SessionAuthenticator<'a> {
    session: &'a HttpSession,
    endpoints: &'a Endpoints,
    allow_fallback: bool,
}

impl<'a> SessionAuthenticator<'a> {
    pub fn new(session: &'a HttpSession, endpoints: &'a Endpoints, allow_fallback: bool) -> Self {
        Self {
            session,
            endpoints,
            allow_fallback,
        }
    }

    /// Run the full handshake and return the resulting tokens
    pub async fn authenticate(&self, credentials: &Credentials) -> Result<AuthTokens> {
        self.authenticate_with_progress(credentials, &NoProgress).await
    }

    /// Run the full handshake, reporting when the CSRF step is done
    ///
    /// Cookies collected before a failure stay in the session jar, so callers
    /// can still dump them after an error.
    pub async fn authenticate_with_progress(
        &self,
        credentials: &Credentials,
        progress: &dyn LoginProgress,
    ) -> Result<AuthTokens> {
        let csrf_token = self.request_csrf_token().await?;
        progress.csrf_obtained().await;
        let access_token = self.login(credentials, &csrf_token).await?;

        Ok(AuthTokens {
            cookies: self.session.cookies_for(&self.endpoints.site_url),
            csrf_token,
            access_token,
        })
    }

    /// Step 1: load the login page for cookies, then read the CSRF token
    pub async fn request_csrf_token(&self) -> Result<String> {
        let client = self.session.client();
        let login_page = self.endpoints.login_page();

        info!("Requesting login page: {login_page}");
        let response = client
            .get(&login_page)
            .header(header::ACCEPT, "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .header(header::REFERER, format!("{}/", self.endpoints.site_url.trim_end_matches('/')))
            .send()
            .await
            .map_err(|e| Error::Token {
                reason: format!("login page request failed: {e}"),
            })?;

        if !response.status().is_success() {
            return Err(Error::Token {
                reason: format!("login page returned HTTP {}", response.status().as_u16()),
            });
        }
        debug!(
            "Cookies after login page: {:?}",
            self.session.cookies_for(&self.endpoints.site_url).keys().collect::<Vec<_>>()
        );

        let response = client
            .get(self.endpoints.csrf())
            .send()
            .await
            .map_err(|e| Error::Token {
                reason: format!("CSRF request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Token {
                reason: format!("CSRF endpoint returned HTTP {}", status.as_u16()),
            });
        }

        let body: Value = response.json().await.map_err(|e| Error::Token {
            reason: format!("CSRF response is not JSON: {e}"),
        })?;

        let token = body
            .get("csrfToken")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::Token {
                reason: "csrfToken field missing from response".to_string(),
            })?
            .to_string();

        self.session
            .add_cookie(&self.endpoints.site_url, CSRF_COOKIE, &token);
        info!("CSRF token obtained");

        Ok(token)
    }

    /// Step 2: post the credentials and return the access token
    pub async fn login(&self, credentials: &Credentials, csrf_token: &str) -> Result<String> {
        let payload = LoginPayload {
            csrf_token,
            password: &credentials.password,
            username: &credentials.username,
        };
        info!(
            "Attempting login for {} (password: ********)",
            credentials.username
        );

        match self.post_login(&self.endpoints.login(), &payload).await {
            LoginAttempt::Success(token) => Ok(token),
            LoginAttempt::Rejected(err) => Err(err),
            LoginAttempt::Generic { status, body } if !self.allow_fallback => Err(Error::Credential {
                status: Some(status),
                reason: body,
            }),
            LoginAttempt::Generic { .. } => {
                warn!("Login returned the generic error, trying alternate endpoint once");
                match self.post_login(&self.endpoints.login_fallback(), &payload).await {
                    LoginAttempt::Success(token) => Ok(token),
                    LoginAttempt::Rejected(err) => Err(err),
                    LoginAttempt::Generic { status, body } => Err(Error::Credential {
                        status: Some(status),
                        reason: body,
                    }),
                }
            }
        }
    }

    async fn post_login(&self, url: &str, payload: &LoginPayload<'_>) -> LoginAttempt {
        let site = self.endpoints.site_url.trim_end_matches('/');
        let response = match self
            .session
            .client()
            .post(url)
            .header(header::ACCEPT, "application/json, text/plain, */*")
            .header(header::ORIGIN, site)
            .header(header::REFERER, self.endpoints.login_page())
            .header("Sec-Fetch-Mode", "cors")
            .header("Sec-Fetch-Site", "same-origin")
            .json(payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                return LoginAttempt::Rejected(Error::Credential {
                    status: None,
                    reason: format!("login request failed: {e}"),
                })
            }
        };

        let status = response.status();
        info!("Login status code from {url}: {}", status.as_u16());
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                return LoginAttempt::Rejected(Error::Credential {
                    status: Some(status.as_u16()),
                    reason: format!("failed to read login response: {e}"),
                })
            }
        };

        let Ok(body) = serde_json::from_str::<Value>(&text) else {
            return LoginAttempt::Rejected(Error::Credential {
                status: Some(status.as_u16()),
                reason: format!("response is not JSON: {}", truncate_body(&text)),
            });
        };

        if status.is_success() {
            return match body.get("access_token").and_then(Value::as_str) {
                Some(token) if !token.is_empty() => LoginAttempt::Success(token.to_string()),
                _ => LoginAttempt::Rejected(Error::Credential {
                    status: Some(status.as_u16()),
                    reason: "access_token missing from login response".to_string(),
                }),
            };
        }

        if status == reqwest::StatusCode::FORBIDDEN && is_generic_error(&body) {
            return LoginAttempt::Generic {
                status: status.as_u16(),
                body: truncate_body(&text),
            };
        }

        LoginAttempt::Rejected(Error::Credential {
            status: Some(status.as_u16()),
            reason: truncate_body(&text),
        })
    }
}

fn is_generic_error(body: &Value) -> bool {
    body.pointer("/errorDetails/0/errorMessage")
        .and_then(Value::as_str)
        .is_some_and(|msg| msg.contains(GENERIC_LOGIN_ERROR))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_cookie_header() {
        let cookies = parse_cookie_header("session=abc; tgo-csrf-token=xyz;  empty=");
        assert_eq!(cookies.get("session").map(String::as_str), Some("abc"));
        assert_eq!(cookies.get("tgo-csrf-token").map(String::as_str), Some("xyz"));
        assert_eq!(cookies.get("empty").map(String::as_str), Some(""));
        assert!(parse_cookie_header("").is_empty());
    }

    #[test]
    fn test_generic_error_detection() {
        let generic = json!({
            "errorDetails": [{"errorMessage": "Beklenmeyen bir hata oluştu"}]
        });
        assert!(is_generic_error(&generic));

        let specific = json!({
            "errorDetails": [{"errorMessage": "Şifre hatalı"}]
        });
        assert!(!is_generic_error(&specific));
        assert!(!is_generic_error(&json!({})));
    }

    #[test]
    fn test_session_cookie_roundtrip() {
        let session = HttpSession::new(&HttpConfig::default()).unwrap();
        session.add_cookie("https://tgoyemek.com", CSRF_COOKIE, "token-1");

        let cookies = session.cookies_for("https://tgoyemek.com");
        assert_eq!(cookies.get(CSRF_COOKIE).map(String::as_str), Some("token-1"));
    }

    #[test]
    fn test_login_payload_field_names() {
        let payload = LoginPayload {
            csrf_token: "t",
            password: "p",
            username: "u",
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value, json!({"csrfToken": "t", "password": "p", "username": "u"}));
    }
}
