//! # Configuration Module
//!
//! This module defines configuration structures for the order pipeline and
//! the chat front-end, including remote endpoints, HTTP settings, fetch
//! paging and external text-generation parameters. Values come from the
//! process environment (optionally seeded from a `.env` file).

use std::fmt;
use std::path::PathBuf;

use crate::errors::{Error, Result};

// Constants for remote endpoints
pub const DEFAULT_SITE_URL: &str = "https://tgoyemek.com";
pub const DEFAULT_API_URL: &str = "https://api.tgoapis.com";
pub const DEFAULT_ANTHROPIC_URL: &str = "https://api.anthropic.com/v1";

// Constants for request behaviour
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const DEFAULT_MAX_PAGES: u32 = 1;

// Constants for the external recommendation strategy
pub const DEFAULT_MODEL: &str = "claude-3-opus-20240229";
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
pub const DEFAULT_HISTORY_LIMIT: usize = 20;
pub const PROMPT_TEMPLATE_FILE: &str = "claude_prompt_template.txt";

/// Login credentials for the delivery site
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"********")
            .finish()
    }
}

/// Base URLs of the remote services
#[derive(Debug, Clone)]
pub struct Endpoints {
    /// Delivery website (login page and auth API)
    pub site_url: String,
    /// Orders API host
    pub api_url: String,
    /// Text-generation API base, including the version segment
    pub anthropic_url: String,
}

impl Endpoints {
    pub fn login_page(&self) -> String {
        format!("{}/giris", self.site_url.trim_end_matches('/'))
    }

    pub fn csrf(&self) -> String {
        format!("{}/api/auth/csrf", self.site_url.trim_end_matches('/'))
    }

    pub fn login(&self) -> String {
        format!("{}/api/auth/login", self.site_url.trim_end_matches('/'))
    }

    pub fn login_fallback(&self) -> String {
        format!("{}/api/auth/signin", self.site_url.trim_end_matches('/'))
    }

    pub fn orders(&self) -> String {
        format!(
            "{}/web-checkout-apicheckout-santral/orders",
            self.api_url.trim_end_matches('/')
        )
    }

    pub fn messages(&self) -> String {
        format!("{}/messages", self.anthropic_url.trim_end_matches('/'))
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            site_url: DEFAULT_SITE_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            anthropic_url: DEFAULT_ANTHROPIC_URL.to_string(),
        }
    }
}

/// HTTP client settings shared by every outbound call
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Browser user agent presented to the delivery site
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Order fetch and login behaviour
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Orders requested per page
    pub page_size: u32,
    /// Upper bound on pages walked per refresh
    pub max_pages: u32,
    /// Retry the alternate login endpoint once on the site's generic error
    pub login_fallback: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
            login_fallback: true,
        }
    }
}

/// External text-generation settings
#[derive(Debug, Clone)]
pub struct ExternalConfig {
    pub model: String,
    pub max_tokens: u32,
    /// Most recent orders included in the prompt
    pub history_limit: usize,
}

impl Default for ExternalConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Application configuration assembled from the environment
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub telegram_token: Option<String>,
    pub credentials: Option<Credentials>,
    pub anthropic_api_key: Option<String>,
    /// Directory holding the JSON, CSV and text artifacts
    pub data_dir: PathBuf,
    pub endpoints: Endpoints,
    pub http: HttpConfig,
    pub fetch: FetchConfig,
    pub external: ExternalConfig,
    pub log_format: LogFormat,
}

impl AppConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    ///
    /// Empty values are treated as absent. Unparseable numbers fall back to
    /// their defaults with a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let credentials = match (get("TGO_USERNAME"), get("TGO_PASSWORD")) {
            (Some(username), Some(password)) => Some(Credentials { username, password }),
            _ => None,
        };

        let defaults = Endpoints::default();
        let endpoints = Endpoints {
            site_url: get("TGO_SITE_URL").unwrap_or(defaults.site_url),
            api_url: get("TGO_API_URL").unwrap_or(defaults.api_url),
            anthropic_url: get("ANTHROPIC_API_URL").unwrap_or(defaults.anthropic_url),
        };

        let http = HttpConfig {
            timeout_secs: parse_or(get("HTTP_TIMEOUT_SECS"), "HTTP_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS),
            ..HttpConfig::default()
        };

        let fetch = FetchConfig {
            page_size: parse_or(get("TGO_PAGE_SIZE"), "TGO_PAGE_SIZE", DEFAULT_PAGE_SIZE).max(1),
            max_pages: parse_or(get("TGO_MAX_PAGES"), "TGO_MAX_PAGES", DEFAULT_MAX_PAGES).max(1),
            login_fallback: parse_or(get("TGO_LOGIN_FALLBACK"), "TGO_LOGIN_FALLBACK", true),
        };

        let external = ExternalConfig {
            model: get("ANTHROPIC_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: parse_or(get("ANTHROPIC_MAX_TOKENS"), "ANTHROPIC_MAX_TOKENS", DEFAULT_MAX_TOKENS),
            history_limit: DEFAULT_HISTORY_LIMIT,
        };

        let log_format = match get("LOG_FORMAT").as_deref() {
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Self {
            telegram_token: get("TELEGRAM_API_KEY"),
            credentials,
            anthropic_api_key: get("ANTHROPIC_API_KEY"),
            data_dir: get("FOOD_BOT_DATA_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from(".")),
            endpoints,
            http,
            fetch,
            external,
            log_format,
        }
    }

    pub fn require_telegram_token(&self) -> Result<&str> {
        self.telegram_token
            .as_deref()
            .ok_or_else(|| Error::MissingConfiguration("TELEGRAM_API_KEY".to_string()))
    }

    pub fn require_credentials(&self) -> Result<&Credentials> {
        self.credentials
            .as_ref()
            .ok_or_else(|| Error::MissingConfiguration("TGO_USERNAME and TGO_PASSWORD".to_string()))
    }

    pub fn require_anthropic_key(&self) -> Result<&str> {
        self.anthropic_api_key
            .as_deref()
            .ok_or_else(|| Error::MissingConfiguration("ANTHROPIC_API_KEY".to_string()))
    }

    /// Path of the optional prompt template for the external strategy
    pub fn prompt_template_path(&self) -> PathBuf {
        self.data_dir.join(PROMPT_TEMPLATE_FILE)
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, key: &str, default: T) -> T {
    match value {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            log::warn!("Ignoring invalid value for {key}: {raw}");
            default
        }),
        None => default,
    }
}
