//! External recommendation strategy
//!
//! Serializes recent orders into a prompt and asks the Anthropic Messages
//! API for a recommendation. One synchronous request per call; failures
//! surface as [`Error::ExternalService`] with status and body.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use log::{info, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::RecommendationGenerator;
use crate::config::{AppConfig, ExternalConfig};
use crate::errors::{truncate_body, Error, Result};
use crate::history::EXTERNAL_RECOMMENDATION_FILE;
use crate::normalize::OrderRecord;

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Placeholder replaced by the formatted order list
pub const HISTORY_PLACEHOLDER: &str = "{order_history}";

pub const DEFAULT_PROMPT_TEMPLATE: &str = "Here's my food order history:

{order_history}

Based on my order history, can you suggest:
1. What I might want to order today
2. A new restaurant or food type I might enjoy trying
3. What time I typically order food
4. Any patterns or preferences you notice in my ordering habits

Please be specific in your recommendations and explain your reasoning.";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

/// Format records as the bullet list embedded in the prompt
pub fn format_order_history(records: &[OrderRecord], limit: usize) -> String {
    records
        .iter()
        .take(limit)
        .map(|r| {
            format!(
                "- {} from {} ({}) ordered on {} at {} for {} TL\n",
                r.item_name, r.restaurant_name, r.restaurant_location, r.date, r.time, r.price
            )
        })
        .collect()
}

/// Substitute the order list into a prompt template
pub fn build_prompt(template: &str, records: &[OrderRecord], limit: usize) -> String {
    template.replace(HISTORY_PLACEHOLDER, &format_order_history(records, limit))
}

/// Load a prompt template, falling back to the built-in one
pub fn load_prompt_template(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(template) => template,
        Err(_) => {
            warn!("{} not found. Using default prompt.", path.display());
            DEFAULT_PROMPT_TEMPLATE.to_string()
        }
    }
}

/// Recommendation strategy backed by the Anthropic Messages API
pub struct ClaudeRecommender {
    client: Client,
    api_key: String,
    url: String,
    settings: ExternalConfig,
    prompt_template: String,
}

impl ClaudeRecommender {
    pub fn new(
        api_key: impl Into<String>,
        url: impl Into<String>,
        settings: ExternalConfig,
        prompt_template: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            url: url.into(),
            settings,
            prompt_template: prompt_template.into(),
        })
    }

    /// Build from application config; fails when no API key is configured
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let api_key = config.require_anthropic_key()?;
        Self::new(
            api_key,
            config.endpoints.messages(),
            config.external.clone(),
            load_prompt_template(&config.prompt_template_path()),
            Duration::from_secs(config.http.timeout_secs),
        )
    }

    pub fn prompt_for(&self, records: &[OrderRecord]) -> String {
        build_prompt(&self.prompt_template, records, self.settings.history_limit)
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = MessagesRequest {
            model: &self.settings.model,
            max_tokens: self.settings.max_tokens,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&self.url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::ExternalService {
                status: None,
                body: e.to_string(),
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| Error::ExternalService {
            status: Some(status.as_u16()),
            body: e.to_string(),
        })?;

        if !status.is_success() {
            return Err(Error::ExternalService {
                status: Some(status.as_u16()),
                body: truncate_body(&text),
            });
        }

        let parsed: MessagesResponse =
            serde_json::from_str(&text).map_err(|e| Error::ExternalService {
                status: Some(status.as_u16()),
                body: format!("unreadable response ({e}): {}", truncate_body(&text)),
            })?;

        parsed
            .content
            .into_iter()
            .next()
            .and_then(|block| block.text)
            .ok_or_else(|| Error::ExternalService {
                status: Some(status.as_u16()),
                body: "response contained no text content".to_string(),
            })
    }
}

#[async_trait]
impl RecommendationGenerator for ClaudeRecommender {
    fn name(&self) -> &'static str {
        "claude"
    }

    fn artifact_name(&self) -> &'static str {
        EXTERNAL_RECOMMENDATION_FILE
    }

    async fn generate(&self, records: &[OrderRecord]) -> Result<String> {
        let prompt = self.prompt_for(records);
        info!(
            "Using Claude prompt with {} orders",
            records.len().min(self.settings.history_limit)
        );
        self.complete(&prompt).await
    }
}
