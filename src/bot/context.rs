//! Shared state handed to every handler

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::AppConfig;
use crate::history::OrderStore;
use crate::recommend::{ClaudeRecommender, RecommendationGenerator, TemplateRecommender};

/// Everything a handler needs, built once at startup
pub struct BotContext {
    pub config: AppConfig,
    pub store: OrderStore,
    pub template: Arc<dyn RecommendationGenerator>,
    /// Absent when no Anthropic API key is configured
    pub external: Option<Arc<dyn RecommendationGenerator>>,
}

impl BotContext {
    pub fn new(
        config: AppConfig,
        template: Arc<dyn RecommendationGenerator>,
        external: Option<Arc<dyn RecommendationGenerator>>,
    ) -> Self {
        let store = OrderStore::new(config.data_dir.clone());
        Self {
            config,
            store,
            template,
            external,
        }
    }

    /// Build the context with the default strategies for this configuration
    pub fn from_config(config: AppConfig) -> Self {
        let template: Arc<dyn RecommendationGenerator> = Arc::new(TemplateRecommender::new());

        let external: Option<Arc<dyn RecommendationGenerator>> =
            match ClaudeRecommender::from_config(&config) {
                Ok(recommender) => Some(Arc::new(recommender)),
                Err(e) => {
                    warn!(error = %e, "AI recommendations disabled");
                    None
                }
            };

        if !OrderStore::new(config.data_dir.clone()).has_history() {
            info!("Order data not found. You may need to update order data when the bot starts.");
        }

        Self::new(config, template, external)
    }
}
