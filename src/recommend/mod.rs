//! Recommendation generators
//!
//! Two interchangeable strategies share one capability:
//! - `template`: deterministic text filled from [`crate::analysis`] output
//! - `claude`: order history forwarded to the Anthropic Messages API

pub mod claude;
pub mod template;

use async_trait::async_trait;

use crate::errors::Result;
use crate::normalize::OrderRecord;

pub use claude::ClaudeRecommender;
pub use template::TemplateRecommender;

/// Turns an order history into recommendation text
#[async_trait]
pub trait RecommendationGenerator: Send + Sync {
    /// Short strategy name used in logs
    fn name(&self) -> &'static str;

    /// File name under which the front-ends save this strategy's output
    fn artifact_name(&self) -> &'static str;

    async fn generate(&self, records: &[OrderRecord]) -> Result<String>;
}
