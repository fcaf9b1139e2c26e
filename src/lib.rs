//! # Food Recommendation Bot
//!
//! Pulls a customer's order history from TGO Yemek, keeps it as a raw JSON
//! document plus a CSV summary, and turns it into food suggestions either
//! from built-in templates or from the Anthropic Messages API. A Telegram
//! bot and a small CLI sit on top of the same pipeline.

pub mod analysis;
pub mod bot;
pub mod config;
pub mod errors;
pub mod history;
pub mod localization;
pub mod normalize;
pub mod orders;
pub mod pipeline;
pub mod recommend;
pub mod session;

pub use errors::{Error, Result};
