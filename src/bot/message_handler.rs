//! Message Handler module for processing incoming Telegram messages

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, ParseMode};
use tracing::{debug, error, info, warn};

use crate::analysis::top_restaurants;
use crate::errors::Error;
use crate::localization::{t, t_args};
use crate::normalize::OrderRecord;
use crate::pipeline::{refresh_orders, RefreshObserver, RefreshStage};
use crate::recommend::RecommendationGenerator;

use super::context::BotContext;
use super::ui_builder::{
    create_main_menu, format_about, format_order_history, format_titled, format_top_restaurants,
    format_welcome, MenuAction, HISTORY_PREVIEW,
};

/// Restaurants listed by the top restaurants command
const TOP_RESTAURANTS: usize = 5;

/// Send prepared MarkdownV2 messages in order
async fn send_markdown(bot: &Bot, chat_id: ChatId, messages: Vec<String>) -> Result<()> {
    for message in messages {
        bot.send_message(chat_id, message)
            .parse_mode(ParseMode::MarkdownV2)
            .await?;
    }
    Ok(())
}

/// Load records, answering the chat when history is missing or unreadable
async fn load_records(
    bot: &Bot,
    chat_id: ChatId,
    ctx: &BotContext,
    limit: usize,
) -> Result<Option<Vec<OrderRecord>>> {
    match ctx.store.read_records_limited(limit) {
        Ok(records) => Ok(Some(records)),
        Err(Error::MissingHistory { path }) => {
            debug!(chat_id = %chat_id, path = %path.display(), "No order history on disk");
            bot.send_message(chat_id, t("history-missing")).await?;
            Ok(None)
        }
        Err(e) => {
            error!(chat_id = %chat_id, error = %e, "Failed to read order history");
            bot.send_message(chat_id, t("history-read-error")).await?;
            Ok(None)
        }
    }
}

async fn send_welcome(bot: &Bot, chat_id: ChatId) -> Result<()> {
    bot.send_message(chat_id, format_welcome())
        .parse_mode(ParseMode::MarkdownV2)
        .reply_markup(create_main_menu())
        .await?;
    Ok(())
}

async fn show_order_history(bot: &Bot, chat_id: ChatId, ctx: &BotContext) -> Result<()> {
    let Some(records) = load_records(bot, chat_id, ctx, HISTORY_PREVIEW).await? else {
        return Ok(());
    };

    if records.is_empty() {
        bot.send_message(chat_id, t("history-empty")).await?;
        return Ok(());
    }

    send_markdown(bot, chat_id, format_order_history(&records)).await
}

async fn send_template_recommendation(bot: &Bot, chat_id: ChatId, ctx: &BotContext) -> Result<()> {
    let Some(records) = load_records(bot, chat_id, ctx, usize::MAX).await? else {
        return Ok(());
    };

    bot.send_chat_action(chat_id, ChatAction::Typing).await?;

    let generator = &ctx.template;
    let recommendation = generator.generate(&records).await?;
    save_recommendation(ctx, generator.as_ref(), &recommendation);

    send_markdown(
        bot,
        chat_id,
        format_titled("🔮", "recommend-title", &recommendation),
    )
    .await
}

async fn send_ai_recommendation(bot: &Bot, chat_id: ChatId, ctx: &BotContext) -> Result<()> {
    if !ctx.store.has_history() {
        bot.send_message(chat_id, t("history-missing")).await?;
        return Ok(());
    }

    let Some(generator) = ctx.external.as_ref() else {
        bot.send_message(chat_id, t("ai-missing-key")).await?;
        return Ok(());
    };

    bot.send_chat_action(chat_id, ChatAction::Typing).await?;
    let processing = bot.send_message(chat_id, t("ai-processing")).await?;

    let Some(records) = load_records(bot, chat_id, ctx, usize::MAX).await? else {
        return Ok(());
    };

    match generator.generate(&records).await {
        Ok(recommendation) => {
            let saved = save_recommendation(ctx, generator.as_ref(), &recommendation);

            if let Err(e) = bot.delete_message(chat_id, processing.id).await {
                warn!(chat_id = %chat_id, error = %e, "Failed to delete processing message");
            }

            send_markdown(bot, chat_id, format_titled("🤖", "ai-title", &recommendation)).await?;

            if let Some(file) = saved {
                bot.send_message(chat_id, t_args("ai-saved", &[("file", file.into())]))
                    .await?;
            }
        }
        Err(e) => {
            error!(chat_id = %chat_id, error = %e, "AI recommendation failed");
            bot.edit_message_text(chat_id, processing.id, t("ai-failed"))
                .await?;
        }
    }

    Ok(())
}

/// Save generated text next to the other artifacts, returning its file name
fn save_recommendation(
    ctx: &BotContext,
    generator: &dyn RecommendationGenerator,
    text: &str,
) -> Option<String> {
    match ctx.store.save_recommendation(generator.artifact_name(), text) {
        Ok(path) => {
            info!(strategy = generator.name(), path = %path.display(), "Recommendation saved");
            Some(generator.artifact_name().to_string())
        }
        Err(e) => {
            warn!(strategy = generator.name(), error = %e, "Failed to save recommendation");
            None
        }
    }
}

/// Posts refresh progress into the chat
struct ChatObserver {
    bot: Bot,
    chat_id: ChatId,
}

#[async_trait]
impl RefreshObserver for ChatObserver {
    async fn on_stage(&self, stage: RefreshStage) {
        let text = match stage {
            RefreshStage::LoggingIn => t("update-logging-in"),
            RefreshStage::TokenObtained => t("update-token-obtained"),
            RefreshStage::LoggedIn => t("update-logged-in"),
            RefreshStage::Fetched { orders } => t_args(
                "update-fetched",
                &[
                    ("count", orders.into()),
                    ("file", crate::history::ORDERS_JSON_FILE.into()),
                ],
            ),
            RefreshStage::Saved { csv_path, .. } => t_args(
                "update-complete",
                &[("file", csv_path.display().to_string().into())],
            ),
        };

        if let Err(e) = self.bot.send_message(self.chat_id, text).await {
            warn!(chat_id = %self.chat_id, error = %e, "Failed to send progress message");
        }
    }
}

async fn update_order_data(bot: &Bot, chat_id: ChatId, ctx: &BotContext) -> Result<()> {
    bot.send_message(chat_id, t("update-start")).await?;
    bot.send_chat_action(chat_id, ChatAction::Typing).await?;
    bot.send_message(chat_id, t("update-fetching")).await?;

    let observer = ChatObserver {
        bot: bot.clone(),
        chat_id,
    };

    match refresh_orders(&ctx.config, &ctx.store, &observer).await {
        Ok(report) => {
            info!(chat_id = %chat_id, records = report.records.len(), "Order data refreshed");
        }
        Err(e) => {
            error!(chat_id = %chat_id, error = %e, "Order data refresh failed");
            let text = match &e {
                Error::Token { .. } => t("update-token-failed"),
                Error::Credential { .. } => t("update-login-failed"),
                Error::Fetch { .. } => t("update-fetch-failed"),
                Error::MissingConfiguration(_) => t("update-missing-credentials"),
                other => t_args("update-failed", &[("error", other.to_string().into())]),
            };
            bot.send_message(chat_id, text).await?;
        }
    }

    Ok(())
}

async fn show_top_restaurants(bot: &Bot, chat_id: ChatId, ctx: &BotContext) -> Result<()> {
    let Some(records) = load_records(bot, chat_id, ctx, usize::MAX).await? else {
        return Ok(());
    };

    let ranking = top_restaurants(&records, TOP_RESTAURANTS);
    if ranking.is_empty() {
        bot.send_message(chat_id, t("top-empty")).await?;
        return Ok(());
    }

    send_markdown(bot, chat_id, format_top_restaurants(&ranking)).await
}

async fn send_about(bot: &Bot, chat_id: ChatId) -> Result<()> {
    send_markdown(bot, chat_id, format_about()).await
}

pub async fn message_handler(bot: Bot, msg: Message, ctx: Arc<BotContext>) -> Result<()> {
    let chat_id = msg.chat.id;

    let Some(text) = msg.text() else {
        debug!(chat_id = %chat_id, "Ignoring non-text message");
        return Ok(());
    };

    let action = MenuAction::from_text(text);
    debug!(chat_id = %chat_id, action = ?action, "Received text message");

    match action {
        Some(MenuAction::Start) => send_welcome(&bot, chat_id).await?,
        Some(MenuAction::ViewHistory) => show_order_history(&bot, chat_id, &ctx).await?,
        Some(MenuAction::Recommend) => send_template_recommendation(&bot, chat_id, &ctx).await?,
        Some(MenuAction::UpdateData) => update_order_data(&bot, chat_id, &ctx).await?,
        Some(MenuAction::TopRestaurants) => show_top_restaurants(&bot, chat_id, &ctx).await?,
        Some(MenuAction::AiRecommend) => send_ai_recommendation(&bot, chat_id, &ctx).await?,
        Some(MenuAction::About) => send_about(&bot, chat_id).await?,
        None => {
            bot.send_message(chat_id, t("unknown-command"))
                .reply_markup(create_main_menu())
                .await?;
        }
    }

    Ok(())
}
