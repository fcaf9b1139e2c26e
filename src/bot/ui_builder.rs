//! UI Builder module for creating keyboards and formatting messages

use teloxide::types::{KeyboardButton, KeyboardMarkup};
use teloxide::utils::markdown::{bold, escape};

use crate::localization::{t, t_args};
use crate::normalize::OrderRecord;

/// Maximum characters per outgoing Telegram message
pub const MAX_MESSAGE_CHARS: usize = 4000;

/// Records shown by the history command
pub const HISTORY_PREVIEW: usize = 10;

/// Menu actions reachable from the reply keyboard or slash aliases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    Start,
    ViewHistory,
    Recommend,
    UpdateData,
    TopRestaurants,
    AiRecommend,
    About,
}

impl MenuAction {
    /// Menu buttons in keyboard order, with their localization keys
    pub const BUTTONS: [(MenuAction, &'static str); 6] = [
        (MenuAction::ViewHistory, "menu-history"),
        (MenuAction::Recommend, "menu-recommend"),
        (MenuAction::UpdateData, "menu-update"),
        (MenuAction::TopRestaurants, "menu-top-restaurants"),
        (MenuAction::AiRecommend, "menu-ai"),
        (MenuAction::About, "menu-about"),
    ];

    /// Resolve button text or a slash command
    pub fn from_text(text: &str) -> Option<Self> {
        let text = text.trim();

        if let Some(command) = text.strip_prefix('/') {
            // Drop "@BotName" suffixes used in group chats
            let command = command.split('@').next().unwrap_or(command);
            return match command {
                "start" | "help" => Some(MenuAction::Start),
                "history" => Some(MenuAction::ViewHistory),
                "recommend" => Some(MenuAction::Recommend),
                "update" => Some(MenuAction::UpdateData),
                "top" => Some(MenuAction::TopRestaurants),
                "ai" => Some(MenuAction::AiRecommend),
                "about" => Some(MenuAction::About),
                _ => None,
            };
        }

        Self::BUTTONS
            .iter()
            .find(|(_, key)| t(key) == text)
            .map(|(action, _)| *action)
    }
}

/// Two-column reply keyboard with the six menu buttons
pub fn create_main_menu() -> KeyboardMarkup {
    let rows: Vec<Vec<KeyboardButton>> = MenuAction::BUTTONS
        .chunks(2)
        .map(|pair| pair.iter().map(|(_, key)| KeyboardButton::new(t(key))).collect())
        .collect();

    KeyboardMarkup::new(rows).resize_keyboard()
}

/// MarkdownV2 welcome text
pub fn format_welcome() -> String {
    format!(
        "👋 {}\n\n{}\n\n{}",
        bold(&escape(&t("welcome-title"))),
        escape(&t("welcome-description")),
        escape(&t("welcome-prompt"))
    )
}

/// Longest raw field shown in a list entry, keeping every entry within one message
const MAX_FIELD_CHARS: usize = 200;

fn clip(value: &str) -> String {
    match value.char_indices().nth(MAX_FIELD_CHARS) {
        Some((idx, _)) => format!("{}…", &value[..idx]),
        None => value.to_string(),
    }
}

/// Group complete MarkdownV2 entries into messages of at most `max_chars`
///
/// Entries are never split, so escapes and bold markers stay balanced.
pub fn pack_messages(header: String, entries: Vec<String>, max_chars: usize) -> Vec<String> {
    let mut messages = Vec::new();
    let mut current = header;

    for entry in entries {
        if !current.is_empty() && current.chars().count() + entry.chars().count() > max_chars {
            messages.push(std::mem::take(&mut current));
        }
        current.push_str(&entry);
    }

    if !current.is_empty() {
        messages.push(current);
    }
    messages
}

/// MarkdownV2 messages listing recent orders
pub fn format_order_history(records: &[OrderRecord]) -> Vec<String> {
    let header = format!("📋 {}\n\n", bold(&escape(&t("history-title"))));
    let status = escape(&t("history-status"));

    let entries = records
        .iter()
        .enumerate()
        .map(|(i, order)| {
            format!(
                "{}\\. {}\n   🍽️ {} \\({}\\)\n   📅 {} at {}\n   💰 {} TL\n   📌 {}: {}\n\n",
                i + 1,
                bold(&escape(&clip(&order.item_name))),
                escape(&clip(&order.restaurant_name)),
                escape(&clip(&order.restaurant_location)),
                escape(&clip(&order.date)),
                escape(&clip(&order.time)),
                escape(&order.price.to_string()),
                status,
                escape(&clip(&order.status))
            )
        })
        .collect();

    pack_messages(header, entries, MAX_MESSAGE_CHARS)
}

/// MarkdownV2 messages ranking restaurants
pub fn format_top_restaurants(ranking: &[(String, usize)]) -> Vec<String> {
    let header = format!("🍔 {}\n\n", bold(&escape(&t("top-title"))));

    let entries = ranking
        .iter()
        .enumerate()
        .map(|(i, (restaurant, count))| {
            format!(
                "{}\\. {}\n   {}\n\n",
                i + 1,
                bold(&escape(&clip(restaurant))),
                escape(&t_args("top-count", &[("count", (*count).into())]))
            )
        })
        .collect();

    pack_messages(header, entries, MAX_MESSAGE_CHARS)
}

/// MarkdownV2 messages with a bold title followed by a plain body
///
/// The body is cut before escaping, so a split never lands inside an escape.
pub fn format_titled(emoji: &str, title_key: &str, body: &str) -> Vec<String> {
    let header = format!("{emoji} {}\n\n", bold(&escape(&t(title_key))));
    let room = MAX_MESSAGE_CHARS.saturating_sub(header.chars().count());

    let escaped = escape(body);
    if escaped.chars().count() <= room {
        return vec![header + &escaped];
    }

    // Escaping at most doubles the length
    let mut messages: Vec<String> = chunk_text(body, room / 2)
        .iter()
        .map(|chunk| escape(chunk))
        .collect();
    if let Some(first) = messages.first_mut() {
        first.insert_str(0, &header);
    }
    messages
}

/// MarkdownV2 about text
pub fn format_about() -> Vec<String> {
    format_titled("ℹ️", "about-title", &t("about-text"))
}

/// Split text into chunks of at most `max_chars` characters
///
/// Splits at the last newline inside the window when there is one, so
/// line-level formatting stays intact; otherwise cuts at the limit.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut rest = text;

    while rest.chars().count() > max_chars {
        let limit = rest
            .char_indices()
            .nth(max_chars)
            .map(|(idx, _)| idx)
            .unwrap_or(rest.len());
        let window = &rest[..limit];

        let cut = match window.rfind('\n') {
            Some(pos) if pos > 0 => pos + 1,
            _ => limit,
        };
        chunks.push(rest[..cut].to_string());
        rest = &rest[cut..];
    }

    if !rest.is_empty() || chunks.is_empty() {
        chunks.push(rest.to_string());
    }
    chunks
}
