//! Bot module for handling Telegram interactions
//!
//! This module is split into several submodules:
//! - `context`: Shared configuration, storage and recommendation strategies
//! - `message_handler`: Dispatches menu buttons and slash commands
//! - `ui_builder`: Creates the reply keyboard and formats messages

pub mod context;
pub mod message_handler;
pub mod ui_builder;

// Re-export main handler pieces for use in main.rs
pub use context::BotContext;
pub use message_handler::message_handler;

pub use ui_builder::{chunk_text, create_main_menu, MenuAction};
