//! Telegram update handlers.
//!
//! Each handler is a small adapter that:
//! - turns the update into core types (sender id, requester, query text)
//! - calls into the `whisper-core` service
//! - hands the answer to the presenter or replies directly

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{CallbackQuery, ChosenInlineResult, InlineQuery, Message},
};

use crate::router::AppState;

mod callback;
mod commands;
mod inline;

pub async fn handle_inline_query(
    bot: Bot,
    q: InlineQuery,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    inline::handle_inline_query(bot, q, state).await
}

pub async fn handle_chosen_result(
    bot: Bot,
    r: ChosenInlineResult,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    inline::handle_chosen_result(bot, r, state).await
}

pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    callback::handle_callback(bot, q, state).await
}

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    if let Some(text) = msg.text() {
        if text.starts_with('/') {
            return commands::handle_command(bot, msg, state).await;
        }
    }

    // Whispers are composed inline; in private chats, point people there.
    if msg.chat.is_private() {
        commands::send_usage(&bot, msg.chat.id).await;
    }
    Ok(())
}
