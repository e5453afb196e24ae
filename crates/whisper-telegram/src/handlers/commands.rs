use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{ChatId, ParseMode},
};

use teloxide::requests::Requester as _;

use whisper_core::{
    audit::AuditEvent,
    domain::{Requester, UserId},
    results::usage_html,
    security::is_admin,
    service::ServiceStats,
};

use crate::parse_reveal_start;
use crate::router::AppState;

fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

fn format_stats(s: &ServiceStats) -> String {
    [
        "📊 <b>Whisper stats</b>".to_string(),
        String::new(),
        format!("Pending: {}", s.pending),
        format!("Senders with recents: {}", s.senders_with_recent),
        format!("Created: {}", s.created),
        format!("Revealed: {}", s.revealed),
        format!("Refused: {}", s.refused),
        format!("Throttled: {}", s.throttled),
        format!("Lookup fallbacks: {}", s.lookup_fallbacks),
    ]
    .join("\n")
}

pub(super) async fn send_usage(bot: &Bot, chat_id: ChatId) {
    if let Err(e) = bot
        .send_message(chat_id, usage_html())
        .parse_mode(ParseMode::Html)
        .await
    {
        tracing::warn!(chat_id = chat_id.0, error = %e, "failed to send usage");
    }
}

async fn reply_html(bot: &Bot, chat_id: ChatId, html: String) {
    let _ = bot
        .send_message(chat_id, html)
        .parse_mode(ParseMode::Html)
        .await;
}

pub async fn handle_command(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let user_id = UserId(user.id.0 as i64);
    let chat_id = msg.chat.id;
    let (cmd, args) = parse_command(msg.text().unwrap_or(""));

    match cmd.as_str() {
        "start" => {
            // Deep link from an alert that could not hold the whole whisper.
            if let Some(token) = parse_reveal_start(&args) {
                if !msg.chat.is_private() {
                    return Ok(());
                }
                let requester = Requester::new(user_id.0, user.username.clone());
                let view = state.service.reveal_view(token, &requester).await;
                // Plain text: bodies are user input and never parsed as markup.
                let _ = bot.send_message(chat_id, view.text).await;
                return Ok(());
            }

            state
                .service
                .note_user_started(user_id, &user.full_name())
                .await;
            send_usage(&bot, chat_id).await;
        }
        "help" => send_usage(&bot, chat_id).await,
        "stats" => {
            let authorized = is_admin(Some(user_id), &state.cfg.admin_users);
            state
                .service
                .audit()
                .record(AuditEvent::admin(user_id, "stats", authorized));
            if !authorized {
                return Ok(());
            }
            let stats = state.service.stats().await;
            reply_html(&bot, chat_id, format_stats(&stats)).await;
        }
        "clear" => {
            let authorized = is_admin(Some(user_id), &state.cfg.admin_users);
            state
                .service
                .audit()
                .record(AuditEvent::admin(user_id, "clear", authorized));
            if !authorized {
                return Ok(());
            }
            let dropped = state.service.clear().await;
            reply_html(
                &bot,
                chat_id,
                format!("🧹 Cleared {dropped} pending whispers and all recent recipients."),
            )
            .await;
        }
        _ => {
            if msg.chat.is_private() {
                send_usage(&bot, chat_id).await;
            }
        }
    }

    Ok(())
}
