//! Telegram adapter (teloxide).
//!
//! Implements the `whisper-core` ports over the Telegram Bot API: entity lookup
//! via `getChat`, inline results and callback answers, and operator messages.

use std::time::Duration;

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{
        Chat, InlineKeyboardButton, InlineKeyboardMarkup, InlineQueryResult,
        InlineQueryResultArticle, InputMessageContent, InputMessageContentText, ParseMode,
        Recipient,
    },
};

use tokio::time::sleep;

pub mod handlers;
pub mod router;

use whisper_core::{
    domain::{AddresseeReference, ResolvedRecipient, Token, UserId},
    errors::{Error, LookupError},
    formatting::char_len,
    ports::{AdminNotifier, EntityLookup, ResultPresenter},
    results::{DisclosureView, InlineAnswer, InlineResultView, ResultAction},
    Result,
};

/// Longest text Telegram shows in a callback alert.
pub const ALERT_MAX_CHARS: usize = 200;

const REVEAL_CALLBACK_PREFIX: &str = "r:";
const REVEAL_START_PREFIX: &str = "r_";

/// Callback data of a reveal button.
pub fn reveal_callback_data(token: &Token) -> String {
    format!("{REVEAL_CALLBACK_PREFIX}{token}")
}

pub fn parse_reveal_callback(data: &str) -> Option<&str> {
    data.strip_prefix(REVEAL_CALLBACK_PREFIX)
        .filter(|t| !t.is_empty())
}

/// `/start` payload that reveals a whisper in the private chat with the bot.
pub fn reveal_start_payload(token: &Token) -> String {
    format!("{REVEAL_START_PREFIX}{token}")
}

pub fn parse_reveal_start(payload: &str) -> Option<&str> {
    payload
        .trim()
        .strip_prefix(REVEAL_START_PREFIX)
        .filter(|t| !t.is_empty())
}

fn map_err(e: teloxide::RequestError) -> Error {
    Error::External(format!("telegram error: {e}"))
}

/// Wait requested by a 429 answer, if that is what `e` is.
fn retry_delay(e: &teloxide::RequestError) -> Option<Duration> {
    match e {
        teloxide::RequestError::RetryAfter(secs) => Some(secs.duration()),
        _ => None,
    }
}

async fn with_retry<T, Fut>(mut op: impl FnMut() -> Fut) -> Result<T>
where
    Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
    Fut::IntoFuture: Send,
{
    const MAX_RETRIES: usize = 1;
    let mut attempts = 0usize;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) => match retry_delay(&e) {
                Some(delay) if attempts < MAX_RETRIES => {
                    attempts += 1;
                    sleep(delay).await;
                }
                _ => return Err(map_err(e)),
            },
        }
    }
}

// ============== Entity Lookup ==============

/// Resolves handles and numeric ids with `getChat`.
///
/// Only private chats count as recipients. No retries here: the service bounds
/// the wait and falls back on any failure.
#[derive(Clone)]
pub struct TelegramLookup {
    bot: Bot,
}

impl TelegramLookup {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl EntityLookup for TelegramLookup {
    async fn resolve(
        &self,
        reference: &AddresseeReference,
    ) -> std::result::Result<ResolvedRecipient, LookupError> {
        let target = match reference {
            AddresseeReference::Handle(h) => Recipient::ChannelUsername(format!("@{h}")),
            AddresseeReference::NumericId(n) => Recipient::Id(teloxide::types::ChatId(*n)),
            AddresseeReference::Unresolved => return Err(LookupError::InvalidFormat),
        };

        let chat = self.bot.get_chat(target).await.map_err(lookup_error)?;
        if !chat.is_private() {
            return Err(LookupError::NotFound);
        }
        Ok(recipient_from_chat(&chat))
    }
}

fn lookup_error(e: teloxide::RequestError) -> LookupError {
    match e {
        teloxide::RequestError::RetryAfter(_) => LookupError::RateLimited,
        teloxide::RequestError::Api(api) => {
            let msg = api.to_string().to_lowercase();
            if msg.contains("invalid") {
                LookupError::InvalidFormat
            } else {
                LookupError::NotFound
            }
        }
        other => LookupError::Unavailable(other.to_string()),
    }
}

fn recipient_from_chat(chat: &Chat) -> ResolvedRecipient {
    let full_name = [chat.first_name(), chat.last_name()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
    let handle = chat.username().map(|s| s.to_string());
    let display_name = if !full_name.trim().is_empty() {
        full_name
    } else if let Some(h) = &handle {
        format!("@{h}")
    } else {
        chat.id.0.to_string()
    };

    ResolvedRecipient {
        id: UserId(chat.id.0),
        display_name,
        handle,
        synthesized: false,
    }
}

// ============== Result Presenter ==============

#[derive(Clone)]
pub struct TelegramPresenter {
    bot: Bot,
    bot_username: String,
}

impl TelegramPresenter {
    pub fn new(bot: Bot, bot_username: impl Into<String>) -> Self {
        Self {
            bot,
            bot_username: bot_username.into(),
        }
    }

    /// `t.me` link that opens the private chat and sends `/start r_<token>`.
    pub fn reveal_link(&self, token: &Token) -> Result<url::Url> {
        let raw = format!(
            "https://t.me/{}?start={}",
            self.bot_username,
            reveal_start_payload(token)
        );
        url::Url::parse(&raw).map_err(|e| Error::External(format!("bad reveal link: {e}")))
    }
}

fn article(view: InlineResultView) -> InlineQueryResult {
    let content = InputMessageContent::Text(
        InputMessageContentText::new(view.body_html).parse_mode(ParseMode::Html),
    );
    let article =
        InlineQueryResultArticle::new(view.id, view.title, content).description(view.description);

    let button = match view.action {
        ResultAction::None => None,
        ResultAction::Reveal(token) => Some(InlineKeyboardButton::callback(
            "🔓 Show message",
            reveal_callback_data(&token),
        )),
        ResultAction::Prefill(query) => Some(
            InlineKeyboardButton::switch_inline_query_current_chat("✏️ Try again", query),
        ),
    };

    match button {
        Some(b) => InlineQueryResult::Article(
            article.reply_markup(InlineKeyboardMarkup::new(vec![vec![b]])),
        ),
        None => InlineQueryResult::Article(article),
    }
}

#[async_trait]
impl ResultPresenter for TelegramPresenter {
    async fn present_results(&self, query_id: &str, answer: InlineAnswer) -> Result<()> {
        let results: Vec<InlineQueryResult> = answer.results.into_iter().map(article).collect();
        with_retry(|| {
            self.bot
                .answer_inline_query(query_id.to_string(), results.clone())
                .cache_time(0)
                .is_personal(true)
        })
        .await?;
        Ok(())
    }

    async fn present_disclosure(&self, callback_id: &str, view: &DisclosureView) -> Result<()> {
        // Too long for an alert: send the reader to the private chat instead.
        if char_len(&view.text) > ALERT_MAX_CHARS {
            if let Some(token) = &view.token {
                let link = self.reveal_link(token)?;
                with_retry(|| {
                    self.bot
                        .answer_callback_query(callback_id.to_string())
                        .url(link.clone())
                })
                .await?;
                return Ok(());
            }
        }

        with_retry(|| {
            self.bot
                .answer_callback_query(callback_id.to_string())
                .text(view.text.clone())
                .show_alert(view.alert)
        })
        .await?;
        Ok(())
    }
}

// ============== Admin Notifier ==============

#[derive(Clone)]
pub struct TelegramNotifier {
    bot: Bot,
    chat_id: teloxide::types::ChatId,
}

impl TelegramNotifier {
    pub fn new(bot: Bot, chat_id: i64) -> Self {
        Self {
            bot,
            chat_id: teloxide::types::ChatId(chat_id),
        }
    }
}

#[async_trait]
impl AdminNotifier for TelegramNotifier {
    async fn notify(&self, text: &str) -> Result<()> {
        with_retry(|| self.bot.send_message(self.chat_id, text.to_string()))
            .await?;
        Ok(())
    }
}
