//! Presentation-neutral views of what the bot answers.
//!
//! The service builds these; a `ResultPresenter` turns them into platform calls.

use crate::{
    domain::{ResolvedRecipient, Token},
    formatting::{escape_html, preview},
    gate::Disclosure,
    recency::RecencyEntry,
};

const DESCRIPTION_PREVIEW: usize = 60;

const REFUSAL_TEXT: &str = "🚫 This whisper is not available to you.";

/// What pressing or picking a result does.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResultAction {
    None,
    /// Attach a reveal button carrying the delivery token.
    Reveal(Token),
    /// Attach a button that puts this text back into the inline query box.
    Prefill(String),
}

/// One selectable inline result: title/description/body plus an action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineResultView {
    pub id: String,
    pub title: String,
    pub description: String,
    /// HTML sent to the chat when the result is picked. Never contains a whisper body.
    pub body_html: String,
    pub action: ResultAction,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InlineAnswer {
    pub results: Vec<InlineResultView>,
}

impl InlineAnswer {
    /// Answer with no results (used while a sender is cooling down).
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn single(view: InlineResultView) -> Self {
        Self {
            results: vec![view],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Text answered to whoever pressed a reveal button.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DisclosureView {
    pub text: String,
    pub alert: bool,
    /// Set when the text is a disclosure, so adapters can route long text elsewhere.
    pub token: Option<Token>,
}

pub fn instructions() -> InlineResultView {
    InlineResultView {
        id: "instructions".to_string(),
        title: "How to send a whisper".to_string(),
        description: "Type your message, then @username or a user id".to_string(),
        body_html: usage_html(),
        action: ResultAction::None,
    }
}

/// Usage text shared by the empty-query result and `/start` / `/help`.
pub fn usage_html() -> String {
    [
        "🤫 <b>Whispers</b>",
        "",
        "In any chat, type my username followed by your message and the recipient:",
        "<code>@bot see you at noon @username</code>",
        "<code>@bot see you at noon 123456789</code>",
        "",
        "Only you and the recipient can open the whisper.",
    ]
    .join("\n")
}

pub fn quick_pick(entries: &[RecencyEntry]) -> Vec<InlineResultView> {
    entries
        .iter()
        .enumerate()
        .map(|(idx, e)| {
            let reference = e.reference();
            InlineResultView {
                id: format!("recent-{idx}"),
                title: format!("Whisper to {}", e.display_name),
                description: reference.clone(),
                body_html: usage_html(),
                action: ResultAction::Prefill(format!("{reference} ")),
            }
        })
        .collect()
}

/// No addressee in the query. The typed text comes back as a retry suggestion.
pub fn no_target(text: &str) -> InlineResultView {
    InlineResultView {
        id: "no-target".to_string(),
        title: "No recipient found".to_string(),
        description: format!(
            "Add @username or a user id: {}",
            preview(text, DESCRIPTION_PREVIEW)
        ),
        body_html: usage_html(),
        action: ResultAction::Prefill(text.to_string()),
    }
}

pub fn message_required(reference: &str) -> InlineResultView {
    InlineResultView {
        id: "message-required".to_string(),
        title: format!("Whisper to {reference}"),
        description: "Type a message to send".to_string(),
        body_html: usage_html(),
        action: ResultAction::Prefill(format!("{reference} ")),
    }
}

pub fn too_long(len: usize, max: usize) -> InlineResultView {
    InlineResultView {
        id: "too-long".to_string(),
        title: "Message is too long".to_string(),
        description: format!("{len} characters, the limit is {max}"),
        body_html: usage_html(),
        action: ResultAction::None,
    }
}

pub fn whisper(token: &Token, recipient: &ResolvedRecipient, body: &str) -> InlineResultView {
    let name = &recipient.display_name;
    let mut description = format!("{} · only {name} can open it", preview(body, 30));
    if recipient.synthesized {
        description.push_str(" (unverified)");
    }
    InlineResultView {
        id: token.to_string(),
        title: format!("🔒 Whisper to {name}"),
        description,
        body_html: format!(
            "🔒 A whisper for <b>{}</b>. Only they can open it.",
            escape_html(name)
        ),
        action: ResultAction::Reveal(token.clone()),
    }
}

pub fn disclosure(d: &Disclosure) -> DisclosureView {
    match d {
        Disclosure::Full {
            token,
            body,
            authored: false,
            ..
        } => DisclosureView {
            text: body.clone(),
            alert: true,
            token: Some(token.clone()),
        },
        Disclosure::Full {
            token,
            body,
            authored: true,
            recipient_display_name,
        } => DisclosureView {
            text: format!("✉️ You sent this to {recipient_display_name}:\n\n{body}"),
            alert: true,
            token: Some(token.clone()),
        },
        // One text for every refusal, so it never tells whether the token is live.
        Disclosure::Refused(_) => DisclosureView {
            text: REFUSAL_TEXT.to_string(),
            alert: true,
            token: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{domain::UserId, gate::RefusalReason};

    #[test]
    fn whisper_result_never_puts_body_in_the_chat_message() {
        let token = Token("t1".to_string());
        let recipient = ResolvedRecipient {
            id: UserId(5),
            display_name: "<Ann>".to_string(),
            handle: None,
            synthesized: true,
        };
        let view = whisper(&token, &recipient, "the secret");
        assert!(!view.body_html.contains("the secret"));
        assert!(view.body_html.contains("&lt;Ann&gt;"));
        assert!(view.description.ends_with("(unverified)"));
        assert_eq!(view.action, ResultAction::Reveal(token));
    }

    #[test]
    fn no_target_keeps_typed_text_for_retry() {
        let view = no_target("hello world");
        assert_eq!(view.action, ResultAction::Prefill("hello world".to_string()));
        assert!(!view.body_html.contains("hello world"));
    }

    #[test]
    fn refusals_read_the_same_whatever_the_reason() {
        let unauthorized = disclosure(&Disclosure::Refused(RefusalReason::NotAuthorized));
        let missing = disclosure(&Disclosure::Refused(RefusalReason::NotFoundOrExpired));
        assert_eq!(unauthorized, missing);
    }

    #[test]
    fn refusal_carries_no_body_or_token() {
        let view = disclosure(&Disclosure::Refused(RefusalReason::NotAuthorized));
        assert!(view.token.is_none());
        assert!(view.alert);
    }
}
