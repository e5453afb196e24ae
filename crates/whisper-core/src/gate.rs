//! Disclosure gate: the single access-control decision of the bot.
//!
//! Inputs are only the stored record and the authenticated requester. Nothing
//! carried in callback data other than the token participates in the decision.

use crate::domain::{same_handle, PendingWhisper, Requester, Token};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefusalReason {
    NotFoundOrExpired,
    NotAuthorized,
}

impl RefusalReason {
    pub fn as_str(self) -> &'static str {
        match self {
            RefusalReason::NotFoundOrExpired => "not_found_or_expired",
            RefusalReason::NotAuthorized => "not_authorized",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Disclosure {
    Full {
        token: Token,
        body: String,
        /// The requester wrote this whisper (and is not its recipient).
        authored: bool,
        recipient_display_name: String,
    },
    Refused(RefusalReason),
}

impl Disclosure {
    pub fn is_full(&self) -> bool {
        matches!(self, Disclosure::Full { .. })
    }
}

/// Decide what `requester` may see of `record`.
///
/// | requester                    | outcome                   |
/// |------------------------------|---------------------------|
/// | recipient                    | full, `authored = false`  |
/// | sender (and not recipient)   | full, `authored = true`   |
/// | anyone, record missing       | refused, not found        |
/// | anyone else                  | refused, not authorized   |
pub fn decide(record: Option<&PendingWhisper>, requester: &Requester) -> Disclosure {
    let Some(record) = record else {
        return Disclosure::Refused(RefusalReason::NotFoundOrExpired);
    };

    let full = |authored| Disclosure::Full {
        token: record.token.clone(),
        body: record.body.clone(),
        authored,
        recipient_display_name: record.recipient_display_name.clone(),
    };

    if is_recipient(record, requester) {
        return full(false);
    }
    if requester.id == record.sender_id {
        return full(true);
    }
    Disclosure::Refused(RefusalReason::NotAuthorized)
}

fn is_recipient(record: &PendingWhisper, requester: &Requester) -> bool {
    if requester.id == record.recipient_id {
        return true;
    }
    // A recipient synthesized from a handle has no real id; the authenticated
    // username is the only identity we can bind it to.
    if !record.recipient_synthesized {
        return false;
    }
    match (&record.recipient_handle, &requester.handle) {
        (Some(expected), Some(actual)) => same_handle(expected, actual),
        _ => false,
    }
}
