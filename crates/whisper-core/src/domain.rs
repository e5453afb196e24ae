use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Telegram user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

/// Opaque delivery token binding a reveal button to one pending whisper.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Token(pub String);

impl Token {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Addressee found in free text by the target extractor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AddresseeReference {
    /// Username without the `@` sigil, as typed.
    Handle(String),
    NumericId(i64),
    Unresolved,
}

impl AddresseeReference {
    /// Textual form used for display names and stable id synthesis.
    pub fn raw(&self) -> Option<String> {
        match self {
            AddresseeReference::Handle(h) => Some(format!("@{h}")),
            AddresseeReference::NumericId(n) => Some(n.to_string()),
            AddresseeReference::Unresolved => None,
        }
    }
}

/// Recipient of a whisper, either confirmed by an entity lookup or synthesized
/// from the textual reference when the lookup failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedRecipient {
    pub id: UserId,
    pub display_name: String,
    pub handle: Option<String>,
    pub synthesized: bool,
}

/// Identity of whoever pressed a reveal button, taken from the authenticated update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Requester {
    pub id: UserId,
    pub handle: Option<String>,
}

impl Requester {
    pub fn new(id: i64, handle: Option<String>) -> Self {
        Self {
            id: UserId(id),
            handle,
        }
    }
}

/// A composed whisper waiting to be revealed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingWhisper {
    pub token: Token,
    pub sender_id: UserId,
    pub recipient_id: UserId,
    pub recipient_display_name: String,
    pub recipient_handle: Option<String>,
    pub recipient_synthesized: bool,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl PendingWhisper {
    /// Recipient as it was resolved when the whisper was composed.
    pub fn recipient(&self) -> ResolvedRecipient {
        ResolvedRecipient {
            id: self.recipient_id,
            display_name: self.recipient_display_name.clone(),
            handle: self.recipient_handle.clone(),
            synthesized: self.recipient_synthesized,
        }
    }
}

/// Case-insensitive username comparison, ignoring a leading `@`.
pub fn same_handle(a: &str, b: &str) -> bool {
    a.trim_start_matches('@')
        .eq_ignore_ascii_case(b.trim_start_matches('@'))
}

/// Synthesized ids live at and above this value, far outside real user ids.
pub const SYNTHETIC_ID_BASE: i64 = 1 << 62;

/// Best-effort recipient for a reference the entity lookup could not confirm.
///
/// A numeric reference keeps its number as the id. A handle maps to a stable id
/// derived from a SHA-256 of its lowercase form, so every query naming the same
/// handle lands on the same recipient.
pub fn synthesize_recipient(reference: &AddresseeReference) -> Option<ResolvedRecipient> {
    use sha2::{Digest, Sha256};

    match reference {
        AddresseeReference::Handle(h) => {
            let digest = Sha256::digest(h.to_lowercase().as_bytes());
            let mut prefix = [0u8; 8];
            prefix.copy_from_slice(&digest[..8]);
            let low = (u64::from_be_bytes(prefix) as i64) & (SYNTHETIC_ID_BASE - 1);
            Some(ResolvedRecipient {
                id: UserId(SYNTHETIC_ID_BASE | low),
                display_name: format!("@{h}"),
                handle: Some(h.clone()),
                synthesized: true,
            })
        }
        AddresseeReference::NumericId(n) => Some(ResolvedRecipient {
            id: UserId(*n),
            display_name: n.to_string(),
            handle: None,
            synthesized: true,
        }),
        AddresseeReference::Unresolved => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthesized_handle_ids_are_stable_and_case_insensitive() {
        let a = synthesize_recipient(&AddresseeReference::Handle("Shribots".to_string())).unwrap();
        let b = synthesize_recipient(&AddresseeReference::Handle("shribots".to_string())).unwrap();
        assert_eq!(a.id, b.id);
        assert!(a.id.0 >= SYNTHETIC_ID_BASE);
        assert!(a.synthesized);
        assert_eq!(a.display_name, "@Shribots");

        let c = synthesize_recipient(&AddresseeReference::Handle("other_one".to_string())).unwrap();
        assert_ne!(a.id, c.id);
    }

    #[test]
    fn synthesized_numeric_keeps_the_number() {
        let r = synthesize_recipient(&AddresseeReference::NumericId(81726354)).unwrap();
        assert_eq!(r.id, UserId(81726354));
        assert_eq!(r.display_name, "81726354");
        assert!(synthesize_recipient(&AddresseeReference::Unresolved).is_none());
    }

    #[test]
    fn handles_compare_without_case_or_sigil() {
        assert!(same_handle("@Bob_One", "bob_one"));
        assert!(!same_handle("bob_one", "bob_two"));
    }
}
