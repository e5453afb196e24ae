//! Delivery registry: delivery token -> pending whisper.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};

use crate::{
    domain::{PendingWhisper, ResolvedRecipient, Token, UserId},
    errors::WhisperError,
    formatting::char_len,
};

/// Upper bound on a whisper body, in code points.
pub const MAX_BODY_CHARS: usize = 1000;

/// Check the body length bounds. Returns the length in code points.
pub fn validate_body(body: &str) -> Result<usize, WhisperError> {
    let len = char_len(body);
    if len == 0 {
        return Err(WhisperError::MessageEmpty);
    }
    if len > MAX_BODY_CHARS {
        return Err(WhisperError::MessageTooLong {
            len,
            max: MAX_BODY_CHARS,
        });
    }
    Ok(len)
}

/// Pending whispers keyed by token.
///
/// Records expire `ttl` after creation and the oldest records are evicted once
/// more than `max_pending` are live. Neither an expired nor an evicted token is
/// ever served again.
#[derive(Debug)]
pub struct DeliveryRegistry {
    ttl: Duration,
    max_pending: usize,
    seq: u64,
    entries: HashMap<String, PendingWhisper>,
    // Creation order, for capacity eviction. May hold tokens already removed.
    order: VecDeque<String>,
}

impl DeliveryRegistry {
    pub fn new(ttl: Duration, max_pending: usize) -> Self {
        Self {
            ttl,
            max_pending: max_pending.max(1),
            seq: 0,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// Register a whisper and return its token.
    ///
    /// The token combines sender, recipient, creation second and a process-wide
    /// sequence number, so two whispers to the same recipient within the same
    /// second still get distinct tokens.
    pub fn create(
        &mut self,
        sender: UserId,
        recipient: &ResolvedRecipient,
        body: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Token, WhisperError> {
        validate_body(body)?;

        self.seq += 1;
        let token = Token(format!(
            "{:x}-{:x}-{:x}-{:x}",
            sender.0 as u64,
            recipient.id.0 as u64,
            created_at.timestamp().max(0) as u64,
            self.seq
        ));

        let record = PendingWhisper {
            token: token.clone(),
            sender_id: sender,
            recipient_id: recipient.id,
            recipient_display_name: recipient.display_name.clone(),
            recipient_handle: recipient.handle.clone(),
            recipient_synthesized: recipient.synthesized,
            body: body.to_string(),
            created_at,
        };
        self.entries.insert(token.0.clone(), record);
        self.order.push_back(token.0.clone());
        self.evict_over_capacity();

        Ok(token)
    }

    /// O(1) lookup. Expired records are dropped on access.
    pub fn lookup(&mut self, token: &str, now: DateTime<Utc>) -> Option<&PendingWhisper> {
        let expired = self.entries.get(token).map(|r| self.is_expired(r, now))?;
        if expired {
            self.entries.remove(token);
            return None;
        }
        self.entries.get(token)
    }

    /// Drop every expired record. Returns how many were removed.
    pub fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries
            .retain(|_, r| now.signed_duration_since(r.created_at) <= ttl);
        let entries = &self.entries;
        self.order.retain(|t| entries.contains_key(t));
        before - self.entries.len()
    }

    /// Administrative clear. Returns how many records were dropped.
    pub fn clear(&mut self) -> usize {
        let n = self.entries.len();
        self.entries.clear();
        self.order.clear();
        n
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_expired(&self, record: &PendingWhisper, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(record.created_at) > self.ttl
    }

    fn evict_over_capacity(&mut self) {
        while self.entries.len() > self.max_pending {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.entries.remove(&oldest);
        }
    }
}
