//! Per-sender list of recently addressed recipients, offered as quick picks.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::{
    domain::{ResolvedRecipient, UserId, SYNTHETIC_ID_BASE},
    ports::PersistenceSink,
};

/// Default bound on entries per sender.
pub const DEFAULT_CAPACITY: usize = 10;

/// Synthesized entries touched this recently are treated as keystrokes of the
/// handle being typed.
const TYPING_WINDOW_SECS: i64 = 60;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecencyEntry {
    pub recipient_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    pub display_name: String,
    pub last_used_at: DateTime<Utc>,
}

impl RecencyEntry {
    /// Text that addresses this recipient in a new query: `@handle` or the id.
    pub fn reference(&self) -> String {
        self.handle
            .as_ref()
            .map(|h| format!("@{h}"))
            .unwrap_or_else(|| self.recipient_id.0.to_string())
    }

    fn is_partial_of(&self, handle: &str, now: DateTime<Utc>) -> bool {
        let Some(own) = &self.handle else {
            return false;
        };
        self.recipient_id.0 >= SYNTHETIC_ID_BASE
            && own.len() < handle.len()
            && handle
                .get(..own.len())
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case(own))
            && now.signed_duration_since(self.last_used_at).num_seconds() < TYPING_WINDOW_SECS
    }
}

/// Recency lists of every sender, as persisted.
pub type RecencySnapshot = BTreeMap<UserId, Vec<RecencyEntry>>;

#[derive(Debug)]
pub struct RecencyCache {
    capacity: usize,
    lists: HashMap<UserId, Vec<RecencyEntry>>,
}

impl RecencyCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            lists: HashMap::new(),
        }
    }

    /// Rebuild from a snapshot, trimming lists that exceed the bound.
    pub fn from_snapshot(capacity: usize, snapshot: RecencySnapshot) -> Self {
        let mut cache = Self::new(capacity);
        for (sender, mut entries) in snapshot {
            entries.sort_by(|a, b| b.last_used_at.cmp(&a.last_used_at));
            let mut seen = std::collections::HashSet::new();
            entries.retain(|e| seen.insert(e.recipient_id));
            entries.truncate(cache.capacity);
            if !entries.is_empty() {
                cache.lists.insert(sender, entries);
            }
        }
        cache
    }

    /// Upsert `recipient` in the sender's list, stamping it with `now`.
    ///
    /// When the list grows past capacity, the entry with the oldest `last_used_at`
    /// goes. The entry just touched is never the one evicted.
    pub fn record_use(&mut self, sender: UserId, recipient: &ResolvedRecipient, now: DateTime<Utc>) {
        let list = self.lists.entry(sender).or_default();

        // Inline queries arrive per keystroke: `@ali`, `@alic`, `@alice` each
        // synthesize a recipient. The longer handle supersedes the recent shorter ones.
        if let Some(handle) = &recipient.handle {
            list.retain(|e| !e.is_partial_of(handle, now));
        }

        match list.iter_mut().find(|e| e.recipient_id == recipient.id) {
            Some(entry) => {
                entry.last_used_at = now;
                entry.display_name = recipient.display_name.clone();
                if recipient.handle.is_some() {
                    entry.handle = recipient.handle.clone();
                }
            }
            None => list.push(RecencyEntry {
                recipient_id: recipient.id,
                handle: recipient.handle.clone(),
                display_name: recipient.display_name.clone(),
                last_used_at: now,
            }),
        }

        while list.len() > self.capacity {
            let oldest = list
                .iter()
                .enumerate()
                .filter(|(_, e)| e.recipient_id != recipient.id)
                .min_by_key(|(_, e)| e.last_used_at)
                .map(|(idx, _)| idx);
            match oldest {
                Some(idx) => {
                    list.remove(idx);
                }
                None => break,
            }
        }
    }

    /// Most-recent-first view of a sender's list, at most `limit` long.
    ///
    /// Calling it again restarts from the most recent entry.
    pub fn list_recent(
        &self,
        sender: UserId,
        limit: usize,
    ) -> impl Iterator<Item = &RecencyEntry> + '_ {
        let mut refs: Vec<&RecencyEntry> = self
            .lists
            .get(&sender)
            .map(|l| l.iter().collect())
            .unwrap_or_default();
        refs.sort_by(|a, b| b.last_used_at.cmp(&a.last_used_at));
        refs.into_iter().take(limit)
    }

    pub fn len_for(&self, sender: UserId) -> usize {
        self.lists.get(&sender).map(Vec::len).unwrap_or(0)
    }

    pub fn sender_count(&self) -> usize {
        self.lists.len()
    }

    pub fn clear(&mut self) {
        self.lists.clear();
    }

    pub fn snapshot(&self) -> RecencySnapshot {
        self.lists
            .iter()
            .map(|(k, v)| (*k, v.clone()))
            .collect()
    }
}

#[derive(Debug)]
struct Inner {
    cache: RecencyCache,
    version: u64,
}

/// Shared recency cache that flushes to a `PersistenceSink` after every change.
///
/// Flushes are best-effort: a failed save is logged and the in-memory state stays
/// authoritative. Snapshots are written in version order, so a slow flush never
/// overwrites a newer one.
pub struct RecencyStore {
    inner: Mutex<Inner>,
    sink: Arc<dyn PersistenceSink>,
    flushed: Mutex<u64>,
}

impl RecencyStore {
    /// Load persisted lists; a failed load starts empty.
    pub async fn load(capacity: usize, sink: Arc<dyn PersistenceSink>) -> Self {
        let cache = match sink.load_recency().await {
            Ok(snapshot) => RecencyCache::from_snapshot(capacity, snapshot),
            Err(e) => {
                tracing::warn!(error = %e, "failed to load recency, starting empty");
                RecencyCache::new(capacity)
            }
        };
        tracing::info!(senders = cache.sender_count(), "recency loaded");

        Self {
            inner: Mutex::new(Inner { cache, version: 0 }),
            sink,
            flushed: Mutex::new(0),
        }
    }

    pub async fn record_use(&self, sender: UserId, recipient: &ResolvedRecipient, now: DateTime<Utc>) {
        let (version, snapshot) = {
            let mut inner = self.inner.lock().await;
            inner.cache.record_use(sender, recipient, now);
            inner.version += 1;
            (inner.version, inner.cache.snapshot())
        };
        self.flush(version, snapshot).await;
    }

    pub async fn list_recent(&self, sender: UserId, limit: usize) -> Vec<RecencyEntry> {
        let inner = self.inner.lock().await;
        inner.cache.list_recent(sender, limit).cloned().collect()
    }

    pub async fn sender_count(&self) -> usize {
        self.inner.lock().await.cache.sender_count()
    }

    /// Administrative clear of every sender's list.
    pub async fn clear(&self) {
        let (version, snapshot) = {
            let mut inner = self.inner.lock().await;
            inner.cache.clear();
            inner.version += 1;
            (inner.version, inner.cache.snapshot())
        };
        self.flush(version, snapshot).await;
    }

    async fn flush(&self, version: u64, snapshot: RecencySnapshot) {
        let mut flushed = self.flushed.lock().await;
        if version <= *flushed {
            return;
        }
        match self.sink.save_recency(&snapshot).await {
            Ok(()) => *flushed = version,
            Err(e) => tracing::warn!(error = %e, "recency flush failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{errors::Error, Result};
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn recipient(id: i64) -> ResolvedRecipient {
        ResolvedRecipient {
            id: UserId(id),
            display_name: format!("user{id}"),
            handle: Some(format!("user_{id}")),
            synthesized: false,
        }
    }

    #[test]
    fn bound_is_never_exceeded_and_oldest_goes() {
        let mut cache = RecencyCache::new(DEFAULT_CAPACITY);
        let sender = UserId(1);
        let t0 = Utc::now();

        for i in 0..25 {
            cache.record_use(sender, &recipient(100 + i), t0 + Duration::seconds(i));
            assert!(cache.len_for(sender) <= DEFAULT_CAPACITY);
        }

        let ids: Vec<i64> = cache
            .list_recent(sender, 100)
            .map(|e| e.recipient_id.0)
            .collect();
        assert_eq!(ids, (115..125).rev().collect::<Vec<_>>());
    }

    #[test]
    fn newest_survives_eviction_even_with_equal_timestamps() {
        let mut cache = RecencyCache::new(3);
        let sender = UserId(1);
        let now = Utc::now();
        for i in 0..3 {
            cache.record_use(sender, &recipient(i), now);
        }
        cache.record_use(sender, &recipient(42), now);
        assert_eq!(cache.len_for(sender), 3);
        assert!(cache.list_recent(sender, 10).any(|e| e.recipient_id == UserId(42)));
    }

    #[test]
    fn repeat_use_updates_instead_of_duplicating() {
        let mut cache = RecencyCache::new(DEFAULT_CAPACITY);
        let sender = UserId(1);
        let t0 = Utc::now();
        cache.record_use(sender, &recipient(2), t0);
        cache.record_use(sender, &recipient(3), t0 + Duration::seconds(1));
        cache.record_use(sender, &recipient(2), t0 + Duration::seconds(2));

        let recent: Vec<&RecencyEntry> = cache.list_recent(sender, 10).collect();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].recipient_id, UserId(2));
        assert_eq!(recent[0].last_used_at, t0 + Duration::seconds(2));
    }

    #[test]
    fn lists_are_sender_scoped_and_limited() {
        let mut cache = RecencyCache::new(DEFAULT_CAPACITY);
        let now = Utc::now();
        cache.record_use(UserId(1), &recipient(2), now);
        cache.record_use(UserId(1), &recipient(3), now + Duration::seconds(1));
        cache.record_use(UserId(9), &recipient(4), now);

        assert_eq!(cache.list_recent(UserId(1), 1).count(), 1);
        assert_eq!(cache.list_recent(UserId(9), 10).count(), 1);
        assert_eq!(cache.list_recent(UserId(5), 10).count(), 0);
    }

    #[test]
    fn snapshot_reload_trims_to_capacity() {
        let mut cache = RecencyCache::new(10);
        let now = Utc::now();
        for i in 0..10 {
            cache.record_use(UserId(1), &recipient(i), now + Duration::seconds(i));
        }
        let reloaded = RecencyCache::from_snapshot(4, cache.snapshot());
        let ids: Vec<i64> = reloaded
            .list_recent(UserId(1), 10)
            .map(|e| e.recipient_id.0)
            .collect();
        assert_eq!(ids, vec![9, 8, 7, 6]);
    }

    fn synthesized(handle: &str) -> ResolvedRecipient {
        crate::domain::synthesize_recipient(&crate::domain::AddresseeReference::Handle(
            handle.to_string(),
        ))
        .unwrap()
    }

    #[test]
    fn typed_handle_supersedes_its_recent_prefixes() {
        let mut cache = RecencyCache::new(DEFAULT_CAPACITY);
        let sender = UserId(1);
        let t0 = Utc::now();
        for (i, h) in ["some_f", "some_fr", "some_fri", "Some_Friend"].iter().enumerate() {
            cache.record_use(sender, &synthesized(h), t0 + Duration::seconds(i as i64));
        }
        let handles: Vec<String> = cache
            .list_recent(sender, 10)
            .filter_map(|e| e.handle.clone())
            .collect();
        assert_eq!(handles, vec!["Some_Friend".to_string()]);
    }

    #[test]
    fn old_or_confirmed_prefixes_are_kept() {
        let mut cache = RecencyCache::new(DEFAULT_CAPACITY);
        let sender = UserId(1);
        let t0 = Utc::now();
        cache.record_use(sender, &synthesized("alice"), t0 - Duration::minutes(10));
        cache.record_use(
            sender,
            &ResolvedRecipient {
                handle: Some("alice_b".to_string()),
                ..recipient(7)
            },
            t0,
        );
        cache.record_use(sender, &synthesized("alice_bob"), t0 + Duration::minutes(10));
        // `alice` is stale and `alice_b` is a confirmed user; both stay.
        assert_eq!(cache.len_for(sender), 3);
    }

    #[test]
    fn entry_reference_prefers_the_handle() {
        let mut cache = RecencyCache::new(DEFAULT_CAPACITY);
        let now = Utc::now();
        cache.record_use(UserId(1), &recipient(5), now);
        cache.record_use(
            UserId(1),
            &ResolvedRecipient {
                handle: None,
                ..recipient(12345678)
            },
            now + Duration::seconds(1),
        );
        let refs: Vec<String> = cache.list_recent(UserId(1), 10).map(|e| e.reference()).collect();
        assert_eq!(refs, vec!["12345678".to_string(), "@user_5".to_string()]);
    }

    #[derive(Default)]
    struct FakeSink {
        saves: AtomicUsize,
        fail: AtomicBool,
        last: std::sync::Mutex<Option<RecencySnapshot>>,
    }

    #[async_trait]
    impl PersistenceSink for FakeSink {
        async fn load_recency(&self) -> Result<RecencySnapshot> {
            Err(Error::External("no file".to_string()))
        }

        async fn save_recency(&self, snapshot: &RecencySnapshot) -> Result<()> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(Error::External("disk full".to_string()));
            }
            *self.last.lock().unwrap() = Some(snapshot.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn store_flushes_on_every_use() {
        let sink = Arc::new(FakeSink::default());
        let store = RecencyStore::load(DEFAULT_CAPACITY, sink.clone()).await;

        store.record_use(UserId(1), &recipient(2), Utc::now()).await;
        store.record_use(UserId(1), &recipient(3), Utc::now()).await;

        assert_eq!(sink.saves.load(Ordering::SeqCst), 2);
        let last = sink.last.lock().unwrap().clone().unwrap();
        assert_eq!(last[&UserId(1)].len(), 2);
    }

    #[tokio::test]
    async fn failed_flush_keeps_memory_state() {
        let sink = Arc::new(FakeSink::default());
        sink.fail.store(true, Ordering::SeqCst);
        let store = RecencyStore::load(DEFAULT_CAPACITY, sink.clone()).await;

        store.record_use(UserId(1), &recipient(2), Utc::now()).await;
        assert_eq!(store.list_recent(UserId(1), 10).await.len(), 1);

        store.clear().await;
        assert!(store.list_recent(UserId(1), 10).await.is_empty());
    }

    #[tokio::test]
    async fn concurrent_uses_respect_the_bound() {
        let sink = Arc::new(FakeSink::default());
        let store = Arc::new(RecencyStore::load(3, sink).await);

        let mut handles = Vec::new();
        for i in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.record_use(UserId(1), &recipient(i), Utc::now()).await;
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(store.list_recent(UserId(1), 100).await.len(), 3);
    }
}
