//! Whisper service: owns the shared state and drives one inline query or reveal
//! from raw input to a presentable answer.
//!
//! Constructed once at startup and shared by handle (`Arc<WhisperService>`)
//! with every request handler.

use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use chrono::Utc;
use tokio::{sync::Mutex, task::JoinHandle};

use crate::{
    audit::{AuditEvent, AuditLogger},
    config::Config,
    domain::{synthesize_recipient, AddresseeReference, Requester, ResolvedRecipient, Token, UserId},
    errors::WhisperError,
    extract::TargetExtractor,
    gate::{self, Disclosure},
    ports::{AdminNotifier, EntityLookup, PersistenceSink},
    recency::{RecencyEntry, RecencyStore},
    registry::{validate_body, DeliveryRegistry},
    results::{self, DisclosureView, InlineAnswer},
    security::QueryCooldown,
    Result,
};

/// External collaborators the service is wired with.
pub struct Collaborators {
    pub lookup: Arc<dyn EntityLookup>,
    pub sink: Arc<dyn PersistenceSink>,
    pub notifier: Option<Arc<dyn AdminNotifier>>,
}

/// Terminal state of one inline query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryOutcome {
    /// Same query repeated inside the cooldown window.
    Throttled,
    OfferRecent(Vec<RecencyEntry>),
    OfferInstructions,
    NoTarget { text: String },
    MessageRequired { reference: String },
    TooLong { len: usize, max: usize },
    Registered {
        token: Token,
        recipient: ResolvedRecipient,
        body: String,
    },
}

impl QueryOutcome {
    pub fn render(&self) -> InlineAnswer {
        match self {
            QueryOutcome::Throttled => InlineAnswer::empty(),
            QueryOutcome::OfferInstructions => InlineAnswer::single(results::instructions()),
            QueryOutcome::OfferRecent(entries) => {
                let mut views = results::quick_pick(entries);
                views.push(results::instructions());
                InlineAnswer { results: views }
            }
            QueryOutcome::NoTarget { text } => InlineAnswer::single(results::no_target(text)),
            QueryOutcome::MessageRequired { reference } => {
                InlineAnswer::single(results::message_required(reference))
            }
            QueryOutcome::TooLong { len, max } => {
                InlineAnswer::single(results::too_long(*len, *max))
            }
            QueryOutcome::Registered {
                token,
                recipient,
                body,
            } => InlineAnswer::single(results::whisper(token, recipient, body)),
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    created: AtomicU64,
    revealed: AtomicU64,
    refused: AtomicU64,
    throttled: AtomicU64,
    lookup_fallbacks: AtomicU64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ServiceStats {
    pub pending: usize,
    pub senders_with_recent: usize,
    pub created: u64,
    pub revealed: u64,
    pub refused: u64,
    pub throttled: u64,
    pub lookup_fallbacks: u64,
}

pub struct WhisperService {
    cfg: Arc<Config>,
    extractor: TargetExtractor,
    lookup: Arc<dyn EntityLookup>,
    notifier: Option<Arc<dyn AdminNotifier>>,
    recency: RecencyStore,
    registry: Mutex<DeliveryRegistry>,
    cooldown: Mutex<QueryCooldown>,
    started_users: Mutex<HashSet<UserId>>,
    audit: AuditLogger,
    counters: Counters,
}

impl WhisperService {
    pub async fn new(cfg: Arc<Config>, collaborators: Collaborators) -> Result<Self> {
        let extractor = TargetExtractor::new(&cfg.extractor)?;
        let recency = RecencyStore::load(cfg.recency_capacity, collaborators.sink).await;
        let ttl = chrono::Duration::seconds(cfg.whisper_ttl.as_secs().min(i64::MAX as u64 / 1000) as i64);

        Ok(Self {
            extractor,
            lookup: collaborators.lookup,
            notifier: collaborators.notifier,
            recency,
            registry: Mutex::new(DeliveryRegistry::new(ttl, cfg.max_pending)),
            cooldown: Mutex::new(QueryCooldown::new(cfg.query_cooldown)),
            started_users: Mutex::new(HashSet::new()),
            audit: AuditLogger::new(cfg.audit_log_path.clone(), cfg.audit_log_json),
            counters: Counters::default(),
            cfg,
        })
    }

    /// Run one inline query through extraction, validation, resolution and
    /// registration, and render the answer.
    pub async fn handle_inline_query(&self, sender: UserId, query: &str) -> InlineAnswer {
        self.process_query(sender, query).await.render()
    }

    pub async fn process_query(&self, sender: UserId, query: &str) -> QueryOutcome {
        if !self.cooldown.lock().await.check(sender, query) {
            self.counters.throttled.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(sender = sender.0, "inline query throttled");
            self.audit.record(AuditEvent::cooldown(sender));
            return QueryOutcome::Throttled;
        }

        if query.trim().is_empty() {
            // Only offer picks whose prefilled reference the extractor will accept.
            let recent: Vec<RecencyEntry> = self
                .recency
                .list_recent(sender, self.cfg.quick_pick_limit)
                .await
                .into_iter()
                .filter(|e| self.extractor.extract(&e.reference()).reference.raw().is_some())
                .collect();
            if recent.is_empty() {
                return QueryOutcome::OfferInstructions;
            }
            return QueryOutcome::OfferRecent(recent);
        }

        let extraction = self.extractor.extract(query);
        let Some(reference_text) = extraction.reference.raw() else {
            tracing::debug!(sender = sender.0, error = %WhisperError::ExtractionAmbiguous, "no target");
            return QueryOutcome::NoTarget {
                text: query.to_string(),
            };
        };

        match validate_body(&extraction.body) {
            Ok(_) => {}
            Err(WhisperError::MessageTooLong { len, max }) => {
                return QueryOutcome::TooLong { len, max };
            }
            Err(_) => {
                return QueryOutcome::MessageRequired {
                    reference: reference_text,
                };
            }
        }

        let recipient = self.resolve(&extraction.reference).await;
        let now = Utc::now();

        self.recency.record_use(sender, &recipient, now).await;

        let created = self
            .registry
            .lock()
            .await
            .create(sender, &recipient, &extraction.body, now);
        match created {
            Ok(token) => {
                self.counters.created.fetch_add(1, Ordering::Relaxed);
                self.audit.record(AuditEvent::whisper_created(
                    sender,
                    recipient.id,
                    recipient.synthesized,
                    extraction.body.chars().count(),
                ));
                QueryOutcome::Registered {
                    token,
                    recipient,
                    body: extraction.body,
                }
            }
            Err(WhisperError::MessageTooLong { len, max }) => QueryOutcome::TooLong { len, max },
            Err(_) => QueryOutcome::MessageRequired {
                reference: reference_text,
            },
        }
    }

    /// Resolve a reference, never failing: lookup errors and timeouts fall back
    /// to a synthesized recipient.
    async fn resolve(&self, reference: &AddresseeReference) -> ResolvedRecipient {
        let looked_up =
            tokio::time::timeout(self.cfg.lookup_timeout, self.lookup.resolve(reference)).await;
        let err = match looked_up {
            Ok(Ok(recipient)) => return recipient,
            Ok(Err(e)) => e,
            Err(_) => crate::errors::LookupError::Timeout,
        };

        self.counters.lookup_fallbacks.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(error = %err, "entity lookup failed, synthesizing recipient");

        synthesize_recipient(reference).unwrap_or_else(|| ResolvedRecipient {
            id: UserId(0),
            display_name: "unknown".to_string(),
            handle: None,
            synthesized: true,
        })
    }

    /// The sender actually posted the result identified by `result_id`.
    ///
    /// Refreshes the recipient in the sender's recency list and tells the
    /// operator, without the body.
    pub async fn handle_chosen_result(&self, sender: UserId, result_id: &str) {
        let record = {
            let mut reg = self.registry.lock().await;
            reg.lookup(result_id, Utc::now()).cloned()
        };
        let Some(record) = record.filter(|r| r.sender_id == sender) else {
            return;
        };

        let recipient = record.recipient();
        self.recency.record_use(sender, &recipient, Utc::now()).await;
        self.notify_admin(format!(
            "📨 Whisper sent: {} → {}{}",
            sender.0,
            recipient.display_name,
            if recipient.synthesized {
                " (unverified)"
            } else {
                ""
            }
        ));
    }

    /// Decide a reveal request. The only place access to a body is granted.
    pub async fn reveal(&self, token: &str, requester: &Requester) -> Disclosure {
        let record = {
            let mut reg = self.registry.lock().await;
            reg.lookup(token, Utc::now()).cloned()
        };
        let disclosure = gate::decide(record.as_ref(), requester);

        match &disclosure {
            Disclosure::Full { authored, .. } => {
                self.counters.revealed.fetch_add(1, Ordering::Relaxed);
                let outcome = if *authored { "authored" } else { "full" };
                self.audit
                    .record(AuditEvent::reveal(requester.id, outcome, None));
            }
            Disclosure::Refused(reason) => {
                self.counters.refused.fetch_add(1, Ordering::Relaxed);
                tracing::info!(requester = requester.id.0, reason = reason.as_str(), "reveal refused");
                self.audit.record(AuditEvent::reveal(
                    requester.id,
                    "refused",
                    Some(reason.as_str()),
                ));
            }
        }
        disclosure
    }

    pub async fn reveal_view(&self, token: &str, requester: &Requester) -> DisclosureView {
        results::disclosure(&self.reveal(token, requester).await)
    }

    /// Note a `/start`. The first one per user in this process notifies the operator.
    pub async fn note_user_started(&self, user: UserId, name: &str) {
        let first = self.started_users.lock().await.insert(user);
        if first {
            self.notify_admin(format!("👤 {name} ({}) started the bot", user.0));
        }
    }

    /// Administrative clear of pending whispers and recency lists.
    pub async fn clear(&self) -> usize {
        let dropped = self.registry.lock().await.clear();
        self.recency.clear().await;
        tracing::info!(dropped, "administrative clear");
        dropped
    }

    pub async fn purge_expired(&self) -> usize {
        let purged = self.registry.lock().await.purge_expired(Utc::now());
        self.cooldown
            .lock()
            .await
            .prune(std::time::Instant::now());
        if purged > 0 {
            tracing::debug!(purged, "expired whispers purged");
        }
        purged
    }

    /// Periodic expiry sweep. Runs until the returned handle is aborted.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(every);
            tick.tick().await;
            loop {
                tick.tick().await;
                service.purge_expired().await;
            }
        })
    }

    pub async fn stats(&self) -> ServiceStats {
        ServiceStats {
            pending: self.registry.lock().await.len(),
            senders_with_recent: self.recency.sender_count().await,
            created: self.counters.created.load(Ordering::Relaxed),
            revealed: self.counters.revealed.load(Ordering::Relaxed),
            refused: self.counters.refused.load(Ordering::Relaxed),
            throttled: self.counters.throttled.load(Ordering::Relaxed),
            lookup_fallbacks: self.counters.lookup_fallbacks.load(Ordering::Relaxed),
        }
    }

    pub fn audit(&self) -> &AuditLogger {
        &self.audit
    }

    fn notify_admin(&self, text: String) {
        let Some(notifier) = self.notifier.clone() else {
            return;
        };
        tokio::spawn(async move {
            if let Err(e) = notifier.notify(&text).await {
                tracing::warn!(error = %e, "admin notification failed");
            }
        });
    }
}
