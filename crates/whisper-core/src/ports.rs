use async_trait::async_trait;

use crate::{
    domain::{AddresseeReference, ResolvedRecipient},
    errors::LookupError,
    recency::RecencySnapshot,
    results::{DisclosureView, InlineAnswer},
    Result,
};

/// Resolves a textual reference to a platform identity.
///
/// Implementations should not retry internally; the service bounds the wait and
/// falls back to a synthesized recipient on any failure.
#[async_trait]
pub trait EntityLookup: Send + Sync {
    async fn resolve(
        &self,
        reference: &AddresseeReference,
    ) -> std::result::Result<ResolvedRecipient, LookupError>;
}

/// Durable home of the recency lists.
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    async fn load_recency(&self) -> Result<RecencySnapshot>;
    async fn save_recency(&self, snapshot: &RecencySnapshot) -> Result<()>;
}

/// Renders inline results and disclosure answers on the chat platform.
#[async_trait]
pub trait ResultPresenter: Send + Sync {
    async fn present_results(&self, query_id: &str, answer: InlineAnswer) -> Result<()>;
    async fn present_disclosure(&self, callback_id: &str, view: &DisclosureView) -> Result<()>;
}

/// Optional operator channel. Fire-and-forget: failures are logged by the caller.
#[async_trait]
pub trait AdminNotifier: Send + Sync {
    async fn notify(&self, text: &str) -> Result<()>;
}
