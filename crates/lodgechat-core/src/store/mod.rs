mod local;
mod remote;

pub use local::LocalCacheStore;
pub use remote::RemoteStore;

use crate::error::Result;
use crate::model::{ChatSession, Feedback};
use uuid::Uuid;

/// Abstract session store. The local cache and the remote account store are the
/// two implementations; the reconciler holds one of each and picks per session
/// based on its origin tag and the current authentication state.
pub trait SessionStore: Send + Sync {
    /// All sessions in this store. No ordering guarantee.
    fn list(&self) -> impl std::future::Future<Output = Result<Vec<ChatSession>>> + Send;

    fn get(&self, id: Uuid) -> impl std::future::Future<Output = Result<ChatSession>> + Send;

    /// Idempotent upsert keyed by `session_id`: saving the same session twice
    /// replaces the earlier entry, it never appends a duplicate.
    fn save(&self, session: &ChatSession) -> impl std::future::Future<Output = Result<()>> + Send;

    fn delete(&self, id: Uuid) -> impl std::future::Future<Output = Result<()>> + Send;

    fn rename(
        &self,
        id: Uuid,
        title: &str,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    fn set_feedback(
        &self,
        session_id: Uuid,
        message_id: i64,
        value: Feedback,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Remove every session. Only the local cache supports this wholesale.
    fn clear(&self) -> impl std::future::Future<Output = Result<()>> + Send;
}
