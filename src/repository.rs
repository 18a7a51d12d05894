//! Subscriber persistence.
//!
//! The monitor only lists, reads and updates subscribers. Inserting and deleting belong to
//! the management side and are exposed here so both sides share one store.

use async_trait::async_trait;

use crate::entity::Subscriber;
use crate::entity::SubscriberPatch;
use crate::repository::error::StoreError;

pub mod error;
pub mod json_store;
pub mod memory_store;
pub mod postgres_store;

pub use json_store::JsonFileStore;
pub use memory_store::MemoryStore;
pub use postgres_store::PostgresStore;

/// Durable mapping of subscriber records.
#[async_trait]
pub trait SubscriberStore: Send + Sync {
    /// Returns a snapshot of every subscriber, in insertion order.
    async fn list(&self) -> Result<Vec<Subscriber>, StoreError>;

    async fn get(&self, id: &str) -> Result<Option<Subscriber>, StoreError>;

    /// Stores a subscriber and returns its id.
    ///
    /// An empty id is replaced with a generated one. An existing subscriber watching the
    /// same category for the same subject is replaced.
    async fn insert(&self, subscriber: Subscriber) -> Result<String, StoreError>;

    /// Applies `patch` to the subscriber with `id`. Returns `false` when no such
    /// subscriber exists.
    async fn update(&self, id: &str, patch: &SubscriberPatch) -> Result<bool, StoreError>;

    /// Returns `false` when no such subscriber exists.
    async fn delete(&self, id: &str) -> Result<bool, StoreError>;
}

/// Inserts `subscriber` into `subscribers`, replacing any record for the same subject and
/// category. Returns the stored id.
pub(crate) fn upsert(subscribers: &mut Vec<Subscriber>, mut subscriber: Subscriber) -> String {
    if subscriber.id.is_empty() {
        subscriber.id = uuid::Uuid::new_v4().to_string();
    }
    subscribers.retain(|s| {
        !(s.subject_key == subscriber.subject_key && s.watch_category == subscriber.watch_category)
    });
    let id = subscriber.id.clone();
    subscribers.push(subscriber);
    id
}

/// Applies `patch` in place. Returns `false` when `id` is unknown.
pub(crate) fn patch_in_place(
    subscribers: &mut [Subscriber],
    id: &str,
    patch: &SubscriberPatch,
) -> bool {
    match subscribers.iter_mut().find(|s| s.id == id) {
        Some(subscriber) => {
            patch.apply(subscriber);
            true
        }
        None => false,
    }
}
