//! Non-persistent store kept entirely in memory.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::entity::Subscriber;
use crate::entity::SubscriberPatch;
use crate::repository::SubscriberStore;
use crate::repository::error::StoreError;
use crate::repository::patch_in_place;
use crate::repository::upsert;

#[derive(Default)]
pub struct MemoryStore {
    subscribers: RwLock<Vec<Subscriber>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_subscribers(subscribers: Vec<Subscriber>) -> Self {
        Self {
            subscribers: RwLock::new(subscribers),
        }
    }
}

#[async_trait]
impl SubscriberStore for MemoryStore {
    async fn list(&self) -> Result<Vec<Subscriber>, StoreError> {
        Ok(self.subscribers.read().await.clone())
    }

    async fn get(&self, id: &str) -> Result<Option<Subscriber>, StoreError> {
        Ok(self
            .subscribers
            .read()
            .await
            .iter()
            .find(|s| s.id == id)
            .cloned())
    }

    async fn insert(&self, subscriber: Subscriber) -> Result<String, StoreError> {
        Ok(upsert(&mut *self.subscribers.write().await, subscriber))
    }

    async fn update(&self, id: &str, patch: &SubscriberPatch) -> Result<bool, StoreError> {
        Ok(patch_in_place(
            &mut self.subscribers.write().await,
            id,
            patch,
        ))
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let mut subscribers = self.subscribers.write().await;
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        Ok(subscribers.len() != before)
    }
}
