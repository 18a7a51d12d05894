//! Subscriber store backed by a single JSON document on disk.

use std::path::Path;
use std::path::PathBuf;

use async_trait::async_trait;
use log::debug;
use log::info;
use serde::Deserialize;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::entity::Subscriber;
use crate::entity::SubscriberPatch;
use crate::repository::SubscriberStore;
use crate::repository::error::StoreError;
use crate::repository::patch_in_place;
use crate::repository::upsert;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct StoreData {
    #[serde(default)]
    users: Vec<Subscriber>,
}

/// Keeps the document in memory and rewrites the file after every mutation.
///
/// A mutation becomes visible in memory only after it reached the disk, so a failed write
/// leaves the subscriber exactly as it was.
pub struct JsonFileStore {
    path: PathBuf,
    data: Mutex<StoreData>,
}

impl JsonFileStore {
    /// Loads the store at `path`, creating an empty document if none exists.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let data = match tokio::fs::read_to_string(&path).await {
            Ok(content) if content.trim().is_empty() => StoreData::default(),
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Store path {} does not exist. Creating...", path.display());
                let data = StoreData::default();
                write_atomically(&path, &data).await?;
                info!("Created {}", path.display());
                data
            }
            Err(e) => return Err(StoreError::io(&path, e)),
        };
        info!(
            "Loaded {} subscriber(s) from {}.",
            data.users.len(),
            path.display()
        );

        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Runs `mutate` on a copy of the document, persists it, then commits it in memory.
    ///
    /// A `None` from `mutate` means nothing changed: the copy is dropped and the file is
    /// not touched.
    async fn mutate<T>(
        &self,
        mutate: impl FnOnce(&mut StoreData) -> Option<T>,
    ) -> Result<Option<T>, StoreError> {
        let mut data = self.data.lock().await;
        let mut next = data.clone();
        let Some(ret) = mutate(&mut next) else {
            return Ok(None);
        };
        write_atomically(&self.path, &next).await?;
        *data = next;
        Ok(Some(ret))
    }
}

async fn write_atomically(path: &Path, data: &StoreData) -> Result<(), StoreError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| StoreError::io(parent, e))?;
    }
    let content = serde_json::to_string_pretty(data)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, content)
        .await
        .map_err(|e| StoreError::io(&tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| StoreError::io(path, e))?;
    Ok(())
}

#[async_trait]
impl SubscriberStore for JsonFileStore {
    async fn list(&self) -> Result<Vec<Subscriber>, StoreError> {
        Ok(self.data.lock().await.users.clone())
    }

    async fn get(&self, id: &str) -> Result<Option<Subscriber>, StoreError> {
        Ok(self
            .data
            .lock()
            .await
            .users
            .iter()
            .find(|s| s.id == id)
            .cloned())
    }

    async fn insert(&self, subscriber: Subscriber) -> Result<String, StoreError> {
        let id = self
            .mutate(|data| Some(upsert(&mut data.users, subscriber)))
            .await?;
        Ok(id.unwrap_or_default())
    }

    async fn update(&self, id: &str, patch: &SubscriberPatch) -> Result<bool, StoreError> {
        let updated = self
            .mutate(|data| patch_in_place(&mut data.users, id, patch).then_some(()))
            .await?;
        Ok(updated.is_some())
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let deleted = self
            .mutate(|data| {
                let before = data.users.len();
                data.users.retain(|s| s.id != id);
                (data.users.len() != before).then_some(())
            })
            .await?;
        Ok(deleted.is_some())
    }
}
