use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::types::{StoreError, UploadRecord, UploadStatus};
use super::EpisodeStore;

/// In-process episode store.
///
/// Useful when the upload pipeline runs in the same process and already holds
/// its records in memory, and as a lightweight backend for tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    uploads: RwLock<HashMap<String, UploadRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an upload by id.
    pub async fn insert(&self, upload: UploadRecord) {
        self.uploads.write().await.insert(upload.id.clone(), upload);
    }

    /// Update the status of an upload. Returns `false` if the id is unknown.
    pub async fn set_status(&self, id: &str, status: UploadStatus) -> bool {
        match self.uploads.write().await.get_mut(id) {
            Some(upload) => {
                upload.status = status;
                true
            }
            None => false,
        }
    }

    /// Remove an upload, returning it if present.
    pub async fn remove(&self, id: &str) -> Option<UploadRecord> {
        self.uploads.write().await.remove(id)
    }
}

#[async_trait]
impl EpisodeStore for MemoryStore {
    async fn get_upload(&self, id: &str) -> Result<Option<UploadRecord>, StoreError> {
        Ok(self.uploads.read().await.get(id).cloned())
    }

    async fn get_all_uploads(&self) -> Result<Vec<UploadRecord>, StoreError> {
        let mut uploads: Vec<UploadRecord> = self.uploads.read().await.values().cloned().collect();
        uploads.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(uploads)
    }
}
