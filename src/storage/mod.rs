//! Episode store: the upload records the feed is built from.
//!
//! The store is owned by the upload pipeline; the feed publisher only reads
//! it through [`EpisodeStore`]. Two backends are provided:
//!
//! - [`Database`] - the shared SQLite `uploads` table
//! - [`MemoryStore`] - an in-process map

mod memory;
mod schema;
mod types;
mod uploads;

use async_trait::async_trait;

pub use memory::MemoryStore;
pub use schema::Database;
pub use types::{StoreError, UploadRecord, UploadStatus};

/// Read access to upload records.
#[async_trait]
pub trait EpisodeStore: Send + Sync {
    /// Look up a single upload. `Ok(None)` when the id is unknown.
    async fn get_upload(&self, id: &str) -> Result<Option<UploadRecord>, StoreError>;

    /// Every upload, newest `created_at` first.
    async fn get_all_uploads(&self) -> Result<Vec<UploadRecord>, StoreError>;
}
