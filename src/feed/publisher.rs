//! Feed publisher: the single writer of the published document and the archive.
//!
//! The published document is also the record of which entries are active.
//! Every add reads it back, prepends the new entry, applies the capacity rule
//! and writes the result before moving the overflow into the archive.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::archive::ArchiveStore;
use super::capacity::{partition, Partition};
use super::entry::{derive_entry_id, FeedEntry};
use super::error::FeedError;
use super::urls::FeedUrls;
use super::validate::{validate_document, FeedValidation};
use super::xml::{parse_feed_entries, render_feed};
use crate::config::Channel;
use crate::storage::{EpisodeStore, UploadRecord, UploadStatus};
use crate::util::atomic_write;

/// Resolved locations and metadata for one feed.
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub feed_path: PathBuf,
    pub archive_path: PathBuf,
    /// Capacity of the published document
    pub max_active: usize,
    pub urls: FeedUrls,
    pub channel: Channel,
}

/// Result of [`FeedPublisher::add_episode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// The entry was published; `archived` older entries were evicted
    Added { active: usize, archived: usize },
    /// The upload is not audio and never belongs in the feed
    Ineligible,
    /// The episode is already active or archived
    Duplicate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegenerateSummary {
    pub active: usize,
    /// Archive size after reconciliation
    pub archived: usize,
    pub newly_archived: usize,
    /// Archived entries dropped because they are active again
    pub unarchived: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedStats {
    pub total_episodes: usize,
    pub active_episodes: usize,
    pub archived_episodes: usize,
    pub oldest_active_episode: Option<DateTime<Utc>>,
    pub newest_active_episode: Option<DateTime<Utc>>,
}

pub struct FeedPublisher {
    config: PublisherConfig,
    store: Arc<dyn EpisodeStore>,
    archive: ArchiveStore,
    /// Held across every read-modify-write of the document and archive
    write_lock: Mutex<()>,
}

impl FeedPublisher {
    /// Create a publisher, creating the feed directory if needed.
    pub fn open(config: PublisherConfig, store: Arc<dyn EpisodeStore>) -> Result<Self, FeedError> {
        for path in [&config.feed_path, &config.archive_path] {
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir).map_err(|source| FeedError::Write {
                    path: dir.to_path_buf(),
                    source,
                })?;
            }
        }

        let archive = ArchiveStore::new(config.archive_path.clone());
        Ok(Self {
            config,
            store,
            archive,
            write_lock: Mutex::new(()),
        })
    }

    pub fn feed_path(&self) -> &Path {
        &self.config.feed_path
    }

    pub fn archive_path(&self) -> &Path {
        self.archive.path()
    }

    /// Public URL of the feed document.
    pub fn get_feed_url(&self) -> String {
        self.config.urls.feed_url()
    }

    /// Publish the upload `upload_id` at the head of the feed.
    pub async fn add_episode(&self, upload_id: &str) -> Result<AddOutcome, FeedError> {
        let upload = self
            .store
            .get_upload(upload_id)
            .await?
            .ok_or_else(|| FeedError::NotFound(upload_id.to_string()))?;

        let Some(entry) = FeedEntry::from_upload(&upload) else {
            tracing::debug!(upload_id, mime_type = %upload.mime_type, "Upload is not audio, skipping");
            return Ok(AddOutcome::Ineligible);
        };

        let _guard = self.write_lock.lock().await;
        self.insert_entry(entry).await
    }

    /// Prepend, partition, write, archive. Caller holds `write_lock`.
    async fn insert_entry(&self, entry: FeedEntry) -> Result<AddOutcome, FeedError> {
        let existing = self.read_active().await?;
        let archived = self.archive.list_all();

        if existing
            .iter()
            .chain(archived.iter())
            .any(|e| e.guid == entry.guid)
        {
            tracing::debug!(guid = %entry.guid, "Episode already published, skipping");
            return Ok(AddOutcome::Duplicate);
        }

        let guid = entry.guid.clone();
        let mut candidates = Vec::with_capacity(existing.len() + 1);
        candidates.push(entry);
        candidates.extend(existing);

        let Partition { active, archived: overflow } =
            partition(candidates, self.config.max_active);

        self.write_document(&active)?;

        if let Err(e) = self.archive.append(&overflow) {
            tracing::error!(
                path = %self.archive.path().display(),
                evicted = overflow.len(),
                error = %e,
                "Feed written but archive update failed; regenerate to reconcile"
            );
            return Err(e);
        }

        tracing::info!(
            guid = %guid,
            active = active.len(),
            archived = overflow.len(),
            "Episode published"
        );
        Ok(AddOutcome::Added {
            active: active.len(),
            archived: overflow.len(),
        })
    }

    /// Rebuild the feed from the episode store's completed audio uploads.
    ///
    /// Archived entries that become active again are dropped from the
    /// archive, and the overflow is archived. Running it twice in a row
    /// changes nothing but the channel build date.
    pub async fn regenerate_feed(&self) -> Result<RegenerateSummary, FeedError> {
        let _guard = self.write_lock.lock().await;

        let uploads = self.store.get_all_uploads().await?;
        let mut entries: Vec<FeedEntry> = uploads
            .iter()
            .filter(|u| u.status == UploadStatus::Completed)
            .filter_map(FeedEntry::from_upload)
            .collect();
        // stable, so equal dates keep the store's order
        entries.sort_by(|a, b| b.pub_date.cmp(&a.pub_date));

        let Partition { active, archived: overflow } =
            partition(entries, self.config.max_active);
        self.write_document(&active)?;

        let active_guids: HashSet<&str> = active.iter().map(|e| e.guid.as_str()).collect();
        let current = self.archive.list_all();
        let mut reconciled: Vec<FeedEntry> = current
            .iter()
            .filter(|e| !active_guids.contains(e.guid.as_str()))
            .cloned()
            .collect();
        let unarchived = current.len() - reconciled.len();

        let mut known: HashSet<String> = reconciled.iter().map(|e| e.guid.clone()).collect();
        let mut newly_archived = 0;
        for entry in overflow {
            if known.insert(entry.guid.clone()) {
                reconciled.push(entry);
                newly_archived += 1;
            }
        }

        if unarchived > 0 || newly_archived > 0 {
            if let Err(e) = self.archive.replace_all(&reconciled) {
                tracing::error!(
                    path = %self.archive.path().display(),
                    error = %e,
                    "Feed regenerated but archive reconciliation failed"
                );
                return Err(e);
            }
        }

        tracing::info!(
            active = active.len(),
            archived = reconciled.len(),
            newly_archived,
            unarchived,
            "Feed regenerated"
        );
        Ok(RegenerateSummary {
            active: active.len(),
            archived: reconciled.len(),
            newly_archived,
            unarchived,
        })
    }

    /// Move the archived entry `entry_id` back to the head of the feed.
    ///
    /// Returns `false`, with nothing changed, when no archived entry has that
    /// id. At capacity this evicts the oldest active entry in turn.
    pub async fn restore_episode_from_archive(&self, entry_id: u32) -> Result<bool, FeedError> {
        let _guard = self.write_lock.lock().await;

        let Some(archived) = self.archive.restore(entry_id)? else {
            tracing::debug!(entry_id, "No archived episode with this id");
            return Ok(false);
        };

        match self.reinsert(&archived).await {
            Ok(outcome) => {
                tracing::info!(entry_id, guid = %archived.guid, ?outcome, "Episode restored from archive");
                Ok(true)
            }
            Err(e) => {
                if let Err(put_back) = self.archive.append(std::slice::from_ref(&archived)) {
                    tracing::error!(
                        entry_id,
                        guid = %archived.guid,
                        error = %put_back,
                        "Failed to return episode to archive after failed restore"
                    );
                }
                Err(e)
            }
        }
    }

    /// Prefer a fresh mapping of the source upload; fall back to the archived copy.
    async fn reinsert(&self, archived: &FeedEntry) -> Result<AddOutcome, FeedError> {
        let fresh = match archived.upload_id() {
            Some(upload_id) => self
                .store
                .get_upload(upload_id)
                .await?
                .and_then(|upload| FeedEntry::from_upload(&upload)),
            None => None,
        };

        let entry = fresh.unwrap_or_else(|| {
            tracing::debug!(guid = %archived.guid, "Source upload gone, restoring archived entry as is");
            archived.clone()
        });
        self.insert_entry(entry).await
    }

    /// Counts and date range, read fresh from the document and the archive.
    pub async fn get_feed_stats(&self) -> Result<FeedStats, FeedError> {
        let active = self.read_active().await?;
        let archived = self.archive.list_all();

        Ok(FeedStats {
            total_episodes: active.len() + archived.len(),
            active_episodes: active.len(),
            archived_episodes: archived.len(),
            oldest_active_episode: active.iter().map(|e| e.pub_date).min(),
            newest_active_episode: active.iter().map(|e| e.pub_date).max(),
        })
    }

    pub fn get_archived_episodes_list(&self) -> Vec<FeedEntry> {
        self.archive.list_all()
    }

    /// The audio upload whose entry id is `entry_id`, for serving enclosures.
    pub async fn find_upload_for_entry(
        &self,
        entry_id: u32,
    ) -> Result<Option<UploadRecord>, FeedError> {
        let uploads = self.store.get_all_uploads().await?;
        Ok(uploads
            .into_iter()
            .find(|u| u.is_audio() && derive_entry_id(&u.id) == entry_id))
    }

    /// Check the published document with a standard feed parser.
    pub async fn validate_feed(&self) -> Result<FeedValidation, FeedError> {
        let bytes = tokio::fs::read(&self.config.feed_path)
            .await
            .map_err(|source| FeedError::Read {
                path: self.config.feed_path.clone(),
                source,
            })?;
        validate_document(&bytes)
    }

    /// Active entries as published; no document yet means none.
    async fn read_active(&self) -> Result<Vec<FeedEntry>, FeedError> {
        match tokio::fs::read_to_string(&self.config.feed_path).await {
            Ok(xml) => parse_feed_entries(&xml),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(source) => Err(FeedError::Read {
                path: self.config.feed_path.clone(),
                source,
            }),
        }
    }

    fn write_document(&self, entries: &[FeedEntry]) -> Result<(), FeedError> {
        let xml = render_feed(&self.config.channel, &self.config.urls, entries, Utc::now())?;
        atomic_write(&self.config.feed_path, xml.as_bytes()).map_err(|source| {
            FeedError::Write {
                path: self.config.feed_path.clone(),
                source,
            }
        })
    }
}
