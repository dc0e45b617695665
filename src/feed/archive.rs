use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::entry::FeedEntry;
use super::error::FeedError;
use crate::util::atomic_write;

/// Episodes that overflowed the feed, kept as a JSON array on disk.
///
/// Reads are best-effort: a missing or unreadable archive behaves as an empty
/// one. Every write replaces the whole file atomically.
#[derive(Debug, Clone)]
pub struct ArchiveStore {
    path: PathBuf,
}

impl ArchiveStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every archived entry in file order.
    pub fn list_all(&self) -> Vec<FeedEntry> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No archive file yet");
                return Vec::new();
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to read archive, treating as empty");
                return Vec::new();
            }
        };

        match serde_json::from_slice(&raw) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Corrupt archive, treating as empty");
                Vec::new()
            }
        }
    }

    /// Append entries whose guid is not archived yet. Returns how many were added.
    ///
    /// The file is left untouched when nothing new arrives.
    pub fn append(&self, entries: &[FeedEntry]) -> Result<usize, FeedError> {
        if entries.is_empty() {
            return Ok(0);
        }

        let mut archived = self.list_all();
        let mut seen: HashSet<String> = archived.iter().map(|e| e.guid.clone()).collect();

        let before = archived.len();
        for entry in entries {
            if seen.insert(entry.guid.clone()) {
                archived.push(entry.clone());
            }
        }
        let added = archived.len() - before;

        if added > 0 {
            self.write(&archived)?;
            tracing::debug!(added, total = archived.len(), "Archived episodes");
        }
        Ok(added)
    }

    /// Remove the first entry with `entry_id` and return it.
    ///
    /// Returns `Ok(None)` without touching the file when no entry matches.
    pub fn restore(&self, entry_id: u32) -> Result<Option<FeedEntry>, FeedError> {
        let mut archived = self.list_all();
        let Some(index) = archived.iter().position(|e| e.id == entry_id) else {
            return Ok(None);
        };

        let entry = archived.remove(index);
        self.write(&archived)?;
        Ok(Some(entry))
    }

    /// Overwrite the archive with exactly `entries`.
    pub fn replace_all(&self, entries: &[FeedEntry]) -> Result<(), FeedError> {
        self.write(entries)
    }

    fn write(&self, entries: &[FeedEntry]) -> Result<(), FeedError> {
        let json = serde_json::to_vec_pretty(entries)?;
        atomic_write(&self.path, &json).map_err(|source| FeedError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn entry(id: u32) -> FeedEntry {
        FeedEntry {
            id,
            title: format!("Episode {id}"),
            description: None,
            file_size: 1_000,
            mime_type: "audio/mpeg".to_string(),
            pub_date: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            duration: None,
            guid: format!("autopost-u{id}-1735689600000"),
        }
    }

    fn store() -> (tempfile::TempDir, ArchiveStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ArchiveStore::new(dir.path().join("archive.json"));
        (dir, store)
    }

    #[test]
    fn test_missing_file_is_empty() {
        let (_dir, store) = store();
        assert!(store.list_all().is_empty());
    }

    #[test]
    fn test_corrupt_file_is_empty() {
        let (_dir, store) = store();
        std::fs::write(store.path(), b"{ not json").unwrap();
        assert!(store.list_all().is_empty());
    }

    #[test]
    fn test_append_preserves_order() {
        let (_dir, store) = store();
        assert_eq!(store.append(&[entry(1), entry(2)]).unwrap(), 2);
        assert_eq!(store.append(&[entry(3)]).unwrap(), 1);

        let ids: Vec<u32> = store.list_all().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_append_skips_archived_guids() {
        let (_dir, store) = store();
        store.append(&[entry(1), entry(2)]).unwrap();
        assert_eq!(store.append(&[entry(2), entry(1)]).unwrap(), 0);
        assert_eq!(store.list_all().len(), 2);
    }

    #[test]
    fn test_append_empty_does_not_create_file() {
        let (_dir, store) = store();
        assert_eq!(store.append(&[]).unwrap(), 0);
        assert!(!store.path().exists());
    }

    #[test]
    fn test_restore_removes_entry() {
        let (_dir, store) = store();
        store.append(&[entry(1), entry(2), entry(3)]).unwrap();

        let restored = store.restore(2).unwrap();
        assert_eq!(restored, Some(entry(2)));

        let ids: Vec<u32> = store.list_all().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_restore_unknown_id_leaves_file_untouched() {
        let (_dir, store) = store();
        store.append(&[entry(1)]).unwrap();
        let before = std::fs::read(store.path()).unwrap();

        assert_eq!(store.restore(99).unwrap(), None);
        assert_eq!(std::fs::read(store.path()).unwrap(), before);
    }

    #[test]
    fn test_replace_all() {
        let (_dir, store) = store();
        store.append(&[entry(1), entry(2)]).unwrap();
        store.replace_all(&[entry(5)]).unwrap();
        assert_eq!(store.list_all(), vec![entry(5)]);
    }

    #[test]
    fn test_file_is_camel_case_json_array() {
        let (_dir, store) = store();
        store.append(&[entry(7)]).unwrap();

        let value: serde_json::Value =
            serde_json::from_slice(&std::fs::read(store.path()).unwrap()).unwrap();
        let first = &value.as_array().unwrap()[0];
        assert_eq!(first["id"], 7);
        assert_eq!(first["mimeType"], "audio/mpeg");
    }

    #[test]
    fn test_write_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArchiveStore::new(dir.path().join("nope").join("archive.json"));
        assert!(matches!(
            store.append(&[entry(1)]),
            Err(FeedError::Write { .. })
        ));
    }
}
