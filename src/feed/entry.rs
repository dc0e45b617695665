use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::storage::UploadRecord;

/// Prefix shared by every guid this publisher issues.
const GUID_PREFIX: &str = "autopost-";

/// A single `<item>` of the podcast feed.
///
/// The enclosure URL is not stored: it is derived from `id` by
/// [`FeedUrls::media_url`](super::FeedUrls::media_url) whenever the feed is
/// rendered, so a base URL change only needs a regeneration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedEntry {
    /// Compact numeric id, see [`derive_entry_id`]
    pub id: u32,
    pub title: String,
    pub description: Option<String>,
    pub file_size: u64,
    pub mime_type: String,
    pub pub_date: DateTime<Utc>,
    /// Formatted `M:SS` / `H:MM:SS`; rendered as `00:00` when unknown
    pub duration: Option<String>,
    /// Unique across the active feed and the archive combined
    pub guid: String,
}

impl FeedEntry {
    /// Map an upload to a feed entry.
    ///
    /// Returns `None` for anything that is not audio; callers treat that as
    /// "not for this feed" rather than an error.
    pub fn from_upload(upload: &UploadRecord) -> Option<Self> {
        if !upload.is_audio() {
            return None;
        }

        Some(Self {
            id: derive_entry_id(&upload.id),
            title: upload.title.clone(),
            description: upload
                .description
                .as_deref()
                .filter(|d| !d.is_empty())
                .map(str::to_string),
            file_size: upload.file_size,
            mime_type: upload.mime_type.clone(),
            pub_date: upload.created_at,
            duration: upload.duration_secs.map(format_duration),
            guid: episode_guid(&upload.id, upload.created_at),
        })
    }

    /// Id of the upload this entry was built from, if the guid is one of ours.
    pub fn upload_id(&self) -> Option<&str> {
        upload_id_from_guid(&self.guid)
    }
}

/// Derive the numeric entry id from an opaque upload id.
///
/// Takes the first four bytes of the SHA-256 digest (big-endian) and clears
/// the sign bit so the id stays positive in every consumer. Zero is mapped to
/// one. SHA-256 has no per-process seed, so the id is identical on every run
/// and platform.
pub fn derive_entry_id(upload_id: &str) -> u32 {
    let digest = Sha256::digest(upload_id.as_bytes());
    let folded = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]) & 0x7FFF_FFFF;
    folded.max(1)
}

/// Build the guid for an upload: `autopost-{upload_id}-{created_at millis}`.
///
/// Derived from the creation time, never from the wall clock, so every
/// regeneration of the same episode yields the same guid.
pub fn episode_guid(upload_id: &str, created_at: DateTime<Utc>) -> String {
    format!(
        "{GUID_PREFIX}{upload_id}-{}",
        created_at.timestamp_millis()
    )
}

/// Recover the upload id embedded in a guid produced by [`episode_guid`].
///
/// Upload ids may themselves contain dashes (UUIDs), so the timestamp is
/// split off from the right.
pub fn upload_id_from_guid(guid: &str) -> Option<&str> {
    let rest = guid.strip_prefix(GUID_PREFIX)?;
    let (upload_id, millis) = rest.rsplit_once('-')?;
    if upload_id.is_empty() || millis.is_empty() {
        return None;
    }
    millis.parse::<i64>().ok()?;
    Some(upload_id)
}

/// Format a duration in seconds as `M:SS`, or `H:MM:SS` from one hour up.
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::UploadStatus;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn upload(id: &str, mime: &str) -> UploadRecord {
        UploadRecord {
            id: id.to_string(),
            title: "Morning Notes".to_string(),
            description: Some("Episode notes".to_string()),
            file_path: "uploads/a.mp3".to_string(),
            processed_file_path: Some("processed/a.mp3".to_string()),
            file_size: 4_096,
            mime_type: mime.to_string(),
            status: UploadStatus::Completed,
            duration_secs: Some(3_725),
            created_at: Utc.with_ymd_and_hms(2025, 6, 1, 8, 30, 0).unwrap(),
        }
    }

    #[test]
    fn test_from_upload_maps_fields() {
        let record = upload("9b2c-41", "audio/mpeg");
        let entry = FeedEntry::from_upload(&record).unwrap();

        assert_eq!(entry.id, derive_entry_id("9b2c-41"));
        assert_eq!(entry.title, "Morning Notes");
        assert_eq!(entry.description.as_deref(), Some("Episode notes"));
        assert_eq!(entry.file_size, 4_096);
        assert_eq!(entry.mime_type, "audio/mpeg");
        assert_eq!(entry.pub_date, record.created_at);
        assert_eq!(entry.duration.as_deref(), Some("1:02:05"));
        assert_eq!(
            entry.guid,
            format!("autopost-9b2c-41-{}", record.created_at.timestamp_millis())
        );
    }

    #[test]
    fn test_from_upload_skips_non_audio() {
        assert!(FeedEntry::from_upload(&upload("v1", "video/mp4")).is_none());
        assert!(FeedEntry::from_upload(&upload("v2", "application/ogg")).is_none());
    }

    #[test]
    fn test_empty_description_becomes_none() {
        let mut record = upload("a", "audio/wav");
        record.description = Some(String::new());
        assert_eq!(FeedEntry::from_upload(&record).unwrap().description, None);
    }

    #[test]
    fn test_mapping_is_deterministic() {
        let record = upload("same", "audio/mpeg");
        assert_eq!(
            FeedEntry::from_upload(&record),
            FeedEntry::from_upload(&record)
        );
    }

    #[test]
    fn test_derive_entry_id_known_value() {
        // SHA-256("abc") starts with ba 78 16 bf
        assert_eq!(derive_entry_id("abc"), 0x3a78_16bf);
    }

    #[test]
    fn test_derive_entry_id_positive_and_distinct() {
        let ids: std::collections::HashSet<u32> = (0..200)
            .map(|i| derive_entry_id(&format!("upload-{i}")))
            .collect();
        assert!(ids.iter().all(|&id| id > 0 && id <= 0x7FFF_FFFF));
        assert_eq!(ids.len(), 200);
    }

    #[test]
    fn test_upload_id_from_guid_roundtrip() {
        let created = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap();
        let guid = episode_guid("0f8e-4c1a-9d2b", created);
        assert_eq!(upload_id_from_guid(&guid), Some("0f8e-4c1a-9d2b"));
    }

    #[test]
    fn test_upload_id_from_foreign_guid() {
        assert_eq!(upload_id_from_guid("https://example.com/ep/1"), None);
        assert_eq!(upload_id_from_guid("autopost-"), None);
        assert_eq!(upload_id_from_guid("autopost-abc"), None);
        assert_eq!(upload_id_from_guid("autopost-abc-notanumber"), None);
        assert_eq!(upload_id_from_guid("autopost--123"), None);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0:00");
        assert_eq!(format_duration(59), "0:59");
        assert_eq!(format_duration(61), "1:01");
        assert_eq!(format_duration(3_599), "59:59");
        assert_eq!(format_duration(3_600), "1:00:00");
        assert_eq!(format_duration(36_061), "10:01:01");
    }

    #[test]
    fn test_archive_json_shape_is_camel_case() {
        let entry = FeedEntry::from_upload(&upload("a", "audio/mpeg")).unwrap();
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("fileSize").is_some());
        assert!(json.get("mimeType").is_some());
        assert!(json.get("pubDate").is_some());
        assert!(json.get("file_size").is_none());
    }
}
