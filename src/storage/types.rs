use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Episode store errors with user-friendly messages
#[derive(Debug, Error)]
pub enum StoreError {
    /// Another process holds the upload database lock
    #[error("The upload database is locked by another process. Please retry shortly.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// A stored row could not be converted into an upload record
    #[error("Invalid upload record: {0}")]
    InvalidRecord(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl StoreError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        // SQLITE_BUSY (5): database is locked
        // SQLITE_LOCKED (6): database table is locked
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
        {
            return StoreError::InstanceLocked;
        }

        StoreError::Other(err)
    }
}

// ============================================================================
// Upload Status
// ============================================================================

/// Lifecycle state of an upload, as written by the upload pipeline.
///
/// Only [`UploadStatus::Completed`] uploads are picked up by feed regeneration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Uploading,
    Processing,
    Completed,
    Failed,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Uploading => "uploading",
            UploadStatus::Processing => "processing",
            UploadStatus::Completed => "completed",
            UploadStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UploadStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "uploading" => Ok(UploadStatus::Uploading),
            "processing" => Ok(UploadStatus::Processing),
            "completed" => Ok(UploadStatus::Completed),
            "failed" => Ok(UploadStatus::Failed),
            other => Err(StoreError::InvalidRecord(format!(
                "unknown upload status '{other}'"
            ))),
        }
    }
}

// ============================================================================
// Upload Record
// ============================================================================

/// An upload as recorded by the upload pipeline.
///
/// The feed publisher only ever reads these. `processed_file_path` is set once
/// the audio processor has produced a trimmed/cut version and takes precedence
/// over `file_path` when serving media.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRecord {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub file_path: String,
    pub processed_file_path: Option<String>,
    pub file_size: u64,
    pub mime_type: String,
    pub status: UploadStatus,
    /// Audio length in seconds, when the processing pipeline reported one
    pub duration_secs: Option<u64>,
    pub created_at: DateTime<Utc>,
}

impl UploadRecord {
    /// Path of the file that should be served for this upload.
    pub fn media_path(&self) -> &str {
        self.processed_file_path
            .as_deref()
            .unwrap_or(self.file_path.as_str())
    }

    /// Whether the mime type marks this upload as podcast audio.
    pub fn is_audio(&self) -> bool {
        self.mime_type.starts_with("audio/")
    }
}

/// Internal row type for upload queries (used by sqlx FromRow)
/// Converts to UploadRecord via into_record(), validating enum and numeric columns
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct UploadDbRow {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub file_path: String,
    pub processed_file_path: Option<String>,
    pub file_size: i64,
    pub mime_type: String,
    pub status: String,
    pub duration_secs: Option<i64>,
    /// Unix milliseconds
    pub created_at: i64,
}

impl UploadDbRow {
    pub(crate) fn into_record(self) -> Result<UploadRecord, StoreError> {
        let status = self.status.parse::<UploadStatus>()?;
        let file_size = u64::try_from(self.file_size).map_err(|_| {
            StoreError::InvalidRecord(format!(
                "upload {} has negative file size {}",
                self.id, self.file_size
            ))
        })?;
        let duration_secs = self.duration_secs.and_then(|d| u64::try_from(d).ok());
        let created_at = DateTime::from_timestamp_millis(self.created_at).ok_or_else(|| {
            StoreError::InvalidRecord(format!(
                "upload {} has out-of-range created_at {}",
                self.id, self.created_at
            ))
        })?;

        Ok(UploadRecord {
            id: self.id,
            title: self.title,
            description: self.description,
            file_path: self.file_path,
            processed_file_path: self.processed_file_path,
            file_size,
            mime_type: self.mime_type,
            status,
            duration_secs,
            created_at,
        })
    }
}
