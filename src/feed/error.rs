use std::path::PathBuf;
use thiserror::Error;

use crate::storage::StoreError;

/// Errors surfaced by feed publishing operations.
///
/// Ineligible uploads and duplicate episodes are not errors: they are reported
/// through [`AddOutcome`](super::AddOutcome). An unreadable archive is not an
/// error either; the archive is treated as empty.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The referenced upload does not exist in the episode store
    #[error("Upload {0} not found")]
    NotFound(String),

    /// Writing the feed document or the archive failed; the previous file is intact
    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The published feed document exists but could not be read
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The published feed document could not be parsed back into entries
    #[error("Malformed feed document: {0}")]
    Document(String),

    /// The XML writer failed while rendering the feed
    #[error("Failed to render feed XML: {0}")]
    Xml(String),

    /// The archive could not be serialized
    #[error("Failed to encode archive: {0}")]
    Archive(#[from] serde_json::Error),

    /// The published document is not a feed a podcast client would accept
    #[error("Feed validation failed: {0}")]
    Invalid(String),

    /// The episode store failed
    #[error(transparent)]
    Store(#[from] StoreError),
}
