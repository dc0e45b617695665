//! Podcast feed lifecycle: publishing episodes into a capacity-limited RSS
//! document and archiving what falls off the end.
//!
//! - [`entry`] - Mapping uploads to feed entries, stable ids and guids
//! - [`urls`] - Public feed and enclosure URLs
//! - [`xml`] - RSS 2.0 + iTunes rendering and reading back
//! - [`capacity`] - Splitting entries at the capacity limit
//! - [`archive`] - JSON side file of evicted entries
//! - [`validate`] - Checking the document with `feed-rs`
//! - [`publisher`] - The orchestrator tying them together
//!
//! # Example
//!
//! ```ignore
//! let publisher = FeedPublisher::open(config.publisher_config(), store)?;
//! match publisher.add_episode(&upload_id).await? {
//!     AddOutcome::Added { archived, .. } => println!("published, {archived} archived"),
//!     AddOutcome::Ineligible | AddOutcome::Duplicate => {}
//! }
//! ```

pub mod archive;
pub mod capacity;
pub mod entry;
mod error;
pub mod publisher;
pub mod urls;
pub mod validate;
pub mod xml;

pub use archive::ArchiveStore;
pub use capacity::{partition, Partition, MAX_ACTIVE};
pub use entry::{derive_entry_id, episode_guid, upload_id_from_guid, FeedEntry};
pub use error::FeedError;
pub use publisher::{
    AddOutcome, FeedPublisher, FeedStats, PublisherConfig, RegenerateSummary,
};
pub use urls::{FeedUrls, MediaRoute};
pub use validate::FeedValidation;
