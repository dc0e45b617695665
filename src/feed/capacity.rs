use super::entry::FeedEntry;

/// Maximum number of items Spotify accepts in a single feed.
pub const MAX_ACTIVE: usize = 50;

/// Result of splitting a newest-first entry list at the capacity limit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    /// The first `max` entries, order preserved
    pub active: Vec<FeedEntry>,
    /// Everything past `max`, order preserved
    pub archived: Vec<FeedEntry>,
}

/// Split `entries` into an active prefix of at most `max` items and the remainder.
pub fn partition(mut entries: Vec<FeedEntry>, max: usize) -> Partition {
    if entries.len() <= max {
        return Partition {
            active: entries,
            archived: Vec::new(),
        };
    }

    let archived = entries.split_off(max);
    Partition {
        active: entries,
        archived,
    }
}
