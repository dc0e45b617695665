use serde::{Deserialize, Serialize};

/// Where the feed document and the media files are served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaRoute {
    /// Served by the application: `/api/rss` and `/api/rss/media/{id}`
    #[default]
    Api,
    /// Published as static files: `/rss/<feed_file>` and `/media/{id}`
    Static,
}

/// Public URLs of the feed and its enclosures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedUrls {
    base_url: String,
    route: MediaRoute,
    feed_file: String,
}

impl FeedUrls {
    pub fn new(base_url: &str, route: MediaRoute, feed_file: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            route,
            feed_file: feed_file.to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Public URL of the feed document.
    pub fn feed_url(&self) -> String {
        match self.route {
            MediaRoute::Api => format!("{}/api/rss", self.base_url),
            MediaRoute::Static => format!("{}/rss/{}", self.base_url, self.feed_file),
        }
    }

    /// Enclosure URL for the entry with the given numeric id.
    pub fn media_url(&self, entry_id: u32) -> String {
        match self.route {
            MediaRoute::Api => format!("{}/api/rss/media/{}", self.base_url, entry_id),
            MediaRoute::Static => format!("{}/media/{}", self.base_url, entry_id),
        }
    }

    /// Cover art location used when the channel config does not set one.
    pub fn default_image_url(&self) -> String {
        format!("{}/podcast-cover.jpg", self.base_url)
    }
}

/// Extract the entry id from an enclosure URL built by [`FeedUrls::media_url`].
///
/// Only the last path segment is inspected, so documents written under a
/// different base URL or route style still resolve.
pub(crate) fn entry_id_from_media_url(url: &str) -> Option<u32> {
    let path = url.split(['?', '#']).next()?;
    let last = path.trim_end_matches('/').rsplit('/').next()?;
    last.parse().ok()
}
