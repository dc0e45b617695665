use feed_rs::model::FeedType;
use feed_rs::parser;
use serde::Serialize;
use std::collections::HashSet;

use super::error::FeedError;

/// What a standard feed reader sees in the published document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedValidation {
    pub title: Option<String>,
    pub item_count: usize,
}

/// Parse a feed document the way a podcast client would and check that every
/// item carries an enclosure and a unique guid.
pub fn validate_document(bytes: &[u8]) -> Result<FeedValidation, FeedError> {
    let feed = parser::parse(bytes).map_err(|e| FeedError::Invalid(e.to_string()))?;

    if feed.feed_type != FeedType::RSS2 {
        return Err(FeedError::Invalid(format!(
            "expected RSS 2.0, found {:?}",
            feed.feed_type
        )));
    }

    let mut seen = HashSet::new();
    for entry in &feed.entries {
        let has_enclosure = entry
            .media
            .iter()
            .flat_map(|m| m.content.iter())
            .any(|c| c.url.is_some());
        if !has_enclosure {
            return Err(FeedError::Invalid(format!(
                "item {} has no enclosure",
                entry.id
            )));
        }
        if !seen.insert(entry.id.as_str()) {
            return Err(FeedError::Invalid(format!("duplicate guid {}", entry.id)));
        }
    }

    Ok(FeedValidation {
        title: feed.title.map(|t| t.content),
        item_count: feed.entries.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Channel;
    use crate::feed::entry::FeedEntry;
    use crate::feed::urls::{FeedUrls, MediaRoute};
    use crate::feed::xml::render_feed;
    use chrono::{TimeZone, Utc};

    fn entry(id: u32) -> FeedEntry {
        FeedEntry {
            id,
            title: format!("Episode {id} & friends"),
            description: Some("<b>notes</b>".to_string()),
            file_size: 2_048,
            mime_type: "audio/mpeg".to_string(),
            pub_date: Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
            duration: Some("3:21".to_string()),
            guid: format!("autopost-u{id}-1740830400000"),
        }
    }

    fn render(entries: &[FeedEntry]) -> String {
        let urls = FeedUrls::new("https://pods.example.com", MediaRoute::Api, "feed.xml");
        render_feed(&Channel::default(), &urls, entries, Utc::now()).unwrap()
    }

    #[test]
    fn test_rendered_feed_validates() {
        let xml = render(&[entry(1), entry(2), entry(3)]);
        let report = validate_document(xml.as_bytes()).unwrap();

        assert_eq!(report.item_count, 3);
        assert_eq!(
            report.title.as_deref(),
            Some("AutoPost Spotify Podcast Feed")
        );
    }

    #[test]
    fn test_empty_feed_validates() {
        let report = validate_document(render(&[]).as_bytes()).unwrap();
        assert_eq!(report.item_count, 0);
    }

    #[test]
    fn test_duplicate_guid_rejected() {
        let xml = render(&[entry(1), entry(1)]);
        assert!(matches!(
            validate_document(xml.as_bytes()),
            Err(FeedError::Invalid(_))
        ));
    }

    #[test]
    fn test_item_without_enclosure_rejected() {
        let xml = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>t</title><link>http://x</link><description>d</description>
<item><title>a</title><guid>g1</guid></item>
</channel></rss>"#;
        assert!(matches!(
            validate_document(xml.as_bytes()),
            Err(FeedError::Invalid(_))
        ));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(validate_document(b"not a feed").is_err());
    }

    #[test]
    fn test_atom_rejected() {
        let atom = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom"><title>a</title><id>urn:x</id>
<updated>2025-01-01T00:00:00Z</updated></feed>"#;
        assert!(matches!(
            validate_document(atom.as_bytes()),
            Err(FeedError::Invalid(_))
        ));
    }
}
