//! Configuration file parser for ~/.config/castfeed/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are ignored by serde, though we log a warning when the file
//! contains potential typos.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::feed::{FeedUrls, MediaRoute, PublisherConfig, MAX_ACTIVE};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// SEC-014: Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    /// Parsed fine but a value is unusable.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Public origin the feed and media URLs are built on.
    pub base_url: String,

    /// Route style for feed and media URLs (`api` or `static`).
    pub media_route: MediaRoute,

    /// Directory holding the published feed document and the archive.
    pub feed_dir: PathBuf,

    /// File name of the published feed document inside `feed_dir`.
    pub feed_file: String,

    /// File name of the archive JSON inside `feed_dir`.
    pub archive_file: String,

    /// Capacity of the published feed. Older entries are archived.
    pub max_active_episodes: usize,

    /// SQLite database shared with the upload pipeline.
    pub database_path: PathBuf,

    /// Channel-level metadata written into every document.
    pub channel: Channel,
}

/// Channel metadata of the podcast feed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Channel {
    pub title: String,
    pub description: String,
    pub language: String,
    pub copyright: String,
    pub author: String,
    pub summary: String,
    /// iTunes category (`<itunes:category text="...">`)
    pub category: String,
    /// Cover art URL. Defaults to `<base_url>/podcast-cover.jpg`.
    pub image_url: Option<String>,
    pub explicit: bool,
}

impl Default for Channel {
    fn default() -> Self {
        Self {
            title: "AutoPost Spotify Podcast Feed".to_string(),
            description: "Automatically generated podcast feed for Spotify synchronization"
                .to_string(),
            language: "ja".to_string(),
            copyright: "© 2025 AutoPost".to_string(),
            author: "AutoPost System".to_string(),
            summary: "Automatically generated podcast feed for multi-platform distribution"
                .to_string(),
            category: "Technology".to_string(),
            image_url: None,
            explicit: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            media_route: MediaRoute::Api,
            feed_dir: PathBuf::from("./public/rss"),
            feed_file: "spotify-feed.xml".to_string(),
            archive_file: "spotify-feed-archive.json".to_string(),
            max_active_episodes: MAX_ACTIVE,
            database_path: PathBuf::from("./data/uploads.db"),
            channel: Channel::default(),
        }
    }
}

impl Config {
    /// SEC-014: Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 8] = [
        "base_url",
        "media_route",
        "feed_dir",
        "feed_file",
        "archive_file",
        "max_active_episodes",
        "database_path",
        "channel",
    ];

    const KNOWN_CHANNEL_KEYS: [&'static str; 9] = [
        "title",
        "description",
        "language",
        "copyright",
        "author",
        "summary",
        "category",
        "image_url",
        "explicit",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    /// - Unusable values → `Err(ConfigError::Invalid)`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // SEC-014: Check file size before reading
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            warn_unknown_keys(&raw, &Self::KNOWN_KEYS, "");
            if let Some(toml::Value::Table(channel)) = raw.get("channel") {
                warn_unknown_keys(channel, &Self::KNOWN_CHANNEL_KEYS, "channel.");
            }
        }

        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        tracing::info!(
            path = %path.display(),
            base_url = %config.base_url,
            feed_dir = %config.feed_dir.display(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Check values serde cannot: URL shape, capacity, file names.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let parsed = url::Url::parse(&self.base_url)
            .map_err(|e| ConfigError::Invalid(format!("base_url '{}': {e}", self.base_url)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "base_url must use http or https, got '{}'",
                parsed.scheme()
            )));
        }

        if self.max_active_episodes == 0 {
            return Err(ConfigError::Invalid(
                "max_active_episodes must be at least 1".to_string(),
            ));
        }

        for (key, name) in [
            ("feed_file", &self.feed_file),
            ("archive_file", &self.archive_file),
        ] {
            if name.is_empty() || name.contains(['/', '\\']) {
                return Err(ConfigError::Invalid(format!(
                    "{key} must be a plain file name, got '{name}'"
                )));
            }
        }
        if self.feed_file == self.archive_file {
            return Err(ConfigError::Invalid(
                "feed_file and archive_file must differ".to_string(),
            ));
        }

        Ok(())
    }

    pub fn feed_path(&self) -> PathBuf {
        self.feed_dir.join(&self.feed_file)
    }

    pub fn archive_path(&self) -> PathBuf {
        self.feed_dir.join(&self.archive_file)
    }

    pub fn urls(&self) -> FeedUrls {
        FeedUrls::new(&self.base_url, self.media_route, &self.feed_file)
    }

    /// Everything the publisher needs, resolved from this config.
    pub fn publisher_config(&self) -> PublisherConfig {
        PublisherConfig {
            feed_path: self.feed_path(),
            archive_path: self.archive_path(),
            max_active: self.max_active_episodes,
            urls: self.urls(),
            channel: self.channel.clone(),
        }
    }
}

fn warn_unknown_keys(table: &toml::Table, known: &[&str], prefix: &str) {
    for key in table.keys() {
        if !known.contains(&key.as_str()) {
            tracing::warn!(key = %format!("{prefix}{key}"), "Unknown key in config file, ignoring");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(config.media_route, MediaRoute::Api);
        assert_eq!(config.max_active_episodes, 50);
        assert_eq!(
            config.feed_path(),
            PathBuf::from("./public/rss/spotify-feed.xml")
        );
        assert_eq!(
            config.archive_path(),
            PathBuf::from("./public/rss/spotify-feed-archive.json")
        );
        assert_eq!(config.channel.language, "ja");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.base_url, "http://localhost:3000");
    }

    #[test]
    fn test_empty_and_whitespace_files_return_default() {
        for content in ["", "   \n  \n  "] {
            let (_dir, path) = write_config(content);
            let config = Config::load(&path).unwrap();
            assert_eq!(config.feed_file, "spotify-feed.xml");
        }
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let (_dir, path) = write_config("base_url = \"https://pods.example.com\"\n");

        let config = Config::load(&path).unwrap();
        assert_eq!(config.base_url, "https://pods.example.com");
        assert_eq!(config.max_active_episodes, 50);
        assert_eq!(config.channel.author, "AutoPost System");
    }

    #[test]
    fn test_full_config() {
        let (_dir, path) = write_config(
            r#"
base_url = "https://user.github.io/show"
media_route = "static"
feed_dir = "/srv/feed"
feed_file = "podcast.xml"
archive_file = "podcast-archive.json"
max_active_episodes = 10
database_path = "/srv/uploads.db"

[channel]
title = "Show & Tell"
language = "en"
image_url = "https://cdn.example.com/cover.png"
explicit = true
"#,
        );

        let config = Config::load(&path).unwrap();
        assert_eq!(config.media_route, MediaRoute::Static);
        assert_eq!(config.feed_path(), PathBuf::from("/srv/feed/podcast.xml"));
        assert_eq!(config.max_active_episodes, 10);
        assert_eq!(config.channel.title, "Show & Tell");
        assert_eq!(config.channel.language, "en");
        assert!(config.channel.explicit);
        // channel keys not given keep their defaults
        assert_eq!(config.channel.category, "Technology");
        assert_eq!(
            config.urls().feed_url(),
            "https://user.github.io/show/rss/podcast.xml"
        );

        let publisher = config.publisher_config();
        assert_eq!(publisher.max_active, 10);
        assert_eq!(
            publisher.archive_path,
            PathBuf::from("/srv/feed/podcast-archive.json")
        );
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let (_dir, path) = write_config("this is not [valid toml");

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let (_dir, path) = write_config(
            r#"
base_url = "http://localhost:8080"
totally_fake_key = "should not fail"

[channel]
colour = "blue"
"#,
        );

        let config = Config::load(&path).unwrap();
        assert_eq!(config.base_url, "http://localhost:8080");
    }

    #[test]
    fn test_unknown_media_route_rejected() {
        let (_dir, path) = write_config("media_route = \"cdn\"\n");
        assert!(matches!(
            Config::load(&path).unwrap_err(),
            ConfigError::Parse(_)
        ));
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        for bad in ["not a url", "ftp://files.example.com"] {
            let (_dir, path) = write_config(&format!("base_url = \"{bad}\"\n"));
            assert!(matches!(
                Config::load(&path).unwrap_err(),
                ConfigError::Invalid(_)
            ));
        }
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let (_dir, path) = write_config("max_active_episodes = 0\n");
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("max_active_episodes"));
    }

    #[test]
    fn test_file_names_must_be_plain_and_distinct() {
        let mut config = Config::default();
        config.feed_file = "../escape.xml".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.archive_file = config.feed_file.clone();
        assert!(config.validate().is_err());
    }

    // SEC-014: File size limit
    #[test]
    fn test_too_large_file_rejected() {
        let (_dir, path) = write_config(&"a".repeat(1_048_577));

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));
    }
}
