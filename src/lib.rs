//! Publishes processed audio uploads as a Spotify-compatible podcast feed.
//!
//! The feed holds at most a fixed number of episodes; older ones move to a
//! JSON archive and can be restored from there.

pub mod config;
pub mod feed;
pub mod storage;
pub mod util;
