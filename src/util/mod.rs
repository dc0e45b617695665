//! Utility functions shared by the feed writer and the archive store.
//!
//! - **Atomic file replacement**: write-to-temp-then-rename so readers never
//!   observe a partially written feed document or archive

mod fs;

pub use fs::atomic_write;
