//! Duplicate content suppression
//!
//! Exact-match detection over the post log: the formatted text is hashed and
//! compared against successful posts to the same platform within a trailing
//! window. Near-duplicate similarity is out of scope.

use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::platform::Platform;
use crate::store::Store;

pub struct DuplicateDetector {
    window_hours: i64,
}

impl DuplicateDetector {
    pub fn new(window_hours: i64) -> Self {
        Self { window_hours }
    }

    /// Hex-encoded SHA-256 of the formatted content, as stored in the post
    /// log.
    pub fn content_hash(text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Whether identical content was already successfully posted to this
    /// platform within the window.
    pub async fn is_duplicate(
        &self,
        store: &Store,
        platform: Platform,
        formatted: &str,
        now: i64,
    ) -> Result<bool> {
        let since = now - self.window_hours * 3600;
        store
            .duplicate_exists(platform, &Self::content_hash(formatted), since)
            .await
    }
}
