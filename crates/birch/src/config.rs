//! Feed configuration.

use std::time::Duration;

use birch_core::HashAlgorithm;
use serde::{Deserialize, Serialize};

/// Configuration for a [`Feed`](crate::Feed).
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```
/// use birch::FeedConfig;
///
/// let config: FeedConfig = serde_json::from_str(r#"{"require_attachments": true}"#).unwrap();
/// assert!(config.require_attachments);
/// assert!(config.verify_signatures);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Backlink algorithms accepted by the chain check.
    pub supported_hashes: Vec<HashAlgorithm>,
    /// Whether to verify entry signatures on append.
    pub verify_signatures: bool,
    /// Whether every declared attachment must ship with its entry.
    pub require_attachments: bool,
    /// Maximum size of one inline content item.
    pub max_inline_bytes: usize,
    /// Maximum number of attachment directory entries per event.
    pub max_attachments: usize,
    /// Timeout for one attachment store fetch, in milliseconds.
    pub fetch_timeout_ms: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            supported_hashes: HashAlgorithm::ALL.to_vec(),
            verify_signatures: true,
            require_attachments: false,
            max_inline_bytes: 64 * 1024,
            max_attachments: 128,
            fetch_timeout_ms: 5_000,
        }
    }
}

impl FeedConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn with_supported_hashes(mut self, hashes: impl Into<Vec<HashAlgorithm>>) -> Self {
        self.supported_hashes = hashes.into();
        self
    }

    pub fn with_verify_signatures(mut self, verify: bool) -> Self {
        self.verify_signatures = verify;
        self
    }

    pub fn with_require_attachments(mut self, require: bool) -> Self {
        self.require_attachments = require;
        self
    }

    pub fn with_max_inline_bytes(mut self, max: usize) -> Self {
        self.max_inline_bytes = max;
        self
    }

    pub fn with_max_attachments(mut self, max: usize) -> Self {
        self.max_attachments = max;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }
}
