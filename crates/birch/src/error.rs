//! Error types for feed operations.

use std::time::Duration;

use birch_core::{
    AttachmentError, ChainError, CoreError, EncodingError, HashAlgorithm, InvalidEvent,
    SignatureError,
};
use thiserror::Error;

/// Errors that can occur during feed operations.
#[derive(Debug, Error)]
pub enum BirchError {
    /// Canonical encoding failed.
    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),

    /// The event is internally inconsistent.
    #[error("invalid event: {0}")]
    InvalidEvent(#[from] InvalidEvent),

    /// An attachment did not match its directory entry.
    #[error("attachment error: {0}")]
    Attachment(#[from] AttachmentError),

    /// Signing or verification failed.
    #[error("signature error: {0}")]
    Signature(#[from] SignatureError),

    /// The entry does not extend the feed's head.
    #[error("chain error: {0}")]
    Chain(#[from] ChainError),

    /// Any other core failure.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// Wire (de)serialization failed.
    #[error("wire format error: {0}")]
    Wire(String),

    /// The attachment store did not answer in time.
    #[error("fetching attachment {attachment_number} timed out after {timeout:?}")]
    FetchTimeout {
        attachment_number: u64,
        timeout: Duration,
    },

    /// The attachment store has no blob under any of the entry's digests.
    #[error("attachment {0} not found in store")]
    AttachmentNotFound(u64),

    /// The attachment store failed.
    #[error("attachment store error: {0}")]
    Store(String),

    /// An entry exceeds a configured limit.
    #[error("{what} limit exceeded: {actual} > {limit}")]
    LimitExceeded {
        what: &'static str,
        limit: usize,
        actual: usize,
    },

    /// The signer authors a different feed.
    #[error("signer feed {signer} does not match feed {feed}")]
    WrongFeed { signer: String, feed: String },

    /// None of the writer's backlink algorithms is accepted by the feed.
    #[error("no backlink algorithm in {requested:?} is supported by the feed")]
    NoLinkAlgorithm { requested: Vec<HashAlgorithm> },
}

/// Result type for feed operations.
pub type Result<T> = std::result::Result<T, BirchError>;
