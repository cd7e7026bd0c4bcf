//! # Birch
//!
//! Signed, hash-chained, append-only feeds with off-chain attachments.
//!
//! ## Overview
//!
//! - **Entries**: Signed events. Never edited; changes are new entries.
//! - **Feeds**: One author's history. Each entry backlinks the digest of its
//!   predecessor's canonical encoding.
//! - **Attachments**: Large blobs kept off the chain, named by digest and
//!   verified on every read.
//! - **Forks**: An author who signs two successors of one entry forks the
//!   feed; a forked feed accepts nothing further.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use birch::{EntryDraft, Feed, FeedConfig, FeedHandle, FeedWriter};
//! use birch::core::{HashAlgorithm, Keypair, Signer};
//!
//! async fn example() -> birch::Result<()> {
//!     let keypair = Keypair::generate();
//!     let feed = Feed::new(keypair.feed_id(), FeedConfig::default());
//!     let handle = FeedHandle::new(feed);
//!     let writer = FeedWriter::new(keypair, handle.clone())?;
//!
//!     let (seq, _entry) = writer
//!         .publish(
//!             EntryDraft::new()
//!                 .inline(&b"hello"[..])
//!                 .attach(&b"large payload"[..], &[HashAlgorithm::Sha256]),
//!         )
//!         .await?;
//!     assert_eq!(seq, 0);
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `birch::core` - Core primitives (events, digests, chain validation)

pub mod config;
pub mod error;
pub mod feed;
pub mod store;
pub mod wire;

pub use birch_core as core;

pub use config::FeedConfig;
pub use error::{BirchError, Result};
pub use feed::{EntryDraft, Feed, FeedHandle, FeedWriter};
pub use store::{fetch_attachment, AttachmentStore, MemoryAttachmentStore};
pub use wire::FeedLog;

pub use birch_core::{
    Digest, EventBuilder, FeedId, HashAlgorithm, Keypair, LogContent, LogEntry, LogEvent,
    SignatureScheme, Signer,
};
