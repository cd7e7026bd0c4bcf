//! Feeds: one author's append-only, hash-chained history.
//!
//! [`Feed`] owns the entries and the chain state. [`FeedHandle`] shares a
//! feed between tasks and serializes appends, running the pure checks
//! (signature, attachment hashing) before taking the lock. [`FeedWriter`]
//! is the author side: it fills in backlinks from the head, signs and
//! appends.

use std::collections::HashMap;
use std::sync::Arc;

use birch_core::signature::verify_encoded;
use birch_core::{
    encode_event, AttachmentEntry, ChainError, ChainValidator, Digest, EventBuilder, FeedId,
    FeedPosition, HashAlgorithm, KeyLocator, LogContent, LogEntry, SignatureScheme, Signer,
};
use bytes::Bytes;
use tokio::sync::{Mutex, MutexGuard};

use crate::config::FeedConfig;
use crate::error::{BirchError, Result};

/// A single feed: its identity, its entries and its chain state.
#[derive(Debug)]
pub struct Feed {
    feed_id: FeedId,
    config: FeedConfig,
    chain: ChainValidator,
    entries: Vec<LogEntry>,
    /// SHA-256 of each accepted encoding, to its sequence number.
    seen: HashMap<Digest, u64>,
}

impl Feed {
    /// Create an empty feed.
    pub fn new(feed_id: FeedId, config: FeedConfig) -> Self {
        let chain = ChainValidator::new(config.supported_hashes.clone());
        Self {
            feed_id,
            config,
            chain,
            entries: Vec::new(),
            seen: HashMap::new(),
        }
    }

    pub fn feed_id(&self) -> &FeedId {
        &self.feed_id
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Append
    // ─────────────────────────────────────────────────────────────────────────

    /// Check `entry` and link it onto the feed. Returns its sequence number.
    ///
    /// Order: limits, structure, signature, shipped attachments, chain.
    /// An entry whose event is already in the feed is not linked again; the
    /// existing sequence number is returned and the chain is left untouched.
    pub fn append(&mut self, entry: LogEntry) -> Result<u64> {
        let encoded = check_entry(&self.feed_id, &self.config, &entry)?;
        self.link(entry, encoded)
    }

    /// Chain step only; `encoded` must be the canonical bytes of the event.
    fn link(&mut self, entry: LogEntry, encoded: Vec<u8>) -> Result<u64> {
        let key = Digest::compute(HashAlgorithm::Sha256, &encoded);
        if let Some(&seq) = self.seen.get(&key) {
            tracing::debug!(feed = %self.feed_id, seq, "Ignored re-delivered entry");
            return Ok(seq);
        }

        match self.chain.append_encoded(&entry.event, encoded) {
            Ok(seq) => {
                tracing::debug!(feed = %self.feed_id, seq, "Appended entry");
                self.seen.insert(key, seq);
                self.entries.push(entry);
                Ok(seq)
            }
            Err(e) => {
                match &e {
                    ChainError::ChainBroken { seq } => {
                        tracing::warn!("Fork detected in feed {} at seq {}", self.feed_id, seq)
                    }
                    ChainError::Forked { at_seq } => tracing::warn!(
                        "Rejected entry for feed {}: forked at seq {}",
                        self.feed_id,
                        at_seq
                    ),
                    other => tracing::warn!("Rejected entry for feed {}: {}", self.feed_id, other),
                }
                Err(e.into())
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sequence number of the latest entry.
    pub fn head_seq(&self) -> Option<u64> {
        self.chain.head_seq()
    }

    pub fn head(&self) -> Option<&LogEntry> {
        self.entries.last()
    }

    /// Backlinks to the head, one per algorithm. Empty for an empty feed.
    pub fn head_links(&self, algorithms: &[HashAlgorithm]) -> Vec<Digest> {
        algorithms
            .iter()
            .filter_map(|alg| self.chain.head_digest(*alg))
            .collect()
    }

    pub fn is_forked(&self) -> bool {
        self.chain.is_forked()
    }

    /// The entry at `seq`.
    pub fn get(&self, seq: u64) -> Option<&LogEntry> {
        usize::try_from(seq).ok().and_then(|i| self.entries.get(i))
    }

    /// Re-check every stored entry and replay the chain from scratch.
    pub fn verify(&self) -> Result<()> {
        let mut chain = ChainValidator::new(self.config.supported_hashes.clone());
        for entry in &self.entries {
            let encoded = check_entry(&self.feed_id, &self.config, entry)?;
            chain.append_encoded(&entry.event, encoded)?;
        }
        Ok(())
    }
}

/// Everything about an entry that does not depend on the feed's head.
///
/// Returns the event's canonical bytes for the chain step.
fn check_entry(feed_id: &FeedId, config: &FeedConfig, entry: &LogEntry) -> Result<Vec<u8>> {
    let result = check_entry_inner(feed_id, config, entry);
    if let Err(e) = &result {
        tracing::warn!("Invalid entry for feed {}: {}", feed_id, e);
    }
    result
}

fn check_entry_inner(feed_id: &FeedId, config: &FeedConfig, entry: &LogEntry) -> Result<Vec<u8>> {
    let event = &entry.event;

    let attachments = event.attachment_directory.len();
    if attachments > config.max_attachments {
        return Err(BirchError::LimitExceeded {
            what: "attachment",
            limit: config.max_attachments,
            actual: attachments,
        });
    }
    for content in &event.contents {
        if let LogContent::Inline(data) = content {
            if data.len() > config.max_inline_bytes {
                return Err(BirchError::LimitExceeded {
                    what: "inline content",
                    limit: config.max_inline_bytes,
                    actual: data.len(),
                });
            }
        }
    }

    let position = if event.is_first() {
        FeedPosition::First
    } else {
        FeedPosition::Subsequent
    };
    event.validate(position)?;

    let encoded = encode_event(event)?;

    if config.verify_signatures {
        verify_encoded(event.sig_info.scheme, &encoded, &entry.signature, feed_id)?;
    }

    entry.verify_attachments(config.require_attachments)?;

    Ok(encoded)
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared handle
// ─────────────────────────────────────────────────────────────────────────────

/// A cloneable, task-safe handle to one feed. Appends are serialized.
#[derive(Clone)]
pub struct FeedHandle {
    feed_id: FeedId,
    config: Arc<FeedConfig>,
    inner: Arc<Mutex<Feed>>,
}

impl FeedHandle {
    pub fn new(feed: Feed) -> Self {
        Self {
            feed_id: feed.feed_id.clone(),
            config: Arc::new(feed.config.clone()),
            inner: Arc::new(Mutex::new(feed)),
        }
    }

    pub fn feed_id(&self) -> &FeedId {
        &self.feed_id
    }

    /// Check `entry` outside the lock, then link it under the lock.
    pub async fn append(&self, entry: LogEntry) -> Result<u64> {
        let encoded = check_entry(&self.feed_id, &self.config, &entry)?;
        let mut feed = self.inner.lock().await;
        feed.link(entry, encoded)
    }

    /// Lock the feed for reading.
    pub async fn lock(&self) -> MutexGuard<'_, Feed> {
        self.inner.lock().await
    }

    pub async fn head_seq(&self) -> Option<u64> {
        self.inner.lock().await.head_seq()
    }

    pub async fn is_forked(&self) -> bool {
        self.inner.lock().await.is_forked()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn get(&self, seq: u64) -> Option<LogEntry> {
        self.inner.lock().await.get(seq).cloned()
    }

    pub async fn verify(&self) -> Result<()> {
        self.inner.lock().await.verify()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Author side
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum DraftItem {
    Inline(Bytes),
    Attach(Bytes, Vec<HashAlgorithm>),
    Declare(AttachmentEntry),
    Pointer(u64, u64),
}

/// Contents of an entry to publish; backlinks are filled in by the writer.
#[derive(Debug, Clone, Default)]
pub struct EntryDraft {
    items: Vec<DraftItem>,
    key_locator: Option<KeyLocator>,
}

impl EntryDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inline(mut self, data: impl Into<Bytes>) -> Self {
        self.items.push(DraftItem::Inline(data.into()));
        self
    }

    /// Attach `blob`, described by one digest per algorithm.
    pub fn attach(mut self, blob: impl Into<Bytes>, algorithms: &[HashAlgorithm]) -> Self {
        self.items
            .push(DraftItem::Attach(blob.into(), algorithms.to_vec()));
        self
    }

    /// Declare an attachment whose bytes travel separately.
    pub fn declare(mut self, entry: AttachmentEntry) -> Self {
        self.items.push(DraftItem::Declare(entry));
        self
    }

    pub fn pointer(mut self, attachment_number: u64, declared_size: u64) -> Self {
        self.items
            .push(DraftItem::Pointer(attachment_number, declared_size));
        self
    }

    pub fn key_locator(mut self, locator: KeyLocator) -> Self {
        self.key_locator = Some(locator);
        self
    }

    /// `back_links` is `None` for the feed's first entry.
    fn into_builder(
        self,
        scheme: SignatureScheme,
        back_links: Option<Vec<Digest>>,
    ) -> EventBuilder {
        let mut builder = match back_links {
            None => EventBuilder::first(scheme),
            Some(links) => links
                .into_iter()
                .fold(EventBuilder::subsequent(scheme), EventBuilder::back_link),
        };
        for item in self.items {
            builder = match item {
                DraftItem::Inline(data) => builder.inline(data),
                DraftItem::Attach(blob, algorithms) => builder.attach(blob, &algorithms),
                DraftItem::Declare(entry) => builder.declare(entry),
                DraftItem::Pointer(number, size) => builder.pointer(number, size),
            };
        }
        if let Some(locator) = self.key_locator {
            builder = builder.key_locator(locator);
        }
        builder
    }
}

/// Publishes entries to a feed on behalf of its author.
pub struct FeedWriter<S: Signer> {
    signer: S,
    handle: FeedHandle,
    scheme: SignatureScheme,
    link_algorithms: Vec<HashAlgorithm>,
    publish_gate: Mutex<()>,
}

impl<S: Signer> FeedWriter<S> {
    /// Create a writer. The signer must author `handle`'s feed.
    pub fn new(signer: S, handle: FeedHandle) -> Result<Self> {
        let signer_feed = signer.feed_id();
        if &signer_feed != handle.feed_id() {
            return Err(BirchError::WrongFeed {
                signer: signer_feed.to_string(),
                feed: handle.feed_id().to_string(),
            });
        }
        let supported = &handle.config.supported_hashes;
        let link_algorithm = if supported.contains(&HashAlgorithm::Sha256) {
            HashAlgorithm::Sha256
        } else {
            *supported
                .first()
                .ok_or_else(|| BirchError::NoLinkAlgorithm { requested: vec![] })?
        };
        Ok(Self {
            signer,
            handle,
            scheme: SignatureScheme::Sha256WithEd25519,
            link_algorithms: vec![link_algorithm],
            publish_gate: Mutex::new(()),
        })
    }

    pub fn with_scheme(mut self, scheme: SignatureScheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Algorithms used for backlinks; one backlink per algorithm.
    ///
    /// Algorithms the feed does not accept are dropped. Fails if none is left.
    pub fn with_link_algorithms(
        mut self,
        algorithms: impl Into<Vec<HashAlgorithm>>,
    ) -> Result<Self> {
        let requested = algorithms.into();
        let usable: Vec<HashAlgorithm> = requested
            .iter()
            .copied()
            .filter(|alg| self.handle.config.supported_hashes.contains(alg))
            .collect();
        if usable.is_empty() {
            return Err(BirchError::NoLinkAlgorithm { requested });
        }
        self.link_algorithms = usable;
        Ok(self)
    }

    pub fn handle(&self) -> &FeedHandle {
        &self.handle
    }

    /// Build, sign and append `draft` as the next entry.
    ///
    /// Publishes through one writer are serialized; signing happens outside
    /// the feed lock.
    pub async fn publish(&self, draft: EntryDraft) -> Result<(u64, LogEntry)> {
        let _gate = self.publish_gate.lock().await;

        let back_links = {
            let feed = self.handle.lock().await;
            if feed.is_forked() {
                return Err(ChainError::Forked {
                    at_seq: feed.chain.expected_seq(),
                }
                .into());
            }
            feed.head_seq().map(|_| feed.head_links(&self.link_algorithms))
        };

        let entry = draft
            .into_builder(self.scheme, back_links)
            .sign(&self.signer)?;
        let seq = self.handle.append(entry.clone()).await?;
        Ok((seq, entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use birch_core::{AttachmentError, Keypair, SignatureError};

    fn keypair() -> Keypair {
        Keypair::from_seed(&[0x31; 32])
    }

    fn feed() -> Feed {
        Feed::new(keypair().feed_id(), FeedConfig::default())
    }

    fn first_entry(keypair: &Keypair) -> LogEntry {
        EventBuilder::first(SignatureScheme::Sha256WithEd25519)
            .inline(&b"genesis"[..])
            .sign(keypair)
            .unwrap()
    }

    fn next_entry(keypair: &Keypair, prev: &LogEntry, payload: &'static [u8]) -> LogEntry {
        EventBuilder::after(&prev.event, &[HashAlgorithm::Sha256], SignatureScheme::Sha256WithEd25519)
            .unwrap()
            .inline(payload)
            .sign(keypair)
            .unwrap()
    }

    #[test]
    fn test_append_and_query() {
        let kp = keypair();
        let mut feed = feed();
        let e0 = first_entry(&kp);
        let e1 = next_entry(&kp, &e0, b"one");

        assert_eq!(feed.append(e0.clone()).unwrap(), 0);
        assert_eq!(feed.append(e1.clone()).unwrap(), 1);
        assert_eq!(feed.len(), 2);
        assert_eq!(feed.head_seq(), Some(1));
        assert_eq!(feed.get(0), Some(&e0));
        assert_eq!(feed.head(), Some(&e1));
        assert!(feed.get(2).is_none());
        feed.verify().unwrap();
    }

    #[test]
    fn test_foreign_signature_rejected() {
        let mut feed = feed();
        let stranger = Keypair::from_seed(&[0x99; 32]);
        let result = feed.append(first_entry(&stranger));
        assert!(matches!(
            result,
            Err(BirchError::Signature(SignatureError::SignatureInvalid))
        ));
        assert!(feed.is_empty());
        assert!(!feed.is_forked());
    }

    #[test]
    fn test_signature_check_can_be_disabled() {
        let config = FeedConfig::default().with_verify_signatures(false);
        let mut feed = Feed::new(keypair().feed_id(), config);
        let stranger = Keypair::from_seed(&[0x99; 32]);
        assert_eq!(feed.append(first_entry(&stranger)).unwrap(), 0);
    }

    #[test]
    fn test_inline_limit() {
        let kp = keypair();
        let config = FeedConfig::default().with_max_inline_bytes(4);
        let mut feed = Feed::new(kp.feed_id(), config);
        let entry = EventBuilder::first(SignatureScheme::Sha256WithEd25519)
            .inline(&b"too long"[..])
            .sign(&kp)
            .unwrap();
        assert!(matches!(
            feed.append(entry),
            Err(BirchError::LimitExceeded {
                limit: 4,
                actual: 8,
                ..
            })
        ));
    }

    #[test]
    fn test_attachment_limit() {
        let kp = keypair();
        let config = FeedConfig::default().with_max_attachments(1);
        let mut feed = Feed::new(kp.feed_id(), config);
        let entry = EventBuilder::first(SignatureScheme::Sha256WithEd25519)
            .attach(&b"a"[..], &[HashAlgorithm::Sha256])
            .attach(&b"b"[..], &[HashAlgorithm::Sha256])
            .sign(&kp)
            .unwrap();
        assert!(matches!(
            feed.append(entry),
            Err(BirchError::LimitExceeded { what: "attachment", .. })
        ));
    }

    #[test]
    fn test_required_attachments() {
        let kp = keypair();
        let entry = EventBuilder::first(SignatureScheme::Sha256WithEd25519)
            .declare(AttachmentEntry::for_blob(b"elsewhere", &[HashAlgorithm::Sha256]))
            .sign(&kp)
            .unwrap();

        let mut lenient = feed();
        assert_eq!(lenient.append(entry.clone()).unwrap(), 0);

        let strict_config = FeedConfig::default().with_require_attachments(true);
        let mut strict = Feed::new(kp.feed_id(), strict_config);
        assert!(matches!(
            strict.append(entry),
            Err(BirchError::Attachment(AttachmentError::CountMismatch { .. }))
        ));
    }

    #[test]
    fn test_tampered_shipped_blob_rejected() {
        let kp = keypair();
        let mut entry = EventBuilder::first(SignatureScheme::Sha256WithEd25519)
            .attach(&b"\x99\x88\x77\x66"[..], &[HashAlgorithm::Sha256])
            .sign(&kp)
            .unwrap();
        entry.raw_attachments[0] = Bytes::from_static(b"\x99\x88\x77\x65");

        let mut feed = feed();
        assert!(matches!(
            feed.append(entry),
            Err(BirchError::Attachment(AttachmentError::DigestMismatch { .. }))
        ));
    }

    #[test]
    fn test_broken_link_forks_feed() {
        let kp = keypair();
        let mut feed = feed();
        let e0 = first_entry(&kp);
        let e1 = next_entry(&kp, &e0, b"one");
        let stray = EventBuilder::subsequent(SignatureScheme::Sha256WithEd25519)
            .back_link(Digest::compute(HashAlgorithm::Sha256, b"unrelated"))
            .inline(&b"stray"[..])
            .sign(&kp)
            .unwrap();

        feed.append(e0).unwrap();
        assert!(matches!(
            feed.append(stray),
            Err(BirchError::Chain(ChainError::ChainBroken { seq: 1 }))
        ));
        assert!(feed.is_forked());
        assert!(matches!(
            feed.append(e1),
            Err(BirchError::Chain(ChainError::Forked { at_seq: 1 }))
        ));
        assert_eq!(feed.len(), 1);
    }

    #[tokio::test]
    async fn test_writer_publishes_chain() {
        let kp = keypair();
        let handle = FeedHandle::new(feed());
        let writer = FeedWriter::new(kp, handle.clone())
            .unwrap()
            .with_link_algorithms([HashAlgorithm::Sha256, HashAlgorithm::Sha512_224])
            .unwrap();

        let (seq0, e0) = writer.publish(EntryDraft::new().inline(&b"zero"[..])).await.unwrap();
        let (seq1, e1) = writer
            .publish(
                EntryDraft::new()
                    .inline(&b"one"[..])
                    .attach(&b"\x99\x88\x77\x66"[..], &[HashAlgorithm::Sha256]),
            )
            .await
            .unwrap();

        assert_eq!((seq0, seq1), (0, 1));
        assert!(e0.event.back_links.is_empty());
        assert_eq!(e1.event.back_links.len(), 2);
        assert!(e1.event.back_links[1].verify(&e0.event.encode().unwrap()));
        assert_eq!(handle.len().await, 2);
        handle.verify().await.unwrap();
    }

    #[test]
    fn test_writer_rejects_foreign_feed() {
        let handle = FeedHandle::new(feed());
        let result = FeedWriter::new(Keypair::from_seed(&[0x99; 32]), handle);
        assert!(matches!(result, Err(BirchError::WrongFeed { .. })));
    }

    #[tokio::test]
    async fn test_writer_links_with_feed_algorithm() {
        let kp = keypair();
        let config = FeedConfig::default().with_supported_hashes([HashAlgorithm::Blake3]);
        let handle = FeedHandle::new(Feed::new(kp.feed_id(), config));
        let writer = FeedWriter::new(kp, handle.clone()).unwrap();

        writer.publish(EntryDraft::new().inline(&b"zero"[..])).await.unwrap();
        let (seq, e1) = writer.publish(EntryDraft::new().inline(&b"one"[..])).await.unwrap();

        assert_eq!(seq, 1);
        assert_eq!(e1.event.back_links[0].algorithm(), HashAlgorithm::Blake3);
        assert!(!handle.is_forked().await);
    }

    #[test]
    fn test_writer_rejects_unusable_link_algorithms() {
        let kp = keypair();
        let config = FeedConfig::default().with_supported_hashes([HashAlgorithm::Blake3]);
        let handle = FeedHandle::new(Feed::new(kp.feed_id(), config));

        let result = FeedWriter::new(kp.clone(), handle.clone())
            .unwrap()
            .with_link_algorithms([HashAlgorithm::Sha256]);
        assert!(matches!(result, Err(BirchError::NoLinkAlgorithm { .. })));

        let result = FeedWriter::new(kp, handle).unwrap().with_link_algorithms(vec![]);
        assert!(matches!(result, Err(BirchError::NoLinkAlgorithm { .. })));

        let empty = FeedConfig::default().with_supported_hashes(vec![]);
        let handle = FeedHandle::new(Feed::new(keypair().feed_id(), empty));
        assert!(matches!(
            FeedWriter::new(keypair(), handle),
            Err(BirchError::NoLinkAlgorithm { .. })
        ));
    }

    #[tokio::test]
    async fn test_writer_never_signs_second_first_entry() {
        let kp = keypair();
        let handle = FeedHandle::new(feed());
        let writer = FeedWriter::new(kp, handle.clone()).unwrap();
        writer.publish(EntryDraft::new().inline(&b"zero"[..])).await.unwrap();

        let draft = EntryDraft::new().inline(&b"one"[..]);
        let entry = draft.into_builder(SignatureScheme::Sha256WithEd25519, Some(vec![]));
        assert!(matches!(entry.build(), Err(birch_core::InvalidEvent::MissingBacklinks)));
        assert!(!handle.is_forked().await);
        assert_eq!(handle.len().await, 1);
    }

    #[test]
    fn test_redelivered_entry_does_not_fork() {
        let kp = keypair();
        let mut feed = feed();
        let e0 = first_entry(&kp);
        let e1 = next_entry(&kp, &e0, b"one");
        let e2 = next_entry(&kp, &e1, b"two");

        feed.append(e0.clone()).unwrap();
        feed.append(e1.clone()).unwrap();
        assert_eq!(feed.append(e1).unwrap(), 1);
        assert_eq!(feed.append(e0).unwrap(), 0);
        assert!(!feed.is_forked());
        assert_eq!(feed.len(), 2);
        assert_eq!(feed.append(e2).unwrap(), 2);
    }
}
