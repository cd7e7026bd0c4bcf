//! Log events and entries.
//!
//! A `LogEvent` is exactly the span that is canonically encoded and signed.
//! A `LogEntry` wraps it with the signature and the raw attachment blobs,
//! which are not signed and are proven by the attachment directory instead.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::attachment::{self, AttachmentDirectory, AttachmentEntry, OffChainPointer};
use crate::canonical::{encode_event, event_hash};
use crate::digest::{Digest, HashAlgorithm};
use crate::error::{AttachmentError, CoreError, EncodingError, InvalidEvent, SignatureError};
use crate::signature::{self, Signer};
use crate::types::{FeedId, KeyLocator};

/// One piece of event content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogContent {
    /// Data carried in the signed event.
    Inline(Bytes),
    /// Data carried outside the event, proven by the attachment directory.
    OffChainPointer(OffChainPointer),
}

impl LogContent {
    pub fn as_pointer(&self) -> Option<&OffChainPointer> {
        match self {
            LogContent::OffChainPointer(p) => Some(p),
            LogContent::Inline(_) => None,
        }
    }
}

/// Hash function + signature algorithm pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum SignatureScheme {
    /// SHA-256 signing digest, Ed25519 signature.
    Sha256WithEd25519 = 1,
    /// BLAKE3 signing digest, Ed25519 signature.
    Blake3WithEd25519 = 2,
}

impl SignatureScheme {
    /// Wire code.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Parse a wire code.
    pub fn from_code(code: u8) -> Result<Self, CoreError> {
        match code {
            1 => Ok(Self::Sha256WithEd25519),
            2 => Ok(Self::Blake3WithEd25519),
            other => Err(CoreError::UnsupportedScheme(other)),
        }
    }

    /// The hash applied to the canonical encoding before signing.
    pub fn digest_algorithm(self) -> HashAlgorithm {
        match self {
            Self::Sha256WithEd25519 => HashAlgorithm::Sha256,
            Self::Blake3WithEd25519 => HashAlgorithm::Blake3,
        }
    }
}

impl From<SignatureScheme> for u8 {
    fn from(scheme: SignatureScheme) -> Self {
        scheme.code()
    }
}

impl TryFrom<u8> for SignatureScheme {
    type Error = CoreError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::from_code(code)
    }
}

/// How an event is signed, and where to find the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignatureInfo {
    pub scheme: SignatureScheme,
    pub key_locator: Option<KeyLocator>,
}

impl SignatureInfo {
    pub fn new(scheme: SignatureScheme) -> Self {
        Self {
            scheme,
            key_locator: None,
        }
    }
}

impl Default for SignatureInfo {
    fn default() -> Self {
        Self::new(SignatureScheme::Sha256WithEd25519)
    }
}

/// Where an event sits in its feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedPosition {
    /// The feed's first event: no backlinks.
    First,
    /// Any later event: at least one backlink.
    Subsequent,
}

/// The signed body of a log entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogEvent {
    pub contents: Vec<LogContent>,
    pub back_links: Vec<Digest>,
    pub sig_info: SignatureInfo,
    pub attachment_directory: Vec<AttachmentEntry>,
}

impl LogEvent {
    /// Canonical encoding of this event.
    pub fn encode(&self) -> Result<Vec<u8>, EncodingError> {
        encode_event(self)
    }

    /// Digest of the canonical encoding, as used for backlinks.
    pub fn hash(&self, algorithm: HashAlgorithm) -> Result<Digest, EncodingError> {
        event_hash(algorithm, self)
    }

    /// Whether the event carries no backlinks.
    pub fn is_first(&self) -> bool {
        self.back_links.is_empty()
    }

    /// All off-chain pointers, in content order.
    pub fn pointers(&self) -> impl Iterator<Item = &OffChainPointer> {
        self.contents.iter().filter_map(LogContent::as_pointer)
    }

    /// Re-run the builder's structural checks.
    pub fn validate(&self, position: FeedPosition) -> Result<(), InvalidEvent> {
        validate_parts(
            &self.contents,
            &self.back_links,
            &self.attachment_directory,
            position,
        )
    }
}

/// Assemble a log event, checking its internal consistency.
pub fn build_event(
    contents: Vec<LogContent>,
    back_links: Vec<Digest>,
    sig_info: SignatureInfo,
    attachment_entries: Vec<AttachmentEntry>,
    position: FeedPosition,
) -> Result<LogEvent, InvalidEvent> {
    validate_parts(&contents, &back_links, &attachment_entries, position)?;
    Ok(LogEvent {
        contents,
        back_links,
        sig_info,
        attachment_directory: attachment_entries,
    })
}

fn validate_parts(
    contents: &[LogContent],
    back_links: &[Digest],
    directory: &[AttachmentEntry],
    position: FeedPosition,
) -> Result<(), InvalidEvent> {
    match position {
        FeedPosition::First if !back_links.is_empty() => {
            return Err(InvalidEvent::BacklinksOnFirstEvent)
        }
        FeedPosition::Subsequent if back_links.is_empty() => {
            return Err(InvalidEvent::MissingBacklinks)
        }
        _ => {}
    }

    for digest in back_links {
        digest.check_len().map_err(InvalidEvent::MalformedDigest)?;
    }

    for (index, entry) in directory.iter().enumerate() {
        if entry.digests.is_empty() {
            return Err(InvalidEvent::AttachmentWithoutDigest(index));
        }
        for digest in &entry.digests {
            digest.check_len().map_err(InvalidEvent::MalformedDigest)?;
        }
    }

    for (index, content) in contents.iter().enumerate() {
        let Some(pointer) = content.as_pointer() else {
            continue;
        };
        let entry = attachment::lookup(directory, pointer.attachment_number).map_err(|_| {
            InvalidEvent::PointerOutOfRange {
                index,
                attachment_number: pointer.attachment_number,
                directory_len: directory.len(),
            }
        })?;
        if entry.declared_size != pointer.declared_size {
            return Err(InvalidEvent::DeclaredSizeMismatch {
                index,
                attachment_number: pointer.attachment_number,
                pointer_size: pointer.declared_size,
                directory_size: entry.declared_size,
            });
        }
    }

    Ok(())
}

/// A signed event plus the blobs shipped alongside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub event: LogEvent,
    /// Signature over the event's signing digest.
    pub signature: Bytes,
    /// Off-chain blobs, positionally aligned to the attachment directory.
    /// May be shorter than the directory when blobs travel separately.
    pub raw_attachments: Vec<Bytes>,
}

impl LogEntry {
    pub fn new(event: LogEvent, signature: impl Into<Bytes>, raw_attachments: Vec<Bytes>) -> Self {
        Self {
            event,
            signature: signature.into(),
            raw_attachments,
        }
    }

    /// Verify the signature against the feed's key.
    pub fn verify_signature(&self, feed_id: &FeedId) -> Result<(), SignatureError> {
        signature::verify_event(&self.event, &self.signature, feed_id)
    }

    /// Whether every declared attachment was shipped.
    pub fn has_all_attachments(&self) -> bool {
        self.raw_attachments.len() == self.event.attachment_directory.len()
    }

    /// Check the shipped blobs against the directory.
    pub fn verify_attachments(&self, require_complete: bool) -> Result<(), AttachmentError> {
        attachment::verify_all(
            &self.event.attachment_directory,
            &self.raw_attachments,
            require_complete,
        )
    }

    /// Return the shipped blob for an attachment number, verified.
    pub fn attachment(&self, attachment_number: u64) -> Result<&Bytes, AttachmentError> {
        let entry = attachment::lookup(&self.event.attachment_directory, attachment_number)?;
        let blob = usize::try_from(attachment_number)
            .ok()
            .and_then(|i| self.raw_attachments.get(i))
            .ok_or(AttachmentError::CountMismatch {
                declared: self.event.attachment_directory.len(),
                shipped: self.raw_attachments.len(),
            })?;
        entry.check(attachment_number, blob)?;
        Ok(blob)
    }

    /// Resolve content `index` to bytes, inline or verified attachment.
    pub fn content(&self, index: usize) -> Option<Result<Bytes, AttachmentError>> {
        let content = self.event.contents.get(index)?;
        Some(match content {
            LogContent::Inline(data) => Ok(data.clone()),
            LogContent::OffChainPointer(pointer) => self
                .attachment(pointer.attachment_number)
                .and_then(|blob| {
                    attachment::resolve(&self.event.attachment_directory, pointer, blob)?;
                    Ok(blob.clone())
                }),
        })
    }
}

/// Fluent builder for events and entries.
#[derive(Debug, Clone)]
pub struct EventBuilder {
    position: FeedPosition,
    contents: Vec<LogContent>,
    back_links: Vec<Digest>,
    sig_info: SignatureInfo,
    directory: AttachmentDirectory,
    blobs: Vec<Option<Bytes>>,
}

impl EventBuilder {
    /// Start the first event of a feed.
    pub fn first(scheme: SignatureScheme) -> Self {
        Self::with_position(FeedPosition::First, scheme)
    }

    /// Start a later event; add backlinks with [`EventBuilder::back_link`].
    pub fn subsequent(scheme: SignatureScheme) -> Self {
        Self::with_position(FeedPosition::Subsequent, scheme)
    }

    /// Start an event following `prev`, backlinked with each algorithm.
    pub fn after(
        prev: &LogEvent,
        algorithms: &[HashAlgorithm],
        scheme: SignatureScheme,
    ) -> Result<Self, EncodingError> {
        let encoded = prev.encode()?;
        let mut builder = Self::subsequent(scheme);
        builder.back_links = algorithms
            .iter()
            .map(|alg| Digest::compute(*alg, &encoded))
            .collect();
        Ok(builder)
    }

    fn with_position(position: FeedPosition, scheme: SignatureScheme) -> Self {
        Self {
            position,
            contents: Vec::new(),
            back_links: Vec::new(),
            sig_info: SignatureInfo::new(scheme),
            directory: AttachmentDirectory::new(),
            blobs: Vec::new(),
        }
    }

    /// Add a backlink.
    pub fn back_link(mut self, digest: Digest) -> Self {
        self.back_links.push(digest);
        self
    }

    /// Add inline content.
    pub fn inline(mut self, data: impl Into<Bytes>) -> Self {
        self.contents.push(LogContent::Inline(data.into()));
        self
    }

    /// Declare `blob` as an attachment and point to it from the contents.
    pub fn attach(mut self, blob: impl Into<Bytes>, algorithms: &[HashAlgorithm]) -> Self {
        let blob = blob.into();
        let pointer = self.directory.declare_blob(&blob, algorithms);
        self.blobs.push(Some(blob));
        self.contents.push(LogContent::OffChainPointer(pointer));
        self
    }

    /// Declare an attachment whose bytes travel separately.
    pub fn declare(mut self, entry: AttachmentEntry) -> Self {
        self.directory.declare(entry.declared_size, entry.digests);
        self.blobs.push(None);
        self
    }

    /// Add a raw pointer; it is checked against the directory on build.
    pub fn pointer(mut self, attachment_number: u64, declared_size: u64) -> Self {
        self.contents.push(LogContent::OffChainPointer(OffChainPointer {
            attachment_number,
            declared_size,
        }));
        self
    }

    /// Set the key locator.
    pub fn key_locator(mut self, locator: KeyLocator) -> Self {
        self.sig_info.key_locator = Some(locator);
        self
    }

    /// Validate and produce the event.
    pub fn build(self) -> Result<LogEvent, InvalidEvent> {
        build_event(
            self.contents,
            self.back_links,
            self.sig_info,
            self.directory.into_entries(),
            self.position,
        )
    }

    /// Validate, sign and assemble the entry.
    ///
    /// Shipped blobs are positional: the entry carries the leading run of
    /// attachments whose bytes were given to [`EventBuilder::attach`], up to
    /// the first one added with [`EventBuilder::declare`].
    pub fn sign(self, signer: &dyn Signer) -> Result<LogEntry, CoreError> {
        let blobs: Vec<Bytes> = self.blobs.iter().map_while(Clone::clone).collect();
        let event = self.build()?;
        let signature = signature::sign_event(&event, signer)?;
        Ok(LogEntry::new(event, signature, blobs))
    }
}
