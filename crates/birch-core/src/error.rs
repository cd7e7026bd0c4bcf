//! Error types for the Birch core.
//!
//! Every failure is a plain value. Nothing in this crate retries.

use thiserror::Error;

use crate::digest::HashAlgorithm;

/// Errors produced while canonically encoding or decoding an event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    #[error("digest length mismatch for {algorithm}: expected {expected} bytes, got {got}")]
    DigestLength {
        algorithm: HashAlgorithm,
        expected: usize,
        got: usize,
    },

    #[error("log content has no populated variant")]
    EmptyContent,

    #[error("unsupported hash algorithm code: {0}")]
    UnsupportedAlgorithm(u8),

    #[error("unsupported signature scheme code: {0}")]
    UnsupportedScheme(u8),

    #[error("input is not in canonical form")]
    NonCanonical,

    #[error("malformed event: {0}")]
    Malformed(String),

    #[error("decoding error: {0}")]
    Decoding(String),
}

/// Structural violations caught by the event builder, before signing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidEvent {
    #[error("content {index} points at attachment {attachment_number}, directory has {directory_len}")]
    PointerOutOfRange {
        index: usize,
        attachment_number: u64,
        directory_len: usize,
    },

    #[error("content {index} declares {pointer_size} bytes, attachment {attachment_number} declares {directory_size}")]
    DeclaredSizeMismatch {
        index: usize,
        attachment_number: u64,
        pointer_size: u64,
        directory_size: u64,
    },

    #[error("first event of a feed must not carry backlinks")]
    BacklinksOnFirstEvent,

    #[error("event after the first must carry at least one backlink")]
    MissingBacklinks,

    #[error("attachment {0} lists no digests")]
    AttachmentWithoutDigest(usize),

    #[error("malformed digest: {0}")]
    MalformedDigest(EncodingError),
}

/// Attachment integrity failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttachmentError {
    #[error("unknown attachment number {attachment_number} (directory has {directory_len})")]
    UnknownAttachmentNumber {
        attachment_number: u64,
        directory_len: usize,
    },

    #[error("attachment {attachment_number}: expected {declared} bytes, got {actual}")]
    SizeMismatch {
        attachment_number: u64,
        declared: u64,
        actual: u64,
    },

    #[error("attachment {attachment_number}: {algorithm} digest does not match")]
    DigestMismatch {
        attachment_number: u64,
        algorithm: HashAlgorithm,
    },

    #[error("attachment {0} lists no digests")]
    NoDigests(u64),

    #[error("entry ships {shipped} attachments, directory declares {declared}")]
    CountMismatch { declared: usize, shipped: usize },
}

/// Signing and verification failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("unsupported signature scheme: {0}")]
    UnsupportedScheme(String),

    #[error("signature verification failed")]
    SignatureInvalid,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("signer failure: {0}")]
    Signer(String),

    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),
}

/// Chain continuity failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("chain broken at seq {seq}: no backlink matches the head")]
    ChainBroken { seq: u64 },

    #[error("feed is forked at seq {at_seq}")]
    Forked { at_seq: u64 },

    #[error("first entry of a feed must not carry backlinks")]
    UnexpectedBacklinks,

    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),
}

/// Umbrella error for callers that do not care which stage failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("unsupported hash algorithm code: {0}")]
    UnsupportedAlgorithm(u8),

    #[error("unsupported signature scheme code: {0}")]
    UnsupportedScheme(u8),

    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),

    #[error("invalid event: {0}")]
    InvalidEvent(#[from] InvalidEvent),

    #[error("attachment error: {0}")]
    Attachment(#[from] AttachmentError),

    #[error("signature error: {0}")]
    Signature(#[from] SignatureError),

    #[error("chain error: {0}")]
    Chain(#[from] ChainError),
}
