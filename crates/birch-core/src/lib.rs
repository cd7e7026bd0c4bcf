//! # Birch Core
//!
//! Pure primitives for Birch feeds: digests, canonical event encoding,
//! attachment directories, signing and chain validation.
//!
//! This crate contains no I/O, no async, no logging. It is pure computation
//! over cryptographic data structures.
//!
//! ## Key Types
//!
//! - [`LogEvent`] - The signed body of a feed entry
//! - [`LogEntry`] - An event, its signature and the blobs shipped with it
//! - [`Digest`] - A hash value tagged with its algorithm
//! - [`FeedId`] - Identifies a feed and its verification key
//! - [`ChainValidator`] - Tracks a feed's head and enforces backlinks
//!
//! ## Canonicalization
//!
//! Events are encoded with a frozen deterministic CBOR layout. See the
//! [`canonical`] module.

pub mod attachment;
pub mod canonical;
pub mod chain;
pub mod crypto;
pub mod digest;
pub mod error;
pub mod event;
pub mod signature;
pub mod types;

pub use attachment::{AttachmentDirectory, AttachmentEntry, OffChainPointer};
pub use canonical::{decode_event, encode_event, event_hash};
pub use chain::{verify_chain, ChainState, ChainValidator};
pub use crypto::{Ed25519PublicKey, Keypair};
pub use digest::{Digest, HashAlgorithm};
pub use error::{
    AttachmentError, ChainError, CoreError, EncodingError, InvalidEvent, SignatureError,
};
pub use event::{
    build_event, EventBuilder, FeedPosition, LogContent, LogEntry, LogEvent, SignatureInfo,
    SignatureScheme,
};
pub use signature::{sign_event, signing_digest, verify_encoded, verify_event, Signer};
pub use types::{FeedId, FeedKeyAlgorithm, KeyLocator};
