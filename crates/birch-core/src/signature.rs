//! Digest-then-sign over the canonical encoding.
//!
//! The signed message is the raw bytes of
//! `hash_{scheme}(SIGN_DOMAIN || encode_event(event))`. The signature input
//! is therefore bounded by the digest size, and the scheme can change
//! independently of the encoding.
//!
//! **CRITICAL**: `SIGN_DOMAIN` is FROZEN. Changing it invalidates every
//! signature ever produced.

use crate::canonical::encode_event;
use crate::crypto::{Ed25519PublicKey, Keypair};
use crate::digest::Digest;
use crate::error::SignatureError;
use crate::event::{LogEvent, SignatureScheme};
use crate::types::{FeedId, FeedKeyAlgorithm};

/// Domain separation prefix for event signatures.
pub const SIGN_DOMAIN: &[u8] = b"birch/event-sig/v1";

/// The signing capability. Private key material stays behind this trait.
pub trait Signer {
    /// The feed this signer authors.
    fn feed_id(&self) -> FeedId;

    /// Whether the signer can produce signatures for `scheme`.
    fn supports(&self, scheme: SignatureScheme) -> bool;

    /// Sign a signing digest.
    fn sign_digest(&self, digest: &Digest) -> Result<Vec<u8>, SignatureError>;
}

impl Signer for Keypair {
    fn feed_id(&self) -> FeedId {
        FeedId::ed25519(self.public_key())
    }

    fn supports(&self, scheme: SignatureScheme) -> bool {
        matches!(
            scheme,
            SignatureScheme::Sha256WithEd25519 | SignatureScheme::Blake3WithEd25519
        )
    }

    fn sign_digest(&self, digest: &Digest) -> Result<Vec<u8>, SignatureError> {
        Ok(self.sign(digest.value()).to_vec())
    }
}

/// Signing digest of already-encoded event bytes.
pub fn signing_digest_of(scheme: SignatureScheme, encoded: &[u8]) -> Digest {
    let mut message = Vec::with_capacity(SIGN_DOMAIN.len() + encoded.len());
    message.extend_from_slice(SIGN_DOMAIN);
    message.extend_from_slice(encoded);
    Digest::compute(scheme.digest_algorithm(), &message)
}

/// Signing digest of an event, per the hash its scheme names.
pub fn signing_digest(event: &LogEvent) -> Result<Digest, SignatureError> {
    let encoded = encode_event(event)?;
    Ok(signing_digest_of(event.sig_info.scheme, &encoded))
}

/// Sign an event with an external signer.
pub fn sign_event(event: &LogEvent, signer: &dyn Signer) -> Result<Vec<u8>, SignatureError> {
    let scheme = event.sig_info.scheme;
    if !signer.supports(scheme) {
        return Err(SignatureError::UnsupportedScheme(format!("{scheme:?}")));
    }
    let digest = signing_digest(event)?;
    signer.sign_digest(&digest)
}

/// Verify an event's signature against the feed's key.
pub fn verify_event(
    event: &LogEvent,
    signature: &[u8],
    feed_id: &FeedId,
) -> Result<(), SignatureError> {
    let encoded = encode_event(event)?;
    verify_encoded(event.sig_info.scheme, &encoded, signature, feed_id)
}

/// Verify a signature over canonical event bytes.
pub fn verify_encoded(
    scheme: SignatureScheme,
    encoded: &[u8],
    signature: &[u8],
    feed_id: &FeedId,
) -> Result<(), SignatureError> {
    match feed_id.key_algorithm {
        FeedKeyAlgorithm::Ed25519 => {
            let key = feed_id.ed25519_key()?;
            verify_encoded_with_key(scheme, encoded, signature, &key)
        }
    }
}

/// Verify with an explicit key, for events whose key locator names a key
/// other than the feed's own.
pub fn verify_encoded_with_key(
    scheme: SignatureScheme,
    encoded: &[u8],
    signature: &[u8],
    key: &Ed25519PublicKey,
) -> Result<(), SignatureError> {
    match scheme {
        SignatureScheme::Sha256WithEd25519 | SignatureScheme::Blake3WithEd25519 => {
            let digest = signing_digest_of(scheme, encoded);
            key.verify(digest.value(), signature)
        }
    }
}
