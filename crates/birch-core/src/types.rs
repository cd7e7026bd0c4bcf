//! Feed identity types.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::Ed25519PublicKey;
use crate::error::{CoreError, SignatureError};

/// Key algorithm of a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum FeedKeyAlgorithm {
    Ed25519 = 1,
}

impl FeedKeyAlgorithm {
    /// Wire code.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Parse a wire code.
    pub fn from_code(code: u8) -> Result<Self, CoreError> {
        match code {
            1 => Ok(Self::Ed25519),
            other => Err(CoreError::UnsupportedAlgorithm(other)),
        }
    }
}

impl From<FeedKeyAlgorithm> for u8 {
    fn from(alg: FeedKeyAlgorithm) -> Self {
        alg.code()
    }
}

impl TryFrom<u8> for FeedKeyAlgorithm {
    type Error = CoreError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::from_code(code)
    }
}

/// Identifies an append-only feed and, implicitly, its verification key.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeedId {
    pub key_algorithm: FeedKeyAlgorithm,
    pub public_key: Bytes,
}

impl FeedId {
    /// A feed keyed by an Ed25519 public key.
    pub fn ed25519(public_key: Ed25519PublicKey) -> Self {
        Self {
            key_algorithm: FeedKeyAlgorithm::Ed25519,
            public_key: Bytes::copy_from_slice(public_key.as_bytes()),
        }
    }

    /// The Ed25519 verification key of this feed.
    pub fn ed25519_key(&self) -> Result<Ed25519PublicKey, SignatureError> {
        match self.key_algorithm {
            FeedKeyAlgorithm::Ed25519 => {
                let arr: [u8; 32] = self
                    .public_key[..]
                    .try_into()
                    .map_err(|_| SignatureError::InvalidPublicKey)?;
                Ok(Ed25519PublicKey(arr))
            }
        }
    }

    /// Convert the key bytes to hex.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.public_key)
    }
}

impl From<Ed25519PublicKey> for FeedId {
    fn from(pk: Ed25519PublicKey) -> Self {
        Self::ed25519(pk)
    }
}

impl fmt::Debug for FeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        write!(f, "FeedId({:?}:{})", self.key_algorithm, &hex[..hex.len().min(16)])
    }
}

impl fmt::Display for FeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        write!(f, "{}", &hex[..hex.len().min(16)])
    }
}

/// Opaque reference used to find the verification key when it is not the
/// feed's own public key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyLocator(pub Bytes);

impl KeyLocator {
    pub fn new(value: impl Into<Bytes>) -> Self {
        Self(value.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}
