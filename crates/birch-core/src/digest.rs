//! Algorithm-tagged digests.
//!
//! The set of hash algorithms is closed and versioned. Adding one changes the
//! protocol, so each algorithm carries a stable one-byte wire code.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256, Sha512_224};
use std::fmt;

use crate::error::{CoreError, EncodingError};

/// Supported hash algorithms (protocol version 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum HashAlgorithm {
    /// SHA-256, 32-byte output.
    Sha256 = 1,
    /// SHA-512/224, 28-byte output.
    Sha512_224 = 2,
    /// BLAKE3, 32-byte output.
    Blake3 = 3,
}

impl HashAlgorithm {
    /// Every algorithm in the current protocol version.
    pub const ALL: [HashAlgorithm; 3] = [Self::Sha256, Self::Sha512_224, Self::Blake3];

    /// Wire code.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Parse a wire code.
    pub fn from_code(code: u8) -> Result<Self, CoreError> {
        match code {
            1 => Ok(Self::Sha256),
            2 => Ok(Self::Sha512_224),
            3 => Ok(Self::Blake3),
            other => Err(CoreError::UnsupportedAlgorithm(other)),
        }
    }

    /// Fixed output length in bytes.
    pub fn output_len(self) -> usize {
        match self {
            Self::Sha256 => 32,
            Self::Sha512_224 => 28,
            Self::Blake3 => 32,
        }
    }

    /// Hash `data` and return the raw output.
    pub fn hash(self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha256 => Sha256::digest(data).to_vec(),
            Self::Sha512_224 => Sha512_224::digest(data).to_vec(),
            Self::Blake3 => blake3::hash(data).as_bytes().to_vec(),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sha256 => "sha256",
            Self::Sha512_224 => "sha512-224",
            Self::Blake3 => "blake3",
        };
        f.write_str(name)
    }
}

impl From<HashAlgorithm> for u8 {
    fn from(alg: HashAlgorithm) -> Self {
        alg.code()
    }
}

impl TryFrom<u8> for HashAlgorithm {
    type Error = CoreError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::from_code(code)
    }
}

/// A hash value tagged with the algorithm that produced it.
///
/// `Digest::new` and `Digest::compute` guarantee the value length matches the
/// algorithm. Values that arrive through serde are not checked here; the
/// canonical encoder rejects them instead.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Digest {
    algorithm: HashAlgorithm,
    value: Bytes,
}

impl Digest {
    /// Create a digest from a precomputed value.
    pub fn new(algorithm: HashAlgorithm, value: impl Into<Bytes>) -> Result<Self, EncodingError> {
        let digest = Self {
            algorithm,
            value: value.into(),
        };
        digest.check_len()?;
        Ok(digest)
    }

    /// Hash `data` with `algorithm`.
    pub fn compute(algorithm: HashAlgorithm, data: &[u8]) -> Self {
        Self {
            algorithm,
            value: Bytes::from(algorithm.hash(data)),
        }
    }

    /// Recompute over `data` and compare.
    pub fn verify(&self, data: &[u8]) -> bool {
        self.check_len().is_ok() && self.algorithm.hash(data) == self.value.as_ref()
    }

    /// The algorithm tag.
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// The raw hash bytes.
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Convert the value to hex.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.value)
    }

    /// Parse `"<algorithm>:<hex>"`, the form produced by `Display`.
    pub fn parse(s: &str) -> Result<Self, EncodingError> {
        let (name, hex_value) = s
            .split_once(':')
            .ok_or_else(|| EncodingError::Malformed(format!("missing algorithm prefix: {s}")))?;
        let algorithm = HashAlgorithm::ALL
            .into_iter()
            .find(|alg| alg.to_string() == name)
            .ok_or_else(|| EncodingError::Malformed(format!("unknown algorithm: {name}")))?;
        let value = hex::decode(hex_value).map_err(|e| EncodingError::Malformed(e.to_string()))?;
        Self::new(algorithm, value)
    }

    /// Check the length invariant.
    pub fn check_len(&self) -> Result<(), EncodingError> {
        let expected = self.algorithm.output_len();
        if self.value.len() != expected {
            return Err(EncodingError::DigestLength {
                algorithm: self.algorithm,
                expected,
                got: self.value.len(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        write!(f, "Digest({}:{})", self.algorithm, &hex[..hex.len().min(16)])
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.to_hex())
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.value
    }
}
