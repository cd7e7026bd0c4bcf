//! Attachment directory: content-addressed references to off-chain blobs.
//!
//! An event never carries attachment bytes. It carries a directory of
//! `(declared_size, digests)` entries, and contents point into it by index.
//! Every digest listed for an entry must match the bytes; multiple digests
//! are redundant proofs over the same bytes, not alternatives.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::digest::{Digest, HashAlgorithm};
use crate::error::AttachmentError;

/// In-event pointer to an attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OffChainPointer {
    /// Index into the event's attachment directory.
    pub attachment_number: u64,
    /// Size the author claims for the blob.
    pub declared_size: u64,
}

/// One directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttachmentEntry {
    pub declared_size: u64,
    pub digests: Vec<Digest>,
}

impl AttachmentEntry {
    pub fn new(declared_size: u64, digests: Vec<Digest>) -> Self {
        Self {
            declared_size,
            digests,
        }
    }

    /// Describe `blob` with one digest per algorithm, in the order given.
    pub fn for_blob(blob: &[u8], algorithms: &[HashAlgorithm]) -> Self {
        Self {
            declared_size: blob.len() as u64,
            digests: algorithms
                .iter()
                .map(|alg| Digest::compute(*alg, blob))
                .collect(),
        }
    }

    /// Check `bytes` against this entry. Fails closed on any mismatch.
    pub fn check(&self, attachment_number: u64, bytes: &[u8]) -> Result<(), AttachmentError> {
        if bytes.len() as u64 != self.declared_size {
            return Err(AttachmentError::SizeMismatch {
                attachment_number,
                declared: self.declared_size,
                actual: bytes.len() as u64,
            });
        }

        if self.digests.is_empty() {
            return Err(AttachmentError::NoDigests(attachment_number));
        }

        for digest in &self.digests {
            if !digest.verify(bytes) {
                return Err(AttachmentError::DigestMismatch {
                    attachment_number,
                    algorithm: digest.algorithm(),
                });
            }
        }

        Ok(())
    }
}

/// Look up the directory entry a pointer refers to.
pub fn lookup(
    directory: &[AttachmentEntry],
    attachment_number: u64,
) -> Result<&AttachmentEntry, AttachmentError> {
    usize::try_from(attachment_number)
        .ok()
        .and_then(|index| directory.get(index))
        .ok_or(AttachmentError::UnknownAttachmentNumber {
            attachment_number,
            directory_len: directory.len(),
        })
}

/// Resolve an in-event pointer against actual bytes.
pub fn resolve(
    directory: &[AttachmentEntry],
    pointer: &OffChainPointer,
    actual: &[u8],
) -> Result<(), AttachmentError> {
    let entry = lookup(directory, pointer.attachment_number)?;

    if pointer.declared_size != entry.declared_size {
        return Err(AttachmentError::SizeMismatch {
            attachment_number: pointer.attachment_number,
            declared: pointer.declared_size,
            actual: entry.declared_size,
        });
    }

    entry.check(pointer.attachment_number, actual)
}

/// Check every blob shipped with an entry against the directory.
///
/// `raw` is positionally aligned to `directory`. With `require_complete`,
/// the counts must match exactly; otherwise a shorter list is accepted and
/// only the shipped blobs are checked. More blobs than entries is always an
/// error.
pub fn verify_all(
    directory: &[AttachmentEntry],
    raw: &[Bytes],
    require_complete: bool,
) -> Result<(), AttachmentError> {
    let count_ok = if require_complete {
        raw.len() == directory.len()
    } else {
        raw.len() <= directory.len()
    };
    if !count_ok {
        return Err(AttachmentError::CountMismatch {
            declared: directory.len(),
            shipped: raw.len(),
        });
    }

    for (number, (entry, blob)) in directory.iter().zip(raw).enumerate() {
        entry.check(number as u64, blob)?;
    }
    Ok(())
}

/// A growable directory used while assembling an event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachmentDirectory {
    entries: Vec<AttachmentEntry>,
}

impl AttachmentDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an attachment and return its stable, 0-based number.
    pub fn declare(&mut self, declared_size: u64, digests: Vec<Digest>) -> u64 {
        self.entries.push(AttachmentEntry::new(declared_size, digests));
        (self.entries.len() - 1) as u64
    }

    /// Declare `blob`, hashing it with each of `algorithms`.
    pub fn declare_blob(&mut self, blob: &[u8], algorithms: &[HashAlgorithm]) -> OffChainPointer {
        let entry = AttachmentEntry::for_blob(blob, algorithms);
        let declared_size = entry.declared_size;
        self.entries.push(entry);
        OffChainPointer {
            attachment_number: (self.entries.len() - 1) as u64,
            declared_size,
        }
    }

    /// Resolve a pointer against actual bytes.
    pub fn resolve(&self, pointer: &OffChainPointer, actual: &[u8]) -> Result<(), AttachmentError> {
        resolve(&self.entries, pointer, actual)
    }

    pub fn get(&self, attachment_number: u64) -> Option<&AttachmentEntry> {
        lookup(&self.entries, attachment_number).ok()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[AttachmentEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<AttachmentEntry> {
        self.entries
    }
}

impl From<Vec<AttachmentEntry>> for AttachmentDirectory {
    fn from(entries: Vec<AttachmentEntry>) -> Self {
        Self { entries }
    }
}
