//! Attachment store: where off-chain blobs live.
//!
//! Entries name attachments only by digest. A store looks blobs up by those
//! digests; [`fetch_attachment`] bounds the lookup with a timeout and checks
//! the returned bytes against the directory before handing them out.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use birch_core::attachment;
use birch_core::{Digest, LogEntry};
use bytes::Bytes;
use tokio::sync::RwLock;

use crate::error::{BirchError, Result};

/// Content-addressed blob lookup.
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    /// Return a blob matching any of `digests`, or `None` if unknown.
    ///
    /// Returned bytes are untrusted; callers verify them.
    async fn fetch(&self, digests: &[Digest]) -> Result<Option<Bytes>>;
}

/// In-memory attachment store, keyed by every digest a blob was put under.
#[derive(Default)]
pub struct MemoryAttachmentStore {
    blobs: RwLock<HashMap<Digest, Bytes>>,
}

impl MemoryAttachmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `blob` under each of `digests` it actually hashes to.
    ///
    /// Returns how many digests it was stored under.
    pub async fn put(&self, digests: &[Digest], blob: Bytes) -> usize {
        let mut blobs = self.blobs.write().await;
        let mut stored = 0;
        for digest in digests {
            if digest.verify(&blob) {
                blobs.insert(digest.clone(), blob.clone());
                stored += 1;
            } else {
                tracing::debug!("Not storing blob under non-matching digest {}", digest);
            }
        }
        stored
    }

    /// Store every blob shipped with `entry`, under its directory digests.
    pub async fn put_entry(&self, entry: &LogEntry) {
        for (dir_entry, blob) in entry
            .event
            .attachment_directory
            .iter()
            .zip(&entry.raw_attachments)
        {
            self.put(&dir_entry.digests, blob.clone()).await;
        }
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait]
impl AttachmentStore for MemoryAttachmentStore {
    async fn fetch(&self, digests: &[Digest]) -> Result<Option<Bytes>> {
        let blobs = self.blobs.read().await;
        Ok(digests.iter().find_map(|d| blobs.get(d).cloned()))
    }
}

/// Fetch attachment `attachment_number` of `entry` and verify it.
///
/// Bytes shipped with the entry are used when present; otherwise the store
/// is asked, bounded by `timeout`. Never returns unverified bytes.
pub async fn fetch_attachment(
    store: &dyn AttachmentStore,
    entry: &LogEntry,
    attachment_number: u64,
    timeout: Duration,
) -> Result<Bytes> {
    let dir_entry = attachment::lookup(&entry.event.attachment_directory, attachment_number)?;

    if let Some(blob) = usize::try_from(attachment_number)
        .ok()
        .and_then(|i| entry.raw_attachments.get(i))
    {
        dir_entry.check(attachment_number, blob)?;
        return Ok(blob.clone());
    }

    let blob = match tokio::time::timeout(timeout, store.fetch(&dir_entry.digests)).await {
        Ok(Ok(Some(blob))) => blob,
        Ok(Ok(None)) => return Err(BirchError::AttachmentNotFound(attachment_number)),
        Ok(Err(e)) => return Err(e),
        Err(_) => {
            tracing::warn!(
                "Attachment {} fetch timed out after {:?}",
                attachment_number,
                timeout
            );
            return Err(BirchError::FetchTimeout {
                attachment_number,
                timeout,
            });
        }
    };

    if let Err(e) = dir_entry.check(attachment_number, &blob) {
        tracing::warn!("Store returned bad bytes for attachment {}: {}", attachment_number, e);
        return Err(e.into());
    }
    Ok(blob)
}

#[cfg(test)]
mod tests {
    use super::*;
    use birch_core::{AttachmentEntry, AttachmentError, EventBuilder, HashAlgorithm, Keypair};
    use birch_core::SignatureScheme;

    const BLOB: &[u8] = b"\x99\x88\x77\x66";

    /// Never answers.
    struct StalledStore;

    #[async_trait]
    impl AttachmentStore for StalledStore {
        async fn fetch(&self, _digests: &[Digest]) -> Result<Option<Bytes>> {
            std::future::pending().await
        }
    }

    fn entry_without_blob() -> LogEntry {
        EventBuilder::first(SignatureScheme::Sha256WithEd25519)
            .declare(AttachmentEntry::for_blob(BLOB, &[HashAlgorithm::Sha256]))
            .pointer(0, 4)
            .sign(&Keypair::from_seed(&[0x11; 32]))
            .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_from_store() {
        let store = MemoryAttachmentStore::new();
        let entry = entry_without_blob();
        assert!(entry.raw_attachments.is_empty());

        store
            .put(
                &entry.event.attachment_directory[0].digests,
                Bytes::from_static(BLOB),
            )
            .await;

        let blob = fetch_attachment(&store, &entry, 0, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(&blob[..], BLOB);
    }

    /// Answers every lookup with the same bytes.
    struct FixedStore(Bytes);

    #[async_trait]
    impl AttachmentStore for FixedStore {
        async fn fetch(&self, _digests: &[Digest]) -> Result<Option<Bytes>> {
            Ok(Some(self.0.clone()))
        }
    }

    #[tokio::test]
    async fn test_fetch_rejects_tampered_store() {
        let store = FixedStore(Bytes::from_static(b"\x99\x88\x77\x65"));
        let entry = entry_without_blob();

        let result = fetch_attachment(&store, &entry, 0, Duration::from_secs(1)).await;
        assert!(matches!(
            result,
            Err(BirchError::Attachment(AttachmentError::DigestMismatch { .. }))
        ));
    }

    #[tokio::test]
    async fn test_put_skips_non_matching_digests() {
        let store = MemoryAttachmentStore::new();
        let sha = Digest::compute(HashAlgorithm::Sha256, BLOB);
        let blake = Digest::compute(HashAlgorithm::Blake3, BLOB);

        let stored = store
            .put(&[sha.clone()], Bytes::from_static(b"\x99\x88\x77\x65"))
            .await;
        assert_eq!(stored, 0);
        assert_eq!(store.put(&[blake.clone()], Bytes::from_static(BLOB)).await, 1);

        let blob = store.fetch(&[sha, blake]).await.unwrap().unwrap();
        assert_eq!(&blob[..], BLOB);
    }

    #[tokio::test]
    async fn test_fetch_missing() {
        let store = MemoryAttachmentStore::new();
        let entry = entry_without_blob();
        let result = fetch_attachment(&store, &entry, 0, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(BirchError::AttachmentNotFound(0))));

        let result = fetch_attachment(&store, &entry, 5, Duration::from_secs(1)).await;
        assert!(matches!(
            result,
            Err(BirchError::Attachment(AttachmentError::UnknownAttachmentNumber { .. }))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_timeout() {
        let entry = entry_without_blob();
        let result = fetch_attachment(&StalledStore, &entry, 0, Duration::from_millis(50)).await;
        assert!(matches!(
            result,
            Err(BirchError::FetchTimeout {
                attachment_number: 0,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_shipped_blob_skips_store() {
        let entry = EventBuilder::first(SignatureScheme::Sha256WithEd25519)
            .attach(BLOB, &[HashAlgorithm::Sha256])
            .sign(&Keypair::from_seed(&[0x11; 32]))
            .unwrap();
        let blob = fetch_attachment(&StalledStore, &entry, 0, Duration::from_millis(50))
            .await
            .unwrap();
        assert_eq!(&blob[..], BLOB);
    }

    #[tokio::test]
    async fn test_put_entry() {
        let store = MemoryAttachmentStore::new();
        let entry = EventBuilder::first(SignatureScheme::Sha256WithEd25519)
            .attach(BLOB, &[HashAlgorithm::Sha256, HashAlgorithm::Blake3])
            .sign(&Keypair::from_seed(&[0x11; 32]))
            .unwrap();
        store.put_entry(&entry).await;
        assert_eq!(store.len().await, 2);
    }
}
