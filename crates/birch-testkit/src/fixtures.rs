//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use birch_core::{
    Digest, EventBuilder, FeedId, HashAlgorithm, Keypair, LogEntry, SignatureScheme, Signer,
};
use bytes::Bytes;
use rand::RngCore;

/// An author with a deterministic or random key.
pub struct FeedFixture {
    pub keypair: Keypair,
    pub scheme: SignatureScheme,
    pub link_algorithms: Vec<HashAlgorithm>,
}

impl FeedFixture {
    /// Create a fixture with a random keypair.
    pub fn new() -> Self {
        Self::from_keypair(Keypair::generate())
    }

    /// Create with a deterministic keypair from seed.
    pub fn with_seed(seed: [u8; 32]) -> Self {
        Self::from_keypair(Keypair::from_seed(&seed))
    }

    fn from_keypair(keypair: Keypair) -> Self {
        Self {
            keypair,
            scheme: SignatureScheme::Sha256WithEd25519,
            link_algorithms: vec![HashAlgorithm::Sha256],
        }
    }

    pub fn feed_id(&self) -> FeedId {
        self.keypair.feed_id()
    }

    /// The first entry of a feed.
    pub fn make_first(&self, payload: &[u8]) -> LogEntry {
        EventBuilder::first(self.scheme)
            .inline(Bytes::copy_from_slice(payload))
            .sign(&self.keypair)
            .expect("fixture entry is valid")
    }

    /// An entry backlinked to `prev`.
    pub fn make_next(&self, prev: &LogEntry, payload: &[u8]) -> LogEntry {
        EventBuilder::after(&prev.event, &self.link_algorithms, self.scheme)
            .expect("fixture event encodes")
            .inline(Bytes::copy_from_slice(payload))
            .sign(&self.keypair)
            .expect("fixture entry is valid")
    }

    /// An entry carrying `blob` as a shipped attachment.
    pub fn make_with_attachment(
        &self,
        prev: Option<&LogEntry>,
        blob: &[u8],
        algorithms: &[HashAlgorithm],
    ) -> LogEntry {
        let builder = match prev {
            Some(prev) => EventBuilder::after(&prev.event, &self.link_algorithms, self.scheme)
                .expect("fixture event encodes"),
            None => EventBuilder::first(self.scheme),
        };
        builder
            .attach(Bytes::copy_from_slice(blob), algorithms)
            .sign(&self.keypair)
            .expect("fixture entry is valid")
    }

    /// An entry with a backlink to nothing in particular.
    pub fn make_unlinked(&self, payload: &[u8]) -> LogEntry {
        EventBuilder::subsequent(self.scheme)
            .back_link(Digest::compute(HashAlgorithm::Sha256, b"unrelated"))
            .inline(Bytes::copy_from_slice(payload))
            .sign(&self.keypair)
            .expect("fixture entry is valid")
    }

    /// A correctly linked chain, one entry per payload.
    pub fn make_chain(&self, payloads: &[&[u8]]) -> Vec<LogEntry> {
        let mut chain: Vec<LogEntry> = Vec::with_capacity(payloads.len());
        for payload in payloads {
            let entry = match chain.last() {
                Some(prev) => self.make_next(prev, payload),
                None => self.make_first(payload),
            };
            chain.push(entry);
        }
        chain
    }
}

impl Default for FeedFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Create fixtures for distinct authors.
pub fn multi_author_fixtures(count: usize) -> Vec<FeedFixture> {
    (0..count)
        .map(|i| {
            let mut seed = [0u8; 32];
            seed[..8].copy_from_slice(&(i as u64).to_le_bytes());
            FeedFixture::with_seed(seed)
        })
        .collect()
}

/// Random bytes of the given length.
pub fn random_blob(len: usize) -> Bytes {
    let mut buf = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut buf);
    Bytes::from(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use birch_core::verify_chain;

    #[test]
    fn test_chain_links() {
        let fixture = FeedFixture::with_seed([1; 32]);
        let chain = fixture.make_chain(&[&b"a"[..], &b"b"[..], &b"c"[..]]);
        let events: Vec<_> = chain.iter().map(|e| e.event.clone()).collect();
        assert_eq!(verify_chain(&events, &HashAlgorithm::ALL), Ok(Some(2)));
        for entry in &chain {
            entry.verify_signature(&fixture.feed_id()).unwrap();
        }
    }

    #[test]
    fn test_authors_differ() {
        let fixtures = multi_author_fixtures(3);
        assert_ne!(fixtures[0].feed_id(), fixtures[1].feed_id());
        assert_ne!(fixtures[1].feed_id(), fixtures[2].feed_id());
    }

    #[test]
    fn test_many_authors_are_distinct() {
        let fixtures = multi_author_fixtures(300);
        let ids: std::collections::HashSet<String> =
            fixtures.iter().map(|f| f.feed_id().to_string()).collect();
        assert_eq!(ids.len(), 300);
    }

    #[test]
    fn test_attachment_entry_ships_blob() {
        let fixture = FeedFixture::with_seed([2; 32]);
        let blob = random_blob(64);
        let entry = fixture.make_with_attachment(None, &blob, &[HashAlgorithm::Blake3]);
        assert!(entry.has_all_attachments());
        entry.verify_attachments(true).unwrap();
    }
}
