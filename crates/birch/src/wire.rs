//! Self-describing wire format for log entries and whole feeds.
//!
//! This is transport convenience only. The bytes produced here are never
//! signed or hashed; signatures and backlinks always refer to the canonical
//! encoding from [`birch_core::canonical`]. Entries read from the wire are
//! untrusted until appended to a [`Feed`]; [`load_feed`] does exactly that.

use birch_core::{FeedId, LogEntry};
use serde::{Deserialize, Serialize};

use crate::config::FeedConfig;
use crate::error::{BirchError, Result};
use crate::feed::Feed;

/// A feed as shipped between peers: its identity and its entries in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedLog {
    pub feed_id: FeedId,
    pub entries: Vec<LogEntry>,
}

impl From<&Feed> for FeedLog {
    fn from(feed: &Feed) -> Self {
        Self {
            feed_id: feed.feed_id().clone(),
            entries: feed.entries().to_vec(),
        }
    }
}

/// Serialize an entry as CBOR.
pub fn to_cbor(entry: &LogEntry) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(entry, &mut buf).map_err(|e| BirchError::Wire(e.to_string()))?;
    Ok(buf)
}

/// Deserialize an entry from CBOR.
pub fn from_cbor(bytes: &[u8]) -> Result<LogEntry> {
    ciborium::from_reader(bytes).map_err(|e| BirchError::Wire(e.to_string()))
}

/// Serialize an entry as JSON.
pub fn to_json(entry: &LogEntry) -> Result<String> {
    serde_json::to_string(entry).map_err(|e| BirchError::Wire(e.to_string()))
}

/// Deserialize an entry from JSON.
pub fn from_json(s: &str) -> Result<LogEntry> {
    serde_json::from_str(s).map_err(|e| BirchError::Wire(e.to_string()))
}

pub fn feed_to_cbor(feed: &Feed) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(&FeedLog::from(feed), &mut buf)
        .map_err(|e| BirchError::Wire(e.to_string()))?;
    Ok(buf)
}

pub fn feed_to_json(feed: &Feed) -> Result<String> {
    serde_json::to_string(&FeedLog::from(feed)).map_err(|e| BirchError::Wire(e.to_string()))
}

/// Read a feed from CBOR and rebuild it with [`load_feed`].
pub fn feed_from_cbor(bytes: &[u8], config: FeedConfig) -> Result<Feed> {
    let log: FeedLog =
        ciborium::from_reader(bytes).map_err(|e| BirchError::Wire(e.to_string()))?;
    load_feed(log, config)
}

/// Read a feed from JSON and rebuild it with [`load_feed`].
pub fn feed_from_json(s: &str, config: FeedConfig) -> Result<Feed> {
    let log: FeedLog = serde_json::from_str(s).map_err(|e| BirchError::Wire(e.to_string()))?;
    load_feed(log, config)
}

/// Rebuild a feed by appending every entry of `log` in order.
///
/// Each entry goes through the full append checks. Fails on the first
/// rejected entry, and on an entry that repeats an earlier one.
pub fn load_feed(log: FeedLog, config: FeedConfig) -> Result<Feed> {
    let mut feed = Feed::new(log.feed_id, config);
    for (index, entry) in log.entries.into_iter().enumerate() {
        let seq = feed.append(entry)?;
        if seq != index as u64 {
            return Err(BirchError::Wire(format!("entry {} repeats entry {}", index, seq)));
        }
    }
    tracing::debug!(feed = %feed.feed_id(), entries = feed.len(), "Loaded feed");
    Ok(feed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use birch_core::{EventBuilder, HashAlgorithm, Keypair, SignatureScheme, Signer};

    fn entry() -> (Keypair, LogEntry) {
        let keypair = Keypair::from_seed(&[0x21; 32]);
        let entry = EventBuilder::first(SignatureScheme::Blake3WithEd25519)
            .inline(&b"\x11\x22\x33\x44"[..])
            .attach(&b"\x99\x88\x77\x66"[..], &[HashAlgorithm::Sha256, HashAlgorithm::Sha512_224])
            .sign(&keypair)
            .unwrap();
        (keypair, entry)
    }

    #[test]
    fn test_cbor_keeps_signature_valid() {
        let (keypair, entry) = entry();
        let decoded = from_cbor(&to_cbor(&entry).unwrap()).unwrap();
        assert_eq!(decoded, entry);
        decoded.verify_signature(&keypair.feed_id()).unwrap();
        decoded.verify_attachments(true).unwrap();
    }

    #[test]
    fn test_json_keeps_signature_valid() {
        let (keypair, entry) = entry();
        let decoded = from_json(&to_json(&entry).unwrap()).unwrap();
        assert_eq!(decoded, entry);
        decoded.verify_signature(&keypair.feed_id()).unwrap();
    }

    #[test]
    fn test_garbage_is_wire_error() {
        assert!(matches!(from_cbor(&[0xff, 0x00]), Err(BirchError::Wire(_))));
        assert!(matches!(from_json("{"), Err(BirchError::Wire(_))));
    }

    #[test]
    fn test_wire_bytes_are_not_canonical_bytes() {
        let (_, entry) = entry();
        let canonical = entry.event.encode().unwrap();
        assert_ne!(to_cbor(&entry).unwrap(), canonical);
    }

    fn three_entry_feed() -> Feed {
        let keypair = Keypair::from_seed(&[0x22; 32]);
        let first = EventBuilder::first(SignatureScheme::Sha256WithEd25519)
            .inline(&b"\x11\x22\x33\x44"[..])
            .sign(&keypair)
            .unwrap();
        let second = EventBuilder::after(
            &first.event,
            &[HashAlgorithm::Sha256, HashAlgorithm::Sha512_224],
            SignatureScheme::Sha256WithEd25519,
        )
        .unwrap()
        .attach(&b"\x99\x88\x77\x66"[..], &[HashAlgorithm::Sha256])
        .sign(&keypair)
        .unwrap();
        let third = EventBuilder::after(
            &second.event,
            &[HashAlgorithm::Blake3],
            SignatureScheme::Blake3WithEd25519,
        )
        .unwrap()
        .inline(&b"third"[..])
        .sign(&keypair)
        .unwrap();

        let mut feed = Feed::new(keypair.feed_id(), FeedConfig::default());
        for entry in [first, second, third] {
            feed.append(entry).unwrap();
        }
        feed
    }

    #[test]
    fn test_feed_cbor_roundtrip() {
        let feed = three_entry_feed();
        let loaded = feed_from_cbor(&feed_to_cbor(&feed).unwrap(), FeedConfig::default()).unwrap();
        assert_eq!(loaded.feed_id(), feed.feed_id());
        assert_eq!(loaded.entries(), feed.entries());
        assert_eq!(loaded.head_seq(), Some(2));
        loaded.verify().unwrap();
    }

    #[test]
    fn test_feed_json_roundtrip() {
        let feed = three_entry_feed();
        let loaded = feed_from_json(&feed_to_json(&feed).unwrap(), FeedConfig::default()).unwrap();
        assert_eq!(loaded.entries(), feed.entries());
        assert_eq!(loaded.head_seq(), Some(2));
    }

    #[test]
    fn test_load_reverifies_entries() {
        let feed = three_entry_feed();

        let mut reordered = FeedLog::from(&feed);
        reordered.entries.swap(1, 2);
        assert!(matches!(
            load_feed(reordered, FeedConfig::default()),
            Err(BirchError::Chain(_))
        ));

        let mut foreign = FeedLog::from(&feed);
        foreign.feed_id = Keypair::from_seed(&[0x99; 32]).feed_id();
        assert!(matches!(
            load_feed(foreign, FeedConfig::default()),
            Err(BirchError::Signature(_))
        ));

        let mut repeated = FeedLog::from(&feed);
        let first = repeated.entries[0].clone();
        repeated.entries.push(first);
        assert!(matches!(
            load_feed(repeated, FeedConfig::default()),
            Err(BirchError::Wire(_))
        ));
    }
}
