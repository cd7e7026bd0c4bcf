//! Chain validation: the backlink continuity rule of a feed.
//!
//! Entry 0 carries no backlinks. Entry i > 0 must carry at least one
//! backlink, in a supported algorithm, equal to the digest of entry i-1's
//! canonical encoding. A feed whose author signed an entry that fails this
//! rule is forked, and stays forked.

use crate::canonical::encode_event;
use crate::digest::{Digest, HashAlgorithm};
use crate::error::ChainError;
use crate::event::LogEvent;

/// Where a feed's chain stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainState {
    /// No entries yet.
    Empty,

    /// Contiguous chain up to `seq`.
    Linked {
        /// Sequence number of the head (0-based).
        seq: u64,
        /// Canonical encoding of the head event.
        head_encoding: Vec<u8>,
    },

    /// An entry failed to link. Terminal.
    Forked {
        /// Sequence number the broken entry would have taken.
        at_seq: u64,
    },
}

/// Tracks the head of a single feed and checks each new event against it.
#[derive(Debug, Clone)]
pub struct ChainValidator {
    supported: Vec<HashAlgorithm>,
    state: ChainState,
}

impl ChainValidator {
    /// A validator that accepts backlinks in any of `supported`.
    pub fn new(supported: impl Into<Vec<HashAlgorithm>>) -> Self {
        Self {
            supported: supported.into(),
            state: ChainState::Empty,
        }
    }

    pub fn state(&self) -> &ChainState {
        &self.state
    }

    pub fn supported(&self) -> &[HashAlgorithm] {
        &self.supported
    }

    /// Sequence number of the head, if any entry has been linked.
    pub fn head_seq(&self) -> Option<u64> {
        match &self.state {
            ChainState::Linked { seq, .. } => Some(*seq),
            _ => None,
        }
    }

    /// Sequence number the next entry will take.
    pub fn expected_seq(&self) -> u64 {
        match &self.state {
            ChainState::Empty => 0,
            ChainState::Linked { seq, .. } => seq + 1,
            ChainState::Forked { at_seq } => *at_seq,
        }
    }

    pub fn is_forked(&self) -> bool {
        matches!(self.state, ChainState::Forked { .. })
    }

    /// Digest of the head's encoding, i.e. the backlink the next entry needs.
    pub fn head_digest(&self, algorithm: HashAlgorithm) -> Option<Digest> {
        match &self.state {
            ChainState::Linked { head_encoding, .. } => {
                Some(Digest::compute(algorithm, head_encoding))
            }
            _ => None,
        }
    }

    /// Link `event` onto the chain and return its sequence number.
    pub fn append(&mut self, event: &LogEvent) -> Result<u64, ChainError> {
        let encoded = encode_event(event)?;
        self.append_encoded(event, encoded)
    }

    /// Like [`ChainValidator::append`], with the event's canonical bytes
    /// already at hand.
    pub fn append_encoded(&mut self, event: &LogEvent, encoded: Vec<u8>) -> Result<u64, ChainError> {
        match &self.state {
            ChainState::Empty => {
                if !event.back_links.is_empty() {
                    return Err(ChainError::UnexpectedBacklinks);
                }
                self.state = ChainState::Linked {
                    seq: 0,
                    head_encoding: encoded,
                };
                Ok(0)
            }
            ChainState::Linked { seq, head_encoding } => {
                let next = seq + 1;
                if !self.links_to(event, head_encoding) {
                    self.state = ChainState::Forked { at_seq: next };
                    return Err(ChainError::ChainBroken { seq: next });
                }
                self.state = ChainState::Linked {
                    seq: next,
                    head_encoding: encoded,
                };
                Ok(next)
            }
            ChainState::Forked { at_seq } => Err(ChainError::Forked { at_seq: *at_seq }),
        }
    }

    fn links_to(&self, event: &LogEvent, head_encoding: &[u8]) -> bool {
        event.back_links.iter().any(|link| {
            self.supported.contains(&link.algorithm()) && link.verify(head_encoding)
        })
    }
}

/// Replay `events` from an empty chain. Returns the head sequence number, or
/// `None` for an empty slice; fails at the first break.
pub fn verify_chain(
    events: &[LogEvent],
    supported: &[HashAlgorithm],
) -> Result<Option<u64>, ChainError> {
    let mut validator = ChainValidator::new(supported.to_vec());
    for event in events {
        validator.append(event)?;
    }
    Ok(validator.head_seq())
}
