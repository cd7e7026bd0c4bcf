//! Proptest generators for property-based testing.

use proptest::prelude::*;

use birch_core::{
    Digest, EventBuilder, HashAlgorithm, KeyLocator, Keypair, LogEntry, LogEvent, SignatureScheme,
};
use bytes::Bytes;

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a supported hash algorithm.
pub fn hash_algorithm() -> impl Strategy<Value = HashAlgorithm> {
    prop_oneof![
        Just(HashAlgorithm::Sha256),
        Just(HashAlgorithm::Sha512_224),
        Just(HashAlgorithm::Blake3),
    ]
}

/// Generate a non-empty set of algorithms, in random order.
pub fn hash_algorithms() -> impl Strategy<Value = Vec<HashAlgorithm>> {
    prop::collection::vec(hash_algorithm(), 1..=3)
}

/// Generate a signature scheme.
pub fn signature_scheme() -> impl Strategy<Value = SignatureScheme> {
    prop_oneof![
        Just(SignatureScheme::Sha256WithEd25519),
        Just(SignatureScheme::Blake3WithEd25519),
    ]
}

/// Generate a well-formed digest over random bytes.
pub fn digest() -> impl Strategy<Value = Digest> {
    (hash_algorithm(), payload(64)).prop_map(|(alg, data)| Digest::compute(alg, &data))
}

/// Generate payload bytes of specified max length.
pub fn payload(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// Parameters for generating an event.
#[derive(Debug, Clone)]
pub struct EventParams {
    pub keypair: Keypair,
    pub scheme: SignatureScheme,
    pub back_links: Vec<Digest>,
    pub inline: Vec<Vec<u8>>,
    pub attachments: Vec<(Vec<u8>, Vec<HashAlgorithm>)>,
    pub key_locator: Option<Vec<u8>>,
}

impl Arbitrary for EventParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            any::<[u8; 32]>(), // seed
            signature_scheme(),
            prop::collection::vec(digest(), 0..=3),
            prop::collection::vec(payload(256), 0..=4),
            prop::collection::vec((payload(512), hash_algorithms()), 0..=3),
            prop::option::of(payload(32)),
        )
            .prop_map(
                |(seed, scheme, back_links, inline, attachments, key_locator)| EventParams {
                    keypair: Keypair::from_seed(&seed),
                    scheme,
                    back_links,
                    inline,
                    attachments,
                    key_locator,
                },
            )
            .boxed()
    }
}

fn builder_from_params(params: &EventParams) -> EventBuilder {
    let mut builder = if params.back_links.is_empty() {
        EventBuilder::first(params.scheme)
    } else {
        EventBuilder::subsequent(params.scheme)
    };
    for link in &params.back_links {
        builder = builder.back_link(link.clone());
    }
    for data in &params.inline {
        builder = builder.inline(Bytes::copy_from_slice(data));
    }
    for (blob, algorithms) in &params.attachments {
        builder = builder.attach(Bytes::copy_from_slice(blob), algorithms);
    }
    if let Some(locator) = &params.key_locator {
        builder = builder.key_locator(KeyLocator::new(Bytes::copy_from_slice(locator)));
    }
    builder
}

/// Generate an event from parameters.
pub fn event_from_params(params: &EventParams) -> LogEvent {
    builder_from_params(params)
        .build()
        .expect("generated event is valid")
}

/// Generate a signed entry from parameters.
pub fn entry_from_params(params: &EventParams) -> LogEntry {
    builder_from_params(params)
        .sign(&params.keypair)
        .expect("generated entry is valid")
}

#[cfg(test)]
mod tests {
    use super::*;
    use birch_core::signature::verify_encoded;
    use birch_core::{decode_event, encode_event, SignatureError, Signer};

    proptest! {
        #[test]
        fn test_encoding_deterministic(params: EventParams) {
            let e1 = event_from_params(&params);
            let e2 = event_from_params(&params);

            prop_assert_eq!(encode_event(&e1).unwrap(), encode_event(&e2).unwrap());
        }

        #[test]
        fn test_decode_inverts_encode(params: EventParams) {
            let event = event_from_params(&params);
            let bytes = encode_event(&event).unwrap();

            prop_assert_eq!(decode_event(&bytes).unwrap(), event);
        }

        #[test]
        fn test_signed_entries_verify(params: EventParams) {
            let entry = entry_from_params(&params);

            prop_assert!(entry.verify_signature(&params.keypair.feed_id()).is_ok());
            prop_assert!(entry.verify_attachments(true).is_ok());
        }

        #[test]
        fn test_single_byte_tamper_detected(params: EventParams, index: prop::sample::Index) {
            let entry = entry_from_params(&params);
            let mut bytes = encode_event(&entry.event).unwrap();
            let i = index.index(bytes.len());
            bytes[i] ^= 0x80;

            prop_assert_eq!(
                verify_encoded(
                    entry.event.sig_info.scheme,
                    &bytes,
                    &entry.signature,
                    &params.keypair.feed_id(),
                ),
                Err(SignatureError::SignatureInvalid)
            );
        }

        #[test]
        fn test_inline_order_matters(
            a in payload(32),
            b in payload(32),
        ) {
            prop_assume!(a != b);

            let ab = EventBuilder::first(SignatureScheme::Sha256WithEd25519)
                .inline(a.clone())
                .inline(b.clone())
                .build()
                .unwrap();
            let ba = EventBuilder::first(SignatureScheme::Sha256WithEd25519)
                .inline(b)
                .inline(a)
                .build()
                .unwrap();

            prop_assert_ne!(encode_event(&ab).unwrap(), encode_event(&ba).unwrap());
        }
    }
}
