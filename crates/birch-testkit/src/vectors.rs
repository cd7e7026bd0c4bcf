//! Golden test vectors for deterministic verification.
//!
//! Each vector pins the canonical encoding of one event, the SHA-256 of that
//! encoding (its backlink value) and the Ed25519 signature a fixed seed
//! produces over it. Any change here means the frozen layout changed.

use birch_core::{
    Digest, EventBuilder, HashAlgorithm, KeyLocator, Keypair, LogEvent, SignatureScheme,
};
use bytes::Bytes;
use serde::Serialize;

/// A golden test vector.
#[derive(Debug, Clone, Serialize)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Seed for deterministic key generation.
    pub seed: [u8; 32],
    /// Signature scheme.
    pub scheme: SignatureScheme,
    /// Backlinks, given as (algorithm, preimage).
    pub back_links: &'static [(HashAlgorithm, &'static [u8])],
    /// Inline contents, in order.
    pub inline: &'static [&'static [u8]],
    /// Attached blobs and the algorithms describing each, after the inline
    /// contents.
    pub attachments: &'static [(&'static [u8], &'static [HashAlgorithm])],
    /// Key locator bytes.
    pub key_locator: Option<&'static [u8]>,
    /// Expected canonical encoding (hex).
    pub expected_encoding: &'static str,
    /// Expected SHA-256 of the encoding (hex).
    pub expected_sha256: &'static str,
    /// Expected signature (hex).
    pub expected_signature: &'static str,
}

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "Minimal first event",
            seed: [0x42; 32],
            scheme: SignatureScheme::Sha256WithEd25519,
            back_links: &[],
            inline: &[b"\x01"],
            attachments: &[],
            key_locator: None,
            expected_encoding: "a40081820041010180028201f60380",
            expected_sha256: "61436bc7e742c40645c3fdea8c58ae3a494b4620c821731afaf10a0ed1390e79",
            expected_signature: "662a251f07ecd27927e978bddebcfd790ad6c754f7fd6c45a18b80341d5c8f9a\
                                 b340f1384c1906a7762d94c50fd5d1d8d8344efd895646e94077d86fe1e17e03",
        },
        GoldenVector {
            name: "Two backlinks, inline and attachment",
            seed: [0x42; 32],
            scheme: SignatureScheme::Sha256WithEd25519,
            back_links: &[
                (HashAlgorithm::Sha256, b"\xde\xad\xbe\xef"),
                (HashAlgorithm::Sha512_224, b"\xaa\xbb\xcc\xef"),
            ],
            inline: &[b"\x11\x22\x33\x44"],
            attachments: &[(b"\x99\x88\x77\x66", &[HashAlgorithm::Sha256])],
            key_locator: None,
            expected_encoding: "a4008282004411223344830100040182820158205f78c33274e43fa9de5659265c\
                                1d917e25c03722dcb0b8d27db8d5feaa8139538202581c095aaa76de875aac9157\
                                626ea3d9d0b6d14c2853dfa1e8d800e779ac028201f6038182048182015820dc5d\
                                b77b8b827c99ea80b2efd183cc2fa4c54fe0aed5aa0775cae7fd8ba4beef",
            expected_sha256: "4d870b24abcdd6b693a8b71372dc28c3094cd17562f36b16b61f3575e8362f89",
            expected_signature: "046806bce07a3f44c5e51479e3a7a2e82036b1a243bd9182de0d2fa4f5c97e31\
                                 8477e7db9e1445d937ff00055c44919ee43e3305333da81a4a88cb942f78730e",
        },
        GoldenVector {
            name: "Key locator and multi-hash attachment",
            seed: [0x07; 32],
            scheme: SignatureScheme::Sha256WithEd25519,
            back_links: &[],
            inline: &[b"hello"],
            attachments: &[(b"world", &[HashAlgorithm::Sha512_224, HashAlgorithm::Sha256])],
            key_locator: Some(b"keyloc"),
            expected_encoding: "a4008282004568656c6c6f830100050180028201466b65796c6f6303818205828202\
                                581c4fc187a8ac275771f3f5d4ea04ba2b1460874a720c63d96cc4d043c182015820\
                                486ea46224d1bb4fb680f34f7c9ad96a8f24ec88be73ea8e5a6c65260e9cb8a7",
            expected_sha256: "e04ada33b6732d0b30e10e737c728bd39c06ffbf6c95c8deb9ae0ddacffa5b3e",
            expected_signature: "177d8bc446503c0520235e1affa465ca9fce79e37a536a86d72090e909318953\
                                 c6ad26659dcc940f0db578eecfff6fdcc94f5b2b23049510d54e0f787efde40d",
        },
    ]
}

fn builder_from_vector(vector: &GoldenVector) -> EventBuilder {
    let mut builder = if vector.back_links.is_empty() {
        EventBuilder::first(vector.scheme)
    } else {
        EventBuilder::subsequent(vector.scheme)
    };
    for (alg, preimage) in vector.back_links {
        builder = builder.back_link(Digest::compute(*alg, preimage));
    }
    for data in vector.inline {
        builder = builder.inline(Bytes::from_static(*data));
    }
    for (blob, algorithms) in vector.attachments {
        builder = builder.attach(Bytes::from_static(*blob), algorithms);
    }
    if let Some(locator) = vector.key_locator {
        builder = builder.key_locator(KeyLocator::new(Bytes::from_static(locator)));
    }
    builder
}

/// Build the event a vector describes.
pub fn event_from_vector(vector: &GoldenVector) -> LogEvent {
    builder_from_vector(vector)
        .build()
        .expect("golden vector describes a valid event")
}

/// Check every vector: encoding, digest and signature.
///
/// Returns (name, matches, actual encoding hex) per vector.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    all_vectors()
        .iter()
        .map(|v| {
            let keypair = Keypair::from_seed(&v.seed);
            let entry = builder_from_vector(v)
                .sign(&keypair)
                .expect("golden vector describes a valid event");
            let encoded = hex::encode(entry.event.encode().unwrap_or_default());
            let sha = entry
                .event
                .hash(HashAlgorithm::Sha256)
                .map(|d| d.to_hex())
                .unwrap_or_default();
            let signature = hex::encode(&entry.signature);

            let matches = encoded == v.expected_encoding
                && sha == v.expected_sha256
                && signature == v.expected_signature;
            (v.name.to_string(), matches, encoded)
        })
        .collect()
}

/// All vectors as pretty JSON, for other implementations to consume.
pub fn vectors_json() -> serde_json::Result<String> {
    serde_json::to_string_pretty(&all_vectors())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vectors_match() {
        for (name, matches, encoded) in verify_all_vectors() {
            assert!(matches, "vector '{}' diverged, got encoding {}", name, encoded);
        }
    }

    #[test]
    fn test_vectors_are_deterministic() {
        for vector in all_vectors() {
            let e1 = event_from_vector(&vector);
            let e2 = event_from_vector(&vector);
            assert_eq!(
                e1.encode().unwrap(),
                e2.encode().unwrap(),
                "Vector '{}' produced different canonical bytes",
                vector.name
            );
        }
    }

    #[test]
    fn test_vectors_decode() {
        for vector in all_vectors() {
            let bytes = hex::decode(vector.expected_encoding).unwrap();
            let decoded = birch_core::decode_event(&bytes).unwrap();
            assert_eq!(decoded, event_from_vector(&vector), "vector '{}'", vector.name);
        }
    }

    #[test]
    fn test_vectors_json_exports() {
        let json = vectors_json().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.as_array().map(Vec::len), Some(all_vectors().len()));
    }
}
