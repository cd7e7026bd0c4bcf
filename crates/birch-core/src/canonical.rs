//! Canonical encoding of log events.
//!
//! Events are written as deterministic CBOR (RFC 8949 subset) by a routine
//! owned by this crate. General-purpose serializers are never used for the
//! signing input: their byte output is not guaranteed stable across versions.
//!
//! Rules:
//! - The event is a map with integer keys 0-3, written in ascending order
//! - Every other structure is a positional array
//! - Repeated fields keep the author's order; nothing is sorted
//! - Integers use the smallest valid encoding
//! - Definite lengths only (every variable-length field is length-prefixed)
//! - No floats, no elision: an absent key locator is written as `null`
//!
//! ```text
//! event      = { 0: [content*], 1: [digest*], 2: sig_info, 3: [attachment*] }
//! content    = [0, bstr] | [1, uint number, uint size]
//! digest     = [uint algorithm, bstr value]
//! sig_info   = [uint scheme, bstr / null]
//! attachment = [uint size, [digest*]]
//! ```
//!
//! **CRITICAL**: This encoding is FROZEN. Changes break all existing
//! signatures and backlinks.

use bytes::Bytes;
use ciborium::value::Value;

use crate::attachment::{AttachmentEntry, OffChainPointer};
use crate::digest::{Digest, HashAlgorithm};
use crate::error::EncodingError;
use crate::event::{LogContent, LogEvent, SignatureInfo, SignatureScheme};
use crate::types::KeyLocator;

/// Event map keys.
mod keys {
    pub const CONTENTS: u64 = 0;
    pub const BACK_LINKS: u64 = 1;
    pub const SIG_INFO: u64 = 2;
    pub const ATTACHMENT_DIRECTORY: u64 = 3;

    pub const COUNT: u64 = 4;
}

/// Content variant tags.
mod tags {
    pub const INLINE: u64 = 0;
    pub const OFF_CHAIN_POINTER: u64 = 1;
}

/// CBOR major types.
mod major {
    pub const UNSIGNED: u8 = 0;
    pub const BYTES: u8 = 2;
    pub const ARRAY: u8 = 4;
    pub const MAP: u8 = 5;
}

const NULL: u8 = 0xf6;

/// Encode an event to its canonical bytes.
pub fn encode_event(event: &LogEvent) -> Result<Vec<u8>, EncodingError> {
    let mut buf = Vec::with_capacity(64);
    encode_uint(&mut buf, major::MAP, keys::COUNT);

    // 0: contents
    encode_uint(&mut buf, major::UNSIGNED, keys::CONTENTS);
    encode_uint(&mut buf, major::ARRAY, event.contents.len() as u64);
    for content in &event.contents {
        encode_content(&mut buf, content);
    }

    // 1: back_links
    encode_uint(&mut buf, major::UNSIGNED, keys::BACK_LINKS);
    encode_digests(&mut buf, &event.back_links)?;

    // 2: sig_info
    encode_uint(&mut buf, major::UNSIGNED, keys::SIG_INFO);
    encode_sig_info(&mut buf, &event.sig_info);

    // 3: attachment_directory
    encode_uint(&mut buf, major::UNSIGNED, keys::ATTACHMENT_DIRECTORY);
    encode_uint(&mut buf, major::ARRAY, event.attachment_directory.len() as u64);
    for entry in &event.attachment_directory {
        encode_uint(&mut buf, major::ARRAY, 2);
        encode_uint(&mut buf, major::UNSIGNED, entry.declared_size);
        encode_digests(&mut buf, &entry.digests)?;
    }

    Ok(buf)
}

fn encode_content(buf: &mut Vec<u8>, content: &LogContent) {
    match content {
        LogContent::Inline(data) => {
            encode_uint(buf, major::ARRAY, 2);
            encode_uint(buf, major::UNSIGNED, tags::INLINE);
            encode_bytes(buf, data);
        }
        LogContent::OffChainPointer(pointer) => {
            encode_uint(buf, major::ARRAY, 3);
            encode_uint(buf, major::UNSIGNED, tags::OFF_CHAIN_POINTER);
            encode_uint(buf, major::UNSIGNED, pointer.attachment_number);
            encode_uint(buf, major::UNSIGNED, pointer.declared_size);
        }
    }
}

fn encode_digests(buf: &mut Vec<u8>, digests: &[Digest]) -> Result<(), EncodingError> {
    encode_uint(buf, major::ARRAY, digests.len() as u64);
    for digest in digests {
        digest.check_len()?;
        encode_uint(buf, major::ARRAY, 2);
        encode_uint(buf, major::UNSIGNED, digest.algorithm().code().into());
        encode_bytes(buf, digest.value());
    }
    Ok(())
}

fn encode_sig_info(buf: &mut Vec<u8>, sig_info: &SignatureInfo) {
    encode_uint(buf, major::ARRAY, 2);
    encode_uint(buf, major::UNSIGNED, sig_info.scheme.code().into());
    match &sig_info.key_locator {
        Some(locator) => encode_bytes(buf, locator.as_bytes()),
        None => buf.push(NULL),
    }
}

/// Encode an unsigned integer with the given major type.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffff_ffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

/// Encode a byte string (major type 2).
fn encode_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    encode_uint(buf, major::BYTES, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

/// Digest of an event's canonical encoding, as used for backlinks.
pub fn event_hash(algorithm: HashAlgorithm, event: &LogEvent) -> Result<Digest, EncodingError> {
    Ok(Digest::compute(algorithm, &encode_event(event)?))
}

/// Decode canonical bytes back into an event.
///
/// Strict: input that parses but is not byte-identical to the canonical
/// re-encoding (non-minimal integers, reordered keys, trailing bytes) is
/// rejected.
pub fn decode_event(bytes: &[u8]) -> Result<LogEvent, EncodingError> {
    let value: Value =
        ciborium::from_reader(bytes).map_err(|e| EncodingError::Decoding(e.to_string()))?;

    let event = value_to_event(&value)?;

    if encode_event(&event)? != bytes {
        return Err(EncodingError::NonCanonical);
    }
    Ok(event)
}

fn value_to_event(value: &Value) -> Result<LogEvent, EncodingError> {
    let map = match value {
        Value::Map(m) if m.len() as u64 == keys::COUNT => m,
        Value::Map(_) => return Err(EncodingError::Malformed("wrong event key count".into())),
        _ => return Err(EncodingError::Malformed("expected map".into())),
    };

    let get = |key: u64| -> Result<&Value, EncodingError> {
        map.iter()
            .find(|(k, _)| matches!(k, Value::Integer(i) if u64::try_from(*i).ok() == Some(key)))
            .map(|(_, v)| v)
            .ok_or_else(|| EncodingError::Malformed(format!("missing key {key}")))
    };

    let contents = as_array(get(keys::CONTENTS)?, "contents")?
        .iter()
        .map(value_to_content)
        .collect::<Result<Vec<_>, _>>()?;

    let back_links = value_to_digests(get(keys::BACK_LINKS)?, "back_links")?;

    let sig_info = value_to_sig_info(get(keys::SIG_INFO)?)?;

    let attachment_directory = as_array(get(keys::ATTACHMENT_DIRECTORY)?, "attachment_directory")?
        .iter()
        .map(|item| {
            let fields = as_fixed_array(item, 2, "attachment")?;
            Ok(AttachmentEntry {
                declared_size: as_uint(&fields[0], "declared_size")?,
                digests: value_to_digests(&fields[1], "attachment digests")?,
            })
        })
        .collect::<Result<Vec<_>, EncodingError>>()?;

    Ok(LogEvent {
        contents,
        back_links,
        sig_info,
        attachment_directory,
    })
}

fn value_to_content(value: &Value) -> Result<LogContent, EncodingError> {
    let fields = as_array(value, "content")?;
    let tag = fields
        .first()
        .ok_or(EncodingError::EmptyContent)
        .and_then(|v| as_uint(v, "content tag"))?;

    match (tag, fields.len()) {
        (tags::INLINE, 2) => Ok(LogContent::Inline(Bytes::copy_from_slice(as_bytes(
            &fields[1],
            "inline data",
        )?))),
        (tags::OFF_CHAIN_POINTER, 3) => Ok(LogContent::OffChainPointer(OffChainPointer {
            attachment_number: as_uint(&fields[1], "attachment_number")?,
            declared_size: as_uint(&fields[2], "declared_size")?,
        })),
        (tags::INLINE, _) | (tags::OFF_CHAIN_POINTER, _) => {
            Err(EncodingError::Malformed("wrong content arity".into()))
        }
        _ => Err(EncodingError::EmptyContent),
    }
}

fn value_to_digests(value: &Value, what: &str) -> Result<Vec<Digest>, EncodingError> {
    as_array(value, what)?
        .iter()
        .map(|item| {
            let fields = as_fixed_array(item, 2, "digest")?;
            let code = as_code(&fields[0], "hash algorithm")?;
            let algorithm = HashAlgorithm::from_code(code)
                .map_err(|_| EncodingError::UnsupportedAlgorithm(code))?;
            Digest::new(
                algorithm,
                Bytes::copy_from_slice(as_bytes(&fields[1], "digest value")?),
            )
        })
        .collect()
}

fn value_to_sig_info(value: &Value) -> Result<SignatureInfo, EncodingError> {
    let fields = as_fixed_array(value, 2, "sig_info")?;
    let code = as_code(&fields[0], "signature scheme")?;
    let scheme =
        SignatureScheme::from_code(code).map_err(|_| EncodingError::UnsupportedScheme(code))?;
    let key_locator = match &fields[1] {
        Value::Null => None,
        Value::Bytes(b) => Some(KeyLocator::new(Bytes::copy_from_slice(b))),
        _ => return Err(EncodingError::Malformed("invalid key_locator".into())),
    };
    Ok(SignatureInfo {
        scheme,
        key_locator,
    })
}

fn as_array<'a>(value: &'a Value, what: &str) -> Result<&'a [Value], EncodingError> {
    match value {
        Value::Array(items) => Ok(items),
        _ => Err(EncodingError::Malformed(format!("{what}: expected array"))),
    }
}

fn as_fixed_array<'a>(value: &'a Value, len: usize, what: &str) -> Result<&'a [Value], EncodingError> {
    let items = as_array(value, what)?;
    if items.len() != len {
        return Err(EncodingError::Malformed(format!(
            "{what}: expected {len} fields, got {}",
            items.len()
        )));
    }
    Ok(items)
}

fn as_uint(value: &Value, what: &str) -> Result<u64, EncodingError> {
    match value {
        Value::Integer(i) => u64::try_from(*i)
            .map_err(|_| EncodingError::Malformed(format!("{what}: out of range"))),
        _ => Err(EncodingError::Malformed(format!("{what}: expected unsigned integer"))),
    }
}

fn as_code(value: &Value, what: &str) -> Result<u8, EncodingError> {
    let n = as_uint(value, what)?;
    u8::try_from(n).map_err(|_| EncodingError::Malformed(format!("{what}: code out of range")))
}

fn as_bytes<'a>(value: &'a Value, what: &str) -> Result<&'a [u8], EncodingError> {
    match value {
        Value::Bytes(b) => Ok(b),
        _ => Err(EncodingError::Malformed(format!("{what}: expected byte string"))),
    }
}
