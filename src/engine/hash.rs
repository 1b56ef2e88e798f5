//! Content hash of a mapping (the `hash` placeholder).
//!
//! The mapping is serialised as a canonical S-expression, every atom written
//! as a netstring (`len:bytes`):
//!
//! ```text
//! (7:mapping(
//!    (10:subject_id30:https://example.org/entities/1)
//!    (10:creator_id(28:https://example.org/people/1 ...))
//!    ...                       # set slots in canonical order, record_id excluded
//!    (4:note5:hello)           # then extension slots, sorted by key
//! ))
//! ```
//!
//! (whitespace added for readability). The SHA-256 digest of that text is
//! rendered in z-base32, giving a 52-character identifier.

use crate::mapping::{Mapping, Slot, SlotValue};
use sha2::{Digest, Sha256};

const ZBASE32: &[u8; 32] = b"ybndrfg8ejkmcpqxot1uwisza345h769";

pub struct MappingHasher;

impl MappingHasher {
    pub fn hash(mapping: &Mapping) -> String {
        let digest = Sha256::digest(Self::canonical(mapping).as_bytes());
        zbase32(&digest)
    }

    /// The S-expression the hash is computed over.
    pub fn canonical(mapping: &Mapping) -> String {
        let mut out = String::from("(7:mapping(");
        for slot in Slot::ALL.iter().filter(|s| **s != Slot::RecordId) {
            let value = mapping.get(*slot);
            if value.is_empty() {
                continue;
            }
            out.push('(');
            netstring(&mut out, slot.name());
            match value {
                SlotValue::List(items) => {
                    out.push('(');
                    for item in &items {
                        netstring(&mut out, item);
                    }
                    out.push(')');
                }
                other => netstring(&mut out, &other.as_text().unwrap_or_default()),
            }
            out.push(')');
        }
        for (key, value) in &mapping.extensions {
            out.push('(');
            netstring(&mut out, key);
            netstring(&mut out, value);
            out.push(')');
        }
        out.push_str("))");
        out
    }
}

fn netstring(out: &mut String, s: &str) {
    out.push_str(&s.len().to_string());
    out.push(':');
    out.push_str(s);
}

/// z-base32 encoding, 5 bits per character, most significant bits first.
pub(crate) fn zbase32(bytes: &[u8]) -> String {
    let mut out = String::with_capacity((bytes.len() * 8).div_ceil(5));
    let mut buffer: u32 = 0;
    let mut bits = 0;
    for &byte in bytes {
        buffer = (buffer << 8) | u32::from(byte);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(char::from(ZBASE32[((buffer >> bits) & 31) as usize]));
        }
        buffer &= (1 << bits) - 1;
    }
    if bits > 0 {
        out.push(char::from(ZBASE32[((buffer << (5 - bits)) & 31) as usize]));
    }
    out
}
