//! Opaque, roughly time-sortable identifiers.
//!
//! Layout (12 raw bytes, rendered as 20 lowercase base32hex characters):
//! `[4: unix seconds BE][3: machine][2: process][3: counter BE]`.
//! Identifiers are unique within a process without coordination; the leading
//! timestamp makes them sort by creation second, which callers may rely on
//! only as a hint.

use std::sync::LazyLock;
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::Utc;
use rand::Rng;

/// Length of the printable form.
pub const ENCODED_LEN: usize = 20;

const RAW_LEN: usize = 12;
const ALPHABET: &[u8; 32] = b"0123456789abcdefghijklmnopqrstuv";

static MACHINE: LazyLock<[u8; 3]> = LazyLock::new(|| rand::rng().random());
static COUNTER: LazyLock<AtomicU32> = LazyLock::new(|| AtomicU32::new(rand::rng().random()));

/// Mint a new identifier.
pub fn generate() -> String {
    let seconds = Utc::now().timestamp() as u32;
    let pid = std::process::id() as u16;
    let count = COUNTER.fetch_add(1, Ordering::Relaxed);

    let mut raw = [0u8; RAW_LEN];
    raw[0..4].copy_from_slice(&seconds.to_be_bytes());
    raw[4..7].copy_from_slice(&*MACHINE);
    raw[7..9].copy_from_slice(&pid.to_be_bytes());
    raw[9..12].copy_from_slice(&count.to_be_bytes()[1..]);
    encode(&raw)
}

/// Report whether `s` is a well-formed, non-nil identifier.
pub fn is_valid(s: &str) -> bool {
    match decode(s) {
        Some(raw) => raw != [0u8; RAW_LEN],
        None => false,
    }
}

fn encode(raw: &[u8; RAW_LEN]) -> String {
    let mut out = String::with_capacity(ENCODED_LEN);
    let mut buffer: u32 = 0;
    let mut bits = 0;
    for &byte in raw {
        buffer = (buffer << 8) | byte as u32;
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(ALPHABET[((buffer >> bits) & 0x1f) as usize] as char);
        }
    }
    if bits > 0 {
        out.push(ALPHABET[((buffer << (5 - bits)) & 0x1f) as usize] as char);
    }
    out
}

fn decode(s: &str) -> Option<[u8; RAW_LEN]> {
    if s.len() != ENCODED_LEN {
        return None;
    }
    let mut raw = [0u8; RAW_LEN];
    let mut filled = 0;
    let mut buffer: u32 = 0;
    let mut bits = 0;
    for ch in s.bytes() {
        let value = ALPHABET.iter().position(|&c| c == ch)? as u32;
        buffer = (buffer << 5) | value;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            if filled == RAW_LEN {
                return None;
            }
            raw[filled] = (buffer >> bits) as u8;
            filled += 1;
        }
    }
    // 20 chars carry 100 bits; the trailing 4 padding bits must be zero.
    if filled != RAW_LEN || buffer & ((1 << bits) - 1) != 0 {
        return None;
    }
    Some(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn generated_ids_are_valid_and_unique() {
        let ids: Vec<String> = (0..1000).map(|_| generate()).collect();
        assert!(ids.iter().all(|id| id.len() == ENCODED_LEN && is_valid(id)));
        let unique: HashSet<&String> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn nil_id_is_rejected() {
        assert!(!is_valid("00000000000000000000"));
    }

    #[test]
    fn malformed_ids_are_rejected() {
        assert!(!is_valid(""));
        assert!(!is_valid("b9nv60e0001"));
        assert!(!is_valid("ZZZZZZZZZZZZZZZZZZZZ"));
        assert!(!is_valid("0000000000000000000w"));
        // Non-zero padding bits in the last character.
        assert!(!is_valid("00000000000000000001"));
    }

    #[test]
    fn decode_inverts_encode() {
        let raw = [0xde, 0xad, 0xbe, 0xef, 1, 2, 3, 4, 5, 6, 7, 8];
        assert_eq!(decode(&encode(&raw)), Some(raw));
    }

    #[test]
    fn ids_minted_later_sort_after() {
        let first = generate();
        std::thread::sleep(std::time::Duration::from_millis(1100));
        let second = generate();
        assert!(second > first);
    }
}
