// coldstart-parser - Deterministic content hashing
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Seeded murmur3 hashes over value content.
//!
//! Every function here is pure: the same input gives the same hash in every
//! process. Keyword hashes computed at snapshot time and recomputed during
//! reconstruction must agree, and hash-map tries built in one process are
//! replayed in another.

use std::io::Cursor;

use murmur3::murmur3_32;

const SEED: u32 = 0x9747_b28c;

fn murmur(bytes: &[u8], seed: u32) -> u32 {
    // Reading from an in-memory cursor cannot fail.
    murmur3_32(&mut Cursor::new(bytes), seed).unwrap_or(seed)
}

/// Hash a string by its UTF-8 bytes.
pub fn hash_str(s: &str) -> u32 {
    murmur(s.as_bytes(), SEED)
}

pub fn hash_i64(i: i64) -> u32 {
    murmur(&i.to_le_bytes(), SEED ^ 0x01)
}

/// Hash a double by bit pattern.
pub fn hash_f64(d: f64) -> u32 {
    murmur(&d.to_bits().to_le_bytes(), SEED ^ 0x02)
}

pub fn hash_char(c: char) -> u32 {
    murmur(&(c as u32).to_le_bytes(), SEED ^ 0x03)
}

/// Hash an optionally namespaced name. The namespace and the name are hashed
/// separately so that `a/bc` and `ab/c` do not collide trivially.
pub fn hash_name(namespace: Option<&str>, name: &str) -> u32 {
    let ns = namespace.map_or(0, hash_str);
    combine(ns, hash_str(name))
}

/// The content hash stored on keyword values.
pub fn keyword_hash(namespace: Option<&str>, name: &str) -> u32 {
    hash_name(namespace, name).wrapping_add(0x9e37_79b9)
}

/// Mix two hashes, order-sensitive.
pub fn combine(seed: u32, hash: u32) -> u32 {
    seed ^ hash
        .wrapping_add(0x9e37_79b9)
        .wrapping_add(seed << 6)
        .wrapping_add(seed >> 2)
}

/// Hash an ordered sequence of element hashes.
pub fn hash_ordered(hashes: impl IntoIterator<Item = u32>) -> u32 {
    hashes.into_iter().fold(1, combine)
}

/// Hash an unordered collection of element hashes.
pub fn hash_unordered(hashes: impl IntoIterator<Item = u32>) -> u32 {
    hashes
        .into_iter()
        .fold(0u32, |acc, h| acc.wrapping_add(h))
}
