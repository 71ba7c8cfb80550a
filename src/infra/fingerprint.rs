use crate::domain::{Fingerprint, FingerprintScheme};
use sha1::{Digest, Sha1};
use std::fmt::Write as _;

/// Bytes dropped before murmur2 hashing: tab, newline, carriage return, space.
const MURMUR_IGNORED: [u8; 4] = [9, 10, 13, 32];

pub fn fingerprint(scheme: FingerprintScheme, content: &[u8]) -> Fingerprint {
    match scheme {
        FingerprintScheme::Sha1 => Fingerprint::Sha1(sha1_hex(content)),
        FingerprintScheme::Murmur2 => Fingerprint::Murmur2(murmur2(&strip_whitespace(content), 1)),
    }
}

pub fn sha1_hex(content: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(content);
    let result = hasher.finalize();

    let mut s = String::with_capacity(40);
    for byte in result {
        let _ = write!(s, "{byte:02x}");
    }
    s
}

/// The whole input is filtered first, hashing only sees the result.
pub fn strip_whitespace(content: &[u8]) -> Vec<u8> {
    content
        .iter()
        .copied()
        .filter(|b| !MURMUR_IGNORED.contains(b))
        .collect()
}

/// 32-bit MurmurHash2.
pub fn murmur2(data: &[u8], seed: u32) -> u32 {
    const M: u32 = 0x5bd1_e995;
    const R: u32 = 24;

    let mut h = seed ^ (data.len() as u32);

    let mut chunks = data.chunks_exact(4);
    for chunk in &mut chunks {
        let mut k = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        k = k.wrapping_mul(M);
        k ^= k >> R;
        k = k.wrapping_mul(M);

        h = h.wrapping_mul(M);
        h ^= k;
    }

    let tail = chunks.remainder();
    if tail.len() >= 3 {
        h ^= (tail[2] as u32) << 16;
    }
    if tail.len() >= 2 {
        h ^= (tail[1] as u32) << 8;
    }
    if !tail.is_empty() {
        h ^= tail[0] as u32;
        h = h.wrapping_mul(M);
    }

    h ^= h >> 13;
    h = h.wrapping_mul(M);
    h ^= h >> 15;
    h
}
