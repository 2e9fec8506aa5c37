//! Hash functions used by the extractor.
//!
//! Two families live here:
//!
//! * [`hash`] is a 32-bit murmurhash2 rendered in base36. It is short, cheap and
//!   yields CSS-identifier friendly output, so it is used for generated class names.
//! * [`hash_bytes`] / [`hash_string`] are xxh3-64 rendered as hex. They are used to
//!   content-address emitted stylesheets.
//!
//! Both must stay stable across runs, machines, platforms and versions: their output
//! ends up in emitted CSS and in rewritten JavaScript.

use xxhash_rust::xxh3::xxh3_64;

const M: u32 = 0x5bd1e995;
const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Murmurhash2 of `key` (as UTF-8 bytes) with `seed`, returned in base36.
pub fn hash(key: &str, seed: u32) -> String {
  to_base36(murmur2(key.as_bytes(), seed))
}

/// Murmurhash2 returning the raw 32-bit value.
pub fn murmur2(bytes: &[u8], seed: u32) -> u32 {
  let mut remaining = bytes.len();
  let mut h = seed ^ (remaining as u32);
  let mut chunks = bytes.chunks_exact(4);

  for chunk in chunks.by_ref() {
    let mut k = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    k = k.wrapping_mul(M);
    k ^= k >> 24;
    k = k.wrapping_mul(M);
    h = h.wrapping_mul(M) ^ k;
    remaining -= 4;
  }

  let tail = chunks.remainder();
  if remaining >= 3 {
    h ^= (tail[2] as u32) << 16;
  }
  if remaining >= 2 {
    h ^= (tail[1] as u32) << 8;
  }
  if remaining >= 1 {
    h ^= tail[0] as u32;
    h = h.wrapping_mul(M);
  }

  h ^= h >> 13;
  h = h.wrapping_mul(M);
  h ^= h >> 15;
  h
}

fn to_base36(mut num: u32) -> String {
  if num == 0 {
    return "0".to_string();
  }

  let mut digits = Vec::with_capacity(7);
  while num > 0 {
    digits.push(BASE36[(num % 36) as usize] as char);
    num /= 36;
  }

  digits.iter().rev().collect()
}

/// xxh3-64 of a string, as 16 lowercase hex digits.
pub fn hash_string(s: &str) -> String {
  hash_bytes(s.as_bytes())
}

/// xxh3-64 of a byte slice, as 16 lowercase hex digits.
pub fn hash_bytes(s: &[u8]) -> String {
  format!("{:016x}", xxh3_64(s))
}
