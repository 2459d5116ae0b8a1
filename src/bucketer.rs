//! Consistent-hash traffic allocation.
//!
//! The bucketer maps a (seed, bucketing key) pair into the integer range `[0, 100)` and walks an
//! ordered partition table to pick the winning treatment. Identical inputs always produce the
//! identical treatment, across calls and across SDK instances sharing the same dataset.

use crate::splits::compiler::Partition;
use crate::splits::Algorithm;
use crate::Str;

/// Compute the bucket for a key under the split's seed and allocation algorithm.
pub(crate) fn bucket(bucketing_key: &str, seed: i64, algo: Algorithm) -> u8 {
    match algo {
        Algorithm::Legacy => (legacy_hash(bucketing_key, seed as i32) % 100).unsigned_abs() as u8,
        Algorithm::Murmur3 => (murmur3_32(bucketing_key.as_bytes(), seed as u32) % 100) as u8,
    }
}

/// Walk the partition table in order, accumulating sizes; the first partition whose cumulative
/// size strictly exceeds the bucket wins. Size-0 partitions contribute no range and can never
/// win.
///
/// Returns `None` when the declared sizes sum to less than 100 and the bucket falls beyond the
/// covered range; the caller falls back to the split's default treatment.
pub(crate) fn partition_treatment(partitions: &[Partition], bucket: u8) -> Option<&Str> {
    let mut covered = 0u32;
    for partition in partitions {
        covered += u32::from(partition.size);
        if u32::from(bucket) < covered {
            return Some(&partition.treatment);
        }
    }
    None
}

/// The original allocation hash: `h = 31·h + c` over the key's UTF-16 code units, xor'ed with the
/// seed. Kept bit-compatible with other SDK implementations sharing the same dataset.
fn legacy_hash(key: &str, seed: i32) -> i32 {
    let mut h: i32 = 0;
    for unit in key.encode_utf16() {
        h = h.wrapping_mul(31).wrapping_add(i32::from(unit));
    }
    h ^ seed
}

/// Murmur3 x86 32-bit, used by datasets with `algo: 2`.
fn murmur3_32(data: &[u8], seed: u32) -> u32 {
    const C1: u32 = 0xcc9e_2d51;
    const C2: u32 = 0x1b87_3593;

    let mut h = seed;

    let mut chunks = data.chunks_exact(4);
    for chunk in &mut chunks {
        let mut k = u32::from_le_bytes(chunk.try_into().expect("chunks_exact yields 4 bytes"));
        k = k.wrapping_mul(C1);
        k = k.rotate_left(15);
        k = k.wrapping_mul(C2);
        h ^= k;
        h = h.rotate_left(13);
        h = h.wrapping_mul(5).wrapping_add(0xe654_6b64);
    }

    let tail = chunks.remainder();
    if !tail.is_empty() {
        let mut k: u32 = 0;
        for (i, &byte) in tail.iter().enumerate() {
            k ^= u32::from(byte) << (8 * i);
        }
        k = k.wrapping_mul(C1);
        k = k.rotate_left(15);
        k = k.wrapping_mul(C2);
        h ^= k;
    }

    h ^= data.len() as u32;
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}
