//! Compute deltas between objects.
//!
//! The algorithm builds a hash table of fixed-size blocks from the base,
//! then scans the target looking for matching blocks. Matching regions
//! become copy instructions; non-matching regions become insert
//! instructions.

use std::collections::HashMap;

use super::{encode_copy, encode_insert, write_varint};

/// Block size for the match index.
const BLOCK_SIZE: usize = 16;

/// Compute a delta that transforms `base` into `target`.
///
/// Returns the raw delta byte stream that can be applied with `apply_delta`.
pub fn compute_delta(base: &[u8], target: &[u8]) -> Vec<u8> {
    let mut delta = Vec::new();

    delta.extend_from_slice(&write_varint(base.len()));
    delta.extend_from_slice(&write_varint(target.len()));

    if target.is_empty() {
        return delta;
    }

    let index = build_block_index(base);

    let mut tpos = 0;
    let mut pending_insert: Vec<u8> = Vec::new();

    while tpos < target.len() {
        let remaining = target.len() - tpos;

        if remaining >= BLOCK_SIZE {
            let block = &target[tpos..tpos + BLOCK_SIZE];
            if let Some(&base_offset) = index.get(block) {
                let match_len = extend_match(base, base_offset, target, tpos);

                flush_insert(&mut delta, &mut pending_insert);
                emit_copy(&mut delta, base_offset, match_len);
                tpos += match_len;
                continue;
            }
        }

        pending_insert.push(target[tpos]);
        tpos += 1;

        // Inserts carry at most 127 literal bytes each
        if pending_insert.len() == 127 {
            flush_insert(&mut delta, &mut pending_insert);
        }
    }

    flush_insert(&mut delta, &mut pending_insert);

    delta
}

/// Build a map from BLOCK_SIZE chunks of the base to their offsets.
fn build_block_index(base: &[u8]) -> HashMap<&[u8], usize> {
    let mut index = HashMap::new();
    if base.len() < BLOCK_SIZE {
        return index;
    }
    // Non-overlapping blocks; first occurrence wins
    for offset in (0..=base.len() - BLOCK_SIZE).step_by(BLOCK_SIZE) {
        index
            .entry(&base[offset..offset + BLOCK_SIZE])
            .or_insert(offset);
    }
    index
}

/// Extend a match between base[base_off..] and target[tgt_off..] as far as possible.
fn extend_match(base: &[u8], base_off: usize, target: &[u8], tgt_off: usize) -> usize {
    let max_len = std::cmp::min(base.len() - base_off, target.len() - tgt_off);
    let mut len = BLOCK_SIZE;
    while len < max_len && base[base_off + len] == target[tgt_off + len] {
        len += 1;
    }
    len
}

/// Flush pending insert bytes as one or more insert instructions.
fn flush_insert(delta: &mut Vec<u8>, pending: &mut Vec<u8>) {
    while !pending.is_empty() {
        let chunk_len = std::cmp::min(pending.len(), 127);
        let chunk: Vec<u8> = pending.drain(..chunk_len).collect();
        delta.extend_from_slice(&encode_insert(&chunk));
    }
}

/// Emit a copy instruction, splitting when the 24-bit size limit requires it.
fn emit_copy(delta: &mut Vec<u8>, offset: usize, mut size: usize) {
    let mut off = offset;
    while size > 0 {
        let chunk = std::cmp::min(size, 0x00ff_ffff);
        delta.extend_from_slice(&encode_copy(off as u64, chunk));
        off += chunk;
        size -= chunk;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::apply::apply_delta;

    #[test]
    fn identical_objects() {
        let data = b"Hello, World! This is a test of delta compression.";
        let delta = compute_delta(data, data);
        let result = apply_delta(data, &delta).unwrap();
        assert_eq!(result, data);
    }

    #[test]
    fn completely_different() {
        let base = b"AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
        let target = b"BBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB";
        let delta = compute_delta(base, target);
        let result = apply_delta(base, &delta).unwrap();
        assert_eq!(result, target);
    }

    #[test]
    fn empty_target() {
        let delta = compute_delta(b"something", b"");
        let result = apply_delta(b"something", &delta).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn empty_base() {
        let target = b"new content here";
        let delta = compute_delta(b"", target);
        let result = apply_delta(b"", &delta).unwrap();
        assert_eq!(result, target);
    }

    #[test]
    fn prepend_data() {
        let base = b"0123456789abcdef0123456789abcdef";
        let mut target = b"PREPENDED_".to_vec();
        target.extend_from_slice(base);
        let delta = compute_delta(base, &target);
        let result = apply_delta(base, &delta).unwrap();
        assert_eq!(result, target);
    }

    #[test]
    fn append_data() {
        let base = b"0123456789abcdef0123456789abcdef";
        let mut target = base.to_vec();
        target.extend_from_slice(b"_APPENDED");
        let delta = compute_delta(base, &target);
        let result = apply_delta(base, &delta).unwrap();
        assert_eq!(result, target);
    }

    #[test]
    fn large_similar_objects_compress() {
        // Two versions of a buffer with a few bytes changed in the middle
        let base: Vec<u8> = (0..4096).map(|i| (i % 251) as u8).collect();
        let mut target = base.clone();
        target[2048] = 0xFF;
        target[2049] = 0xFE;
        target[2050] = 0xFD;

        let delta = compute_delta(&base, &target);
        let result = apply_delta(&base, &delta).unwrap();
        assert_eq!(result, target);
        assert!(delta.len() < target.len());
    }
}
