//! Pack entry header parsing and encoding.

use vec_hash::ObjectId;

use crate::{PackEntryKind, PackError};

/// A raw entry read from a packfile (before delta resolution).
#[derive(Debug, Clone)]
pub struct PackEntry {
    pub kind: PackEntryKind,
    pub uncompressed_size: usize,
    /// Offset of the compressed payload within the pack.
    pub data_offset: u64,
    /// Number of bytes consumed by the header.
    pub header_size: usize,
}

/// Parse a pack entry header starting at the given position in `data`.
///
/// `entry_offset` is the absolute offset of this entry in the pack file
/// (needed for the ofs-delta base offset computation).
pub fn parse_entry_header(data: &[u8], entry_offset: u64) -> Result<PackEntry, PackError> {
    if data.is_empty() {
        return Err(PackError::CorruptEntry(entry_offset));
    }

    let mut pos = 0;
    let c = data[pos];
    pos += 1;

    // First byte: bits 6-4 = kind, bits 3-0 = lower 4 bits of size
    let kind_num = (c >> 4) & 0x07;
    let mut size: u64 = (c & 0x0f) as u64;
    let mut shift = 4;

    // Continue reading size bytes while the continuation bit is set
    let mut byte = c;
    while byte & 0x80 != 0 {
        if pos >= data.len() {
            return Err(PackError::CorruptEntry(entry_offset));
        }
        byte = data[pos];
        pos += 1;
        size |= ((byte & 0x7f) as u64) << shift;
        shift += 7;
    }

    let kind = match kind_num {
        1 => PackEntryKind::Commit,
        2 => PackEntryKind::Tree,
        3 => PackEntryKind::Blob,
        6 => {
            // ofs-delta: variable-length negative offset to the base entry
            if pos >= data.len() {
                return Err(PackError::CorruptEntry(entry_offset));
            }
            let mut c = data[pos];
            pos += 1;
            let mut back = (c & 0x7f) as u64;
            while c & 0x80 != 0 {
                if pos >= data.len() {
                    return Err(PackError::CorruptEntry(entry_offset));
                }
                back += 1;
                c = data[pos];
                pos += 1;
                back = (back << 7) + (c & 0x7f) as u64;
            }
            if back == 0 || back > entry_offset {
                return Err(PackError::CorruptEntry(entry_offset));
            }
            PackEntryKind::OfsDelta {
                base_offset: entry_offset - back,
            }
        }
        7 => {
            // ref-delta: full OID of the base object
            let hash_len = vec_hash::DIGEST_LEN;
            if pos + hash_len > data.len() {
                return Err(PackError::CorruptEntry(entry_offset));
            }
            let base_oid = ObjectId::from_bytes(&data[pos..pos + hash_len])
                .map_err(|_| PackError::CorruptEntry(entry_offset))?;
            pos += hash_len;
            PackEntryKind::RefDelta { base_oid }
        }
        _ => {
            return Err(PackError::CorruptEntry(entry_offset));
        }
    };

    Ok(PackEntry {
        kind,
        uncompressed_size: size as usize,
        data_offset: entry_offset + pos as u64,
        header_size: pos,
    })
}

/// Encode a pack entry header.
///
/// For ofs-delta and ref-delta entries the caller appends the base
/// reference separately.
pub fn encode_entry_header(kind_num: u8, size: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(10);
    let mut s = size;

    // First byte: kind in bits 6-4, lower 4 bits of size
    let mut c = (kind_num << 4) | (s & 0x0f) as u8;
    s >>= 4;

    while s > 0 {
        buf.push(c | 0x80);
        c = (s & 0x7f) as u8;
        s >>= 7;
    }
    buf.push(c);
    buf
}

/// Encode an ofs-delta negative offset.
pub fn encode_ofs_delta_offset(offset: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(10);
    let mut off = offset;

    buf.push((off & 0x7f) as u8);
    off >>= 7;
    while off > 0 {
        off -= 1;
        buf.push(0x80 | (off & 0x7f) as u8);
        off >>= 7;
    }
    buf.reverse();
    buf
}
