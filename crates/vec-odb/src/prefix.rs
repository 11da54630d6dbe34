//! Partial-hash resolution.
//!
//! A prefix of at least four hex digits resolves to the unique object it
//! identifies; zero matches and multiple matches are distinct errors.

use vec_hash::{hex, ObjectId, HEX_LEN, MIN_PREFIX_LEN};

use crate::{ObjectDatabase, OdbError};

/// Resolve a hex string (full or partial, ≥4 digits) to a full OID.
pub fn resolve_prefix(odb: &ObjectDatabase, prefix: &str) -> Result<ObjectId, OdbError> {
    let prefix = prefix.to_ascii_lowercase();

    // A full hash needs no scanning, only an existence check.
    if prefix.len() == HEX_LEN {
        let oid = ObjectId::from_hex(&prefix)?;
        return if odb.contains(&oid) {
            Ok(oid)
        } else {
            Err(OdbError::NotFound(oid))
        };
    }

    if prefix.len() < MIN_PREFIX_LEN || !hex::is_hex(&prefix) {
        return Err(OdbError::Hash(vec_hash::HashError::PrefixTooShort {
            prefix,
            minimum: MIN_PREFIX_LEN,
        }));
    }

    let mut matches: Vec<ObjectId> = odb.loose().find_prefix(&prefix)?;

    // Packs: probe by the even-length byte prefix, then narrow by hex.
    let even_hex = &prefix[..prefix.len() - prefix.len() % 2];
    let mut prefix_bytes = vec![0u8; even_hex.len() / 2];
    hex::hex_decode(even_hex, &mut prefix_bytes)?;
    for oid in odb.packed_prefix_matches(&prefix_bytes) {
        if oid.starts_with_hex(&prefix) && !matches.contains(&oid) {
            matches.push(oid);
        }
    }

    match matches.len() {
        0 => Err(OdbError::PrefixNotFound(prefix)),
        1 => Ok(matches[0]),
        n => Err(OdbError::Ambiguous { prefix, count: n }),
    }
}
