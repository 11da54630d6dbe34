//! Pack creation: write .pack and .idx files.
//!
//! The writer takes a fully materialized object list, plans delta
//! compression over a sliding window of same-kind neighbors, and publishes
//! the `.pack` before the `.idx` so a reader never sees an index without
//! its pack.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::ZlibEncoder;
use flate2::Compression;
use vec_hash::{Hasher, ObjectId};
use vec_object::ObjectKind;
use vec_utils::CancelToken;

use crate::entry::{encode_entry_header, encode_ofs_delta_offset};
use crate::index::serialize_index;
use crate::{
    kind_number, PackError, DELTA_WINDOW, MAX_DELTA_DEPTH, PACK_SIGNATURE, PACK_VERSION,
};

/// Outcome of writing a pack.
#[derive(Debug)]
pub struct PackWriteResult {
    pub pack_path: PathBuf,
    pub idx_path: PathBuf,
    pub checksum: ObjectId,
    pub num_objects: u32,
    /// How many entries were stored as deltas.
    pub num_deltas: u32,
}

/// How one object will be stored.
enum Plan {
    Full,
    /// Delta against the object at the given list position.
    Delta { base_index: usize, delta: Vec<u8> },
}

/// Write the given objects into a new `pack-<checksum>.pack` + `.idx` pair
/// under `dir`. Returns the final paths and the pack checksum.
///
/// Objects are `(oid, kind, body)` tuples; the caller is responsible for
/// the OIDs matching the bodies.
pub fn write_pack(
    dir: &Path,
    objects: &[(ObjectId, ObjectKind, Vec<u8>)],
    cancel: &CancelToken,
) -> Result<PackWriteResult, PackError> {
    fs::create_dir_all(dir)?;

    let plans = plan_deltas(objects, cancel)?;

    let tmp_path = dir.join(format!("tmp_pack_{}", std::process::id()));
    let result = match write_entries(&tmp_path, objects, &plans, cancel) {
        Ok(r) => r,
        Err(e) => {
            // A partial pack must not survive cancellation or failure.
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }
    };
    let (checksum, mut index_entries, num_deltas) = result;

    let pack_path = dir.join(format!("pack-{}.pack", checksum.to_hex()));
    let idx_path = dir.join(format!("pack-{}.idx", checksum.to_hex()));

    // Publish the .pack first; readers ignore a lone .pack until the .idx
    // appears, and the .idx is fsynced before its rename.
    fs::rename(&tmp_path, &pack_path)?;

    let idx_data = serialize_index(&mut index_entries, &checksum);
    let tmp_idx = dir.join(format!("tmp_idx_{}", std::process::id()));
    {
        let mut f = fs::File::create(&tmp_idx)?;
        f.write_all(&idx_data)?;
        f.sync_all()?;
    }
    fs::rename(&tmp_idx, &idx_path)?;

    Ok(PackWriteResult {
        pack_path,
        idx_path,
        checksum,
        num_objects: objects.len() as u32,
        num_deltas,
    })
}

/// Choose a representation for each object.
///
/// For every object, up to `DELTA_WINDOW` preceding objects of the same
/// kind are tried as delta bases; the smallest delta wins, provided it
/// actually saves space and does not extend a chain past `MAX_DELTA_DEPTH`.
fn plan_deltas(
    objects: &[(ObjectId, ObjectKind, Vec<u8>)],
    cancel: &CancelToken,
) -> Result<Vec<Plan>, PackError> {
    let mut plans: Vec<Plan> = Vec::with_capacity(objects.len());
    let mut depths: Vec<usize> = vec![0; objects.len()];

    for (i, (_, kind, body)) in objects.iter().enumerate() {
        cancel.check()?;

        let mut best: Option<(usize, Vec<u8>)> = None;
        let mut tried = 0;

        for j in (0..i).rev() {
            if tried >= DELTA_WINDOW {
                break;
            }
            let (_, base_kind, base_body) = &objects[j];
            if base_kind != kind {
                continue;
            }
            tried += 1;

            if depths[j] + 1 > MAX_DELTA_DEPTH {
                continue;
            }

            let delta = crate::delta::compute_delta(base_body, body);
            if delta.len() >= body.len() {
                continue;
            }
            match &best {
                Some((_, current)) if current.len() <= delta.len() => {}
                _ => best = Some((j, delta)),
            }
        }

        match best {
            Some((base_index, delta)) => {
                depths[i] = depths[base_index] + 1;
                plans.push(Plan::Delta { base_index, delta });
            }
            None => plans.push(Plan::Full),
        }
    }

    Ok(plans)
}

/// Stream all entries into `path`, returning the trailer checksum, the
/// index records, and the delta count.
#[allow(clippy::type_complexity)]
fn write_entries(
    path: &Path,
    objects: &[(ObjectId, ObjectKind, Vec<u8>)],
    plans: &[Plan],
    cancel: &CancelToken,
) -> Result<(ObjectId, Vec<(ObjectId, u64, u32)>, u32), PackError> {
    let mut file = fs::File::create(path)?;
    let mut hasher = Hasher::new();
    let mut position: u64 = 0;

    let write_bytes = |file: &mut fs::File,
                           hasher: &mut Hasher,
                           position: &mut u64,
                           data: &[u8]|
     -> Result<(), PackError> {
        file.write_all(data)?;
        hasher.update(data);
        *position += data.len() as u64;
        Ok(())
    };

    // Header
    let mut header = [0u8; crate::PACK_HEADER_SIZE];
    header[0..4].copy_from_slice(PACK_SIGNATURE);
    header[4..8].copy_from_slice(&PACK_VERSION.to_be_bytes());
    header[8..12].copy_from_slice(&(objects.len() as u32).to_be_bytes());
    write_bytes(&mut file, &mut hasher, &mut position, &header)?;

    let mut offsets: Vec<u64> = Vec::with_capacity(objects.len());
    let mut index_entries: Vec<(ObjectId, u64, u32)> = Vec::with_capacity(objects.len());
    let mut num_deltas = 0u32;

    for (i, (oid, kind, body)) in objects.iter().enumerate() {
        cancel.check()?;
        let entry_offset = position;
        offsets.push(entry_offset);

        let mut crc = crc32fast::Hasher::new();

        match &plans[i] {
            Plan::Full => {
                let entry_header = encode_entry_header(kind_number(*kind), body.len() as u64);
                let compressed = compress(body)?;

                crc.update(&entry_header);
                crc.update(&compressed);

                write_bytes(&mut file, &mut hasher, &mut position, &entry_header)?;
                write_bytes(&mut file, &mut hasher, &mut position, &compressed)?;
            }
            Plan::Delta { base_index, delta } => {
                num_deltas += 1;
                let entry_header = encode_entry_header(6, delta.len() as u64);
                let back = entry_offset - offsets[*base_index];
                let ofs = encode_ofs_delta_offset(back);
                let compressed = compress(delta)?;

                crc.update(&entry_header);
                crc.update(&ofs);
                crc.update(&compressed);

                write_bytes(&mut file, &mut hasher, &mut position, &entry_header)?;
                write_bytes(&mut file, &mut hasher, &mut position, &ofs)?;
                write_bytes(&mut file, &mut hasher, &mut position, &compressed)?;
            }
        }

        index_entries.push((*oid, entry_offset, crc.finalize()));
    }

    let checksum = hasher.finalize();
    file.write_all(checksum.as_bytes())?;
    file.sync_all()?;

    Ok((checksum, index_entries, num_deltas))
}

fn compress(data: &[u8]) -> Result<Vec<u8>, PackError> {
    let mut compressed = Vec::new();
    let mut encoder = ZlibEncoder::new(&mut compressed, Compression::default());
    encoder.write_all(data)?;
    encoder.finish()?;
    Ok(compressed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pack::PackFile;

    fn blob(content: &[u8]) -> (ObjectId, ObjectKind, Vec<u8>) {
        (
            Hasher::hash_object("blob", content),
            ObjectKind::Blob,
            content.to_vec(),
        )
    }

    #[test]
    fn write_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let objects = vec![blob(b"first"), blob(b"second"), blob(b"third")];

        let result = write_pack(dir.path(), &objects, &CancelToken::new()).unwrap();
        assert_eq!(result.num_objects, 3);
        assert!(result.pack_path.exists());
        assert!(result.idx_path.exists());

        let pack = PackFile::open(&result.pack_path).unwrap();
        for (oid, _, body) in &objects {
            let obj = pack.read_object(oid).unwrap().unwrap();
            assert_eq!(&obj.data, body);
        }
    }

    #[test]
    fn similar_objects_get_deltified() {
        let dir = tempfile::tempdir().unwrap();
        let base: Vec<u8> = (0..4096).map(|i| (i % 199) as u8).collect();
        let mut near = base.clone();
        near[100] = 0xAA;

        let objects = vec![blob(&base), blob(&near)];
        let result = write_pack(dir.path(), &objects, &CancelToken::new()).unwrap();
        assert_eq!(result.num_deltas, 1);

        let pack = PackFile::open(&result.pack_path).unwrap();
        assert_eq!(pack.read_object(&objects[1].0).unwrap().unwrap().data, near);
    }

    #[test]
    fn dissimilar_objects_stay_full() {
        let dir = tempfile::tempdir().unwrap();
        let a: Vec<u8> = (0..512).map(|i| (i % 7) as u8).collect();
        let b: Vec<u8> = (0..512).map(|i| (i % 11 + 100) as u8).collect();
        let result =
            write_pack(dir.path(), &[blob(&a), blob(&b)], &CancelToken::new()).unwrap();
        assert_eq!(result.num_deltas, 0);
    }

    #[test]
    fn empty_pack() {
        let dir = tempfile::tempdir().unwrap();
        let result = write_pack(dir.path(), &[], &CancelToken::new()).unwrap();
        let pack = PackFile::open(&result.pack_path).unwrap();
        assert_eq!(pack.num_objects(), 0);
    }

    #[test]
    fn cancellation_leaves_no_temp_pack() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();

        let objects = vec![blob(b"never written")];
        assert!(matches!(
            write_pack(dir.path(), &objects, &cancel),
            Err(PackError::Cancelled)
        ));

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .collect();
        assert!(leftovers.is_empty(), "temp files left: {leftovers:?}");
    }

    #[test]
    fn pack_name_carries_checksum() {
        let dir = tempfile::tempdir().unwrap();
        let result = write_pack(dir.path(), &[blob(b"x")], &CancelToken::new()).unwrap();
        let name = result.pack_path.file_name().unwrap().to_string_lossy().to_string();
        assert_eq!(name, format!("pack-{}.pack", result.checksum.to_hex()));
    }
}
