use bstr::{BStr, BString, ByteSlice};
use vec_hash::ObjectId;

use crate::{ObjectError, ObjectKind};

/// File mode for tree entries, retained for working-tree restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileMode {
    /// Regular file (100644)
    Regular,
    /// Executable file (100755)
    Executable,
    /// Subdirectory (40000)
    Tree,
    /// Unknown mode (preserved for round-trip)
    Unknown(u32),
}

impl FileMode {
    /// Parse from octal ASCII bytes (e.g., `b"100644"`).
    pub fn from_bytes(s: &[u8]) -> Result<Self, ObjectError> {
        let raw = parse_octal(s)
            .ok_or_else(|| ObjectError::InvalidFileMode(String::from_utf8_lossy(s).into()))?;
        Ok(Self::from_raw(raw))
    }

    /// Create from the raw numeric value.
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0o100644 => Self::Regular,
            0o100755 => Self::Executable,
            0o040000 => Self::Tree,
            other => Self::Unknown(other),
        }
    }

    /// Serialize to octal ASCII bytes (no leading zeros).
    pub fn as_bytes(&self) -> BString {
        BString::from(format!("{:o}", self.raw()))
    }

    /// Get the raw numeric value.
    pub fn raw(&self) -> u32 {
        match self {
            Self::Regular => 0o100644,
            Self::Executable => 0o100755,
            Self::Tree => 0o40000,
            Self::Unknown(v) => *v,
        }
    }

    /// Is this a tree (directory) entry?
    pub fn is_tree(&self) -> bool {
        matches!(self, Self::Tree)
    }

    /// Is this a blob (file) entry?
    pub fn is_blob(&self) -> bool {
        matches!(self, Self::Regular | Self::Executable)
    }
}

/// Parse an octal ASCII string to u32.
fn parse_octal(s: &[u8]) -> Option<u32> {
    if s.is_empty() {
        return None;
    }
    let mut val: u32 = 0;
    for &b in s {
        if !(b'0'..=b'7').contains(&b) {
            return None;
        }
        val = val.checked_mul(8)?.checked_add(u32::from(b - b'0'))?;
    }
    Some(val)
}

/// A single entry in a tree object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub mode: FileMode,
    pub kind: ObjectKind,
    pub name: BString,
    pub oid: ObjectId,
}

/// A tree object — a directory listing.
///
/// Entries are kept strictly sorted bytewise by name with no duplicates;
/// this is what makes the serialized form (and therefore the hash) stable
/// regardless of insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Tree {
    pub entries: Vec<TreeEntry>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse tree body from the wire form.
    ///
    /// Each entry is one line: `<mode-octal> <kind> <hex-oid>\t<name>\n`.
    /// Entries must be strictly sorted by name; duplicates are rejected.
    pub fn parse(body: &[u8]) -> Result<Self, ObjectError> {
        let mut entries = Vec::new();
        let mut pos = 0;

        while pos < body.len() {
            let line_end = body[pos..]
                .find_byte(b'\n')
                .map(|p| p + pos)
                .ok_or_else(|| ObjectError::InvalidTreeEntry {
                    offset: pos,
                    reason: "missing newline".into(),
                })?;
            let line = &body[pos..line_end];

            let tab_pos = line.find_byte(b'\t').ok_or_else(|| {
                ObjectError::InvalidTreeEntry {
                    offset: pos,
                    reason: "missing tab before name".into(),
                }
            })?;
            let meta = &line[..tab_pos];
            let name = BString::from(&line[tab_pos + 1..]);
            if name.is_empty() || name.contains(&b'/') {
                return Err(ObjectError::InvalidTreeEntry {
                    offset: pos,
                    reason: "entry name must be a single path component".into(),
                });
            }

            let mut fields = meta.split(|&b| b == b' ');
            let mode_bytes = fields.next().unwrap_or_default();
            let kind_bytes = fields.next().ok_or_else(|| ObjectError::InvalidTreeEntry {
                offset: pos,
                reason: "missing kind field".into(),
            })?;
            let hex_bytes = fields.next().ok_or_else(|| ObjectError::InvalidTreeEntry {
                offset: pos,
                reason: "missing hash field".into(),
            })?;
            if fields.next().is_some() {
                return Err(ObjectError::InvalidTreeEntry {
                    offset: pos,
                    reason: "too many fields".into(),
                });
            }

            let mode = FileMode::from_bytes(mode_bytes)?;
            let kind = ObjectKind::from_bytes(kind_bytes)?;
            if kind == ObjectKind::Commit {
                return Err(ObjectError::InvalidTreeEntry {
                    offset: pos,
                    reason: "trees may only reference blobs and trees".into(),
                });
            }
            let hex = std::str::from_utf8(hex_bytes).map_err(|_| {
                ObjectError::InvalidTreeEntry {
                    offset: pos,
                    reason: "non-UTF8 hash".into(),
                }
            })?;
            let oid = ObjectId::from_hex(hex)?;

            if let Some(prev) = entries.last() {
                let prev: &TreeEntry = prev;
                match prev.name.cmp(&name) {
                    std::cmp::Ordering::Less => {}
                    std::cmp::Ordering::Equal => {
                        return Err(ObjectError::DuplicateTreeEntry(name));
                    }
                    std::cmp::Ordering::Greater => {
                        return Err(ObjectError::UnsortedTree {
                            prev: prev.name.clone(),
                            next: name,
                        });
                    }
                }
            }

            entries.push(TreeEntry {
                mode,
                kind,
                name,
                oid,
            });
            pos = line_end + 1;
        }

        Ok(Self { entries })
    }

    /// Serialize the tree body in canonical (sorted) form.
    pub fn serialize_body(&self) -> Vec<u8> {
        let mut sorted: Vec<&TreeEntry> = self.entries.iter().collect();
        sorted.sort_by(|a, b| a.name.cmp(&b.name));

        let mut out = Vec::new();
        for entry in sorted {
            out.extend_from_slice(&entry.mode.as_bytes());
            out.push(b' ');
            out.extend_from_slice(entry.kind.as_bytes());
            out.push(b' ');
            out.extend_from_slice(entry.oid.to_hex().as_bytes());
            out.push(b'\t');
            out.extend_from_slice(&entry.name);
            out.push(b'\n');
        }
        out
    }

    /// Sort entries into canonical order.
    pub fn sort(&mut self) {
        self.entries.sort_by(|a, b| a.name.cmp(&b.name));
    }

    /// Lookup an entry by name.
    pub fn find(&self, name: &BStr) -> Option<&TreeEntry> {
        self.entries.iter().find(|e| e.name.as_bstr() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TreeEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(n: u8) -> ObjectId {
        let mut bytes = [0u8; 32];
        bytes[31] = n;
        ObjectId::from_bytes(&bytes).unwrap()
    }

    fn entry(name: &str, kind: ObjectKind, n: u8) -> TreeEntry {
        TreeEntry {
            mode: if kind == ObjectKind::Tree {
                FileMode::Tree
            } else {
                FileMode::Regular
            },
            kind,
            name: BString::from(name),
            oid: oid(n),
        }
    }

    #[test]
    fn file_mode_from_bytes() {
        assert_eq!(FileMode::from_bytes(b"100644").unwrap(), FileMode::Regular);
        assert_eq!(
            FileMode::from_bytes(b"100755").unwrap(),
            FileMode::Executable
        );
        assert_eq!(FileMode::from_bytes(b"40000").unwrap(), FileMode::Tree);
        assert!(FileMode::from_bytes(b"10064x").is_err());
    }

    #[test]
    fn file_mode_roundtrip() {
        for mode in [FileMode::Regular, FileMode::Executable, FileMode::Tree] {
            let bytes = mode.as_bytes();
            assert_eq!(FileMode::from_bytes(&bytes).unwrap(), mode);
        }
    }

    #[test]
    fn parse_empty_tree() {
        let tree = Tree::parse(b"").unwrap();
        assert!(tree.is_empty());
    }

    #[test]
    fn serialize_parse_roundtrip() {
        let tree = Tree {
            entries: vec![
                entry("b.txt", ObjectKind::Blob, 1),
                entry("a-dir", ObjectKind::Tree, 2),
            ],
        };
        let body = tree.serialize_body();
        let parsed = Tree::parse(&body).unwrap();
        // Entries come back in sorted order.
        assert_eq!(parsed.entries[0].name, "a-dir");
        assert_eq!(parsed.entries[0].kind, ObjectKind::Tree);
        assert_eq!(parsed.entries[1].name, "b.txt");
        assert_eq!(parsed.entries[1].oid, oid(1));
    }

    #[test]
    fn hash_stable_under_insertion_order() {
        let forward = Tree {
            entries: vec![
                entry("alpha", ObjectKind::Blob, 1),
                entry("beta", ObjectKind::Blob, 2),
            ],
        };
        let reversed = Tree {
            entries: vec![
                entry("beta", ObjectKind::Blob, 2),
                entry("alpha", ObjectKind::Blob, 1),
            ],
        };
        assert_eq!(forward.serialize_body(), reversed.serialize_body());
    }

    #[test]
    fn unsorted_rejected() {
        let tree = Tree {
            entries: vec![
                entry("zed", ObjectKind::Blob, 1),
                entry("alpha", ObjectKind::Blob, 2),
            ],
        };
        // serialize_body sorts, so corrupt the body by hand
        let sorted = tree.serialize_body();
        let lines: Vec<&[u8]> = sorted.split(|&b| b == b'\n').filter(|l| !l.is_empty()).collect();
        let mut swapped = Vec::new();
        swapped.extend_from_slice(lines[1]);
        swapped.push(b'\n');
        swapped.extend_from_slice(lines[0]);
        swapped.push(b'\n');
        assert!(matches!(
            Tree::parse(&swapped),
            Err(ObjectError::UnsortedTree { .. })
        ));
    }

    #[test]
    fn duplicate_rejected() {
        let one = Tree {
            entries: vec![entry("same", ObjectKind::Blob, 1)],
        };
        let line = one.serialize_body();
        let mut doubled = line.clone();
        doubled.extend_from_slice(&line);
        assert!(matches!(
            Tree::parse(&doubled),
            Err(ObjectError::DuplicateTreeEntry(_))
        ));
    }

    #[test]
    fn name_with_slash_rejected() {
        let body = format!("100644 blob {}\ta/b\n", oid(1).to_hex());
        assert!(Tree::parse(body.as_bytes()).is_err());
    }

    #[test]
    fn commit_kind_rejected() {
        let body = format!("100644 commit {}\tx\n", oid(1).to_hex());
        assert!(Tree::parse(body.as_bytes()).is_err());
    }

    #[test]
    fn find_entry() {
        let tree = Tree {
            entries: vec![
                entry("README.md", ObjectKind::Blob, 1),
                entry("src", ObjectKind::Tree, 2),
            ],
        };
        assert!(tree.find(BStr::new("README.md")).is_some());
        assert!(tree.find(BStr::new("nonexistent")).is_none());
    }
}
