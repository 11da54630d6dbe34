use digest::Digest;
use sha2::Sha256;

use crate::ObjectId;

/// Streaming SHA-256 computation.
///
/// Data can be fed incrementally with [`update`](Hasher::update) or through
/// the [`std::io::Write`] implementation, then finalised into an [`ObjectId`].
pub struct Hasher {
    inner: Sha256,
}

impl Hasher {
    pub fn new() -> Self {
        Self {
            inner: Sha256::new(),
        }
    }

    /// Feed data into the hasher.
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Finalize and return the ObjectId.
    pub fn finalize(self) -> ObjectId {
        let result = self.inner.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(result.as_slice());
        ObjectId::from_bytes(&bytes).expect("digest is 32 bytes")
    }

    /// Convenience: hash data in one call.
    pub fn digest(data: &[u8]) -> ObjectId {
        let mut h = Self::new();
        h.update(data);
        h.finalize()
    }

    /// Hash a typed object payload: `"{kind} {len}\0{body}"`.
    pub fn hash_object(kind: &str, body: &[u8]) -> ObjectId {
        let header = format!("{} {}\0", kind, body.len());
        let mut h = Self::new();
        h.update(header.as_bytes());
        h.update(body);
        h.finalize()
    }
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::io::Write for Hasher {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // SHA-256 of the empty string.
    const EMPTY_HEX: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn digest_empty() {
        assert_eq!(Hasher::digest(b"").to_hex(), EMPTY_HEX);
    }

    #[test]
    fn digest_known_vector() {
        // SHA-256("abc")
        assert_eq!(
            Hasher::digest(b"abc").to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn incremental_matches_one_shot() {
        let mut h = Hasher::new();
        h.update(b"hello ");
        h.update(b"world");
        assert_eq!(h.finalize(), Hasher::digest(b"hello world"));
    }

    #[test]
    fn hash_object_includes_framing() {
        // The framed payload differs from the bare body, so the digests differ.
        let framed = Hasher::hash_object("blob", b"hello");
        let bare = Hasher::digest(b"hello");
        assert_ne!(framed, bare);

        let mut manual = Hasher::new();
        manual.update(b"blob 5\0hello");
        assert_eq!(framed, manual.finalize());
    }

    #[test]
    fn write_trait() {
        use std::io::Write;
        let mut h = Hasher::new();
        h.write_all(b"data").unwrap();
        assert_eq!(h.finalize(), Hasher::digest(b"data"));
    }
}
