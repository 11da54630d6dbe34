use bstr::BString;

/// A blob object — an opaque byte sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub data: BString,
}

impl Blob {
    pub fn new(data: impl Into<BString>) -> Self {
        Self { data: data.into() }
    }

    /// Parse blob body bytes (the body is the content, verbatim).
    pub fn parse(body: &[u8]) -> Self {
        Self {
            data: BString::from(body),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_preserves_bytes() {
        let blob = Blob::parse(b"\x00\xff binary \x01");
        assert_eq!(blob.data, b"\x00\xff binary \x01".as_slice());
        assert_eq!(blob.len(), 11);
    }

    #[test]
    fn empty() {
        assert!(Blob::parse(b"").is_empty());
    }
}
