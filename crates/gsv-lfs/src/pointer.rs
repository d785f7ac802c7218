//! LFS pointer documents.
//!
//! A pointer is the small text blob committed in place of a large file:
//!
//! ```text
//! version https://git-lfs.github.com/spec/v1
//! oid sha256:4d7a214614ab2935c943f9e0ff69d22eadbb8f32b1258daaa5e2ca24d17e2393
//! size 12345
//! ```

use std::fmt;

use crate::error::{LfsError, LfsResult};

/// Prefix of externally-namespaced LFS object identifiers.
pub const OID_PREFIX: &str = "sha256:";

pub const POINTER_VERSION: &str = "https://git-lfs.github.com/spec/v1";

/// Blobs larger than this are never pointers.
pub const MAX_POINTER_SIZE: u64 = 1024;

const VERSION_KEY: &str = "version ";

/// A parsed LFS pointer.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Pointer {
    hash: String,
    size: u64,
}

impl Pointer {
    /// Build a pointer from a bare SHA-256 hex hash and a size.
    pub fn new(hash: impl Into<String>, size: u64) -> LfsResult<Self> {
        let hash = hash.into();
        validate_hash(&hash)?;
        Ok(Self { hash, size })
    }

    /// Parse a blob as a pointer document.
    ///
    /// Returns `Ok(None)` when the blob is not a pointer at all (it does not
    /// start with a `version` line), and an error when it starts like one but
    /// is malformed.
    pub fn parse(data: &[u8]) -> LfsResult<Option<Self>> {
        if !data.starts_with(VERSION_KEY.as_bytes()) || data.len() as u64 > MAX_POINTER_SIZE {
            return Ok(None);
        }
        let text = std::str::from_utf8(data)
            .map_err(|_| LfsError::MalformedPointer("pointer is not valid UTF-8".into()))?;

        let mut version = None;
        let mut oid = None;
        let mut size = None;
        for line in text.lines() {
            if line.is_empty() {
                continue;
            }
            let (key, value) = line
                .split_once(' ')
                .ok_or_else(|| LfsError::MalformedPointer(format!("invalid line: {line:?}")))?;
            match key {
                "version" => version = Some(value),
                "oid" => oid = Some(value),
                "size" => {
                    let parsed = value.parse::<u64>().map_err(|_| {
                        LfsError::MalformedPointer(format!("invalid size: {value:?}"))
                    })?;
                    size = Some(parsed);
                }
                // Extension keys (ext-*) do not change the object identity.
                _ => {}
            }
        }

        if version != Some(POINTER_VERSION) {
            return Err(LfsError::MalformedPointer(format!(
                "unsupported version: {:?}",
                version.unwrap_or_default()
            )));
        }
        let oid = oid.ok_or_else(|| LfsError::MalformedPointer("missing oid".into()))?;
        let hash = oid.strip_prefix(OID_PREFIX).ok_or_else(|| {
            LfsError::MalformedPointer(format!("unsupported oid type: {oid:?}"))
        })?;
        let size = size.ok_or_else(|| LfsError::MalformedPointer("missing size".into()))?;

        Self::new(hash, size)
            .map(Some)
            .map_err(|e| LfsError::MalformedPointer(e.to_string()))
    }

    /// Bare SHA-256 hex hash.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Hash with the [`OID_PREFIX`].
    pub fn oid(&self) -> String {
        format!("{OID_PREFIX}{}", self.hash)
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Canonical pointer document.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "version {POINTER_VERSION}")?;
        writeln!(f, "oid {OID_PREFIX}{}", self.hash)?;
        writeln!(f, "size {}", self.size)
    }
}

/// Split an externally-namespaced identifier into its bare hash.
pub fn strip_oid_prefix(oid: &str) -> Option<&str> {
    oid.strip_prefix(OID_PREFIX)
}

fn validate_hash(hash: &str) -> LfsResult<()> {
    let valid = hash.len() == 64 && hash.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
    if valid {
        Ok(())
    } else {
        Err(LfsError::InvalidOid(hash.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const HASH: &str = "4d7a214614ab2935c943f9e0ff69d22eadbb8f32b1258daaa5e2ca24d17e2393";

    #[test]
    fn parses_canonical_pointer() {
        let text = format!("version {POINTER_VERSION}\noid sha256:{HASH}\nsize 12345\n");
        let pointer = Pointer::parse(text.as_bytes()).unwrap().unwrap();
        assert_eq!(pointer.hash(), HASH);
        assert_eq!(pointer.oid(), format!("sha256:{HASH}"));
        assert_eq!(pointer.size(), 12345);
        assert_eq!(pointer.to_bytes(), text.into_bytes());
    }

    #[test]
    fn ignores_extension_keys() {
        let text = format!(
            "version {POINTER_VERSION}\next-0-foo sha256:{HASH}\noid sha256:{HASH}\nsize 1\n"
        );
        assert!(Pointer::parse(text.as_bytes()).unwrap().is_some());
    }

    #[test]
    fn plain_content_is_not_a_pointer() {
        assert_eq!(Pointer::parse(b"hello world").unwrap(), None);
        assert_eq!(Pointer::parse(b"").unwrap(), None);
    }

    #[test]
    fn malformed_pointers_are_errors() {
        let cases = [
            format!("version {POINTER_VERSION}\nsize 1\n"),
            format!("version {POINTER_VERSION}\noid sha256:{HASH}\n"),
            format!("version {POINTER_VERSION}\noid md5:{HASH}\nsize 1\n"),
            format!("version {POINTER_VERSION}\noid sha256:abc\nsize 1\n"),
            format!("version {POINTER_VERSION}\noid sha256:{HASH}\nsize -1\n"),
            format!("version https://example.com/v9\noid sha256:{HASH}\nsize 1\n"),
        ];
        for case in cases {
            assert!(
                matches!(Pointer::parse(case.as_bytes()), Err(LfsError::MalformedPointer(_))),
                "{case:?} should be malformed"
            );
        }
    }

    #[test]
    fn new_validates_hash() {
        assert!(Pointer::new(HASH, 1).is_ok());
        assert!(matches!(Pointer::new("XYZ", 1), Err(LfsError::InvalidOid(_))));
        assert!(Pointer::new(HASH.to_uppercase(), 1).is_err());
    }

    #[test]
    fn strip_prefix() {
        assert_eq!(strip_oid_prefix(&format!("sha256:{HASH}")), Some(HASH));
        assert_eq!(strip_oid_prefix(HASH), None);
    }

    proptest! {
        #[test]
        fn content_without_version_line_is_never_a_pointer(data in proptest::collection::vec(any::<u8>(), 0..2048)) {
            prop_assume!(!data.starts_with(b"version "));
            prop_assert_eq!(Pointer::parse(&data).unwrap(), None);
        }
    }
}
