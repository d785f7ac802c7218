use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::TypeError;

/// Content-addressed identifier of a repository object.
///
/// Git names objects with SHA-1 (20 bytes) or, in repositories using the
/// SHA-256 object format, 32 bytes. Identical content always produces the
/// same hash, so anything derived purely from the content (checksums, sizes)
/// can be cached by hash forever.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectHash {
    Sha1([u8; 20]),
    Sha256([u8; 32]),
}

impl ObjectHash {
    /// Compute the SHA-256 blob object name for raw content
    /// (`blob <len>\0<data>`).
    pub fn for_blob(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(format!("blob {}\0", data.len()).as_bytes());
        hasher.update(data);
        Self::Sha256(hasher.finalize().into())
    }

    /// The null object hash (all zeros). Represents "no object".
    pub const fn null() -> Self {
        Self::Sha256([0u8; 32])
    }

    /// Returns `true` if this is a null object hash of either width.
    pub fn is_null(&self) -> bool {
        self.as_bytes().iter().all(|b| *b == 0)
    }

    /// The raw hash bytes.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Sha1(bytes) => bytes,
            Self::Sha256(bytes) => bytes,
        }
    }

    /// Hex-encoded object name. This is the key used in every cache table.
    pub fn to_hex(&self) -> String {
        hex::encode(self.as_bytes())
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.as_bytes()[..4])
    }

    /// Parse a 40- or 64-character hex object name.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if let Ok(arr) = <[u8; 20]>::try_from(bytes.as_slice()) {
            return Ok(Self::Sha1(arr));
        }
        if let Ok(arr) = <[u8; 32]>::try_from(bytes.as_slice()) {
            return Ok(Self::Sha256(arr));
        }
        Err(TypeError::InvalidHashLength(bytes.len()))
    }
}

impl fmt::Debug for ObjectHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectHash({})", self.short_hex())
    }
}

impl fmt::Display for ObjectHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl std::str::FromStr for ObjectHash {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; 20]> for ObjectHash {
    fn from(bytes: [u8; 20]) -> Self {
        Self::Sha1(bytes)
    }
}

impl From<[u8; 32]> for ObjectHash {
    fn from(bytes: [u8; 32]) -> Self {
        Self::Sha256(bytes)
    }
}

impl Serialize for ObjectHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ObjectHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
