//! Content hashing primitives
//!
//! Provides [`Sha256Digest`], a strongly-typed 32-byte SHA-256 digest used
//! for custody records and for chaining ledger entries.

use sha2::{Digest, Sha256};
use std::fmt::{self, Display, Formatter};
use std::io::Read;
use std::str::FromStr;

/// A 32-byte SHA-256 digest
///
/// Immutable and cheap to clone (Copy). Serializes as lowercase hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Sha256Digest([u8; 32]);

impl Sha256Digest {
    /// Create a digest from raw bytes
    #[inline]
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The all-zero digest, used as the genesis link of a chain
    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self([0; 32])
    }

    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Create digest from byte slice
    ///
    /// # Errors
    /// Returns error if slice length is not exactly 32 bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, HashError> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| HashError::InvalidLength {
            expected: 32,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    /// Hash an in-memory buffer
    #[inline]
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// Hash everything readable from `reader`
    ///
    /// # Errors
    /// Propagates read errors
    pub fn compute_reader<R: Read>(mut reader: R) -> std::io::Result<Self> {
        let mut hasher = Sha256::new();
        let mut buf = [0u8; 64 * 1024];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(Self(hasher.finalize().into()))
    }

    /// Hash a file on disk
    ///
    /// # Errors
    /// Propagates open and read errors
    pub fn compute_file(path: &std::path::Path) -> std::io::Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::compute_reader(std::io::BufReader::new(file))
    }

    /// Short string representation (first 16 hex chars)
    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }

    #[inline]
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl Display for Sha256Digest {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for Sha256Digest {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        Self::from_slice(&bytes)
    }
}

impl serde::Serialize for Sha256Digest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for Sha256Digest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Incremental hasher for chaining records field by field
///
/// Each string is length-prefixed so adjacent fields cannot be shifted
/// into one another.
#[derive(Debug, Clone, Default)]
pub struct ChainHasher(Sha256);

impl ChainHasher {
    #[must_use]
    pub fn new() -> Self {
        Self(Sha256::new())
    }

    #[must_use]
    pub fn str(mut self, value: &str) -> Self {
        self.0.update((value.len() as u64).to_le_bytes());
        self.0.update(value.as_bytes());
        self
    }

    #[must_use]
    pub fn u64(mut self, value: u64) -> Self {
        self.0.update(value.to_le_bytes());
        self
    }

    #[must_use]
    pub fn digest(mut self, value: &Sha256Digest) -> Self {
        self.0.update(value.as_bytes());
        self
    }

    #[must_use]
    pub fn finish(self) -> Sha256Digest {
        Sha256Digest(self.0.finalize().into())
    }
}

/// Errors that can occur when working with digests
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    /// Invalid digest length
    #[error("invalid digest length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// Hex encoding error
    #[error("hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vector() {
        let d = Sha256Digest::compute(b"abc");
        assert_eq!(
            d.to_string(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn reader_matches_buffer() {
        let data = vec![7u8; 200_000];
        let a = Sha256Digest::compute(&data);
        let b = Sha256Digest::compute_reader(data.as_slice()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn from_slice_invalid_length() {
        let result = Sha256Digest::from_slice(&[1u8; 31]);
        assert!(matches!(result, Err(HashError::InvalidLength { expected: 32, actual: 31 })));
    }

    #[test]
    fn display_and_parse() {
        let d = Sha256Digest::compute(b"test");
        let parsed: Sha256Digest = d.to_string().parse().unwrap();
        assert_eq!(d, parsed);
        assert!(d.to_string().starts_with(&d.short()));
    }

    #[test]
    fn zero_digest() {
        assert!(Sha256Digest::zero().is_zero());
        assert!(!Sha256Digest::compute(b"x").is_zero());
    }

    #[test]
    fn serde_as_hex_string() {
        let d = Sha256Digest::compute(b"test");
        let json = serde_json::to_string(&d).unwrap();
        assert_eq!(json.len(), 66);
        let back: Sha256Digest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);
    }

    #[test]
    fn chain_hasher_is_field_boundary_sensitive() {
        let a = ChainHasher::new().str("ab").str("c").finish();
        let b = ChainHasher::new().str("a").str("bc").finish();
        assert_ne!(a, b);
    }
}
