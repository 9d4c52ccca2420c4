//! The 32-byte SHA-256 digest newtype.
//!
//! Every chain entry is a `Digest`. On the wire and in storage a digest is
//! always its 64-character lowercase hex rendering.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest as _, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// A 32-byte SHA-256 digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest(pub [u8; 32]);

impl Digest {
    /// Hash arbitrary bytes.
    pub fn hash(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to lowercase hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a 64-character hex string.
    ///
    /// Upper-case input is accepted; the canonical form is lower-case.
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let bytes = hex::decode(s).map_err(|e| CoreError::InvalidDigest(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CoreError::InvalidDigest(format!("expected 32 bytes, got {} hex chars", s.len())))?;
        Ok(Self(arr))
    }

    /// The zero digest (sentinel).
    pub const ZERO: Self = Self([0u8; 32]);
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({}...)", &self.to_hex()[..16])
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Digest {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Digest {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_hex_roundtrip() {
        let digest = Digest::from_bytes([0x42; 32]);
        let recovered = Digest::from_hex(&digest.to_hex()).unwrap();
        assert_eq!(digest, recovered);
    }

    #[test]
    fn test_digest_hash_known_value() {
        // SHA-256("abc")
        let digest = Digest::hash(b"abc");
        assert_eq!(
            digest.to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_digest_rejects_wrong_length() {
        assert!(matches!(
            Digest::from_hex("abcd"),
            Err(CoreError::InvalidDigest(_))
        ));
        assert!(Digest::from_hex("zz").is_err());
    }

    #[test]
    fn test_digest_accepts_uppercase() {
        let lower = Digest::from_bytes([0xab; 32]).to_hex();
        let upper = lower.to_uppercase();
        assert_eq!(Digest::from_hex(&upper).unwrap().to_hex(), lower);
    }

    #[test]
    fn test_digest_serde_as_hex_string() {
        let digest = Digest::from_bytes([0x01; 32]);
        let json = serde_json::to_string(&digest).unwrap();
        assert_eq!(json, format!("\"{}\"", "01".repeat(32)));
        let back: Digest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, digest);
    }

    #[test]
    fn test_digest_debug() {
        let debug = format!("{:?}", Digest::from_bytes([0xcd; 32]));
        assert!(debug.starts_with("Digest(cdcdcdcd"));
    }
}
