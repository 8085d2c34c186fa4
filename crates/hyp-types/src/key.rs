use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Length in bytes of a [`ContentKey`] and a [`DiscoveryKey`].
pub const KEY_LENGTH: usize = 32;

/// Public key addressing a replicated drive.
///
/// Content keys are exchanged as 64 hex characters (case-insensitive). The
/// key is the identity of a drive: two handles opened for the same key refer
/// to the same data set.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentKey([u8; KEY_LENGTH]);

impl ContentKey {
    /// Create a key from raw bytes.
    pub const fn from_bytes(bytes: [u8; KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    /// The raw 32-byte key.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.0
    }

    /// Full lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters), for logs.
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Parse from exactly 64 hex characters.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        if s.len() != KEY_LENGTH * 2 {
            return Err(TypeError::InvalidLength {
                expected: KEY_LENGTH * 2,
                actual: s.len(),
            });
        }
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        let mut arr = [0u8; KEY_LENGTH];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Derive the discovery key announced on the replication network.
    ///
    /// The derivation is one-way: peers that only know the discovery key can
    /// find each other but cannot read the drive.
    pub fn discovery_key(&self) -> DiscoveryKey {
        DiscoveryKey(*blake3::keyed_hash(&self.0, b"hypercore").as_bytes())
    }
}

impl FromStr for ContentKey {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentKey({})", self.short_hex())
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<[u8; KEY_LENGTH]> for ContentKey {
    fn from(bytes: [u8; KEY_LENGTH]) -> Self {
        Self(bytes)
    }
}

/// Network topic derived from a [`ContentKey`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DiscoveryKey([u8; KEY_LENGTH]);

impl DiscoveryKey {
    /// The raw 32-byte key.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.0
    }

    /// Full lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters), for logs.
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Debug for DiscoveryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DiscoveryKey({})", self.short_hex())
    }
}

impl fmt::Display for DiscoveryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const HEX: &str = "c0ffee00c0ffee00c0ffee00c0ffee00c0ffee00c0ffee00c0ffee00c0ffee00";

    #[test]
    fn parses_lowercase_and_uppercase_hex() {
        let lower = ContentKey::from_hex(HEX).unwrap();
        let upper = ContentKey::from_hex(&HEX.to_uppercase()).unwrap();
        assert_eq!(lower, upper);
        assert_eq!(lower.to_hex(), HEX);
    }

    #[test]
    fn rejects_wrong_length() {
        let err = ContentKey::from_hex("abcd").unwrap_err();
        assert_eq!(err, TypeError::InvalidLength { expected: 64, actual: 4 });
    }

    #[test]
    fn rejects_non_hex() {
        let bad = "z".repeat(64);
        assert!(matches!(ContentKey::from_hex(&bad), Err(TypeError::InvalidHex(_))));
    }

    #[test]
    fn discovery_key_is_deterministic_and_distinct() {
        let key = ContentKey::from_bytes([7; 32]);
        assert_eq!(key.discovery_key(), key.discovery_key());
        assert_ne!(key.discovery_key().as_bytes(), key.as_bytes());
        assert_ne!(key.discovery_key(), ContentKey::from_bytes([8; 32]).discovery_key());
    }

    #[test]
    fn short_hex_is_8_chars() {
        let key = ContentKey::from_bytes([0xab; 32]);
        assert_eq!(key.short_hex(), "abababab");
        assert_eq!(format!("{key:?}"), "ContentKey(abababab)");
    }

    #[test]
    fn from_str_delegates_to_hex() {
        let key: ContentKey = HEX.parse().unwrap();
        assert_eq!(key.to_string(), HEX);
    }

    proptest! {
        #[test]
        fn hex_encoding_roundtrips(bytes in proptest::array::uniform32(any::<u8>())) {
            let key = ContentKey::from_bytes(bytes);
            prop_assert_eq!(ContentKey::from_hex(&key.to_hex()).unwrap(), key);
        }
    }
}
