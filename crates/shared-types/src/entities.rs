//! # Core Primitive Entities
//!
//! Identity, hash and timestamp types shared by every custody-chain crate.

use crate::errors::IdentityParseError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A 32-byte Keccak-256 digest.
pub type Hash = [u8; 32];

/// Unix timestamp in seconds.
pub type Timestamp = u64;

/// Length of an identity in bytes.
pub const IDENTITY_LEN: usize = 20;

/// An opaque, globally unique actor reference (Ethereum-style address).
///
/// Serialized as a `0x`-prefixed lowercase hex string. Parsing accepts the
/// prefix optionally and any hex case.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Identity(pub [u8; IDENTITY_LEN]);

impl Identity {
    /// The zero identity. Used as the "void" destination and as the
    /// `new_owner` of records that do not change ownership.
    pub const ZERO: Identity = Identity([0u8; IDENTITY_LEN]);

    /// Builds an identity with every byte set to `byte`. Handy for fixtures.
    #[must_use]
    pub const fn repeat(byte: u8) -> Self {
        Identity([byte; IDENTITY_LEN])
    }

    /// Returns true for the zero identity.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; IDENTITY_LEN]
    }

    /// Raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; IDENTITY_LEN] {
        &self.0
    }

    /// Abbreviated form (`0xabcd…1234`) for log lines.
    #[must_use]
    pub fn short(&self) -> String {
        let full = hex::encode(self.0);
        format!("0x{}…{}", &full[..4], &full[full.len() - 4..])
    }
}

impl From<[u8; IDENTITY_LEN]> for Identity {
    fn from(bytes: [u8; IDENTITY_LEN]) -> Self {
        Identity(bytes)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({})", self)
    }
}

impl FromStr for Identity {
    type Err = IdentityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        let bytes =
            hex::decode(digits).map_err(|e| IdentityParseError::InvalidHex(e.to_string()))?;
        let array: [u8; IDENTITY_LEN] =
            bytes
                .as_slice()
                .try_into()
                .map_err(|_| IdentityParseError::InvalidLength {
                    expected: IDENTITY_LEN,
                    actual: bytes.len(),
                })?;
        Ok(Identity(array))
    }
}

impl Serialize for Identity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Identity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
