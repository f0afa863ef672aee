//! Confidential Records
//!
//! A record pairs a public description with an opaque ciphertext handle.
//! The cleartext only ever appears as a [`Disclosure::Disclosed`] value,
//! written by the ledger after it accepted a verified decryption.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ledger-wide record identifier
pub type RecordId = String;

/// Prefix used for identifiers generated by the submission pipeline
pub const RECORD_ID_PREFIX: &str = "salary-";

// ============================================================================
// Addresses and Handles
// ============================================================================

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressParseError {
    #[error("invalid hex in address: {0}")]
    InvalidHex(String),

    #[error("address must be 20 bytes, got {0}")]
    InvalidLength(usize),
}

/// A 20-byte account or contract address
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    /// Accepts `0x`-prefixed or bare hex in any letter case
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);

        let bytes = hex::decode(digits).map_err(|e| AddressParseError::InvalidHex(e.to_string()))?;
        let array: [u8; 20] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| AddressParseError::InvalidLength(bytes.len()))?;

        Ok(Address(array))
    }
}

/// Opaque reference to a ciphertext held by the encryption service.
/// Safe to store and transmit publicly.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CiphertextHandle(pub [u8; 32]);

impl CiphertextHandle {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for CiphertextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for CiphertextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CiphertextHandle({})", self.to_hex())
    }
}

// ============================================================================
// Record
// ============================================================================

/// Disclosure state of a record.
///
/// Holding the verified flag and the disclosed value in one enum keeps
/// "value present iff verified" true by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Disclosure {
    /// Only the ciphertext exists
    #[default]
    Sealed,
    /// A verified decryption was accepted; the value is permanent
    Disclosed(u64),
}

/// A confidential value entry as stored on the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    /// Public description (position title)
    pub label: String,
    pub encrypted_handle: CiphertextHandle,
    /// Years of experience
    pub public_attribute1: u32,
    pub public_attribute2: u32,
    /// Free text stored with the record
    pub metadata: String,
    /// Creation time in seconds
    pub created_at: u64,
    pub owner: Address,
    pub disclosure: Disclosure,
}

impl Record {
    pub fn verified(&self) -> bool {
        matches!(self.disclosure, Disclosure::Disclosed(_))
    }

    pub fn disclosed_value(&self) -> Option<u64> {
        match self.disclosure {
            Disclosure::Disclosed(value) => Some(value),
            Disclosure::Sealed => None,
        }
    }

    pub fn experience_years(&self) -> u32 {
        self.public_attribute1
    }

    pub fn is_owned_by(&self, address: &Address) -> bool {
        self.owner == *address
    }
}
