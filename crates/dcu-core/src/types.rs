//! Core type definitions for the DeCleanup Network
//!
//! Accounts and contracts are both identified by 20-byte addresses, token
//! amounts are 18-decimal fixed point values held in `u128`, and time is
//! block time in whole seconds.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Token amount in the smallest unit (wei-style, 18 decimals)
pub type Amount = u128;

/// Block timestamp in seconds
pub type Timestamp = u64;

/// Decimal places of DCU
pub const DECIMALS: u8 = 18;

/// One DCU in smallest unit
pub const ONE_DCU: Amount = 1_000_000_000_000_000_000; // 10^18

/// Seconds per day
pub const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Whole DCU to smallest unit
pub const fn dcu(whole: u64) -> Amount {
    whole as Amount * ONE_DCU
}

/// Address - 20-byte identifier for accounts and contracts
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; 20]);

impl Address {
    /// The zero address, never a valid participant
    pub const ZERO: Self = Self([0u8; 20]);

    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Derive a deterministic address from a human-readable label.
    ///
    /// Used by scripts and tests to name accounts ("alice", "oracle") without
    /// carrying raw hex around.
    pub fn from_label(label: &str) -> Self {
        let hash = blake3::hash(label.as_bytes());
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&hash.as_bytes()[..20]);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parse from hex, with or without the `0x` prefix
    pub fn from_hex(s: &str) -> Result<Self, AddressParseError> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let raw = hex::decode(digits).map_err(|_| AddressParseError::InvalidHex)?;
        if raw.len() != 20 {
            return Err(AddressParseError::InvalidLength(raw.len()));
        }
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&raw);
        Ok(Self(bytes))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", &self.to_hex()[..12])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Address parse failures
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AddressParseError {
    #[error("address is not valid hex")]
    InvalidHex,

    #[error("address must be 20 bytes, got {0}")]
    InvalidLength(usize),
}

/// Decision recorded against a PoI submission
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VerificationStatus {
    /// Absence of a decision; never accepted as input
    #[default]
    Pending,
    Approved,
    Rejected,
}

/// Render an amount as a decimal DCU string (e.g. `10.5`)
pub fn format_dcu(amount: Amount) -> String {
    let whole = amount / ONE_DCU;
    let frac = amount % ONE_DCU;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{:018}", frac);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}

/// Parse a decimal DCU string ("12", "0.5") into the smallest unit
pub fn parse_dcu(s: &str) -> Option<Amount> {
    let s = s.trim();
    let (whole, frac) = s.split_once('.').unwrap_or((s, ""));
    if (whole.is_empty() && frac.is_empty()) || frac.len() > DECIMALS as usize {
        return None;
    }
    if !whole.bytes().chain(frac.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }
    let whole: Amount = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let frac: Amount = if frac.is_empty() {
        0
    } else {
        format!("{:0<18}", frac).parse().ok()?
    };
    whole.checked_mul(ONE_DCU)?.checked_add(frac)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_hex_roundtrip() {
        let addr = Address::from_label("alice");
        let parsed: Address = addr.to_hex().parse().unwrap();
        assert_eq!(addr, parsed);
        assert!(addr.to_hex().starts_with("0x"));
    }

    #[test]
    fn test_labels_are_distinct_and_nonzero() {
        let alice = Address::from_label("alice");
        let bob = Address::from_label("bob");
        assert_ne!(alice, bob);
        assert!(!alice.is_zero());
        assert!(Address::ZERO.is_zero());
    }

    #[test]
    fn test_bad_address_rejected() {
        assert_eq!(Address::from_hex("0x1234"), Err(AddressParseError::InvalidLength(2)));
        assert_eq!(Address::from_hex("zz"), Err(AddressParseError::InvalidHex));
    }

    #[test]
    fn test_format_dcu() {
        assert_eq!(format_dcu(dcu(10)), "10");
        assert_eq!(format_dcu(ONE_DCU / 2), "0.5");
        assert_eq!(format_dcu(0), "0");
    }

    #[test]
    fn test_parse_dcu() {
        assert_eq!(parse_dcu("10"), Some(dcu(10)));
        assert_eq!(parse_dcu("0.5"), Some(ONE_DCU / 2));
        assert_eq!(parse_dcu(".25"), Some(ONE_DCU / 4));
        assert_eq!(parse_dcu(&format_dcu(dcu(3) + 7)), Some(dcu(3) + 7));
        assert_eq!(parse_dcu(""), None);
        assert_eq!(parse_dcu("1.2.3"), None);
        assert_eq!(parse_dcu("-1"), None);
        assert_eq!(parse_dcu("0.0000000000000000001"), None);
    }
}
