//! Account references in configs and scripts
//!
//! Either a `0x`-prefixed hex address or a human label hashed into one
//! with [`Address::from_label`].

use crate::error::{NodeError, NodeResult};
use dcu_core::{parse_dcu, Address, Amount};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Resolve a label or hex string to an address
pub fn resolve_account(reference: &str) -> NodeResult<Address> {
    let reference = reference.trim();
    if reference.is_empty() {
        return Err(NodeError::InvalidAccount(reference.to_string()));
    }
    if reference.starts_with("0x") {
        return reference
            .parse()
            .map_err(|_| NodeError::InvalidAccount(reference.to_string()));
    }
    Ok(Address::from_label(reference))
}

/// Address that deserializes from a label or hex string
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Account(pub Address);

impl TryFrom<String> for Account {
    type Error = NodeError;

    fn try_from(value: String) -> NodeResult<Self> {
        resolve_account(&value).map(Account)
    }
}

impl From<Account> for String {
    fn from(account: Account) -> Self {
        account.0.to_hex()
    }
}

impl From<Address> for Account {
    fn from(address: Address) -> Self {
        Self(address)
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// DCU amount written as a decimal string ("12.5")
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DcuAmount(pub Amount);

impl TryFrom<String> for DcuAmount {
    type Error = NodeError;

    fn try_from(value: String) -> NodeResult<Self> {
        parse_dcu(&value)
            .map(DcuAmount)
            .ok_or_else(|| NodeError::InvalidConfig(format!("invalid DCU amount '{}'", value)))
    }
}

impl From<DcuAmount> for String {
    fn from(amount: DcuAmount) -> Self {
        dcu_core::format_dcu(amount.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcu_core::dcu;

    #[test]
    fn test_label_and_hex() {
        let alice = Address::from_label("alice");
        assert_eq!(resolve_account("alice").unwrap(), alice);
        assert_eq!(resolve_account(&alice.to_hex()).unwrap(), alice);
        assert!(resolve_account("0xnothex").is_err());
        assert!(resolve_account("  ").is_err());
    }

    #[test]
    fn test_serde_forms() {
        let account: Account = serde_json::from_str("\"alice\"").unwrap();
        assert_eq!(account.0, Address::from_label("alice"));

        let amount: DcuAmount = serde_json::from_str("\"2.5\"").unwrap();
        assert_eq!(amount.0, dcu(5) / 2);
        assert_eq!(serde_json::to_string(&amount).unwrap(), "\"2.5\"");
        assert!(serde_json::from_str::<DcuAmount>("\"abc\"").is_err());
    }
}
