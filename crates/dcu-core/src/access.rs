//! Access control
//!
//! Privileged entry points check the caller against an [`Authority`]
//! rather than inheriting access rules. Each contract owns an
//! [`AccessControl`] with one owner and a set of role members.

use crate::error::{DcuError, Result};
use crate::events::{Event, SharedEventLog};
use crate::types::Address;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Roles recognised across the network's contracts
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Operational administrator (whitelists, submissions, soulbound transfers)
    Admin,
    /// May credit claimable balances on the ledger
    RewardManager,
    /// Sets PoI verification status on the reward manager
    Oracle,
    /// May mint the DCU token
    Minter,
    /// The soulbound NFT contract, reports mints and level claims
    NftContract,
}

/// Capability check used by contracts before privileged mutations
pub trait Authority: Send + Sync {
    fn owner(&self) -> Address;

    fn has_role(&self, account: &Address, role: Role) -> bool;

    fn is_owner(&self, account: &Address) -> bool {
        self.owner() == *account
    }

    fn ensure_owner(&self, caller: &Address) -> Result<()> {
        if self.is_owner(caller) {
            Ok(())
        } else {
            tracing::warn!(caller = %caller, "owner-only call rejected");
            Err(DcuError::NotOwner(*caller))
        }
    }

    fn ensure_role(&self, caller: &Address, role: Role) -> Result<()> {
        if self.has_role(caller, role) {
            Ok(())
        } else {
            tracing::warn!(caller = %caller, ?role, "role-gated call rejected");
            Err(DcuError::MissingRole { account: *caller, role })
        }
    }

    /// Owner, or any member of `role`
    fn ensure_owner_or_role(&self, caller: &Address, role: Role) -> Result<()> {
        if self.is_owner(caller) {
            return Ok(());
        }
        self.ensure_role(caller, role)
    }
}

/// Owner plus role membership
pub struct AccessControl {
    owner: RwLock<Address>,
    roles: RwLock<HashMap<Role, HashSet<Address>>>,
    events: Option<(SharedEventLog, Address)>,
}

impl AccessControl {
    pub fn new(owner: Address) -> Self {
        Self {
            owner: RwLock::new(owner),
            roles: RwLock::new(HashMap::new()),
            events: None,
        }
    }

    /// Emit role and ownership changes to `log` on behalf of `emitter`
    pub fn with_events(mut self, log: SharedEventLog, emitter: Address) -> Self {
        self.events = Some((log, emitter));
        self
    }

    /// Grant `role` to `account` (owner-only)
    pub fn grant_role(&self, caller: &Address, role: Role, account: Address) -> Result<()> {
        self.ensure_owner(caller)?;
        if account.is_zero() {
            return Err(DcuError::InvalidAddress);
        }
        if self.roles.write().entry(role).or_default().insert(account) {
            tracing::info!(?role, account = %account, "role granted");
            self.emit(Event::RoleGranted { role, account });
        }
        Ok(())
    }

    /// Revoke `role` from `account` (owner-only)
    pub fn revoke_role(&self, caller: &Address, role: Role, account: Address) -> Result<()> {
        self.ensure_owner(caller)?;
        let removed = self
            .roles
            .write()
            .get_mut(&role)
            .map(|members| members.remove(&account))
            .unwrap_or(false);
        if removed {
            tracing::info!(?role, account = %account, "role revoked");
            self.emit(Event::RoleRevoked { role, account });
        }
        Ok(())
    }

    /// Hand ownership to `new_owner` (owner-only)
    pub fn transfer_ownership(&self, caller: &Address, new_owner: Address) -> Result<()> {
        self.ensure_owner(caller)?;
        if new_owner.is_zero() {
            return Err(DcuError::InvalidAddress);
        }
        let previous = std::mem::replace(&mut *self.owner.write(), new_owner);
        self.emit(Event::OwnershipTransferred { previous, new_owner });
        Ok(())
    }

    /// Current members of `role`
    pub fn members(&self, role: Role) -> Vec<Address> {
        let mut members: Vec<Address> = self
            .roles
            .read()
            .get(&role)
            .map(|m| m.iter().copied().collect())
            .unwrap_or_default();
        members.sort();
        members
    }

    fn emit(&self, event: Event) {
        if let Some((log, emitter)) = &self.events {
            log.emit(*emitter, event);
        }
    }
}

impl Authority for AccessControl {
    fn owner(&self) -> Address {
        *self.owner.read()
    }

    fn has_role(&self, account: &Address, role: Role) -> bool {
        self.roles
            .read()
            .get(&role)
            .map(|m| m.contains(account))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (AccessControl, Address, Address) {
        let owner = Address::from_label("owner");
        let alice = Address::from_label("alice");
        (AccessControl::new(owner), owner, alice)
    }

    #[test]
    fn test_owner_checks() {
        let (acl, owner, alice) = setup();
        assert!(acl.ensure_owner(&owner).is_ok());
        assert_eq!(acl.ensure_owner(&alice), Err(DcuError::NotOwner(alice)));
    }

    #[test]
    fn test_grant_and_revoke() {
        let (acl, owner, alice) = setup();

        assert!(acl.ensure_role(&alice, Role::Oracle).is_err());
        acl.grant_role(&owner, Role::Oracle, alice).unwrap();
        assert!(acl.ensure_role(&alice, Role::Oracle).is_ok());
        assert!(!acl.has_role(&alice, Role::Admin));
        assert_eq!(acl.members(Role::Oracle), vec![alice]);

        acl.revoke_role(&owner, Role::Oracle, alice).unwrap();
        assert!(!acl.has_role(&alice, Role::Oracle));
    }

    #[test]
    fn test_only_owner_grants() {
        let (acl, _, alice) = setup();
        assert_eq!(
            acl.grant_role(&alice, Role::Admin, alice),
            Err(DcuError::NotOwner(alice))
        );
    }

    #[test]
    fn test_owner_passes_role_gate() {
        let (acl, owner, alice) = setup();
        assert!(acl.ensure_owner_or_role(&owner, Role::Oracle).is_ok());
        assert!(acl.ensure_owner_or_role(&alice, Role::Oracle).is_err());
    }

    #[test]
    fn test_transfer_ownership() {
        let (acl, owner, alice) = setup();
        assert_eq!(
            acl.transfer_ownership(&owner, Address::ZERO),
            Err(DcuError::InvalidAddress)
        );
        acl.transfer_ownership(&owner, alice).unwrap();
        assert_eq!(acl.owner(), alice);
        assert!(acl.ensure_owner(&owner).is_err());
    }
}
