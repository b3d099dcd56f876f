//! # Verifier Registry
//!
//! Single answer to "may this account verify PoI submissions?": either it
//! holds an active stake, or the owner added it to the allow-list.

use crate::verifier_staking::StakeOracle;
use dcu_core::prelude::*;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;

/// Verifier lookup consumed by the PoI verification manager
pub trait VerifierDirectory: Send + Sync {
    fn address(&self) -> Address;

    /// Fails with `InvalidAddress` for the zero address
    fn is_verifier(&self, account: &Address) -> Result<bool>;
}

/// Verifier registry contract
pub struct VerifierRegistry {
    address: Address,
    access: AccessControl,
    staking: RwLock<Arc<dyn StakeOracle>>,
    additional: RwLock<HashSet<Address>>,
    events: SharedEventLog,
}

impl VerifierRegistry {
    pub fn new(
        address: Address,
        owner: Address,
        staking: Arc<dyn StakeOracle>,
        events: SharedEventLog,
    ) -> Self {
        Self {
            address,
            access: AccessControl::new(owner).with_events(events.clone(), address),
            staking: RwLock::new(staking),
            additional: RwLock::new(HashSet::new()),
            events,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    /// Allow-list `verifier` independently of staking (owner-only)
    pub fn add_verifier(&self, caller: &Address, verifier: &Address) -> Result<()> {
        self.access.ensure_owner(caller)?;
        if verifier.is_zero() {
            return Err(DcuError::InvalidAddress);
        }
        if !self.additional.write().insert(*verifier) {
            return Err(DcuError::AlreadyVerifier(*verifier));
        }
        tracing::info!(verifier = %verifier, "verifier added");
        self.events.emit(self.address, Event::VerifierAdded { verifier: *verifier });
        Ok(())
    }

    /// Drop `verifier` from the allow-list (owner-only); staking is unaffected
    pub fn remove_verifier(&self, caller: &Address, verifier: &Address) -> Result<()> {
        self.access.ensure_owner(caller)?;
        if verifier.is_zero() {
            return Err(DcuError::InvalidAddress);
        }
        if !self.additional.write().remove(verifier) {
            return Err(DcuError::NotVerifier(*verifier));
        }
        tracing::info!(verifier = %verifier, "verifier removed");
        self.events.emit(self.address, Event::VerifierRemoved { verifier: *verifier });
        Ok(())
    }

    /// Point the registry at another staking contract (owner-only)
    pub fn set_staking_contract(&self, caller: &Address, staking: Arc<dyn StakeOracle>) -> Result<()> {
        self.access.ensure_owner(caller)?;
        let staking_address = staking.address();
        if staking_address.is_zero() {
            return Err(DcuError::InvalidAddress);
        }
        *self.staking.write() = staking;
        self.events.emit(
            self.address,
            Event::StakingContractUpdated { staking: staking_address },
        );
        Ok(())
    }

    pub fn is_additional_verifier(&self, account: &Address) -> bool {
        self.additional.read().contains(account)
    }

    /// Allow-listed verifiers, sorted
    pub fn additional_verifiers(&self) -> Vec<Address> {
        let mut verifiers: Vec<Address> = self.additional.read().iter().copied().collect();
        verifiers.sort();
        verifiers
    }

    pub fn staking_address(&self) -> Address {
        self.staking.read().address()
    }
}

impl VerifierDirectory for VerifierRegistry {
    fn address(&self) -> Address {
        self.address
    }

    fn is_verifier(&self, account: &Address) -> Result<bool> {
        if account.is_zero() {
            return Err(DcuError::InvalidAddress);
        }
        Ok(self.staking.read().is_staked_verifier(account) || self.is_additional_verifier(account))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fixed set of staked accounts
    struct StubStaking {
        address: Address,
        staked: HashSet<Address>,
    }

    impl StakeOracle for StubStaking {
        fn address(&self) -> Address {
            self.address
        }
        fn is_staked_verifier(&self, account: &Address) -> bool {
            self.staked.contains(account)
        }
    }

    fn stub(label: &str, staked: &[Address]) -> Arc<dyn StakeOracle> {
        Arc::new(StubStaking {
            address: Address::from_label(label),
            staked: staked.iter().copied().collect(),
        })
    }

    fn setup() -> (VerifierRegistry, Address, Address, Address) {
        let owner = Address::from_label("owner");
        let staker = Address::from_label("staker");
        let listed = Address::from_label("listed");
        let events = Arc::new(EventLog::new(Arc::new(ManualClock::new(0))));
        let registry = VerifierRegistry::new(
            Address::from_label("registry"),
            owner,
            stub("staking", &[staker]),
            events,
        );
        (registry, owner, staker, listed)
    }

    #[test]
    fn test_is_verifier_composes_stake_and_allow_list() {
        let (registry, owner, staker, listed) = setup();
        assert_eq!(registry.is_verifier(&staker), Ok(true));
        assert_eq!(registry.is_verifier(&listed), Ok(false));

        registry.add_verifier(&owner, &listed).unwrap();
        assert_eq!(registry.is_verifier(&listed), Ok(true));
        assert_eq!(registry.additional_verifiers(), vec![listed]);
    }

    #[test]
    fn test_zero_address_rejected() {
        let (registry, owner, _, _) = setup();
        assert_eq!(registry.is_verifier(&Address::ZERO), Err(DcuError::InvalidAddress));
        assert_eq!(
            registry.add_verifier(&owner, &Address::ZERO),
            Err(DcuError::InvalidAddress)
        );
    }

    #[test]
    fn test_duplicate_and_missing() {
        let (registry, owner, _, listed) = setup();
        registry.add_verifier(&owner, &listed).unwrap();
        assert_eq!(
            registry.add_verifier(&owner, &listed),
            Err(DcuError::AlreadyVerifier(listed))
        );
        registry.remove_verifier(&owner, &listed).unwrap();
        assert_eq!(
            registry.remove_verifier(&owner, &listed),
            Err(DcuError::NotVerifier(listed))
        );
    }

    #[test]
    fn test_owner_only() {
        let (registry, _, staker, listed) = setup();
        assert_eq!(
            registry.add_verifier(&staker, &listed),
            Err(DcuError::NotOwner(staker))
        );
    }

    #[test]
    fn test_swap_staking_contract() {
        let (registry, owner, staker, listed) = setup();
        registry
            .set_staking_contract(&owner, stub("staking-v2", &[listed]))
            .unwrap();
        assert_eq!(registry.staking_address(), Address::from_label("staking-v2"));
        assert_eq!(registry.is_verifier(&staker), Ok(false));
        assert_eq!(registry.is_verifier(&listed), Ok(true));

        let zero = Arc::new(StubStaking { address: Address::ZERO, staked: HashSet::new() });
        assert_eq!(
            registry.set_staking_contract(&owner, zero),
            Err(DcuError::InvalidAddress)
        );
    }
}
