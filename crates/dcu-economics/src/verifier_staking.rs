//! # Verifier Staking
//!
//! An account becomes a staked verifier by locking at least
//! [`MINIMUM_STAKE`](crate::MINIMUM_STAKE) DCU with this contract. The stake
//! can only be withdrawn after [`UNSTAKING_DELAY_SECS`](crate::UNSTAKING_DELAY_SECS)
//! have passed since it was created; withdrawal returns the whole stake and
//! clears the record.
//!
//! | Rule | Failure |
//! |------|---------|
//! | amount > 0 | `InvalidAmount` |
//! | amount >= minimum | `InsufficientStakeAmount { provided, required }` |
//! | one active stake per account | `StakeAlreadyExists` |
//! | now >= staked_at + delay | `UnstakingLocked { remaining }` |

use crate::constants::{MINIMUM_STAKE, UNSTAKING_DELAY_SECS};
use dcu_core::prelude::*;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Staking parameters
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakingParams {
    /// Minimum amount to open a stake
    pub minimum_stake: Amount,
    /// Seconds after staking before the stake can be withdrawn
    pub unstaking_delay: u64,
}

impl Default for StakingParams {
    fn default() -> Self {
        Self {
            minimum_stake: MINIMUM_STAKE,
            unstaking_delay: UNSTAKING_DELAY_SECS,
        }
    }
}

/// Stake record of one verifier
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifierStake {
    /// Tokens held by the contract for this verifier
    pub amount: Amount,
    /// When the stake was opened
    pub timestamp: Timestamp,
    pub is_active: bool,
}

/// Read-side view of staking consumed by the verifier registry
pub trait StakeOracle: Send + Sync {
    fn address(&self) -> Address;

    /// Whether `account` holds an active stake
    fn is_staked_verifier(&self, account: &Address) -> bool;
}

#[derive(Default)]
struct StakingState {
    stakes: HashMap<Address, VerifierStake>,
    total_staked: Amount,
}

impl StakingState {
    fn stake(&self, account: &Address) -> VerifierStake {
        self.stakes.get(account).copied().unwrap_or_default()
    }

    fn active_stake(&self, account: &Address) -> Result<VerifierStake> {
        let stake = self.stake(account);
        if stake.is_active {
            Ok(stake)
        } else {
            Err(DcuError::NoActiveStake)
        }
    }
}

/// Verifier staking contract
pub struct VerifierStaking {
    address: Address,
    access: AccessControl,
    token: RwLock<SharedToken>,
    clock: SharedClock,
    events: SharedEventLog,
    guard: ReentrancyGuard,
    params: StakingParams,
    state: RwLock<StakingState>,
}

impl VerifierStaking {
    pub fn new(
        address: Address,
        owner: Address,
        token: SharedToken,
        clock: SharedClock,
        events: SharedEventLog,
    ) -> Self {
        Self::with_params(address, owner, token, clock, events, StakingParams::default())
    }

    pub fn with_params(
        address: Address,
        owner: Address,
        token: SharedToken,
        clock: SharedClock,
        events: SharedEventLog,
        params: StakingParams,
    ) -> Self {
        Self {
            address,
            access: AccessControl::new(owner).with_events(events.clone(), address),
            token: RwLock::new(token),
            clock,
            events,
            guard: ReentrancyGuard::new(),
            params,
            state: RwLock::new(StakingState::default()),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    pub fn params(&self) -> StakingParams {
        self.params
    }

    /// Open a stake of `amount`; the caller must have approved this contract
    pub fn stake(&self, caller: &Address, amount: Amount) -> Result<()> {
        if amount == 0 {
            return Err(DcuError::InvalidAmount);
        }
        if amount < self.params.minimum_stake {
            return Err(DcuError::InsufficientStakeAmount {
                provided: amount,
                required: self.params.minimum_stake,
            });
        }
        let _lock = self.guard.enter()?;
        if self.state.read().stake(caller).is_active {
            return Err(DcuError::StakeAlreadyExists);
        }

        let token = self.token.read().clone();
        token.transfer_from(&self.address, caller, &self.address, amount)?;

        {
            let mut state = self.state.write();
            state.stakes.insert(
                *caller,
                VerifierStake {
                    amount,
                    timestamp: self.clock.now(),
                    is_active: true,
                },
            );
            state.total_staked += amount;
        }

        tracing::info!(verifier = %caller, amount, "verifier registered");
        self.events.emit(
            self.address,
            Event::VerifierRegistered { verifier: *caller, amount },
        );
        Ok(())
    }

    /// Add to an existing stake; the unstaking clock is not reset
    pub fn increase_stake(&self, caller: &Address, additional: Amount) -> Result<()> {
        let _lock = self.guard.enter()?;
        let current = self.state.read().active_stake(caller)?;
        if additional == 0 {
            return Err(DcuError::InvalidAmount);
        }
        let new_amount = current.amount.checked_add(additional).ok_or(DcuError::Overflow)?;

        let token = self.token.read().clone();
        token.transfer_from(&self.address, caller, &self.address, additional)?;

        {
            let mut state = self.state.write();
            if let Some(stake) = state.stakes.get_mut(caller) {
                stake.amount = new_amount;
            }
            state.total_staked += additional;
        }

        tracing::info!(verifier = %caller, additional, new_amount, "stake increased");
        self.events.emit(
            self.address,
            Event::StakeIncreased { verifier: *caller, added: additional, new_amount },
        );
        Ok(())
    }

    /// Withdraw the whole stake once the unstaking delay has passed
    pub fn unstake(&self, caller: &Address) -> Result<Amount> {
        let _lock = self.guard.enter()?;
        let now = self.clock.now();

        let stake = {
            let mut state = self.state.write();
            let stake = state.active_stake(caller)?;
            let unlock_at = stake.timestamp.saturating_add(self.params.unstaking_delay);
            if now < unlock_at {
                return Err(DcuError::UnstakingLocked { remaining: unlock_at - now });
            }
            state.stakes.insert(*caller, VerifierStake::default());
            state.total_staked -= stake.amount;
            stake
        };

        let token = self.token.read().clone();
        if let Err(err) = token.transfer(&self.address, caller, stake.amount) {
            let mut state = self.state.write();
            state.stakes.insert(*caller, stake);
            state.total_staked += stake.amount;
            tracing::warn!(verifier = %caller, error = %err, "unstake reverted");
            return Err(err);
        }

        tracing::info!(verifier = %caller, amount = stake.amount, "verifier unstaked");
        self.events.emit(
            self.address,
            Event::VerifierUnstaked { verifier: *caller, amount: stake.amount },
        );
        Ok(stake.amount)
    }

    /// Swap the staking token (owner-only)
    pub fn set_token(&self, caller: &Address, token: SharedToken) -> Result<()> {
        self.access.ensure_owner(caller)?;
        let token_address = token.address();
        if token_address.is_zero() {
            return Err(DcuError::InvalidAddress);
        }
        *self.token.write() = token;
        self.events.emit(self.address, Event::StakingTokenUpdated { token: token_address });
        Ok(())
    }

    // === Views ===

    pub fn is_verifier(&self, account: &Address) -> bool {
        self.state.read().stake(account).is_active
    }

    /// Stake record, all-zero for unknown accounts
    pub fn stake_info(&self, account: &Address) -> VerifierStake {
        self.state.read().stake(account)
    }

    /// Seconds until the stake can be withdrawn, `None` without an active stake
    pub fn time_until_unstake(&self, account: &Address) -> Option<u64> {
        let stake = self.state.read().active_stake(account).ok()?;
        let unlock_at = stake.timestamp.saturating_add(self.params.unstaking_delay);
        Some(unlock_at.saturating_sub(self.clock.now()))
    }

    pub fn total_staked(&self) -> Amount {
        self.state.read().total_staked
    }

    pub fn active_verifier_count(&self) -> usize {
        self.state.read().stakes.values().filter(|s| s.is_active).count()
    }

    pub fn token_address(&self) -> Address {
        self.token.read().address()
    }
}

impl StakeOracle for VerifierStaking {
    fn address(&self) -> Address {
        self.address
    }

    fn is_staked_verifier(&self, account: &Address) -> bool {
        self.is_verifier(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::{Arc, OnceLock, Weak};

    struct Fixture {
        staking: Arc<VerifierStaking>,
        token: Arc<DcuToken>,
        clock: ManualClock,
        owner: Address,
        alice: Address,
    }

    fn setup() -> Fixture {
        let clock = ManualClock::new(0);
        let events = Arc::new(EventLog::new(Arc::new(clock.clone())));
        let owner = Address::from_label("owner");
        let token = Arc::new(DcuToken::new(Address::from_label("token"), owner, events.clone()));
        let staking = Arc::new(VerifierStaking::new(
            Address::from_label("staking"),
            owner,
            token.clone(),
            Arc::new(clock.clone()),
            events,
        ));
        let alice = Address::from_label("alice");
        token.mint(&owner, &alice, MINIMUM_STAKE * 3).unwrap();
        token.approve(&alice, &staking.address, MINIMUM_STAKE * 3).unwrap();
        Fixture { staking, token, clock, owner, alice }
    }

    #[test]
    fn test_stake_exact_minimum() {
        let f = setup();
        f.staking.stake(&f.alice, MINIMUM_STAKE).unwrap();

        let info = f.staking.stake_info(&f.alice);
        assert!(info.is_active);
        assert_eq!(info.amount, MINIMUM_STAKE);
        assert!(f.staking.is_verifier(&f.alice));
        assert_eq!(f.token.balance_of(&f.staking.address), MINIMUM_STAKE);
    }

    #[test]
    fn test_stake_below_minimum() {
        let f = setup();
        assert_eq!(
            f.staking.stake(&f.alice, MINIMUM_STAKE - 1),
            Err(DcuError::InsufficientStakeAmount {
                provided: MINIMUM_STAKE - 1,
                required: MINIMUM_STAKE,
            })
        );
        assert_eq!(f.staking.stake(&f.alice, 0), Err(DcuError::InvalidAmount));
        assert!(!f.staking.is_verifier(&f.alice));
    }

    #[test]
    fn test_duplicate_stake_rejected() {
        let f = setup();
        f.staking.stake(&f.alice, MINIMUM_STAKE).unwrap();
        assert_eq!(
            f.staking.stake(&f.alice, MINIMUM_STAKE),
            Err(DcuError::StakeAlreadyExists)
        );
    }

    #[test]
    fn test_increase_stake() {
        let f = setup();
        assert_eq!(
            f.staking.increase_stake(&f.alice, dcu(1)),
            Err(DcuError::NoActiveStake)
        );
        f.staking.stake(&f.alice, MINIMUM_STAKE).unwrap();
        assert_eq!(f.staking.increase_stake(&f.alice, 0), Err(DcuError::InvalidAmount));

        f.clock.advance(100);
        f.staking.increase_stake(&f.alice, dcu(500)).unwrap();
        let info = f.staking.stake_info(&f.alice);
        assert_eq!(info.amount, MINIMUM_STAKE + dcu(500));
        assert_eq!(info.timestamp, 0);
        assert_eq!(f.staking.total_staked(), MINIMUM_STAKE + dcu(500));
    }

    #[test]
    fn test_unstake_delay() {
        let f = setup();
        f.staking.stake(&f.alice, MINIMUM_STAKE).unwrap();

        f.clock.set(UNSTAKING_DELAY_SECS - 10);
        assert_eq!(
            f.staking.unstake(&f.alice),
            Err(DcuError::UnstakingLocked { remaining: 10 })
        );
        assert_eq!(f.staking.time_until_unstake(&f.alice), Some(10));

        f.clock.set(UNSTAKING_DELAY_SECS);
        assert_eq!(f.staking.unstake(&f.alice), Ok(MINIMUM_STAKE));
        assert_eq!(f.staking.stake_info(&f.alice), VerifierStake::default());
        assert_eq!(f.token.balance_of(&f.alice), MINIMUM_STAKE * 3);
        assert_eq!(f.staking.active_verifier_count(), 0);
        assert_eq!(f.staking.unstake(&f.alice), Err(DcuError::NoActiveStake));
    }

    #[test]
    fn test_restake_after_unstake() {
        let f = setup();
        f.staking.stake(&f.alice, MINIMUM_STAKE).unwrap();
        f.clock.set(UNSTAKING_DELAY_SECS);
        f.staking.unstake(&f.alice).unwrap();
        f.staking.stake(&f.alice, MINIMUM_STAKE).unwrap();
        assert_eq!(f.staking.stake_info(&f.alice).timestamp, UNSTAKING_DELAY_SECS);
    }

    #[test]
    fn test_set_token_owner_only() {
        let f = setup();
        let other: SharedToken = f.token.clone();
        assert!(matches!(
            f.staking.set_token(&f.alice, other.clone()),
            Err(DcuError::NotOwner(_))
        ));
        f.staking.set_token(&f.owner, other).unwrap();
        assert_eq!(f.staking.token_address(), f.token.address());
    }

    /// Token that calls back into staking while paying out
    struct ReentrantToken {
        inner: Arc<DcuToken>,
        target: OnceLock<Weak<VerifierStaking>>,
        nested: Mutex<Option<Result<Amount>>>,
    }

    impl TokenLedger for ReentrantToken {
        fn address(&self) -> Address {
            self.inner.address()
        }
        fn mint(&self, caller: &Address, to: &Address, amount: Amount) -> Result<()> {
            self.inner.mint(caller, to, amount)
        }
        fn transfer(&self, from: &Address, to: &Address, amount: Amount) -> Result<()> {
            if let Some(staking) = self.target.get().and_then(Weak::upgrade) {
                *self.nested.lock() = Some(staking.unstake(to));
            }
            self.inner.transfer(from, to, amount)
        }
        fn transfer_from(&self, spender: &Address, from: &Address, to: &Address, amount: Amount) -> Result<()> {
            self.inner.transfer_from(spender, from, to, amount)
        }
        fn balance_of(&self, account: &Address) -> Amount {
            self.inner.balance_of(account)
        }
        fn burn(&self, caller: &Address, from: &Address, amount: Amount) -> Result<()> {
            self.inner.burn(caller, from, amount)
        }
    }

    #[test]
    fn test_reentrant_unstake_rejected() {
        let clock = ManualClock::new(0);
        let events = Arc::new(EventLog::new(Arc::new(clock.clone())));
        let owner = Address::from_label("owner");
        let alice = Address::from_label("alice");
        let inner = Arc::new(DcuToken::new(Address::from_label("token"), owner, events.clone()));
        let token = Arc::new(ReentrantToken {
            inner: inner.clone(),
            target: OnceLock::new(),
            nested: Mutex::new(None),
        });
        let staking = Arc::new(VerifierStaking::new(
            Address::from_label("staking"),
            owner,
            token.clone(),
            Arc::new(clock.clone()),
            events,
        ));
        let _ = token.target.set(Arc::downgrade(&staking));

        inner.mint(&owner, &alice, MINIMUM_STAKE).unwrap();
        inner.approve(&alice, &staking.address, MINIMUM_STAKE).unwrap();
        staking.stake(&alice, MINIMUM_STAKE).unwrap();

        clock.set(UNSTAKING_DELAY_SECS);
        assert_eq!(staking.unstake(&alice), Ok(MINIMUM_STAKE));
        assert_eq!(*token.nested.lock(), Some(Err(DcuError::ReentrantCall)));
        assert_eq!(inner.balance_of(&alice), MINIMUM_STAKE);
    }
}
