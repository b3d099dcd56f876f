//! # Ledger Accounting
//!
//! Per-account DCU bookkeeping with two partitions that never mix:
//!
//! | Partition | Meaning | In | Out |
//! |-----------|---------|----|-----|
//! | claimable | promised, not yet minted | `add_claimable_balance` | `claim_tokens` (mints) |
//! | liquid | minted tokens held in ledger custody | `deposit` | `withdraw`, `stake`, `lock_tokens` |
//! | staked | liquid moved aside, no time lock | `stake` | `unstake` |
//! | locked | liquid moved aside until a release time | `lock_tokens` | `unlock_tokens` |
//!
//! Transfer-class operations (`claim_tokens`, `withdraw`,
//! `internal_transfer`) are closed until TGE unless the account is
//! whitelisted.

use dcu_core::prelude::*;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Balance record of one account
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalance {
    /// Minted tokens in ledger custody
    pub liquid: Amount,
    /// Promised tokens, minted on claim
    pub claimable: Amount,
    /// Staked out of liquid
    pub staked: Amount,
    /// Time-locked out of liquid
    pub locked: Amount,
    /// When `locked` may be released (0 when nothing is locked)
    pub lock_release_time: Timestamp,
}

/// Pre-TGE transfer gate
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TgeGate {
    pub completed: bool,
    pub whitelist: HashSet<Address>,
}

impl TgeGate {
    /// Whether `account` may perform transfer-class operations
    pub fn allows(&self, account: &Address) -> bool {
        self.completed || self.whitelist.contains(account)
    }
}

#[derive(Default)]
struct LedgerState {
    accounts: HashMap<Address, AccountBalance>,
    tge: TgeGate,
    total_claimable: Amount,
    total_liquid: Amount,
    total_staked: Amount,
    total_locked: Amount,
}

impl LedgerState {
    /// Unknown accounts read as all-zero
    fn account(&self, user: &Address) -> AccountBalance {
        self.accounts.get(user).copied().unwrap_or_default()
    }

    fn account_mut(&mut self, user: &Address) -> &mut AccountBalance {
        self.accounts.entry(*user).or_default()
    }

    fn ensure_transfer_allowed(&self, account: &Address) -> Result<()> {
        if self.tge.allows(account) {
            Ok(())
        } else {
            Err(DcuError::TgeNotCompleted(*account))
        }
    }

    fn ensure_liquid(&self, user: &Address, amount: Amount) -> Result<()> {
        let available = self.account(user).liquid;
        if available < amount {
            return Err(DcuError::InsufficientBalance { available, required: amount });
        }
        Ok(())
    }
}

/// Ledger accounting contract
pub struct DcuAccounting {
    address: Address,
    access: AccessControl,
    token: RwLock<SharedToken>,
    clock: SharedClock,
    events: SharedEventLog,
    guard: ReentrancyGuard,
    state: RwLock<LedgerState>,
}

impl DcuAccounting {
    pub fn new(
        address: Address,
        owner: Address,
        token: SharedToken,
        clock: SharedClock,
        events: SharedEventLog,
    ) -> Self {
        Self {
            address,
            access: AccessControl::new(owner).with_events(events.clone(), address),
            token: RwLock::new(token),
            clock,
            events,
            guard: ReentrancyGuard::new(),
            state: RwLock::new(LedgerState::default()),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    // === Liquid balance ===

    /// Pull `amount` tokens from the caller into ledger custody.
    ///
    /// The caller must have approved the ledger for `amount` on the token.
    pub fn deposit(&self, caller: &Address, amount: Amount) -> Result<()> {
        if amount == 0 {
            return Err(DcuError::InvalidAmount);
        }
        let _lock = self.guard.enter()?;

        let token = self.token.read().clone();
        token.transfer_from(&self.address, caller, &self.address, amount)?;

        let new_balance = {
            let mut state = self.state.write();
            let account = state.account_mut(caller);
            account.liquid = account.liquid.checked_add(amount).ok_or(DcuError::Overflow)?;
            let new_balance = account.liquid;
            state.total_liquid += amount;
            new_balance
        };

        tracing::info!(user = %caller, amount, "deposit");
        self.events.emit(
            self.address,
            Event::Deposited { user: *caller, amount, new_balance },
        );
        Ok(())
    }

    /// Send `amount` liquid tokens back to the caller
    pub fn withdraw(&self, caller: &Address, amount: Amount) -> Result<()> {
        if amount == 0 {
            return Err(DcuError::InvalidAmount);
        }
        let _lock = self.guard.enter()?;

        let new_balance = {
            let mut state = self.state.write();
            state.ensure_transfer_allowed(caller)?;
            state.ensure_liquid(caller, amount)?;
            let account = state.account_mut(caller);
            account.liquid -= amount;
            let new_balance = account.liquid;
            state.total_liquid -= amount;
            new_balance
        };

        let token = self.token.read().clone();
        if let Err(err) = token.transfer(&self.address, caller, amount) {
            let mut state = self.state.write();
            state.account_mut(caller).liquid += amount;
            state.total_liquid += amount;
            return Err(err);
        }

        tracing::info!(user = %caller, amount, "withdraw");
        self.events.emit(
            self.address,
            Event::Withdrawn { user: *caller, amount, new_balance },
        );
        Ok(())
    }

    /// Move liquid balance between two ledger accounts
    pub fn internal_transfer(&self, caller: &Address, to: &Address, amount: Amount) -> Result<()> {
        if to.is_zero() {
            return Err(DcuError::InvalidAddress);
        }
        if amount == 0 {
            return Err(DcuError::InvalidAmount);
        }

        {
            let mut state = self.state.write();
            state.ensure_transfer_allowed(caller)?;
            state.ensure_liquid(caller, amount)?;
            state.account(to).liquid.checked_add(amount).ok_or(DcuError::Overflow)?;
            state.account_mut(caller).liquid -= amount;
            state.account_mut(to).liquid += amount;
        }

        tracing::debug!(from = %caller, to = %to, amount, "internal transfer");
        self.events.emit(
            self.address,
            Event::InternalTransfer { from: *caller, to: *to, amount },
        );
        Ok(())
    }

    // === Claimable balance ===

    /// Promise `amount` tokens to `user` (reward-manager role)
    pub fn add_claimable_balance(&self, caller: &Address, user: &Address, amount: Amount) -> Result<()> {
        self.access.ensure_owner_or_role(caller, Role::RewardManager)?;
        if user.is_zero() {
            return Err(DcuError::InvalidAddress);
        }
        if amount == 0 {
            return Err(DcuError::InvalidAmount);
        }

        let new_balance = {
            let mut state = self.state.write();
            let total = state.total_claimable.checked_add(amount).ok_or(DcuError::Overflow)?;
            let account = state.account_mut(user);
            account.claimable = account.claimable.checked_add(amount).ok_or(DcuError::Overflow)?;
            let new_balance = account.claimable;
            state.total_claimable = total;
            new_balance
        };

        tracing::info!(user = %user, amount, "claimable balance added");
        self.events.emit(
            self.address,
            Event::ClaimableBalanceAdded { user: *user, amount, new_balance },
        );
        Ok(())
    }

    /// Mint `amount` of the caller's claimable balance to the caller
    pub fn claim_tokens(&self, caller: &Address, amount: Amount) -> Result<()> {
        if amount == 0 {
            return Err(DcuError::InvalidAmount);
        }
        let _lock = self.guard.enter()?;

        let new_balance = {
            let mut state = self.state.write();
            state.ensure_transfer_allowed(caller)?;
            let available = state.account(caller).claimable;
            if available < amount {
                return Err(DcuError::InsufficientClaimableBalance { available, required: amount });
            }
            let account = state.account_mut(caller);
            account.claimable -= amount;
            let new_balance = account.claimable;
            state.total_claimable -= amount;
            new_balance
        };

        let token = self.token.read().clone();
        if let Err(err) = token.mint(&self.address, caller, amount) {
            let mut state = self.state.write();
            state.account_mut(caller).claimable += amount;
            state.total_claimable += amount;
            tracing::warn!(user = %caller, amount, error = %err, "claim reverted");
            return Err(err);
        }

        tracing::info!(user = %caller, amount, "tokens claimed");
        self.events.emit(
            self.address,
            Event::TokensClaimed { user: *caller, amount, new_balance },
        );
        Ok(())
    }

    // === Staking ===

    /// Move liquid tokens into the staked bucket
    pub fn stake(&self, caller: &Address, amount: Amount) -> Result<()> {
        if amount == 0 {
            return Err(DcuError::InvalidAmount);
        }
        let new_balance = {
            let mut state = self.state.write();
            state.ensure_liquid(caller, amount)?;
            let account = state.account_mut(caller);
            account.liquid -= amount;
            account.staked += amount;
            let new_balance = account.staked;
            state.total_liquid -= amount;
            state.total_staked += amount;
            new_balance
        };

        self.events.emit(
            self.address,
            Event::TokensStaked { user: *caller, amount, new_balance },
        );
        Ok(())
    }

    /// Move staked tokens back to liquid; there is no time lock
    pub fn unstake(&self, caller: &Address, amount: Amount) -> Result<()> {
        if amount == 0 {
            return Err(DcuError::InvalidAmount);
        }
        let new_balance = {
            let mut state = self.state.write();
            let available = state.account(caller).staked;
            if available < amount {
                return Err(DcuError::InsufficientStakedBalance { available, required: amount });
            }
            let account = state.account_mut(caller);
            account.staked -= amount;
            account.liquid += amount;
            let new_balance = account.staked;
            state.total_staked -= amount;
            state.total_liquid += amount;
            new_balance
        };

        self.events.emit(
            self.address,
            Event::TokensUnstaked { user: *caller, amount, new_balance },
        );
        Ok(())
    }

    // === Time locks ===

    /// Lock liquid tokens for `duration` seconds.
    ///
    /// One lock record per account: a second lock adds to the amount and
    /// replaces the release time.
    pub fn lock_tokens(&self, caller: &Address, amount: Amount, duration: u64) -> Result<()> {
        if amount == 0 {
            return Err(DcuError::InvalidAmount);
        }
        if duration == 0 {
            return Err(DcuError::InvalidDuration);
        }
        let release_time = self
            .clock
            .now()
            .checked_add(duration)
            .ok_or(DcuError::Overflow)?;

        {
            let mut state = self.state.write();
            state.ensure_liquid(caller, amount)?;
            let account = state.account_mut(caller);
            account.liquid -= amount;
            account.locked += amount;
            account.lock_release_time = release_time;
            state.total_liquid -= amount;
            state.total_locked += amount;
        }

        tracing::info!(user = %caller, amount, release_time, "tokens locked");
        self.events.emit(
            self.address,
            Event::TokensLocked { user: *caller, amount, release_time },
        );
        Ok(())
    }

    /// Release the caller's lock once its release time has passed
    pub fn unlock_tokens(&self, caller: &Address) -> Result<Amount> {
        let now = self.clock.now();
        let amount = {
            let mut state = self.state.write();
            let account = state.account(caller);
            if account.locked == 0 {
                return Err(DcuError::NoLockedTokens);
            }
            if now < account.lock_release_time {
                return Err(DcuError::TokensStillLocked {
                    release_time: account.lock_release_time,
                    now,
                });
            }
            let account = state.account_mut(caller);
            let amount = std::mem::take(&mut account.locked);
            account.liquid += amount;
            account.lock_release_time = 0;
            state.total_locked -= amount;
            state.total_liquid += amount;
            amount
        };

        self.events.emit(self.address, Event::TokensUnlocked { user: *caller, amount });
        Ok(amount)
    }

    // === Administration ===

    /// Open or close the TGE gate (owner-only).
    ///
    /// Closing it again after completion is permitted.
    pub fn set_tge_status(&self, caller: &Address, completed: bool) -> Result<()> {
        self.access.ensure_owner(caller)?;
        let previous = std::mem::replace(&mut self.state.write().tge.completed, completed);
        if previous && !completed {
            tracing::warn!("TGE gate closed again after completion");
        }
        self.events.emit(self.address, Event::TgeStatusUpdated { completed });
        Ok(())
    }

    pub fn add_to_whitelist(&self, caller: &Address, account: &Address) -> Result<()> {
        self.access.ensure_owner(caller)?;
        if account.is_zero() {
            return Err(DcuError::InvalidAddress);
        }
        if self.state.write().tge.whitelist.insert(*account) {
            self.events.emit(self.address, Event::WhitelistAdded { account: *account });
        }
        Ok(())
    }

    pub fn remove_from_whitelist(&self, caller: &Address, account: &Address) -> Result<()> {
        self.access.ensure_owner(caller)?;
        if self.state.write().tge.whitelist.remove(account) {
            self.events.emit(self.address, Event::WhitelistRemoved { account: *account });
        }
        Ok(())
    }

    /// Swap the token collaborator (owner-only)
    pub fn set_token(&self, caller: &Address, token: SharedToken) -> Result<()> {
        self.access.ensure_owner(caller)?;
        if token.address().is_zero() {
            return Err(DcuError::InvalidAddress);
        }
        *self.token.write() = token;
        Ok(())
    }

    // === Views ===

    pub fn balance(&self, user: &Address) -> AccountBalance {
        self.state.read().account(user)
    }

    pub fn liquid_balance(&self, user: &Address) -> Amount {
        self.balance(user).liquid
    }

    pub fn claimable_balance(&self, user: &Address) -> Amount {
        self.balance(user).claimable
    }

    pub fn staked_balance(&self, user: &Address) -> Amount {
        self.balance(user).staked
    }

    /// Locked amount and its release time
    pub fn lock_info(&self, user: &Address) -> (Amount, Timestamp) {
        let account = self.balance(user);
        (account.locked, account.lock_release_time)
    }

    pub fn total_claimable(&self) -> Amount {
        self.state.read().total_claimable
    }

    pub fn total_staked(&self) -> Amount {
        self.state.read().total_staked
    }

    pub fn total_locked(&self) -> Amount {
        self.state.read().total_locked
    }

    pub fn total_liquid(&self) -> Amount {
        self.state.read().total_liquid
    }

    pub fn is_tge_completed(&self) -> bool {
        self.state.read().tge.completed
    }

    pub fn is_whitelisted(&self, account: &Address) -> bool {
        self.state.read().tge.whitelist.contains(account)
    }

    /// Whether `account` may currently claim, withdraw or transfer
    pub fn can_transfer(&self, account: &Address) -> bool {
        self.state.read().tge.allows(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct Fixture {
        ledger: DcuAccounting,
        token: Arc<DcuToken>,
        clock: ManualClock,
        owner: Address,
        manager: Address,
        alice: Address,
        bob: Address,
    }

    fn setup() -> Fixture {
        let clock = ManualClock::new(1_000);
        let events = Arc::new(EventLog::new(Arc::new(clock.clone())));
        let owner = Address::from_label("owner");
        let token = Arc::new(DcuToken::new(Address::from_label("token"), owner, events.clone()));
        let ledger = DcuAccounting::new(
            Address::from_label("ledger"),
            owner,
            token.clone(),
            Arc::new(clock.clone()),
            events,
        );
        token.access().grant_role(&owner, Role::Minter, ledger.address()).unwrap();

        let manager = Address::from_label("reward-manager");
        ledger.access().grant_role(&owner, Role::RewardManager, manager).unwrap();

        Fixture {
            ledger,
            token,
            clock,
            owner,
            manager,
            alice: Address::from_label("alice"),
            bob: Address::from_label("bob"),
        }
    }

    fn fund(f: &Fixture, user: &Address, amount: Amount) {
        f.token.mint(&f.owner, user, amount).unwrap();
        f.token.approve(user, &f.ledger.address(), amount).unwrap();
        f.ledger.deposit(user, amount).unwrap();
    }

    #[test]
    fn test_unknown_account_reads_zero() {
        let f = setup();
        assert_eq!(f.ledger.balance(&f.alice), AccountBalance::default());
        assert_eq!(f.ledger.lock_info(&f.alice), (0, 0));
        assert!(!f.ledger.is_whitelisted(&f.alice));
    }

    #[test]
    fn test_claim_round_trip() {
        let f = setup();
        f.ledger.set_tge_status(&f.owner, true).unwrap();
        f.ledger.add_claimable_balance(&f.manager, &f.alice, dcu(25)).unwrap();
        assert_eq!(f.ledger.total_claimable(), dcu(25));

        f.ledger.claim_tokens(&f.alice, dcu(25)).unwrap();
        assert_eq!(f.ledger.claimable_balance(&f.alice), 0);
        assert_eq!(f.ledger.total_claimable(), 0);
        assert_eq!(f.token.balance_of(&f.alice), dcu(25));
    }

    #[test]
    fn test_claim_gated_by_tge() {
        let f = setup();
        f.ledger.add_claimable_balance(&f.manager, &f.alice, dcu(5)).unwrap();
        f.ledger.add_claimable_balance(&f.manager, &f.bob, dcu(5)).unwrap();

        assert_eq!(
            f.ledger.claim_tokens(&f.alice, dcu(5)),
            Err(DcuError::TgeNotCompleted(f.alice))
        );
        assert_eq!(f.ledger.claimable_balance(&f.alice), dcu(5));

        f.ledger.add_to_whitelist(&f.owner, &f.alice).unwrap();
        f.ledger.claim_tokens(&f.alice, dcu(5)).unwrap();

        assert!(f.ledger.claim_tokens(&f.bob, dcu(5)).is_err());
        f.ledger.set_tge_status(&f.owner, true).unwrap();
        f.ledger.claim_tokens(&f.bob, dcu(5)).unwrap();
    }

    #[test]
    fn test_claim_more_than_claimable() {
        let f = setup();
        f.ledger.set_tge_status(&f.owner, true).unwrap();
        f.ledger.add_claimable_balance(&f.manager, &f.alice, dcu(1)).unwrap();
        assert_eq!(
            f.ledger.claim_tokens(&f.alice, dcu(2)),
            Err(DcuError::InsufficientClaimableBalance { available: dcu(1), required: dcu(2) })
        );
    }

    #[test]
    fn test_claim_reverts_when_mint_fails() {
        let f = setup();
        f.ledger.set_tge_status(&f.owner, true).unwrap();
        f.token.access().revoke_role(&f.owner, Role::Minter, f.ledger.address()).unwrap();
        f.ledger.add_claimable_balance(&f.manager, &f.alice, dcu(3)).unwrap();

        assert!(f.ledger.claim_tokens(&f.alice, dcu(3)).is_err());
        assert_eq!(f.ledger.claimable_balance(&f.alice), dcu(3));
        assert_eq!(f.ledger.total_claimable(), dcu(3));
    }

    #[test]
    fn test_add_claimable_requires_role() {
        let f = setup();
        assert!(matches!(
            f.ledger.add_claimable_balance(&f.alice, &f.alice, dcu(1)),
            Err(DcuError::MissingRole { role: Role::RewardManager, .. })
        ));
        assert_eq!(
            f.ledger.add_claimable_balance(&f.manager, &Address::ZERO, dcu(1)),
            Err(DcuError::InvalidAddress)
        );
    }

    #[test]
    fn test_deposit_withdraw() {
        let f = setup();
        fund(&f, &f.alice, dcu(100));
        assert_eq!(f.ledger.liquid_balance(&f.alice), dcu(100));
        assert_eq!(f.token.balance_of(&f.ledger.address()), dcu(100));

        assert!(f.ledger.withdraw(&f.alice, dcu(10)).is_err());
        f.ledger.set_tge_status(&f.owner, true).unwrap();
        f.ledger.withdraw(&f.alice, dcu(10)).unwrap();
        assert_eq!(f.ledger.liquid_balance(&f.alice), dcu(90));
        assert_eq!(f.token.balance_of(&f.alice), dcu(10));
    }

    #[test]
    fn test_internal_transfer() {
        let f = setup();
        fund(&f, &f.alice, dcu(10));
        f.ledger.add_to_whitelist(&f.owner, &f.alice).unwrap();

        f.ledger.internal_transfer(&f.alice, &f.bob, dcu(4)).unwrap();
        assert_eq!(f.ledger.liquid_balance(&f.bob), dcu(4));
        assert_eq!(
            f.ledger.internal_transfer(&f.bob, &f.alice, dcu(1)),
            Err(DcuError::TgeNotCompleted(f.bob))
        );
    }

    #[test]
    fn test_stake_unstake() {
        let f = setup();
        fund(&f, &f.alice, dcu(10));

        f.ledger.stake(&f.alice, dcu(6)).unwrap();
        let balance = f.ledger.balance(&f.alice);
        assert_eq!((balance.liquid, balance.staked), (dcu(4), dcu(6)));
        assert_eq!(f.ledger.total_staked(), dcu(6));

        assert!(matches!(
            f.ledger.unstake(&f.alice, dcu(7)),
            Err(DcuError::InsufficientStakedBalance { .. })
        ));
        f.ledger.unstake(&f.alice, dcu(6)).unwrap();
        assert_eq!(f.ledger.liquid_balance(&f.alice), dcu(10));
    }

    #[test]
    fn test_lock_and_unlock() {
        let f = setup();
        fund(&f, &f.alice, dcu(10));

        assert_eq!(f.ledger.unlock_tokens(&f.alice), Err(DcuError::NoLockedTokens));
        f.ledger.lock_tokens(&f.alice, dcu(5), 100).unwrap();
        assert_eq!(f.ledger.lock_info(&f.alice), (dcu(5), 1_100));

        f.clock.advance(99);
        assert_eq!(
            f.ledger.unlock_tokens(&f.alice),
            Err(DcuError::TokensStillLocked { release_time: 1_100, now: 1_099 })
        );

        f.clock.advance(1);
        assert_eq!(f.ledger.unlock_tokens(&f.alice), Ok(dcu(5)));
        assert_eq!(f.ledger.lock_info(&f.alice), (0, 0));
        assert_eq!(f.ledger.liquid_balance(&f.alice), dcu(10));
    }

    #[test]
    fn test_second_lock_overwrites_release_time() {
        let f = setup();
        fund(&f, &f.alice, dcu(10));

        f.ledger.lock_tokens(&f.alice, dcu(2), 1_000).unwrap();
        f.ledger.lock_tokens(&f.alice, dcu(3), 10).unwrap();
        assert_eq!(f.ledger.lock_info(&f.alice), (dcu(5), 1_010));
        assert_eq!(f.ledger.total_locked(), dcu(5));
    }

    #[test]
    fn test_tge_toggle_back() {
        let f = setup();
        f.ledger.set_tge_status(&f.owner, true).unwrap();
        assert!(f.ledger.can_transfer(&f.alice));
        f.ledger.set_tge_status(&f.owner, false).unwrap();
        assert!(!f.ledger.can_transfer(&f.alice));
        assert!(f.ledger.set_tge_status(&f.alice, true).is_err());
    }
}
