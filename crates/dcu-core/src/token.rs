//! DCU token collaborator
//!
//! Contracts only ever see the token through [`TokenLedger`]: mint,
//! transfer, transfer-from, balance and burn. [`DcuToken`] is the in-memory
//! ERC-20-shaped implementation used by the network and in tests.

use crate::access::{AccessControl, Authority, Role};
use crate::error::{DcuError, Result};
use crate::events::{Event, SharedEventLog};
use crate::types::{Address, Amount};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Token surface consumed by the reward manager, ledger and staking
pub trait TokenLedger: Send + Sync {
    /// Address of the token contract
    fn address(&self) -> Address;

    /// Create `amount` new tokens for `to`
    fn mint(&self, caller: &Address, to: &Address, amount: Amount) -> Result<()>;

    /// Move tokens owned by `from` (the caller)
    fn transfer(&self, from: &Address, to: &Address, amount: Amount) -> Result<()>;

    /// Move tokens owned by `from` using `spender`'s allowance
    fn transfer_from(
        &self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<()>;

    fn balance_of(&self, account: &Address) -> Amount;

    /// Destroy tokens held by `from`
    fn burn(&self, caller: &Address, from: &Address, amount: Amount) -> Result<()>;
}

/// Shared token handle
pub type SharedToken = Arc<dyn TokenLedger>;

#[derive(Default)]
struct TokenState {
    balances: HashMap<Address, Amount>,
    allowances: HashMap<(Address, Address), Amount>,
    total_supply: Amount,
}

impl TokenState {
    fn balance(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    fn debit(&mut self, account: &Address, amount: Amount) -> Result<()> {
        let available = self.balance(account);
        if available < amount {
            return Err(DcuError::InsufficientBalance { available, required: amount });
        }
        self.balances.insert(*account, available - amount);
        Ok(())
    }

    fn credit(&mut self, account: &Address, amount: Amount) -> Result<()> {
        let balance = self
            .balance(account)
            .checked_add(amount)
            .ok_or(DcuError::Overflow)?;
        self.balances.insert(*account, balance);
        Ok(())
    }
}

/// In-memory DCU token
pub struct DcuToken {
    address: Address,
    access: AccessControl,
    state: RwLock<TokenState>,
    events: SharedEventLog,
}

impl DcuToken {
    pub fn new(address: Address, owner: Address, events: SharedEventLog) -> Self {
        Self {
            address,
            access: AccessControl::new(owner).with_events(events.clone(), address),
            state: RwLock::new(TokenState::default()),
            events,
        }
    }

    /// Role management for this token (minters)
    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    /// Set `spender`'s allowance over `owner`'s tokens
    pub fn approve(&self, owner: &Address, spender: &Address, amount: Amount) -> Result<()> {
        if spender.is_zero() {
            return Err(DcuError::InvalidAddress);
        }
        self.state.write().allowances.insert((*owner, *spender), amount);
        self.events.emit(
            self.address,
            Event::Approval { owner: *owner, spender: *spender, amount },
        );
        Ok(())
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.state
            .read()
            .allowances
            .get(&(*owner, *spender))
            .copied()
            .unwrap_or(0)
    }

    pub fn total_supply(&self) -> Amount {
        self.state.read().total_supply
    }

    fn move_tokens(state: &mut TokenState, from: &Address, to: &Address, amount: Amount) -> Result<()> {
        if to.is_zero() {
            return Err(DcuError::InvalidAddress);
        }
        state.debit(from, amount)?;
        state.credit(to, amount)
    }
}

impl TokenLedger for DcuToken {
    fn address(&self) -> Address {
        self.address
    }

    fn mint(&self, caller: &Address, to: &Address, amount: Amount) -> Result<()> {
        self.access.ensure_owner_or_role(caller, Role::Minter)?;
        if to.is_zero() {
            return Err(DcuError::InvalidAddress);
        }
        let mut state = self.state.write();
        let supply = state.total_supply.checked_add(amount).ok_or(DcuError::Overflow)?;
        state.credit(to, amount)?;
        state.total_supply = supply;
        drop(state);

        self.events.emit(
            self.address,
            Event::Transfer { from: Address::ZERO, to: *to, amount },
        );
        Ok(())
    }

    fn transfer(&self, from: &Address, to: &Address, amount: Amount) -> Result<()> {
        Self::move_tokens(&mut self.state.write(), from, to, amount)?;
        self.events.emit(self.address, Event::Transfer { from: *from, to: *to, amount });
        Ok(())
    }

    fn transfer_from(
        &self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<()> {
        let mut state = self.state.write();
        let key = (*from, *spender);
        let allowance = state.allowances.get(&key).copied().unwrap_or(0);
        if allowance < amount {
            return Err(DcuError::InsufficientAllowance { available: allowance, required: amount });
        }
        Self::move_tokens(&mut state, from, to, amount)?;
        state.allowances.insert(key, allowance - amount);
        drop(state);

        self.events.emit(self.address, Event::Transfer { from: *from, to: *to, amount });
        Ok(())
    }

    fn balance_of(&self, account: &Address) -> Amount {
        self.state.read().balance(account)
    }

    fn burn(&self, caller: &Address, from: &Address, amount: Amount) -> Result<()> {
        if caller != from {
            self.access.ensure_owner_or_role(caller, Role::Minter)?;
        }
        let mut state = self.state.write();
        state.debit(from, amount)?;
        state.total_supply -= amount;
        drop(state);

        self.events.emit(
            self.address,
            Event::Transfer { from: *from, to: Address::ZERO, amount },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::events::EventLog;
    use crate::types::dcu;

    fn setup() -> (DcuToken, Address, Address, Address) {
        let log = Arc::new(EventLog::new(Arc::new(ManualClock::new(0))));
        let owner = Address::from_label("owner");
        let alice = Address::from_label("alice");
        let bob = Address::from_label("bob");
        let token = DcuToken::new(Address::from_label("dcu-token"), owner, log);
        (token, owner, alice, bob)
    }

    #[test]
    fn test_mint_requires_minter() {
        let (token, owner, alice, _) = setup();

        assert!(matches!(
            token.mint(&alice, &alice, dcu(1)),
            Err(DcuError::MissingRole { role: Role::Minter, .. })
        ));

        token.access().grant_role(&owner, Role::Minter, alice).unwrap();
        token.mint(&alice, &alice, dcu(5)).unwrap();
        assert_eq!(token.balance_of(&alice), dcu(5));
        assert_eq!(token.total_supply(), dcu(5));
    }

    #[test]
    fn test_transfer() {
        let (token, owner, alice, bob) = setup();
        token.mint(&owner, &alice, dcu(10)).unwrap();

        token.transfer(&alice, &bob, dcu(4)).unwrap();
        assert_eq!(token.balance_of(&alice), dcu(6));
        assert_eq!(token.balance_of(&bob), dcu(4));

        assert!(matches!(
            token.transfer(&bob, &alice, dcu(5)),
            Err(DcuError::InsufficientBalance { .. })
        ));
    }

    #[test]
    fn test_transfer_from_consumes_allowance() {
        let (token, owner, alice, bob) = setup();
        token.mint(&owner, &alice, dcu(10)).unwrap();
        token.approve(&alice, &bob, dcu(3)).unwrap();

        token.transfer_from(&bob, &alice, &bob, dcu(2)).unwrap();
        assert_eq!(token.allowance(&alice, &bob), dcu(1));
        assert!(matches!(
            token.transfer_from(&bob, &alice, &bob, dcu(2)),
            Err(DcuError::InsufficientAllowance { .. })
        ));
        assert_eq!(token.balance_of(&bob), dcu(2));
    }

    #[test]
    fn test_burn() {
        let (token, owner, alice, bob) = setup();
        token.mint(&owner, &alice, dcu(10)).unwrap();

        assert!(token.burn(&bob, &alice, dcu(1)).is_err());
        token.burn(&alice, &alice, dcu(4)).unwrap();
        assert_eq!(token.balance_of(&alice), dcu(6));
        assert_eq!(token.total_supply(), dcu(6));
    }
}
