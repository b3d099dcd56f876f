//! # Dip NFT
//!
//! Soulbound impact NFT: one token per PoI-verified account, levels 1..=10.
//! Minting and each upgrade drive the reward manager, so a failed reward
//! hook reverts the mint or upgrade.
//!
//! Tokens move only through a one-shot transfer authorized by an admin.

use crate::constants::{IMPACT_PER_LEVEL, MAX_LEVEL};
use crate::reward_manager::ImpactRewards;
use dcu_core::prelude::*;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Token held by one account
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftData {
    pub token_id: u64,
    pub impact: u64,
    pub level: u8,
}

#[derive(Clone, Copy, Debug)]
struct TokenRecord {
    owner: Address,
    level: u8,
}

struct NftState {
    verified: HashSet<Address>,
    tokens: HashMap<u64, TokenRecord>,
    held: HashMap<Address, u64>,
    authorized: HashMap<u64, Address>,
    next_token_id: u64,
}

impl NftState {
    fn token(&self, token_id: u64) -> Result<TokenRecord> {
        self.tokens.get(&token_id).copied().ok_or(DcuError::NftNotFound(token_id))
    }
}

/// Impact of a token at `level`
pub fn impact_for_level(level: u8) -> u64 {
    u64::from(level) * IMPACT_PER_LEVEL
}

/// Soulbound NFT contract
pub struct DipNft {
    address: Address,
    access: AccessControl,
    rewards: RwLock<Arc<dyn ImpactRewards>>,
    events: SharedEventLog,
    guard: ReentrancyGuard,
    state: RwLock<NftState>,
}

impl DipNft {
    pub fn new(
        address: Address,
        owner: Address,
        rewards: Arc<dyn ImpactRewards>,
        events: SharedEventLog,
    ) -> Self {
        Self {
            address,
            access: AccessControl::new(owner).with_events(events.clone(), address),
            rewards: RwLock::new(rewards),
            events,
            guard: ReentrancyGuard::new(),
            state: RwLock::new(NftState {
                verified: HashSet::new(),
                tokens: HashMap::new(),
                held: HashMap::new(),
                authorized: HashMap::new(),
                next_token_id: 1,
            }),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    // === Verification ===

    /// Mark `user` PoI-verified (owner or admin)
    pub fn verify_poi(&self, caller: &Address, user: &Address) -> Result<()> {
        self.access.ensure_owner_or_role(caller, Role::Admin)?;
        if user.is_zero() {
            return Err(DcuError::InvalidAddress);
        }
        if self.state.write().verified.insert(*user) {
            self.events.emit(self.address, Event::PoiVerified { user: *user });
        } else {
            tracing::debug!(user = %user, "already verified");
        }
        Ok(())
    }

    /// Clear `user`'s verification (owner or admin); the NFT stays with its holder
    pub fn revoke_poi(&self, caller: &Address, user: &Address) -> Result<()> {
        self.access.ensure_owner_or_role(caller, Role::Admin)?;
        if self.state.write().verified.remove(user) {
            self.events.emit(self.address, Event::PoiRevoked { user: *user });
        }
        Ok(())
    }

    // === Mint / upgrade ===

    /// Mint the caller's level-1 token and credit its level-1 reward
    pub fn safe_mint(&self, caller: &Address) -> Result<u64> {
        let _lock = self.guard.enter()?;
        {
            let state = self.state.read();
            if !state.verified.contains(caller) {
                return Err(DcuError::PoiNotVerified(*caller));
            }
            if state.held.contains_key(caller) {
                return Err(DcuError::NftAlreadyMinted(*caller));
            }
        }
        let rewards = self.rewards.read().clone();
        rewards.check_level_claim(caller, 1)?;

        let token_id = {
            let mut state = self.state.write();
            let token_id = state.next_token_id;
            state.next_token_id += 1;
            state.tokens.insert(token_id, TokenRecord { owner: *caller, level: 1 });
            state.held.insert(*caller, token_id);
            token_id
        };

        if let Err(err) = rewards.reward_nft_mint(&self.address, caller) {
            let mut state = self.state.write();
            state.tokens.remove(&token_id);
            state.held.remove(caller);
            state.next_token_id = token_id;
            tracing::warn!(user = %caller, error = %err, "mint reverted");
            return Err(err);
        }

        tracing::info!(user = %caller, token_id, "impact NFT minted");
        self.events.emit(
            self.address,
            Event::NftMinted { to: *caller, token_id, level: 1 },
        );
        Ok(token_id)
    }

    /// Raise `token_id` one level and credit the new level's reward.
    /// Only the verified holder may upgrade.
    pub fn upgrade_nft(&self, caller: &Address, token_id: u64) -> Result<u8> {
        let _lock = self.guard.enter()?;
        let record = {
            let state = self.state.read();
            let record = state.token(token_id)?;
            if record.owner != *caller {
                return Err(DcuError::NotTokenOwner { account: *caller, token_id });
            }
            if !state.verified.contains(caller) {
                return Err(DcuError::PoiNotVerified(*caller));
            }
            record
        };
        if record.level >= MAX_LEVEL {
            return Err(DcuError::MaxLevelReached { token_id, max: MAX_LEVEL });
        }
        let level = record.level + 1;

        let rewards = self.rewards.read().clone();
        rewards.reward_impact_product_claim(&self.address, caller, level)?;

        if let Some(token) = self.state.write().tokens.get_mut(&token_id) {
            token.level = level;
        }

        let impact = impact_for_level(level);
        tracing::info!(user = %caller, token_id, level, "impact NFT upgraded");
        self.events.emit(
            self.address,
            Event::NftUpgraded { owner: *caller, token_id, level, impact },
        );
        Ok(level)
    }

    // === Transfers ===

    /// Allow a single transfer of `token_id` to `to` (owner or admin)
    pub fn authorize_transfer(&self, caller: &Address, token_id: u64, to: &Address) -> Result<()> {
        self.access.ensure_owner_or_role(caller, Role::Admin)?;
        if to.is_zero() {
            return Err(DcuError::InvalidAddress);
        }
        {
            let mut state = self.state.write();
            state.token(token_id)?;
            state.authorized.insert(token_id, *to);
        }
        self.events.emit(self.address, Event::TransferAuthorized { token_id, to: *to });
        Ok(())
    }

    /// Move `token_id` from `from` to `to`, consuming the authorization.
    /// The reward manager moves the holding first, so eligibility follows the token.
    pub fn transfer_from(&self, caller: &Address, from: &Address, to: &Address, token_id: u64) -> Result<()> {
        if to.is_zero() {
            return Err(DcuError::InvalidAddress);
        }
        if caller != from && !self.access.is_owner(caller) && !self.access.has_role(caller, Role::Admin) {
            return Err(DcuError::NotTokenOwner { account: *caller, token_id });
        }
        let _lock = self.guard.enter()?;
        {
            let state = self.state.read();
            let record = state.token(token_id)?;
            if record.owner != *from {
                return Err(DcuError::NotTokenOwner { account: *from, token_id });
            }
            if state.authorized.get(&token_id) != Some(to) {
                tracing::warn!(token_id, to = %to, "unauthorized soulbound transfer");
                return Err(DcuError::NonTransferable(token_id));
            }
            if state.held.contains_key(to) {
                return Err(DcuError::NftAlreadyMinted(*to));
            }
        }

        let rewards = self.rewards.read().clone();
        rewards.record_nft_transfer(&self.address, from, to)?;

        {
            let mut state = self.state.write();
            state.authorized.remove(&token_id);
            state.held.remove(from);
            state.held.insert(*to, token_id);
            if let Some(token) = state.tokens.get_mut(&token_id) {
                token.owner = *to;
            }
        }

        tracing::info!(token_id, from = %from, to = %to, "impact NFT transferred");
        self.events.emit(
            self.address,
            Event::NftTransferred { from: *from, to: *to, token_id },
        );
        Ok(())
    }

    /// Point the NFT at another reward manager (owner-only)
    pub fn set_reward_manager(&self, caller: &Address, rewards: Arc<dyn ImpactRewards>) -> Result<()> {
        self.access.ensure_owner(caller)?;
        if rewards.address().is_zero() {
            return Err(DcuError::InvalidAddress);
        }
        *self.rewards.write() = rewards;
        Ok(())
    }

    // === Views ===

    pub fn get_user_nft_data(&self, user: &Address) -> Result<NftData> {
        let state = self.state.read();
        let token_id = *state.held.get(user).ok_or(DcuError::NftNotMinted(*user))?;
        let record = state.token(token_id)?;
        Ok(NftData {
            token_id,
            impact: impact_for_level(record.level),
            level: record.level,
        })
    }

    pub fn owner_of(&self, token_id: u64) -> Result<Address> {
        self.state.read().token(token_id).map(|t| t.owner)
    }

    pub fn level_of(&self, token_id: u64) -> Result<u8> {
        self.state.read().token(token_id).map(|t| t.level)
    }

    pub fn is_poi_verified(&self, user: &Address) -> bool {
        self.state.read().verified.contains(user)
    }

    pub fn has_minted(&self, user: &Address) -> bool {
        self.state.read().held.contains_key(user)
    }

    pub fn transfer_authorization(&self, token_id: u64) -> Option<Address> {
        self.state.read().authorized.get(&token_id).copied()
    }

    pub fn total_supply(&self) -> usize {
        self.state.read().tokens.len()
    }

    pub fn reward_manager_address(&self) -> Address {
        self.rewards.read().address()
    }
}
