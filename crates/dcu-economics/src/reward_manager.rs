//! # Reward Manager
//!
//! Gates and accrues DCU rewards for three activities and holds them as an
//! internal balance until the user claims, at which point they are minted.
//!
//! ## Eligibility
//!
//! ```text
//! Unverified ──oracle──► PoiVerified ──NFT mint──► RewardEligible
//!      ▲                     │
//!      └──────revoke─────────┘   (eligibility recomputed on every read)
//! ```
//!
//! Level claims require `poi_verified && nft_minted`.
//!
//! ## Rewards
//!
//! | Activity | Trigger | Once per |
//! |----------|---------|----------|
//! | Impact product claim | NFT mint / upgrade to a level | (user, level) |
//! | Streak | PoI re-verified within the streak window | re-verification |
//! | Referral | invitee's first level claim | (referrer, invitee) |

use crate::constants::{
    DEFAULT_IMPACT_PRODUCT_CLAIM_REWARD, DEFAULT_REFERRAL_REWARD, DEFAULT_STREAK_REWARD,
    MAX_LEVEL, MAX_REWARD_AMOUNT, STREAK_WINDOW_SECS,
};
use dcu_core::prelude::*;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Per-activity reward amounts
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardAmounts {
    pub impact_product_claim: Amount,
    pub streak: Amount,
    pub referral: Amount,
}

impl Default for RewardAmounts {
    fn default() -> Self {
        Self {
            impact_product_claim: DEFAULT_IMPACT_PRODUCT_CLAIM_REWARD,
            streak: DEFAULT_STREAK_REWARD,
            referral: DEFAULT_REFERRAL_REWARD,
        }
    }
}

impl RewardAmounts {
    /// Reject any component above the cap
    pub fn validate(&self) -> Result<()> {
        for amount in [self.impact_product_claim, self.streak, self.referral] {
            if amount > MAX_REWARD_AMOUNT {
                return Err(DcuError::RewardAmountTooHigh { amount, max: MAX_REWARD_AMOUNT });
            }
        }
        Ok(())
    }
}

/// Live eligibility of one user
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityStatus {
    pub poi_verified: bool,
    pub nft_minted: bool,
    pub reward_eligible: bool,
}

/// Earned and claimed totals of one user
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardBreakdown {
    pub claim_rewards: Amount,
    pub streak_rewards: Amount,
    pub referral_rewards: Amount,
    pub current_balance: Amount,
    pub total_claimed: Amount,
}

#[derive(Clone, Debug, Default)]
struct UserRewards {
    poi_verified: bool,
    nft_minted: bool,
    last_poi_timestamp: Option<Timestamp>,
    streak_days: u64,
    claimed_levels: BTreeSet<u8>,
    referrer: Option<Address>,
    balance: Amount,
    claim_rewards: Amount,
    streak_rewards: Amount,
    referral_rewards: Amount,
    total_claimed: Amount,
}

impl UserRewards {
    fn check_claim(&self, user: &Address, level: u8, require_nft: bool) -> Result<()> {
        if !self.poi_verified {
            return Err(DcuError::PoiNotVerified(*user));
        }
        if require_nft && !self.nft_minted {
            return Err(DcuError::NftNotMinted(*user));
        }
        if self.claimed_levels.contains(&level) {
            return Err(DcuError::LevelAlreadyClaimed { level });
        }
        Ok(())
    }

    fn credit(&mut self, amount: Amount) -> Result<()> {
        self.balance = self.balance.checked_add(amount).ok_or(DcuError::Overflow)?;
        Ok(())
    }
}

struct RewardState {
    users: HashMap<Address, UserRewards>,
    /// (referrer, invitee) pairs already paid
    referral_rewarded: HashSet<(Address, Address)>,
    amounts: RewardAmounts,
    nft_contract: Option<Address>,
}

impl RewardState {
    fn user(&self, user: &Address) -> UserRewards {
        self.users.get(user).cloned().unwrap_or_default()
    }

    fn user_mut(&mut self, user: &Address) -> &mut UserRewards {
        self.users.entry(*user).or_default()
    }
}

/// Reward hooks driven by the impact NFT
pub trait ImpactRewards: Send + Sync {
    fn address(&self) -> Address;

    /// Validate a level claim as if the NFT were already recorded
    fn check_level_claim(&self, user: &Address, level: u8) -> Result<()>;

    /// Record the mint of `user`'s NFT and credit its level-1 reward
    fn reward_nft_mint(&self, caller: &Address, user: &Address) -> Result<()>;

    fn record_nft_transfer(&self, caller: &Address, from: &Address, to: &Address) -> Result<()>;

    fn reward_impact_product_claim(&self, caller: &Address, user: &Address, level: u8) -> Result<()>;
}

/// Amounts credited by one level claim
#[derive(Clone, Copy, Debug)]
struct LevelCredit {
    amount: Amount,
    referral: Option<(Address, Amount)>,
}

/// Outcome of a PoI verification update
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreakOutcome {
    /// First verification, or a revocation
    None,
    /// Re-verified inside the window; bonus credited
    Continued { streak_days: u64, reward: Amount },
    /// Re-verified after the window; no bonus
    Reset { elapsed_days: u64 },
}

/// Reward manager contract
pub struct RewardManager {
    address: Address,
    access: AccessControl,
    token: RwLock<SharedToken>,
    clock: SharedClock,
    events: SharedEventLog,
    guard: ReentrancyGuard,
    streak_window: u64,
    state: RwLock<RewardState>,
}

impl RewardManager {
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
            streak_window: STREAK_WINDOW_SECS,
            state: RwLock::new(RewardState {
                users: HashMap::new(),
                referral_rewarded: HashSet::new(),
                amounts: RewardAmounts::default(),
                nft_contract: None,
            }),
        }
    }

    /// Override the streak window (seconds, upper bound inclusive)
    pub fn with_streak_window(mut self, window: u64) -> Self {
        self.streak_window = window;
        self
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    // === Verification ===

    /// Set a user's PoI verification flag (owner or oracle).
    ///
    /// Every verification advances the last PoI timestamp. A verification
    /// within the streak window of the previous one credits the streak
    /// reward; a later one resets the streak.
    pub fn set_poi_verification_status(
        &self,
        caller: &Address,
        user: &Address,
        verified: bool,
    ) -> Result<StreakOutcome> {
        self.access.ensure_owner_or_role(caller, Role::Oracle)?;
        if user.is_zero() {
            return Err(DcuError::InvalidAddress);
        }
        let now = self.clock.now();

        let outcome = {
            let mut state = self.state.write();
            let streak_reward = state.amounts.streak;
            let record = state.user_mut(user);

            if !verified {
                record.poi_verified = false;
                StreakOutcome::None
            } else {
                let outcome = match record.last_poi_timestamp {
                    None => StreakOutcome::None,
                    Some(last) => {
                        let elapsed = now.saturating_sub(last);
                        if elapsed <= self.streak_window {
                            let streak_days = (elapsed / SECONDS_PER_DAY).max(1);
                            let balance = record
                                .balance
                                .checked_add(streak_reward)
                                .ok_or(DcuError::Overflow)?;
                            record.balance = balance;
                            record.streak_rewards += streak_reward;
                            record.streak_days = streak_days;
                            StreakOutcome::Continued { streak_days, reward: streak_reward }
                        } else {
                            record.streak_days = 0;
                            StreakOutcome::Reset { elapsed_days: elapsed / SECONDS_PER_DAY }
                        }
                    }
                };
                record.poi_verified = true;
                record.last_poi_timestamp = Some(now);
                outcome
            }
        };

        match outcome {
            StreakOutcome::Continued { streak_days, reward } => {
                tracing::info!(user = %user, streak_days, reward, "streak reward");
                self.events.emit(
                    self.address,
                    Event::StreakReward { user: *user, amount: reward, streak_days, timestamp: now },
                );
            }
            StreakOutcome::Reset { elapsed_days } => {
                tracing::info!(user = %user, elapsed_days, "streak reset");
                self.events.emit(self.address, Event::StreakReset { user: *user, elapsed_days });
            }
            StreakOutcome::None => {}
        }
        self.events.emit(
            self.address,
            Event::PoiVerificationUpdated { user: *user, verified },
        );
        Ok(outcome)
    }

    /// Record that `user` now holds the impact NFT (NFT contract or owner)
    pub fn record_nft_mint(&self, caller: &Address, user: &Address) -> Result<()> {
        self.access.ensure_owner_or_role(caller, Role::NftContract)?;
        if user.is_zero() {
            return Err(DcuError::InvalidAddress);
        }
        self.state.write().user_mut(user).nft_minted = true;
        self.events.emit(self.address, Event::NftMintRecorded { user: *user });
        Ok(())
    }

    /// Record a fresh mint and credit its level-1 reward in one step
    /// (NFT contract or owner). Nothing is recorded if the claim fails.
    pub fn reward_nft_mint(&self, caller: &Address, user: &Address) -> Result<()> {
        self.access.ensure_owner_or_role(caller, Role::NftContract)?;
        if user.is_zero() {
            return Err(DcuError::InvalidAddress);
        }
        let now = self.clock.now();

        let credit = {
            let mut state = self.state.write();
            state.user(user).check_claim(user, 1, false)?;
            let record = state.user_mut(user);
            let was_minted = std::mem::replace(&mut record.nft_minted, true);
            match Self::apply_level_claim(&mut state, user, 1) {
                Ok(credit) => credit,
                Err(err) => {
                    state.user_mut(user).nft_minted = was_minted;
                    return Err(err);
                }
            }
        };

        self.events.emit(self.address, Event::NftMintRecorded { user: *user });
        self.emit_level_claim(user, 1, credit, now);
        Ok(())
    }

    /// Move the NFT holding from `from` to `to` after an authorized
    /// soulbound transfer (NFT contract or owner)
    pub fn record_nft_transfer(&self, caller: &Address, from: &Address, to: &Address) -> Result<()> {
        self.access.ensure_owner_or_role(caller, Role::NftContract)?;
        if from.is_zero() || to.is_zero() {
            return Err(DcuError::InvalidAddress);
        }
        {
            let mut state = self.state.write();
            if !state.user(from).nft_minted {
                return Err(DcuError::NftNotMinted(*from));
            }
            if state.user(to).nft_minted {
                return Err(DcuError::NftAlreadyMinted(*to));
            }
            state.user_mut(from).nft_minted = false;
            state.user_mut(to).nft_minted = true;
        }

        tracing::info!(from = %from, to = %to, "NFT holding moved");
        self.events.emit(self.address, Event::NftTransferRecorded { from: *from, to: *to });
        Ok(())
    }

    // === Rewards ===

    /// Validate a level claim for `user` without requiring the NFT record
    pub fn check_level_claim(&self, user: &Address, level: u8) -> Result<()> {
        if level == 0 || level > MAX_LEVEL {
            return Err(DcuError::InvalidLevel { level, max: MAX_LEVEL });
        }
        self.state.read().user(user).check_claim(user, level, false)
    }

    /// Credit the impact product reward for `level` (NFT contract or owner).
    ///
    /// The first successful claim of a referred user also pays the referrer,
    /// exactly once.
    pub fn reward_impact_product_claim(&self, caller: &Address, user: &Address, level: u8) -> Result<()> {
        self.access.ensure_owner_or_role(caller, Role::NftContract)?;
        if level == 0 || level > MAX_LEVEL {
            return Err(DcuError::InvalidLevel { level, max: MAX_LEVEL });
        }
        if user.is_zero() {
            return Err(DcuError::InvalidAddress);
        }
        let now = self.clock.now();
        let credit = Self::apply_level_claim(&mut self.state.write(), user, level)?;
        self.emit_level_claim(user, level, credit, now);
        Ok(())
    }

    /// Mark `level` claimed and credit the user (and a pending referrer).
    /// Either everything is applied or nothing is.
    fn apply_level_claim(state: &mut RewardState, user: &Address, level: u8) -> Result<LevelCredit> {
        let amounts = state.amounts;
        let record = state.user(user);
        record.check_claim(user, level, true)?;
        let balance = record
            .balance
            .checked_add(amounts.impact_product_claim)
            .ok_or(DcuError::Overflow)?;

        let referral = record
            .referrer
            .filter(|referrer| !state.referral_rewarded.contains(&(*referrer, *user)));
        let referrer_balance = match referral {
            Some(referrer) => Some(
                state
                    .user(&referrer)
                    .balance
                    .checked_add(amounts.referral)
                    .ok_or(DcuError::Overflow)?,
            ),
            None => None,
        };

        let record = state.user_mut(user);
        record.balance = balance;
        record.claimed_levels.insert(level);
        record.claim_rewards += amounts.impact_product_claim;

        if let (Some(referrer), Some(balance)) = (referral, referrer_balance) {
            state.referral_rewarded.insert((referrer, *user));
            let referrer_record = state.user_mut(&referrer);
            referrer_record.balance = balance;
            referrer_record.referral_rewards += amounts.referral;
        }
        Ok(LevelCredit {
            amount: amounts.impact_product_claim,
            referral: referral.map(|r| (r, amounts.referral)),
        })
    }

    fn emit_level_claim(&self, user: &Address, level: u8, credit: LevelCredit, now: Timestamp) {
        tracing::info!(user = %user, level, amount = credit.amount, "impact product claim reward");
        self.events.emit(
            self.address,
            Event::ImpactProductClaimReward { user: *user, level, amount: credit.amount, timestamp: now },
        );
        if let Some((referrer, amount)) = credit.referral {
            tracing::info!(referrer = %referrer, invitee = %user, amount, "referral reward");
            self.events.emit(
                self.address,
                Event::ReferralReward { referrer, invitee: *user, amount, timestamp: now },
            );
        }
    }

    /// Link `invitee` to `referrer` (owner-only); an invitee has one referrer for life
    pub fn register_referral(&self, caller: &Address, invitee: &Address, referrer: &Address) -> Result<()> {
        self.access.ensure_owner(caller)?;
        if invitee.is_zero() || referrer.is_zero() {
            return Err(DcuError::InvalidAddress);
        }
        if invitee == referrer {
            return Err(DcuError::SelfReferral);
        }
        {
            let mut state = self.state.write();
            let record = state.user_mut(invitee);
            if record.referrer.is_some() {
                return Err(DcuError::ReferralAlreadyRegistered(*invitee));
            }
            record.referrer = Some(*referrer);
        }

        self.events.emit(
            self.address,
            Event::ReferralRegistered { invitee: *invitee, referrer: *referrer },
        );
        Ok(())
    }

    /// Mint `amount` of the caller's accrued balance to the caller
    pub fn claim_rewards(&self, caller: &Address, amount: Amount) -> Result<()> {
        if amount == 0 {
            return Err(DcuError::InvalidAmount);
        }
        let _lock = self.guard.enter()?;

        {
            let mut state = self.state.write();
            let available = state.user(caller).balance;
            if available < amount {
                return Err(DcuError::InsufficientBalance { available, required: amount });
            }
            let record = state.user_mut(caller);
            record.balance -= amount;
            record.total_claimed += amount;
        }

        let token = self.token.read().clone();
        if let Err(err) = token.mint(&self.address, caller, amount) {
            let mut state = self.state.write();
            let record = state.user_mut(caller);
            record.balance += amount;
            record.total_claimed -= amount;
            tracing::warn!(user = %caller, amount, error = %err, "reward claim reverted");
            return Err(err);
        }

        let timestamp = self.clock.now();
        tracing::info!(user = %caller, amount, "rewards claimed");
        self.events.emit(
            self.address,
            Event::RewardsClaimed { user: *caller, amount, timestamp },
        );
        Ok(())
    }

    // === Administration ===

    /// Replace all reward amounts (owner-only), each capped at `MAX_REWARD_AMOUNT`
    pub fn update_reward_amounts(&self, caller: &Address, amounts: RewardAmounts) -> Result<()> {
        self.access.ensure_owner(caller)?;
        amounts.validate()?;
        self.state.write().amounts = amounts;

        tracing::info!(?amounts, "reward amounts updated");
        self.events.emit(
            self.address,
            Event::RewardAmountsUpdated {
                impact_product_claim: amounts.impact_product_claim,
                streak: amounts.streak,
                referral: amounts.referral,
            },
        );
        Ok(())
    }

    /// Designate the NFT contract allowed to report mints and level claims (owner-only)
    pub fn set_nft_contract(&self, caller: &Address, nft: &Address) -> Result<()> {
        self.access.ensure_owner(caller)?;
        if nft.is_zero() {
            return Err(DcuError::InvalidAddress);
        }
        let previous = self.state.write().nft_contract.replace(*nft);
        if let Some(previous) = previous {
            self.access.revoke_role(caller, Role::NftContract, previous)?;
        }
        self.access.grant_role(caller, Role::NftContract, *nft)?;
        self.events.emit(self.address, Event::NftContractUpdated { nft: *nft });
        Ok(())
    }

    /// Swap the token used for minting claims (owner-only)
    pub fn set_token(&self, caller: &Address, token: SharedToken) -> Result<()> {
        self.access.ensure_owner(caller)?;
        if token.address().is_zero() {
            return Err(DcuError::InvalidAddress);
        }
        *self.token.write() = token;
        Ok(())
    }

    // === Views ===

    pub fn verification_status(&self, user: &Address) -> EligibilityStatus {
        let record = self.state.read().user(user);
        EligibilityStatus {
            poi_verified: record.poi_verified,
            nft_minted: record.nft_minted,
            reward_eligible: record.poi_verified && record.nft_minted,
        }
    }

    pub fn is_poi_verified(&self, user: &Address) -> bool {
        self.state.read().user(user).poi_verified
    }

    pub fn last_poi_timestamp(&self, user: &Address) -> Option<Timestamp> {
        self.state.read().user(user).last_poi_timestamp
    }

    /// Streak days granted by the most recent verification, 0 after a reset
    pub fn streak_days(&self, user: &Address) -> u64 {
        self.state.read().user(user).streak_days
    }

    /// Unclaimed reward balance
    pub fn balance_of(&self, user: &Address) -> Amount {
        self.state.read().user(user).balance
    }

    pub fn reward_breakdown(&self, user: &Address) -> RewardBreakdown {
        let record = self.state.read().user(user);
        RewardBreakdown {
            claim_rewards: record.claim_rewards,
            streak_rewards: record.streak_rewards,
            referral_rewards: record.referral_rewards,
            current_balance: record.balance,
            total_claimed: record.total_claimed,
        }
    }

    /// Balance plus everything already claimed
    pub fn total_earned(&self, user: &Address) -> Amount {
        let record = self.state.read().user(user);
        record.balance.saturating_add(record.total_claimed)
    }

    pub fn has_claimed_level(&self, user: &Address, level: u8) -> bool {
        self.state.read().user(user).claimed_levels.contains(&level)
    }

    pub fn claimed_levels(&self, user: &Address) -> Vec<u8> {
        self.state.read().user(user).claimed_levels.into_iter().collect()
    }

    pub fn referrer_of(&self, invitee: &Address) -> Option<Address> {
        self.state.read().user(invitee).referrer
    }

    pub fn is_referral_rewarded(&self, referrer: &Address, invitee: &Address) -> bool {
        self.state.read().referral_rewarded.contains(&(*referrer, *invitee))
    }

    pub fn reward_amounts(&self) -> RewardAmounts {
        self.state.read().amounts
    }

    pub fn nft_contract(&self) -> Option<Address> {
        self.state.read().nft_contract
    }
}

impl ImpactRewards for RewardManager {
    fn address(&self) -> Address {
        self.address
    }

    fn check_level_claim(&self, user: &Address, level: u8) -> Result<()> {
        RewardManager::check_level_claim(self, user, level)
    }

    fn reward_nft_mint(&self, caller: &Address, user: &Address) -> Result<()> {
        RewardManager::reward_nft_mint(self, caller, user)
    }

    fn record_nft_transfer(&self, caller: &Address, from: &Address, to: &Address) -> Result<()> {
        RewardManager::record_nft_transfer(self, caller, from, to)
    }

    fn reward_impact_product_claim(&self, caller: &Address, user: &Address, level: u8) -> Result<()> {
        RewardManager::reward_impact_product_claim(self, caller, user, level)
    }
}
