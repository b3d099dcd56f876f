//! # Network
//!
//! Wires every contract to one token, clock and event log, and executes
//! serialized transactions against them.
//!
//! ## Cross-contract roles
//!
//! | Contract | Role | Granted to |
//! |----------|------|------------|
//! | token | `Minter` | ledger, reward manager |
//! | reward manager | `Oracle` | oracle |
//! | reward manager | `NftContract` | NFT |
//! | NFT | `Admin` | oracle |
//! | ledger | `RewardManager` | submission registry |

use crate::account::{resolve_account, Account, DcuAmount};
use crate::config::NetworkConfig;
use crate::error::NodeResult;
use dcu_core::prelude::*;
use dcu_economics::{
    AccountBalance, DcuAccounting, DipNft, EligibilityStatus, NftData, PoiVerificationManager,
    RewardAmounts, RewardBreakdown, RewardManager, SubmissionRegistry, VerifierRegistry,
    VerifierStake, VerifierStaking,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Contract addressed by role-management transactions
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractId {
    Token,
    Ledger,
    Staking,
    Registry,
    Poi,
    Rewards,
    Nft,
    Submissions,
}

/// Every user and admin entry point of the network
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Transaction {
    // Token
    Mint { to: Account, amount: DcuAmount },
    Transfer { to: Account, amount: DcuAmount },
    Approve { spender: ContractId, amount: DcuAmount },

    // Access
    GrantRole { contract: ContractId, role: Role, account: Account },
    RevokeRole { contract: ContractId, role: Role, account: Account },

    // Ledger
    Deposit { amount: DcuAmount },
    Withdraw { amount: DcuAmount },
    InternalTransfer { to: Account, amount: DcuAmount },
    AddClaimableBalance { user: Account, amount: DcuAmount },
    ClaimTokens { amount: DcuAmount },
    LedgerStake { amount: DcuAmount },
    LedgerUnstake { amount: DcuAmount },
    LockTokens { amount: DcuAmount, duration: u64 },
    UnlockTokens,
    SetTgeStatus { completed: bool },
    AddToWhitelist { account: Account },
    RemoveFromWhitelist { account: Account },

    // Verifier staking / registry
    StakeVerifier { amount: DcuAmount },
    IncreaseStake { amount: DcuAmount },
    UnstakeVerifier,
    AddVerifier { verifier: Account },
    RemoveVerifier { verifier: Account },

    // PoI verification
    SubmitVerification {
        poi_id: u64,
        status: VerificationStatus,
        #[serde(default)]
        reason: String,
    },
    SyncPoi { poi_id: u64, user: Account },

    // Rewards
    SetPoiVerificationStatus { user: Account, verified: bool },
    RewardImpactProductClaim { user: Account, level: u8 },
    RegisterReferral { invitee: Account, referrer: Account },
    ClaimRewards { amount: DcuAmount },
    UpdateRewardAmounts {
        impact_product_claim: DcuAmount,
        streak: DcuAmount,
        referral: DcuAmount,
    },

    // Impact NFT
    VerifyPoi { user: Account },
    RevokePoi { user: Account },
    SafeMint,
    UpgradeNft { token_id: u64 },
    AuthorizeTransfer { token_id: u64, to: Account },
    TransferNft { from: Account, to: Account, token_id: u64 },

    // Submissions
    CreateSubmission { data_uri: String },
    ApproveSubmission { id: u64 },
    RejectSubmission { id: u64 },
    SetDefaultReward { amount: DcuAmount },
}

impl Transaction {
    /// Variant name as written in scripts
    pub fn name(&self) -> &'static str {
        match self {
            Self::Mint { .. } => "mint",
            Self::Transfer { .. } => "transfer",
            Self::Approve { .. } => "approve",
            Self::GrantRole { .. } => "grant_role",
            Self::RevokeRole { .. } => "revoke_role",
            Self::Deposit { .. } => "deposit",
            Self::Withdraw { .. } => "withdraw",
            Self::InternalTransfer { .. } => "internal_transfer",
            Self::AddClaimableBalance { .. } => "add_claimable_balance",
            Self::ClaimTokens { .. } => "claim_tokens",
            Self::LedgerStake { .. } => "ledger_stake",
            Self::LedgerUnstake { .. } => "ledger_unstake",
            Self::LockTokens { .. } => "lock_tokens",
            Self::UnlockTokens => "unlock_tokens",
            Self::SetTgeStatus { .. } => "set_tge_status",
            Self::AddToWhitelist { .. } => "add_to_whitelist",
            Self::RemoveFromWhitelist { .. } => "remove_from_whitelist",
            Self::StakeVerifier { .. } => "stake_verifier",
            Self::IncreaseStake { .. } => "increase_stake",
            Self::UnstakeVerifier => "unstake_verifier",
            Self::AddVerifier { .. } => "add_verifier",
            Self::RemoveVerifier { .. } => "remove_verifier",
            Self::SubmitVerification { .. } => "submit_verification",
            Self::SyncPoi { .. } => "sync_poi",
            Self::SetPoiVerificationStatus { .. } => "set_poi_verification_status",
            Self::RewardImpactProductClaim { .. } => "reward_impact_product_claim",
            Self::RegisterReferral { .. } => "register_referral",
            Self::ClaimRewards { .. } => "claim_rewards",
            Self::UpdateRewardAmounts { .. } => "update_reward_amounts",
            Self::VerifyPoi { .. } => "verify_poi",
            Self::RevokePoi { .. } => "revoke_poi",
            Self::SafeMint => "safe_mint",
            Self::UpgradeNft { .. } => "upgrade_nft",
            Self::AuthorizeTransfer { .. } => "authorize_transfer",
            Self::TransferNft { .. } => "transfer_nft",
            Self::CreateSubmission { .. } => "create_submission",
            Self::ApproveSubmission { .. } => "approve_submission",
            Self::RejectSubmission { .. } => "reject_submission",
            Self::SetDefaultReward { .. } => "set_default_reward",
        }
    }
}

/// Value returned by a successful transaction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum TxOutput {
    None,
    TokenId(u64),
    Level(u8),
    SubmissionId(u64),
    Amount(String),
    Approved(bool),
}

/// Failure reported in a receipt
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxFailure {
    pub code: u32,
    pub message: String,
}

/// Result of applying one transaction
#[derive(Clone, Debug, Serialize)]
pub struct Receipt {
    pub sender: Address,
    pub action: &'static str,
    pub block_time: Timestamp,
    pub success: bool,
    pub output: Option<TxOutput>,
    pub error: Option<TxFailure>,
    /// Events emitted by this transaction, empty on failure
    pub events: Vec<EventRecord>,
}

/// Combined view of one account across contracts
#[derive(Clone, Debug, Serialize)]
pub struct AccountSummary {
    pub address: Address,
    pub token_balance: Amount,
    pub ledger: AccountBalance,
    pub rewards: RewardBreakdown,
    pub eligibility: EligibilityStatus,
    pub claimed_levels: Vec<u8>,
    pub nft: Option<NftData>,
    pub verifier_stake: VerifierStake,
}

/// All contracts of one deployment
pub struct Network {
    config: NetworkConfig,
    clock: SharedClock,
    events: SharedEventLog,
    owner: Address,
    oracle: Address,
    token: Arc<DcuToken>,
    ledger: Arc<DcuAccounting>,
    staking: Arc<VerifierStaking>,
    registry: Arc<VerifierRegistry>,
    poi: Arc<PoiVerificationManager>,
    rewards: Arc<RewardManager>,
    nft: Arc<DipNft>,
    submissions: Arc<SubmissionRegistry>,
    /// (poi_id, user) approvals already bridged
    synced: RwLock<HashSet<(u64, Address)>>,
}

impl Network {
    /// Deploy and wire all contracts
    pub fn new(config: NetworkConfig, clock: SharedClock) -> NodeResult<Self> {
        config.validate()?;
        let owner = resolve_account(&config.network.owner)?;
        let oracle = resolve_account(&config.network.oracle)?;
        let events: SharedEventLog = Arc::new(EventLog::new(clock.clone()));

        let token = Arc::new(DcuToken::new(Address::from_label("dcu-token"), owner, events.clone()));
        let ledger = Arc::new(DcuAccounting::new(
            Address::from_label("dcu-accounting"),
            owner,
            token.clone(),
            clock.clone(),
            events.clone(),
        ));
        let staking = Arc::new(VerifierStaking::with_params(
            Address::from_label("verifier-staking"),
            owner,
            token.clone(),
            clock.clone(),
            events.clone(),
            config.staking.params(),
        ));
        let registry = Arc::new(VerifierRegistry::new(
            Address::from_label("verifier-registry"),
            owner,
            staking.clone(),
            events.clone(),
        ));
        let poi = Arc::new(PoiVerificationManager::new(
            Address::from_label("poi-verification"),
            owner,
            registry.clone(),
            clock.clone(),
            events.clone(),
        ));
        let rewards = Arc::new(
            RewardManager::new(
                Address::from_label("reward-manager"),
                owner,
                token.clone(),
                clock.clone(),
                events.clone(),
            )
            .with_streak_window(config.streak.window_secs),
        );
        let nft = Arc::new(DipNft::new(
            Address::from_label("dip-nft"),
            owner,
            rewards.clone(),
            events.clone(),
        ));
        let submissions = Arc::new(SubmissionRegistry::new(
            Address::from_label("submissions"),
            owner,
            ledger.clone(),
            clock.clone(),
            events.clone(),
        ));

        token.access().grant_role(&owner, Role::Minter, ledger.address())?;
        token.access().grant_role(&owner, Role::Minter, rewards.address())?;
        rewards.access().grant_role(&owner, Role::Oracle, oracle)?;
        rewards.set_nft_contract(&owner, &nft.address())?;
        nft.access().grant_role(&owner, Role::Admin, oracle)?;
        ledger.access().grant_role(&owner, Role::RewardManager, submissions.address())?;

        rewards.update_reward_amounts(&owner, config.rewards.amounts())?;
        submissions.set_default_reward(&owner, dcu(config.submission.default_reward))?;
        if config.accounting.tge_completed {
            ledger.set_tge_status(&owner, true)?;
        }
        for label in &config.accounting.whitelist {
            ledger.add_to_whitelist(&owner, &resolve_account(label)?)?;
        }

        tracing::info!(
            network = %config.network.name,
            owner = %owner,
            oracle = %oracle,
            "network deployed"
        );

        Ok(Self {
            config,
            clock,
            events,
            owner,
            oracle,
            token,
            ledger,
            staking,
            registry,
            poi,
            rewards,
            nft,
            submissions,
            synced: RwLock::new(HashSet::new()),
        })
    }

    /// Execute `tx` as `sender` and report what happened
    pub fn apply(&self, sender: &Address, tx: Transaction) -> Receipt {
        let action = tx.name();
        let start = self.events.len();
        let block_time = self.clock.now();

        match self.execute(sender, tx) {
            Ok(output) => {
                tracing::debug!(sender = %sender, action, "transaction applied");
                Receipt {
                    sender: *sender,
                    action,
                    block_time,
                    success: true,
                    output: Some(output),
                    error: None,
                    events: self.events.since(start),
                }
            }
            Err(err) => {
                tracing::warn!(sender = %sender, action, error = %err, "transaction reverted");
                Receipt {
                    sender: *sender,
                    action,
                    block_time,
                    success: false,
                    output: None,
                    error: Some(TxFailure { code: err.code(), message: err.to_string() }),
                    events: Vec::new(),
                }
            }
        }
    }

    fn execute(&self, sender: &Address, tx: Transaction) -> Result<TxOutput> {
        use Transaction as Tx;

        let done = |()| TxOutput::None;
        match tx {
            Tx::Mint { to, amount } => self.token.mint(sender, &to.0, amount.0).map(done),
            Tx::Transfer { to, amount } => self.token.transfer(sender, &to.0, amount.0).map(done),
            Tx::Approve { spender, amount } => self
                .token
                .approve(sender, &self.contract_address(spender), amount.0)
                .map(done),

            Tx::GrantRole { contract, role, account } => {
                self.access_of(contract).grant_role(sender, role, account.0).map(done)
            }
            Tx::RevokeRole { contract, role, account } => {
                self.access_of(contract).revoke_role(sender, role, account.0).map(done)
            }

            Tx::Deposit { amount } => self.ledger.deposit(sender, amount.0).map(done),
            Tx::Withdraw { amount } => self.ledger.withdraw(sender, amount.0).map(done),
            Tx::InternalTransfer { to, amount } => {
                self.ledger.internal_transfer(sender, &to.0, amount.0).map(done)
            }
            Tx::AddClaimableBalance { user, amount } => {
                self.ledger.add_claimable_balance(sender, &user.0, amount.0).map(done)
            }
            Tx::ClaimTokens { amount } => self.ledger.claim_tokens(sender, amount.0).map(done),
            Tx::LedgerStake { amount } => self.ledger.stake(sender, amount.0).map(done),
            Tx::LedgerUnstake { amount } => self.ledger.unstake(sender, amount.0).map(done),
            Tx::LockTokens { amount, duration } => {
                self.ledger.lock_tokens(sender, amount.0, duration).map(done)
            }
            Tx::UnlockTokens => self
                .ledger
                .unlock_tokens(sender)
                .map(|amount| TxOutput::Amount(format_dcu(amount))),
            Tx::SetTgeStatus { completed } => self.ledger.set_tge_status(sender, completed).map(done),
            Tx::AddToWhitelist { account } => self.ledger.add_to_whitelist(sender, &account.0).map(done),
            Tx::RemoveFromWhitelist { account } => {
                self.ledger.remove_from_whitelist(sender, &account.0).map(done)
            }

            Tx::StakeVerifier { amount } => self.staking.stake(sender, amount.0).map(done),
            Tx::IncreaseStake { amount } => self.staking.increase_stake(sender, amount.0).map(done),
            Tx::UnstakeVerifier => self
                .staking
                .unstake(sender)
                .map(|amount| TxOutput::Amount(format_dcu(amount))),
            Tx::AddVerifier { verifier } => self.registry.add_verifier(sender, &verifier.0).map(done),
            Tx::RemoveVerifier { verifier } => {
                self.registry.remove_verifier(sender, &verifier.0).map(done)
            }

            Tx::SubmitVerification { poi_id, status, reason } => self
                .poi
                .submit_verification(sender, poi_id, status, reason)
                .map(done),
            Tx::SyncPoi { poi_id, user } => self.sync_poi_as(sender, poi_id, &user.0).map(TxOutput::Approved),

            Tx::SetPoiVerificationStatus { user, verified } => self
                .rewards
                .set_poi_verification_status(sender, &user.0, verified)
                .map(|_| TxOutput::None),
            Tx::RewardImpactProductClaim { user, level } => self
                .rewards
                .reward_impact_product_claim(sender, &user.0, level)
                .map(done),
            Tx::RegisterReferral { invitee, referrer } => self
                .rewards
                .register_referral(sender, &invitee.0, &referrer.0)
                .map(done),
            Tx::ClaimRewards { amount } => self.rewards.claim_rewards(sender, amount.0).map(done),
            Tx::UpdateRewardAmounts { impact_product_claim, streak, referral } => self
                .rewards
                .update_reward_amounts(
                    sender,
                    RewardAmounts {
                        impact_product_claim: impact_product_claim.0,
                        streak: streak.0,
                        referral: referral.0,
                    },
                )
                .map(done),

            Tx::VerifyPoi { user } => self.nft.verify_poi(sender, &user.0).map(done),
            Tx::RevokePoi { user } => self.nft.revoke_poi(sender, &user.0).map(done),
            Tx::SafeMint => self.nft.safe_mint(sender).map(TxOutput::TokenId),
            Tx::UpgradeNft { token_id } => self.nft.upgrade_nft(sender, token_id).map(TxOutput::Level),
            Tx::AuthorizeTransfer { token_id, to } => {
                self.nft.authorize_transfer(sender, token_id, &to.0).map(done)
            }
            Tx::TransferNft { from, to, token_id } => {
                self.nft.transfer_from(sender, &from.0, &to.0, token_id).map(done)
            }

            Tx::CreateSubmission { data_uri } => self
                .submissions
                .create_submission(sender, data_uri)
                .map(TxOutput::SubmissionId),
            Tx::ApproveSubmission { id } => self
                .submissions
                .approve_submission(sender, id)
                .map(|reward| TxOutput::Amount(format_dcu(reward))),
            Tx::RejectSubmission { id } => self.submissions.reject_submission(sender, id).map(done),
            Tx::SetDefaultReward { amount } => {
                self.submissions.set_default_reward(sender, amount.0).map(done)
            }
        }
    }

    /// Oracle bridge from the PoI log to the reward manager and NFT.
    ///
    /// Returns whether `poi_id` is approved; only then is `user` marked
    /// verified in both contracts. Each approval is one verification event,
    /// so syncing the same `(poi_id, user)` again changes nothing.
    pub fn sync_poi(&self, poi_id: u64, user: &Address) -> Result<bool> {
        self.sync_poi_as(&self.oracle, poi_id, user)
    }

    fn sync_poi_as(&self, caller: &Address, poi_id: u64, user: &Address) -> Result<bool> {
        if poi_id == 0 {
            return Err(DcuError::InvalidPoiId(poi_id));
        }
        if !self.poi.is_poi_approved(poi_id) {
            tracing::debug!(poi_id, user = %user, "PoI not approved yet");
            return Ok(false);
        }
        self.rewards.access().ensure_owner_or_role(caller, Role::Oracle)?;
        self.nft.access().ensure_owner_or_role(caller, Role::Admin)?;
        if self.synced.read().contains(&(poi_id, *user)) {
            tracing::debug!(poi_id, user = %user, "PoI approval already synced");
            return Ok(true);
        }

        self.rewards.set_poi_verification_status(caller, user, true)?;
        self.nft.verify_poi(caller, user)?;
        self.synced.write().insert((poi_id, *user));
        tracing::info!(poi_id, user = %user, "PoI approval synced");
        Ok(true)
    }

    fn contract_address(&self, contract: ContractId) -> Address {
        match contract {
            ContractId::Token => self.token.address(),
            ContractId::Ledger => self.ledger.address(),
            ContractId::Staking => self.staking.address(),
            ContractId::Registry => self.registry.address(),
            ContractId::Poi => self.poi.address(),
            ContractId::Rewards => self.rewards.address(),
            ContractId::Nft => self.nft.address(),
            ContractId::Submissions => self.submissions.address(),
        }
    }

    fn access_of(&self, contract: ContractId) -> &AccessControl {
        match contract {
            ContractId::Token => self.token.access(),
            ContractId::Ledger => self.ledger.access(),
            ContractId::Staking => self.staking.access(),
            ContractId::Registry => self.registry.access(),
            ContractId::Poi => self.poi.access(),
            ContractId::Rewards => self.rewards.access(),
            ContractId::Nft => self.nft.access(),
            ContractId::Submissions => self.submissions.access(),
        }
    }

    // === Views ===

    pub fn summary(&self, account: &Address) -> AccountSummary {
        AccountSummary {
            address: *account,
            token_balance: self.token.balance_of(account),
            ledger: self.ledger.balance(account),
            rewards: self.rewards.reward_breakdown(account),
            eligibility: self.rewards.verification_status(account),
            claimed_levels: self.rewards.claimed_levels(account),
            nft: self.nft.get_user_nft_data(account).ok(),
            verifier_stake: self.staking.stake_info(account),
        }
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn oracle(&self) -> Address {
        self.oracle
    }

    pub fn events(&self) -> &SharedEventLog {
        &self.events
    }

    pub fn token(&self) -> &Arc<DcuToken> {
        &self.token
    }

    pub fn ledger(&self) -> &Arc<DcuAccounting> {
        &self.ledger
    }

    pub fn staking(&self) -> &Arc<VerifierStaking> {
        &self.staking
    }

    pub fn registry(&self) -> &Arc<VerifierRegistry> {
        &self.registry
    }

    pub fn poi(&self) -> &Arc<PoiVerificationManager> {
        &self.poi
    }

    pub fn rewards(&self) -> &Arc<RewardManager> {
        &self.rewards
    }

    pub fn nft(&self) -> &Arc<DipNft> {
        &self.nft
    }

    pub fn submissions(&self) -> &Arc<SubmissionRegistry> {
        &self.submissions
    }
}
