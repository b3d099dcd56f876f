//! Contract events
//!
//! Events are the only output consumed by off-chain indexers, so names and
//! field order are part of the external interface. Contracts append to a
//! shared [`EventLog`]; an operation that fails emits nothing.

use crate::access::Role;
use crate::clock::SharedClock;
use crate::types::{Address, Amount, Timestamp, VerificationStatus};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;

/// All events emitted by the network's contracts
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "PascalCase")]
pub enum Event {
    // Token
    Transfer { from: Address, to: Address, amount: Amount },
    Approval { owner: Address, spender: Address, amount: Amount },

    // Access control
    RoleGranted { role: Role, account: Address },
    RoleRevoked { role: Role, account: Address },
    OwnershipTransferred { previous: Address, new_owner: Address },

    // Ledger accounting
    Deposited { user: Address, amount: Amount, new_balance: Amount },
    Withdrawn { user: Address, amount: Amount, new_balance: Amount },
    InternalTransfer { from: Address, to: Address, amount: Amount },
    ClaimableBalanceAdded { user: Address, amount: Amount, new_balance: Amount },
    TokensClaimed { user: Address, amount: Amount, new_balance: Amount },
    TokensStaked { user: Address, amount: Amount, new_balance: Amount },
    TokensUnstaked { user: Address, amount: Amount, new_balance: Amount },
    TokensLocked { user: Address, amount: Amount, release_time: Timestamp },
    TokensUnlocked { user: Address, amount: Amount },
    TgeStatusUpdated { completed: bool },
    WhitelistAdded { account: Address },
    WhitelistRemoved { account: Address },

    // Verifier staking
    VerifierRegistered { verifier: Address, amount: Amount },
    StakeIncreased { verifier: Address, added: Amount, new_amount: Amount },
    VerifierUnstaked { verifier: Address, amount: Amount },
    StakingTokenUpdated { token: Address },

    // Verifier registry
    VerifierAdded { verifier: Address },
    VerifierRemoved { verifier: Address },
    StakingContractUpdated { staking: Address },

    // PoI verification
    VerificationSubmitted {
        poi_id: u64,
        verifier: Address,
        status: VerificationStatus,
        timestamp: Timestamp,
        reason: String,
    },

    // Reward manager
    PoiVerificationUpdated { user: Address, verified: bool },
    NftMintRecorded { user: Address },
    NftTransferRecorded { from: Address, to: Address },
    ImpactProductClaimReward { user: Address, level: u8, amount: Amount, timestamp: Timestamp },
    StreakReward { user: Address, amount: Amount, streak_days: u64, timestamp: Timestamp },
    StreakReset { user: Address, elapsed_days: u64 },
    ReferralRegistered { invitee: Address, referrer: Address },
    ReferralReward { referrer: Address, invitee: Address, amount: Amount, timestamp: Timestamp },
    RewardsClaimed { user: Address, amount: Amount, timestamp: Timestamp },
    RewardAmountsUpdated { impact_product_claim: Amount, streak: Amount, referral: Amount },
    NftContractUpdated { nft: Address },

    // Soulbound NFT
    PoiVerified { user: Address },
    PoiRevoked { user: Address },
    NftMinted { to: Address, token_id: u64, level: u8 },
    NftUpgraded { owner: Address, token_id: u64, level: u8, impact: u64 },
    TransferAuthorized { token_id: u64, to: Address },
    NftTransferred { from: Address, to: Address, token_id: u64 },

    // Submissions
    SubmissionCreated { id: u64, submitter: Address, data_uri: String },
    SubmissionApproved { id: u64, submitter: Address, reward: Amount },
    SubmissionRejected { id: u64, submitter: Address },
    DefaultRewardUpdated { amount: Amount },
}

impl Event {
    /// Stable event name
    pub fn name(&self) -> &'static str {
        self.signature().split('(').next().unwrap_or_default()
    }

    /// Canonical `Name(type,...)` signature, field order as emitted
    pub fn signature(&self) -> &'static str {
        match self {
            Self::Transfer { .. } => "Transfer(address,address,uint256)",
            Self::Approval { .. } => "Approval(address,address,uint256)",
            Self::RoleGranted { .. } => "RoleGranted(bytes32,address)",
            Self::RoleRevoked { .. } => "RoleRevoked(bytes32,address)",
            Self::OwnershipTransferred { .. } => "OwnershipTransferred(address,address)",
            Self::Deposited { .. } => "Deposited(address,uint256,uint256)",
            Self::Withdrawn { .. } => "Withdrawn(address,uint256,uint256)",
            Self::InternalTransfer { .. } => "InternalTransfer(address,address,uint256)",
            Self::ClaimableBalanceAdded { .. } => "ClaimableBalanceAdded(address,uint256,uint256)",
            Self::TokensClaimed { .. } => "TokensClaimed(address,uint256,uint256)",
            Self::TokensStaked { .. } => "TokensStaked(address,uint256,uint256)",
            Self::TokensUnstaked { .. } => "TokensUnstaked(address,uint256,uint256)",
            Self::TokensLocked { .. } => "TokensLocked(address,uint256,uint256)",
            Self::TokensUnlocked { .. } => "TokensUnlocked(address,uint256)",
            Self::TgeStatusUpdated { .. } => "TgeStatusUpdated(bool)",
            Self::WhitelistAdded { .. } => "WhitelistAdded(address)",
            Self::WhitelistRemoved { .. } => "WhitelistRemoved(address)",
            Self::VerifierRegistered { .. } => "VerifierRegistered(address,uint256)",
            Self::StakeIncreased { .. } => "StakeIncreased(address,uint256,uint256)",
            Self::VerifierUnstaked { .. } => "VerifierUnstaked(address,uint256)",
            Self::StakingTokenUpdated { .. } => "StakingTokenUpdated(address)",
            Self::VerifierAdded { .. } => "VerifierAdded(address)",
            Self::VerifierRemoved { .. } => "VerifierRemoved(address)",
            Self::StakingContractUpdated { .. } => "StakingContractUpdated(address)",
            Self::VerificationSubmitted { .. } => {
                "VerificationSubmitted(uint256,address,uint8,uint256,string)"
            }
            Self::PoiVerificationUpdated { .. } => "PoiVerificationUpdated(address,bool)",
            Self::NftMintRecorded { .. } => "NftMintRecorded(address)",
            Self::NftTransferRecorded { .. } => "NftTransferRecorded(address,address)",
            Self::ImpactProductClaimReward { .. } => {
                "ImpactProductClaimReward(address,uint8,uint256,uint256)"
            }
            Self::StreakReward { .. } => "StreakReward(address,uint256,uint256,uint256)",
            Self::StreakReset { .. } => "StreakReset(address,uint256)",
            Self::ReferralRegistered { .. } => "ReferralRegistered(address,address)",
            Self::ReferralReward { .. } => "ReferralReward(address,address,uint256,uint256)",
            Self::RewardsClaimed { .. } => "RewardsClaimed(address,uint256,uint256)",
            Self::RewardAmountsUpdated { .. } => "RewardAmountsUpdated(uint256,uint256,uint256)",
            Self::NftContractUpdated { .. } => "NftContractUpdated(address)",
            Self::PoiVerified { .. } => "PoiVerified(address)",
            Self::PoiRevoked { .. } => "PoiRevoked(address)",
            Self::NftMinted { .. } => "NftMinted(address,uint256,uint8)",
            Self::NftUpgraded { .. } => "NftUpgraded(address,uint256,uint8,uint256)",
            Self::TransferAuthorized { .. } => "TransferAuthorized(uint256,address)",
            Self::NftTransferred { .. } => "NftTransferred(address,address,uint256)",
            Self::SubmissionCreated { .. } => "SubmissionCreated(uint256,address,string)",
            Self::SubmissionApproved { .. } => "SubmissionApproved(uint256,address,uint256)",
            Self::SubmissionRejected { .. } => "SubmissionRejected(uint256,address)",
            Self::DefaultRewardUpdated { .. } => "DefaultRewardUpdated(uint256)",
        }
    }
}

/// An emitted event with its origin
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EventRecord {
    /// Sequence number within the log
    pub index: u64,
    /// Contract that emitted the event
    pub emitter: Address,
    /// Block time of emission
    pub block_time: Timestamp,
    pub event: Event,
}

/// Append-only event sink shared by all contracts of a network
pub struct EventLog {
    clock: SharedClock,
    records: RwLock<Vec<EventRecord>>,
}

impl EventLog {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            records: RwLock::new(Vec::new()),
        }
    }

    /// Append an event
    pub fn emit(&self, emitter: Address, event: Event) {
        tracing::debug!(emitter = %emitter, event = event.name(), "event emitted");
        let mut records = self.records.write();
        let index = records.len() as u64;
        records.push(EventRecord {
            index,
            emitter,
            block_time: self.clock.now(),
            event,
        });
    }

    /// Number of events recorded so far
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Events recorded from `start` onward
    pub fn since(&self, start: usize) -> Vec<EventRecord> {
        let records = self.records.read();
        records.get(start..).map(<[_]>::to_vec).unwrap_or_default()
    }

    /// All events
    pub fn all(&self) -> Vec<EventRecord> {
        self.records.read().clone()
    }

    /// Events with the given name
    pub fn named(&self, name: &str) -> Vec<Event> {
        self.records
            .read()
            .iter()
            .filter(|r| r.event.name() == name)
            .map(|r| r.event.clone())
            .collect()
    }
}

/// Shared event log handle
pub type SharedEventLog = Arc<EventLog>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn test_event_names_match_signatures() {
        let event = Event::StreakReward {
            user: Address::ZERO,
            amount: 1,
            streak_days: 3,
            timestamp: 0,
        };
        assert_eq!(event.name(), "StreakReward");
        assert!(event.signature().starts_with("StreakReward("));
    }

    #[test]
    fn test_log_stamps_block_time() {
        let clock = ManualClock::new(1_000);
        let log = EventLog::new(Arc::new(clock.clone()));
        let emitter = Address::from_label("ledger");

        log.emit(emitter, Event::TgeStatusUpdated { completed: true });
        clock.advance(5);
        log.emit(emitter, Event::WhitelistAdded { account: emitter });

        let all = log.all();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].block_time, 1_000);
        assert_eq!(all[1].block_time, 1_005);
        assert_eq!(all[1].index, 1);
        assert_eq!(log.since(1).len(), 1);
        assert_eq!(log.since(5).len(), 0);
        assert_eq!(log.named("WhitelistAdded").len(), 1);
    }

    #[test]
    fn test_event_json_tagged() {
        let event = Event::TgeStatusUpdated { completed: true };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"TgeStatusUpdated\""));
    }
}
