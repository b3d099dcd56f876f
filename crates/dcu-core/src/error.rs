//! Error types for DeCleanup Network contract operations
//!
//! Every failure aborts the current operation with no state change left
//! behind. Variants carry the values a caller needs to react (the required
//! minimum, the remaining lock time), never a free-form message.

use crate::access::Role;
use crate::types::{Address, Amount, Timestamp};
use thiserror::Error;

/// Result type alias for contract operations
pub type Result<T> = std::result::Result<T, DcuError>;

/// Broad failure class
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller input is malformed (zero amount, zero address, out of range)
    Validation,
    /// Operation is invalid for the current recorded state
    State,
    /// Caller lacks the capability for the operation
    Authorization,
    /// Operation is valid but not yet; retry after the reported time
    Timing,
    /// A collaborator contract rejected the call
    External,
}

/// Errors raised by DeCleanup Network contracts
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DcuError {
    // === Validation ===
    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Zero address is not allowed")]
    InvalidAddress,

    #[error("Invalid level {level}: must be between 1 and {max}")]
    InvalidLevel { level: u8, max: u8 },

    #[error("Reward amount {amount} exceeds maximum {max}")]
    RewardAmountTooHigh { amount: Amount, max: Amount },

    #[error("Invalid PoI id: {0}")]
    InvalidPoiId(u64),

    #[error("Pending is not a valid verification decision")]
    InvalidStatus,

    #[error("Account cannot refer itself")]
    SelfReferral,

    #[error("Lock duration must be greater than zero")]
    InvalidDuration,

    #[error("Submission data URI must not be empty")]
    EmptyDataUri,

    #[error("Arithmetic overflow")]
    Overflow,

    // === Balances ===
    #[error("Insufficient balance: have {available}, need {required}")]
    InsufficientBalance { available: Amount, required: Amount },

    #[error("Insufficient claimable balance: have {available}, need {required}")]
    InsufficientClaimableBalance { available: Amount, required: Amount },

    #[error("Insufficient staked balance: have {available}, need {required}")]
    InsufficientStakedBalance { available: Amount, required: Amount },

    #[error("Insufficient allowance: have {available}, need {required}")]
    InsufficientAllowance { available: Amount, required: Amount },

    #[error("No locked tokens")]
    NoLockedTokens,

    // === Staking ===
    #[error("Stake {provided} below minimum {required}")]
    InsufficientStakeAmount { provided: Amount, required: Amount },

    #[error("Account already has an active stake")]
    StakeAlreadyExists,

    #[error("No active stake")]
    NoActiveStake,

    // === Verifiers ===
    #[error("Already a verifier: {0}")]
    AlreadyVerifier(Address),

    #[error("Not a verifier: {0}")]
    NotVerifier(Address),

    #[error("Verifier {verifier} already verified PoI {poi_id}")]
    AlreadyVerified { poi_id: u64, verifier: Address },

    // === Rewards ===
    #[error("Level {level} already claimed")]
    LevelAlreadyClaimed { level: u8 },

    #[error("Referral already registered for {0}")]
    ReferralAlreadyRegistered(Address),

    // === NFT ===
    #[error("Account already holds an NFT: {0}")]
    NftAlreadyMinted(Address),

    #[error("NFT {0} does not exist")]
    NftNotFound(u64),

    #[error("NFT {token_id} is already at max level {max}")]
    MaxLevelReached { token_id: u64, max: u8 },

    // === Submissions ===
    #[error("Submission {0} not found")]
    SubmissionNotFound(u64),

    #[error("Submission {0} already approved")]
    AlreadyApproved(u64),

    #[error("Submission {0} already rejected")]
    AlreadyRejected(u64),

    // === Authorization ===
    #[error("{0} is not the owner")]
    NotOwner(Address),

    #[error("{account} lacks role {role:?}")]
    MissingRole { account: Address, role: Role },

    #[error("{0} is not an authorized verifier")]
    NotAuthorizedVerifier(Address),

    #[error("Transfers are locked until TGE: {0} is not whitelisted")]
    TgeNotCompleted(Address),

    #[error("PoI not verified for {0}")]
    PoiNotVerified(Address),

    #[error("No NFT minted for {0}")]
    NftNotMinted(Address),

    #[error("{account} does not own NFT {token_id}")]
    NotTokenOwner { account: Address, token_id: u64 },

    #[error("NFT {0} is soulbound and the transfer was not authorized")]
    NonTransferable(u64),

    #[error("Reentrant call")]
    ReentrantCall,

    // === Timing ===
    #[error("Unstaking locked for another {remaining}s")]
    UnstakingLocked { remaining: u64 },

    #[error("Tokens locked until {release_time} (now {now})")]
    TokensStillLocked { release_time: Timestamp, now: Timestamp },

    // === External ===
    #[error("Token call rejected: {0}")]
    TokenRejected(String),
}

impl DcuError {
    /// Classify the failure
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidAmount
            | Self::InvalidAddress
            | Self::InvalidLevel { .. }
            | Self::RewardAmountTooHigh { .. }
            | Self::InvalidPoiId(_)
            | Self::InvalidStatus
            | Self::SelfReferral
            | Self::InvalidDuration
            | Self::EmptyDataUri
            | Self::Overflow => ErrorKind::Validation,

            Self::NotOwner(_)
            | Self::MissingRole { .. }
            | Self::NotAuthorizedVerifier(_)
            | Self::TgeNotCompleted(_)
            | Self::PoiNotVerified(_)
            | Self::NftNotMinted(_)
            | Self::NotTokenOwner { .. }
            | Self::NonTransferable(_) => ErrorKind::Authorization,

            Self::UnstakingLocked { .. } | Self::TokensStillLocked { .. } => ErrorKind::Timing,

            Self::TokenRejected(_) => ErrorKind::External,

            _ => ErrorKind::State,
        }
    }

    /// Stable numeric code for receipts and the CLI
    pub fn code(&self) -> u32 {
        match self.kind() {
            ErrorKind::Validation => 1000,
            ErrorKind::State => 2000,
            ErrorKind::Authorization => 3000,
            ErrorKind::Timing => 4000,
            ErrorKind::External => 5000,
        }
    }

    /// Timing failures succeed if retried after the reported time
    pub fn is_recoverable(&self) -> bool {
        self.kind() == ErrorKind::Timing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(DcuError::InvalidAmount.kind(), ErrorKind::Validation);
        assert_eq!(DcuError::NoActiveStake.kind(), ErrorKind::State);
        assert_eq!(
            DcuError::TgeNotCompleted(Address::ZERO).kind(),
            ErrorKind::Authorization
        );
        assert_eq!(DcuError::UnstakingLocked { remaining: 5 }.code(), 4000);
    }

    #[test]
    fn test_recoverable_errors() {
        assert!(DcuError::UnstakingLocked { remaining: 10 }.is_recoverable());
        assert!(!DcuError::LevelAlreadyClaimed { level: 1 }.is_recoverable());
    }

    #[test]
    fn test_error_display() {
        let err = DcuError::InsufficientStakeAmount { provided: 1, required: 2 };
        assert!(err.to_string().contains("below minimum"));
    }
}
