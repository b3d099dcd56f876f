//! # DCU Economics - DeCleanup Network Contracts
//!
//! The reward, accounting and verification engine of the DeCleanup Network,
//! modeled as in-process contracts sharing one token, one block clock and
//! one event log.
//!
//! ## Data Flow
//!
//! ```text
//! ┌────────────────┐   stake    ┌──────────────────┐  is_verifier  ┌────────────────────┐
//! │ VerifierStaking│──────────► │ VerifierRegistry │◄───────────── │ PoiVerificationMgr │
//! └────────────────┘            └──────────────────┘               └─────────┬──────────┘
//!                                                                            │ approved
//!                                                                   oracle   ▼
//! ┌────────────────┐  mint/upgrade  ┌───────────────┐  claim   ┌──────────────────────┐
//! │     DipNft     │──────────────► │ RewardManager │────────► │ DcuToken (mint)      │
//! └────────────────┘                └───────────────┘          └──────────────────────┘
//! ┌────────────────────┐  approve   ┌───────────────┐  claim   ┌──────────────────────┐
//! │ SubmissionRegistry │──────────► │ DcuAccounting │────────► │ DcuToken (mint)      │
//! └────────────────────┘            └───────────────┘          └──────────────────────┘
//! ```
//!
//! ## Default Parameters
//!
//! | Parameter | Value |
//! |-----------|-------|
//! | Impact product claim reward | 10 DCU |
//! | Referral reward | 1 DCU |
//! | Streak reward | 3 DCU |
//! | Streak window | 7 days (inclusive) |
//! | Reward cap | 1000 DCU |
//! | Minimum verifier stake | 1000 DCU |
//! | Unstaking delay | 7 days |
//! | NFT levels | 1..=10 |

pub mod accounting;
pub mod nft;
pub mod poi_verification;
pub mod reward_manager;
pub mod submission;
pub mod verifier_registry;
pub mod verifier_staking;

// Re-exports
pub use accounting::{AccountBalance, DcuAccounting, TgeGate};
pub use nft::{impact_for_level, DipNft, NftData};
pub use poi_verification::{PoiVerification, PoiVerificationManager};
pub use reward_manager::{
    EligibilityStatus, ImpactRewards, RewardAmounts, RewardBreakdown, RewardManager, StreakOutcome,
};
pub use submission::{Submission, SubmissionRegistry, SubmissionStatus};
pub use verifier_registry::{VerifierDirectory, VerifierRegistry};
pub use verifier_staking::{StakeOracle, StakingParams, VerifierStake, VerifierStaking};

/// Protocol constants
pub mod constants {
    use dcu_core::{dcu, Amount, SECONDS_PER_DAY};

    /// Token symbol
    pub const SYMBOL: &str = "DCU";

    /// Highest impact NFT level
    pub const MAX_LEVEL: u8 = 10;

    /// Impact points per NFT level
    pub const IMPACT_PER_LEVEL: u64 = 10;

    /// Upper bound for any configurable reward amount
    pub const MAX_REWARD_AMOUNT: Amount = dcu(1_000);

    pub const DEFAULT_IMPACT_PRODUCT_CLAIM_REWARD: Amount = dcu(10);

    pub const DEFAULT_REFERRAL_REWARD: Amount = dcu(1);

    pub const DEFAULT_STREAK_REWARD: Amount = dcu(3);

    /// Submission approval reward
    pub const DEFAULT_SUBMISSION_REWARD: Amount = dcu(10);

    /// Re-verification within this many seconds continues a streak
    pub const STREAK_WINDOW_SECS: u64 = 7 * SECONDS_PER_DAY;

    /// Minimum verifier stake: 1,000 DCU
    pub const MINIMUM_STAKE: Amount = dcu(1_000);

    /// Stake withdrawal delay: 7 days
    pub const UNSTAKING_DELAY_SECS: u64 = 7 * SECONDS_PER_DAY;
}

pub use constants::*;

#[cfg(test)]
mod tests {
    use super::*;
    use dcu_core::ONE_DCU;

    #[test]
    fn test_reward_defaults_under_cap() {
        assert!(RewardAmounts::default().validate().is_ok());
        assert!(DEFAULT_SUBMISSION_REWARD <= MAX_REWARD_AMOUNT);
    }

    #[test]
    fn test_minimum_stake() {
        assert_eq!(MINIMUM_STAKE, 1_000 * ONE_DCU);
        assert_eq!(UNSTAKING_DELAY_SECS, 604_800);
    }
}
