//! Network configuration types
//!
//! Loaded from an optional TOML file, then overridden by `DCU_*`
//! environment variables (`DCU_REWARDS__STREAK=5`).

use crate::error::{NodeError, NodeResult};
use dcu_core::{dcu, SECONDS_PER_DAY};
use dcu_economics::{constants, RewardAmounts, StakingParams};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete network configuration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Deployment identity
    #[serde(default)]
    pub network: NetworkSettings,

    /// Reward amounts, whole DCU
    #[serde(default)]
    pub rewards: RewardsConfig,

    /// Verifier staking parameters
    #[serde(default)]
    pub staking: StakingConfig,

    #[serde(default)]
    pub streak: StreakConfig,

    /// Ledger TGE gate
    #[serde(default)]
    pub accounting: AccountingConfig,

    #[serde(default)]
    pub submission: SubmissionConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl NetworkConfig {
    /// Load `path` (if any) layered with `DCU_*` environment variables
    pub fn load(path: Option<&Path>) -> NodeResult<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let config: NetworkConfig = builder
            .add_source(
                config::Environment::with_prefix("DCU")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document
    pub fn from_toml(content: &str) -> NodeResult<Self> {
        let config: NetworkConfig = config::Config::builder()
            .add_source(config::File::from_str(content, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> NodeResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject values the contracts would refuse
    pub fn validate(&self) -> NodeResult<()> {
        self.rewards.amounts().validate()?;
        if dcu(self.submission.default_reward) > constants::MAX_REWARD_AMOUNT {
            return Err(NodeError::InvalidConfig(format!(
                "submission.default_reward {} exceeds the reward cap",
                self.submission.default_reward
            )));
        }
        if self.staking.minimum_stake == 0 {
            return Err(NodeError::InvalidConfig("staking.minimum_stake must be positive".into()));
        }
        if self.streak.window_secs == 0 {
            return Err(NodeError::InvalidConfig("streak.window_secs must be positive".into()));
        }
        if self.network.owner.trim().is_empty() || self.network.oracle.trim().is_empty() {
            return Err(NodeError::InvalidConfig("network.owner and network.oracle are required".into()));
        }
        Ok(())
    }
}

/// Deployment identity
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSettings {
    #[serde(default = "default_network_name")]
    pub name: String,

    /// Owner of every contract (label or 0x address)
    #[serde(default = "default_owner")]
    pub owner: String,

    /// Account allowed to set PoI verification status
    #[serde(default = "default_oracle")]
    pub oracle: String,
}

fn default_network_name() -> String {
    "decleanup-local".to_string()
}

fn default_owner() -> String {
    "owner".to_string()
}

fn default_oracle() -> String {
    "oracle".to_string()
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            name: default_network_name(),
            owner: default_owner(),
            oracle: default_oracle(),
        }
    }
}

/// Reward amounts in whole DCU
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardsConfig {
    #[serde(default = "default_impact_product_claim")]
    pub impact_product_claim: u64,

    #[serde(default = "default_streak")]
    pub streak: u64,

    #[serde(default = "default_referral")]
    pub referral: u64,
}

fn default_impact_product_claim() -> u64 {
    10
}

fn default_streak() -> u64 {
    3
}

fn default_referral() -> u64 {
    1
}

impl RewardsConfig {
    pub fn amounts(&self) -> RewardAmounts {
        RewardAmounts {
            impact_product_claim: dcu(self.impact_product_claim),
            streak: dcu(self.streak),
            referral: dcu(self.referral),
        }
    }
}

impl Default for RewardsConfig {
    fn default() -> Self {
        Self {
            impact_product_claim: default_impact_product_claim(),
            streak: default_streak(),
            referral: default_referral(),
        }
    }
}

/// Verifier staking parameters
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakingConfig {
    /// Whole DCU
    #[serde(default = "default_minimum_stake")]
    pub minimum_stake: u64,

    #[serde(default = "default_unstaking_delay")]
    pub unstaking_delay_secs: u64,
}

fn default_minimum_stake() -> u64 {
    1_000
}

fn default_unstaking_delay() -> u64 {
    constants::UNSTAKING_DELAY_SECS
}

impl StakingConfig {
    pub fn params(&self) -> StakingParams {
        StakingParams {
            minimum_stake: dcu(self.minimum_stake),
            unstaking_delay: self.unstaking_delay_secs,
        }
    }
}

impl Default for StakingConfig {
    fn default() -> Self {
        Self {
            minimum_stake: default_minimum_stake(),
            unstaking_delay_secs: default_unstaking_delay(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakConfig {
    /// Inclusive upper bound between verifications
    #[serde(default = "default_streak_window")]
    pub window_secs: u64,
}

fn default_streak_window() -> u64 {
    7 * SECONDS_PER_DAY
}

impl Default for StreakConfig {
    fn default() -> Self {
        Self { window_secs: default_streak_window() }
    }
}

/// Ledger TGE gate
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountingConfig {
    #[serde(default)]
    pub tge_completed: bool,

    /// Accounts allowed to transfer before TGE
    #[serde(default)]
    pub whitelist: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionConfig {
    /// Whole DCU credited per approved submission
    #[serde(default = "default_submission_reward")]
    pub default_reward: u64,
}

fn default_submission_reward() -> u64 {
    10
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self { default_reward: default_submission_reward() }
    }
}

/// Logging configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format ("text" or "json")
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}
