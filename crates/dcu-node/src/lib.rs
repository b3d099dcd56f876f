//! # DeCleanup Network Node
//!
//! Deploys the DCU contracts from a [`NetworkConfig`] and executes
//! [`Transaction`]s against them in block-time order.

pub mod account;
pub mod config;
pub mod error;
pub mod network;

pub use account::{resolve_account, Account, DcuAmount};
pub use config::NetworkConfig;
pub use error::{NodeError, NodeResult};
pub use network::{AccountSummary, ContractId, Network, Receipt, Transaction, TxFailure, TxOutput};
