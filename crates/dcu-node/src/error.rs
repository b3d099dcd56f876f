//! Node error types

use dcu_core::DcuError;
use thiserror::Error;

pub type NodeResult<T> = std::result::Result<T, NodeError>;

#[derive(Error, Debug)]
pub enum NodeError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid account '{0}'")]
    InvalidAccount(String),

    #[error("Contract error: {0}")]
    Contract(#[from] DcuError),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::ser::Error),
}
