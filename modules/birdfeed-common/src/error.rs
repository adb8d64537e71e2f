use thiserror::Error;

use crate::types::{Classification, Tier};

#[derive(Error, Debug)]
pub enum BirdfeedError {
    #[error("Request timed out")]
    Timeout,

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Content rejected: {0}")]
    Rejected(Classification),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("All mirrors exhausted for {0} tier")]
    TierExhausted(Tier),

    #[error("All tiers exhausted for @{0}")]
    AllTiersExhausted(String),

    #[error("Dedup store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl BirdfeedError {
    /// True for the transport family of failures (timeout, status, network).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            BirdfeedError::Timeout | BirdfeedError::Status(_) | BirdfeedError::Network(_)
        )
    }
}
