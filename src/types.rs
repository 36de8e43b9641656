//! Crate-wide error and result types

use thiserror::Error;

use crate::config::ConfigError;
use crate::flags::FlagSourceError;
use crate::identity::StorageError;
use crate::tiers::MembershipError;

/// Top-level error for hi-gate operations
#[derive(Debug, Error)]
pub enum HiGateError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    FlagSource(#[from] FlagSourceError),

    #[error(transparent)]
    Membership(#[from] MembershipError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Caller lacks the capability for an admin operation
    #[error("Forbidden: {0}")]
    Forbidden(String),
}

pub type Result<T> = std::result::Result<T, HiGateError>;
