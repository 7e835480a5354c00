//! Error types for the chain gateway

use std::fmt;
use thiserror::Error;

/// Why the faucet contract rejected a transaction.
///
/// The three known reasons are matched against the contract's verbatim
/// revert strings; anything else is carried as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevertReason {
    CooldownActive,
    LifetimeLimitReached,
    Paused,
    Other(String),
}

impl RevertReason {
    pub const COOLDOWN_ACTIVE: &'static str = "Faucet: cooldown active";
    pub const LIFETIME_LIMIT_REACHED: &'static str = "Faucet: lifetime limit reached";
    pub const PAUSED: &'static str = "Faucet: paused";

    /// Classify a raw revert string
    pub fn classify(raw: &str) -> Self {
        let raw = raw.trim();
        for (needle, reason) in [
            (Self::COOLDOWN_ACTIVE, RevertReason::CooldownActive),
            (Self::LIFETIME_LIMIT_REACHED, RevertReason::LifetimeLimitReached),
            (Self::PAUSED, RevertReason::Paused),
        ] {
            if raw == needle || raw.contains(needle) {
                return reason;
            }
        }
        RevertReason::Other(raw.to_string())
    }

    /// The revert string as the contract reports it
    pub fn as_str(&self) -> &str {
        match self {
            RevertReason::CooldownActive => Self::COOLDOWN_ACTIVE,
            RevertReason::LifetimeLimitReached => Self::LIFETIME_LIMIT_REACHED,
            RevertReason::Paused => Self::PAUSED,
            RevertReason::Other(reason) => reason,
        }
    }

    /// Short label for metrics
    pub fn label(&self) -> &'static str {
        match self {
            RevertReason::CooldownActive => "cooldown active",
            RevertReason::LifetimeLimitReached => "lifetime limit reached",
            RevertReason::Paused => "paused",
            RevertReason::Other(_) => "other",
        }
    }
}

impl fmt::Display for RevertReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gateway errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    #[error("No injected wallet found")]
    NoWallet,

    #[error("No accounts returned from wallet")]
    NoAccounts,

    /// Node unreachable or timed out; safe to retry
    #[error("Network error: {0}")]
    Network(String),

    /// Deterministic rejection by the chain
    #[error("Transaction reverted: {reason}")]
    Reverted { reason: RevertReason },

    /// Query failure; safe to retry
    #[error("Read failed: {0}")]
    Read(String),

    #[error("Gateway configuration error: {0}")]
    Config(String),
}

impl GatewayError {
    pub fn reverted(raw: &str) -> Self {
        GatewayError::Reverted {
            reason: RevertReason::classify(raw),
        }
    }

    /// Transient failures the user may simply retry
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Network(_) | GatewayError::Read(_))
    }

    pub fn revert_reason(&self) -> Option<&RevertReason> {
        match self {
            GatewayError::Reverted { reason } => Some(reason),
            _ => None,
        }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
