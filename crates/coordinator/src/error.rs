//! Coordinator errors

use faucet_gateway::GatewayError;
use std::fmt;
use thiserror::Error;

/// Why the pre-submission check refused a claim
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IneligibleReason {
    LifetimeLimitReached,
    Paused,
    /// `retry_in_secs` is estimated from the last claim time and the
    /// configured cooldown
    CooldownActive { retry_in_secs: u64 },
    /// The contract refuses for a reason the reads do not explain
    NotEligible,
}

impl fmt::Display for IneligibleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IneligibleReason::LifetimeLimitReached => {
                write!(f, "Cannot claim: lifetime limit reached")
            }
            IneligibleReason::Paused => write!(f, "Cannot claim: faucet is paused"),
            IneligibleReason::CooldownActive { retry_in_secs } => write!(
                f,
                "Cannot claim yet: cooldown active, try again in {}",
                format_wait(*retry_in_secs)
            ),
            IneligibleReason::NotEligible => {
                write!(f, "Cannot claim: this account is not eligible right now")
            }
        }
    }
}

/// Human wait time, e.g. `23h 59m`
pub fn format_wait(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    match (hours, minutes) {
        (0, 0) => format!("{}s", seconds),
        (0, m) => format!("{}m {}s", m, seconds),
        (h, m) => format!("{}h {}m", h, m),
    }
}

/// Coordinator errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoordinatorError {
    #[error("Connect your wallet first")]
    NotConnected,

    #[error("A claim is already in progress")]
    ClaimInFlight,

    #[error("{0}")]
    Ineligible(IneligibleReason),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Session closed")]
    SessionClosed,

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type CoordinatorResult<T> = Result<T, CoordinatorError>;
