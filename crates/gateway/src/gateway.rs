//! The chain gateway abstraction

use crate::error::GatewayResult;
use async_trait::async_trait;
use faucet_common::{Address, Amount, TxHash};
use serde::Serialize;

/// Deployed contract pair the gateway talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ContractAddresses {
    pub token: Address,
    pub faucet: Address,
}

/// Everything needed to decide whether an account may claim now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ClaimEligibility {
    pub eligible: bool,
    pub remaining_allowance: Amount,
    /// Chain timestamp of the last successful claim, 0 if never claimed
    pub last_claim_at: u64,
}

impl ClaimEligibility {
    /// Earliest chain time at which the cooldown has elapsed
    pub fn next_claim_at(&self, cooldown_secs: u64) -> Option<u64> {
        if self.last_claim_at == 0 {
            None
        } else {
            Some(self.last_claim_at.saturating_add(cooldown_secs))
        }
    }
}

/// Outcome of a mined transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    Confirmed,
    Reverted,
}

/// A submitted transaction once a receipt exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClaimReceipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub status: ClaimStatus,
}

impl ClaimReceipt {
    pub fn is_confirmed(&self) -> bool {
        self.status == ClaimStatus::Confirmed
    }
}

/// Boundary between the client and the chain.
///
/// Reads never mutate chain state and are safe to repeat. `submit_claim`
/// resolves only once the transaction is mined, never merely broadcast.
#[async_trait]
pub trait ChainGateway: Send + Sync {
    /// Authorize with the wallet and return the first account
    async fn connect(&self) -> GatewayResult<Address>;

    /// Token balance in base units
    async fn token_balance(&self, account: Address) -> GatewayResult<Amount>;

    async fn token_decimals(&self) -> GatewayResult<u8>;

    async fn can_claim(&self, account: Address) -> GatewayResult<bool>;

    /// Lifetime allowance left, base units
    async fn remaining_allowance(&self, account: Address) -> GatewayResult<Amount>;

    async fn is_paused(&self) -> GatewayResult<bool>;

    async fn last_claim_at(&self, account: Address) -> GatewayResult<u64>;

    async fn total_claimed(&self, account: Address) -> GatewayResult<Amount>;

    /// Current chain time (latest block timestamp)
    async fn chain_time(&self) -> GatewayResult<u64>;

    /// Send `requestTokens()` from the connected account and wait for it to be mined
    async fn submit_claim(&self) -> GatewayResult<TxHash>;

    /// Owner only; reverts for anyone else
    async fn set_paused(&self, paused: bool) -> GatewayResult<TxHash>;

    fn contract_addresses(&self) -> ContractAddresses;

    /// The three eligibility reads, issued concurrently
    async fn eligibility(&self, account: Address) -> GatewayResult<ClaimEligibility> {
        let (eligible, remaining_allowance, last_claim_at) = tokio::try_join!(
            self.can_claim(account),
            self.remaining_allowance(account),
            self.last_claim_at(account),
        )?;
        Ok(ClaimEligibility {
            eligible,
            remaining_allowance,
            last_claim_at,
        })
    }
}
