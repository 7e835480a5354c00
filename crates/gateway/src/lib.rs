//! Chain gateway for the token faucet.
//!
//! Wraps read and write access to the faucet and token contracts behind the
//! [`ChainGateway`] trait. Two backends exist: [`EvmGateway`] talks JSON-RPC to
//! a node, [`SimulatedGateway`] runs the contract rules in process.

pub mod abi;
pub mod config;
pub mod error;
pub mod evm;
pub mod gateway;
pub mod rpc;
pub mod sim;
pub mod wallet;

pub use config::{Backend, GatewayConfig, WalletConfig, WalletKind};
pub use error::{GatewayError, GatewayResult, RevertReason};
pub use evm::EvmGateway;
pub use gateway::{ChainGateway, ClaimEligibility, ClaimReceipt, ClaimStatus, ContractAddresses};
pub use sim::{SimulatedChain, SimulatedGateway};

use std::sync::Arc;

/// Build the gateway selected by `config.backend`
pub fn build_gateway(config: &GatewayConfig) -> GatewayResult<Arc<dyn ChainGateway>> {
    match config.backend {
        Backend::Rpc => Ok(Arc::new(EvmGateway::from_config(config)?)),
        Backend::Simulated => Ok(Arc::new(SimulatedGateway::from_config(config)?)),
    }
}
