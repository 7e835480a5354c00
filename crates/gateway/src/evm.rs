//! Gateway backed by a JSON-RPC node

use crate::abi::{self, ContractCall};
use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::gateway::{ChainGateway, ClaimReceipt, ClaimStatus, ContractAddresses};
use crate::rpc::{RpcClient, RpcError, TransactionReceipt, TxRequest};
use crate::wallet::{build_wallet, Wallet};
use async_trait::async_trait;
use faucet_common::{Address, Amount, TxHash};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

impl From<TransactionReceipt> for ClaimReceipt {
    fn from(receipt: TransactionReceipt) -> Self {
        ClaimReceipt {
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
            status: if receipt.success {
                ClaimStatus::Confirmed
            } else {
                ClaimStatus::Reverted
            },
        }
    }
}

/// EVM chain gateway
pub struct EvmGateway {
    node: Arc<RpcClient>,
    wallet: Arc<dyn Wallet>,
    addresses: ContractAddresses,
    poll_interval: Duration,
}

impl EvmGateway {
    pub fn new(
        node: Arc<RpcClient>,
        wallet: Arc<dyn Wallet>,
        addresses: ContractAddresses,
        poll_interval: Duration,
    ) -> Self {
        Self {
            node,
            wallet,
            addresses,
            poll_interval,
        }
    }

    /// Build node client and wallet from configuration
    pub fn from_config(config: &GatewayConfig) -> GatewayResult<Self> {
        let addresses = config.contract_addresses()?;
        let node = Arc::new(
            RpcClient::new(config.rpc_url.clone(), config.request_timeout())
                .map_err(|e| GatewayError::Config(e.to_string()))?,
        );
        let wallet = build_wallet(config, node.clone())?;
        info!(
            "EVM gateway: node {}, token {}, faucet {}",
            config.rpc_url, addresses.token, addresses.faucet
        );
        Ok(Self::new(node, wallet, addresses, config.poll_interval()))
    }

    fn target(&self, call: &ContractCall) -> Address {
        if call.is_token_call() {
            self.addresses.token
        } else {
            self.addresses.faucet
        }
    }

    async fn read(&self, call: ContractCall) -> GatewayResult<Vec<u8>> {
        self.node
            .eth_call(None, self.target(&call), &call.encode(), "latest")
            .await
            .map_err(|e| {
                warn!("{} failed: {}", call.signature(), e);
                GatewayError::Read(e.to_string())
            })
    }

    async fn read_bool(&self, call: ContractCall) -> GatewayResult<bool> {
        let data = self.read(call).await?;
        abi::decode_bool(&data).map_err(GatewayError::Read)
    }

    async fn read_uint(&self, call: ContractCall) -> GatewayResult<Amount> {
        let data = self.read(call).await?;
        abi::decode_uint(&data).map_err(GatewayError::Read)
    }

    /// Signer account, resolved from the wallet on every write
    async fn signer(&self) -> GatewayResult<Address> {
        self.wallet
            .accounts()
            .await?
            .into_iter()
            .next()
            .ok_or(GatewayError::NoWallet)
    }

    /// Poll for the receipt until it exists; no overall deadline
    async fn wait_for_receipt(&self, hash: &TxHash) -> GatewayResult<ClaimReceipt> {
        loop {
            match self.node.transaction_receipt(hash).await {
                Ok(Some(receipt)) => return Ok(receipt.into()),
                Ok(None) => {
                    debug!("Transaction {} pending", hash);
                    tokio::time::sleep(self.poll_interval).await;
                }
                Err(RpcError::Transport(msg)) => return Err(GatewayError::Network(msg)),
                Err(e) => return Err(GatewayError::Network(e.to_string())),
            }
        }
    }

    /// Re-run a failed transaction at its block to recover the revert string
    async fn revert_reason_of(&self, tx: &TxRequest, block_number: u64) -> GatewayError {
        let block = format!("0x{:x}", block_number);
        match self
            .node
            .eth_call(Some(tx.from), tx.to, &tx.data, &block)
            .await
        {
            Err(e) => match e.revert_reason() {
                Some(reason) => GatewayError::reverted(&reason),
                None => GatewayError::reverted("transaction reverted"),
            },
            Ok(_) => GatewayError::reverted("transaction reverted"),
        }
    }

    /// Send a faucet write from the signer and wait for it to be mined
    async fn transact(&self, call: ContractCall) -> GatewayResult<TxHash> {
        let from = self.signer().await?;
        let tx = TxRequest::new(from, self.target(&call), call.encode());

        let hash = self.wallet.send_transaction(tx.clone()).await?;
        info!("{} sent from {}: {}", call.signature(), from.short(), hash);

        let receipt = self.wait_for_receipt(&hash).await?;
        if receipt.is_confirmed() {
            info!("{} confirmed in block {}", hash, receipt.block_number);
            Ok(receipt.tx_hash)
        } else {
            let err = self.revert_reason_of(&tx, receipt.block_number).await;
            warn!("{} reverted in block {}: {}", hash, receipt.block_number, err);
            Err(err)
        }
    }
}

#[async_trait]
impl ChainGateway for EvmGateway {
    async fn connect(&self) -> GatewayResult<Address> {
        let accounts = self.wallet.request_accounts().await?;
        let account = accounts.into_iter().next().ok_or(GatewayError::NoAccounts)?;
        info!("Wallet connected: {}", account);
        Ok(account)
    }

    async fn token_balance(&self, account: Address) -> GatewayResult<Amount> {
        self.read_uint(ContractCall::BalanceOf(account)).await
    }

    async fn token_decimals(&self) -> GatewayResult<u8> {
        let decimals = self.read_uint(ContractCall::Decimals).await?;
        u8::try_from(decimals).map_err(|_| GatewayError::Read(format!("decimals out of range: {}", decimals)))
    }

    async fn can_claim(&self, account: Address) -> GatewayResult<bool> {
        self.read_bool(ContractCall::CanClaim(account)).await
    }

    async fn remaining_allowance(&self, account: Address) -> GatewayResult<Amount> {
        self.read_uint(ContractCall::RemainingAllowance(account)).await
    }

    async fn is_paused(&self) -> GatewayResult<bool> {
        self.read_bool(ContractCall::IsPaused).await
    }

    async fn last_claim_at(&self, account: Address) -> GatewayResult<u64> {
        let timestamp = self.read_uint(ContractCall::LastClaimAt(account)).await?;
        u64::try_from(timestamp).map_err(|_| GatewayError::Read(format!("timestamp out of range: {}", timestamp)))
    }

    async fn total_claimed(&self, account: Address) -> GatewayResult<Amount> {
        self.read_uint(ContractCall::TotalClaimed(account)).await
    }

    async fn chain_time(&self) -> GatewayResult<u64> {
        self.node
            .latest_block_timestamp()
            .await
            .map_err(|e| GatewayError::Read(e.to_string()))
    }

    async fn submit_claim(&self) -> GatewayResult<TxHash> {
        self.transact(ContractCall::RequestTokens).await
    }

    async fn set_paused(&self, paused: bool) -> GatewayResult<TxHash> {
        self.transact(ContractCall::SetPaused(paused)).await
    }

    fn contract_addresses(&self) -> ContractAddresses {
        self.addresses
    }
}
