//! Wallets: who authorizes accounts and signs transactions

use crate::config::{GatewayConfig, WalletKind};
use crate::error::{GatewayError, GatewayResult};
use crate::rpc::{RpcClient, RpcError, TxRequest};
use async_trait::async_trait;
use faucet_common::{Address, TxHash};
use k256::ecdsa::SigningKey;
use rlp::RlpStream;
use std::sync::Arc;
use tracing::{debug, info};

/// JSON-RPC error code nodes use for a reverted call
const EXECUTION_REVERTED: i64 = 3;

/// Map a failed write to the gateway taxonomy.
///
/// Only contract reverts become `Reverted`. Node-side rejections before
/// execution (nonce, funds, pool limits) are network errors and retryable.
pub(crate) fn write_error(err: RpcError) -> GatewayError {
    if let Some(reason) = err.revert_reason() {
        return GatewayError::reverted(&reason);
    }
    match err {
        RpcError::Transport(msg) => GatewayError::Network(msg),
        RpcError::Rpc { code, message, .. }
            if code == EXECUTION_REVERTED || message.contains("revert") =>
        {
            GatewayError::reverted(&message)
        }
        RpcError::Rpc { message, .. } => {
            GatewayError::Network(format!("Rejected by node: {}", message))
        }
        RpcError::Decode(msg) => GatewayError::Network(format!("Invalid response: {}", msg)),
    }
}

#[async_trait]
pub trait Wallet: Send + Sync {
    /// Authorization handshake; may prompt the user
    async fn request_accounts(&self) -> GatewayResult<Vec<Address>>;

    /// Accounts already authorized, never prompts
    async fn accounts(&self) -> GatewayResult<Vec<Address>>;

    /// Sign and broadcast, returning the transaction hash (not yet confirmed)
    async fn send_transaction(&self, tx: TxRequest) -> GatewayResult<TxHash>;
}

/// No wallet present
pub struct NoWallet;

#[async_trait]
impl Wallet for NoWallet {
    async fn request_accounts(&self) -> GatewayResult<Vec<Address>> {
        Err(GatewayError::NoWallet)
    }

    async fn accounts(&self) -> GatewayResult<Vec<Address>> {
        Err(GatewayError::NoWallet)
    }

    async fn send_transaction(&self, _tx: TxRequest) -> GatewayResult<TxHash> {
        Err(GatewayError::NoWallet)
    }
}

/// Provider endpoint that owns the keys, EIP-1193 style
pub struct InjectedWallet {
    provider: RpcClient,
}

impl InjectedWallet {
    pub fn new(provider: RpcClient) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Wallet for InjectedWallet {
    async fn request_accounts(&self) -> GatewayResult<Vec<Address>> {
        self.provider.request_accounts().await.map_err(|e| match e {
            RpcError::Transport(msg) => GatewayError::Network(msg),
            other => GatewayError::Network(format!("connectWallet failed: {}", other)),
        })
    }

    async fn accounts(&self) -> GatewayResult<Vec<Address>> {
        self.provider.accounts().await.map_err(|e| match e {
            RpcError::Transport(msg) => GatewayError::Network(msg),
            other => GatewayError::Network(format!("eth_accounts failed: {}", other)),
        })
    }

    async fn send_transaction(&self, tx: TxRequest) -> GatewayResult<TxHash> {
        debug!("Sending transaction via provider {}", self.provider.url());
        self.provider.send_transaction(&tx).await.map_err(write_error)
    }
}

/// secp256k1 key held by the client; transactions are signed locally as
/// EIP-155 legacy transactions
pub struct LocalKeyWallet {
    signing_key: SigningKey,
    address: Address,
    node: Arc<RpcClient>,
    chain_id: Option<u64>,
    fallback_gas_limit: u64,
}

impl LocalKeyWallet {
    pub fn new(
        private_key: &str,
        node: Arc<RpcClient>,
        chain_id: Option<u64>,
        fallback_gas_limit: u64,
    ) -> GatewayResult<Self> {
        let signing_key = parse_signing_key(private_key)?;
        let address = address_of(&signing_key);
        info!("Local wallet account: {}", address);
        Ok(Self {
            signing_key,
            address,
            node,
            chain_id,
            fallback_gas_limit,
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    async fn chain_id(&self) -> GatewayResult<u64> {
        match self.chain_id {
            Some(id) => Ok(id),
            None => self.node.chain_id().await.map_err(write_error),
        }
    }
}

#[async_trait]
impl Wallet for LocalKeyWallet {
    async fn request_accounts(&self) -> GatewayResult<Vec<Address>> {
        Ok(vec![self.address])
    }

    async fn accounts(&self) -> GatewayResult<Vec<Address>> {
        Ok(vec![self.address])
    }

    async fn send_transaction(&self, mut tx: TxRequest) -> GatewayResult<TxHash> {
        if tx.from != self.address {
            return Err(GatewayError::NoAccounts);
        }

        let nonce = self
            .node
            .transaction_count(&self.address, "pending")
            .await
            .map_err(write_error)?;
        let chain_id = self.chain_id().await?;
        let gas_price = self.node.gas_price().await.map_err(write_error)?;

        // Estimation simulates the call, so a doomed claim reverts here
        // with its reason before anything is broadcast.
        let gas = match tx.gas {
            Some(gas) => gas,
            None => match self.node.estimate_gas(&tx).await {
                Ok(estimate) => estimate + estimate / 5,
                Err(e) if e.revert_reason().is_some() => return Err(write_error(e)),
                Err(RpcError::Transport(msg)) => return Err(GatewayError::Network(msg)),
                Err(e) => {
                    debug!("Gas estimation failed ({}), using fallback", e);
                    self.fallback_gas_limit
                }
            },
        };
        tx.gas = Some(gas);

        let raw = sign_legacy_transaction(&self.signing_key, &tx, nonce, gas_price, chain_id)?;
        debug!("Broadcasting signed transaction, nonce {}", nonce);
        self.node.send_raw_transaction(&raw).await.map_err(write_error)
    }
}

/// Decode a hex private key
pub fn parse_signing_key(private_key: &str) -> GatewayResult<SigningKey> {
    let hex_key = private_key.trim().strip_prefix("0x").unwrap_or(private_key.trim());
    let bytes = hex::decode(hex_key)
        .map_err(|e| GatewayError::Config(format!("Invalid private key: {}", e)))?;
    SigningKey::from_slice(&bytes)
        .map_err(|e| GatewayError::Config(format!("Invalid signing key: {}", e)))
}

/// Ethereum address of a key: last 20 bytes of keccak(uncompressed pubkey)
pub fn address_of(signing_key: &SigningKey) -> Address {
    let public_key = signing_key.verifying_key();
    let pub_key_bytes = public_key.to_encoded_point(false);
    let hash = keccak_hash::keccak(&pub_key_bytes.as_bytes()[1..]); // Skip the 0x04 tag
    let mut addr_bytes = [0u8; 20];
    addr_bytes.copy_from_slice(&hash.0[12..]);
    Address(addr_bytes)
}

/// Big-endian bytes without leading zeros, as RLP integers require
fn trim_be(bytes: &[u8]) -> Vec<u8> {
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    bytes[first..].to_vec()
}

fn append_legacy_fields(stream: &mut RlpStream, tx: &TxRequest, nonce: u64, gas_price: u128, gas: u64) {
    stream.append(&nonce);
    stream.append(&trim_be(&gas_price.to_be_bytes()));
    stream.append(&gas);
    stream.append(&tx.to.0.to_vec());
    stream.append(&Vec::<u8>::new()); // value
    stream.append(&tx.data);
}

/// Build and sign an EIP-155 legacy transaction, returning its RLP bytes
pub fn sign_legacy_transaction(
    signing_key: &SigningKey,
    tx: &TxRequest,
    nonce: u64,
    gas_price: u128,
    chain_id: u64,
) -> GatewayResult<Vec<u8>> {
    let gas = tx.gas.unwrap_or_default();

    let mut unsigned = RlpStream::new_list(9);
    append_legacy_fields(&mut unsigned, tx, nonce, gas_price, gas);
    unsigned.append(&chain_id);
    unsigned.append(&0u8);
    unsigned.append(&0u8);
    let sighash = keccak_hash::keccak(unsigned.out());

    let (signature, recovery_id) = signing_key
        .sign_prehash_recoverable(&sighash.0)
        .map_err(|e| GatewayError::Config(format!("Signing failed: {}", e)))?;
    let sig_bytes = signature.to_bytes();
    let (r, s) = sig_bytes.split_at(32);
    let v = chain_id * 2 + 35 + recovery_id.to_byte() as u64;

    let mut signed = RlpStream::new_list(9);
    append_legacy_fields(&mut signed, tx, nonce, gas_price, gas);
    signed.append(&v);
    signed.append(&trim_be(r));
    signed.append(&trim_be(s));
    Ok(signed.out().to_vec())
}

/// Build the wallet the configuration asks for
pub fn build_wallet(config: &GatewayConfig, node: Arc<RpcClient>) -> GatewayResult<Arc<dyn Wallet>> {
    match config.wallet.kind {
        WalletKind::None => Ok(Arc::new(NoWallet)),
        WalletKind::Injected => {
            let provider = RpcClient::new(config.provider_url(), config.request_timeout())
                .map_err(|e| GatewayError::Config(e.to_string()))?;
            Ok(Arc::new(InjectedWallet::new(provider)))
        }
        WalletKind::LocalKey => {
            let key = config.wallet.private_key.as_deref().ok_or_else(|| {
                GatewayError::Config("local_key wallet requires private_key".to_string())
            })?;
            Ok(Arc::new(LocalKeyWallet::new(
                key,
                node,
                config.chain_id,
                config.fallback_gas_limit,
            )?))
        }
    }
}
