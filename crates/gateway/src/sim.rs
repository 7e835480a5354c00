//! In-process faucet and token pair.
//!
//! `SimulatedChain` applies the faucet contract rules over a manually
//! advanced clock; `SimulatedGateway` exposes it through `ChainGateway` with
//! switches for node and wallet failures.

use crate::config::{GatewayConfig, WalletKind};
use crate::error::{GatewayError, GatewayResult, RevertReason};
use crate::gateway::{ChainGateway, ClaimReceipt, ClaimStatus, ContractAddresses};
use crate::wallet::{address_of, parse_signing_key};
use async_trait::async_trait;
use faucet_common::{Address, Amount, TxHash};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

const UNIT: Amount = 1_000_000_000_000_000_000;

/// Tokens minted per claim
pub const CLAIM_AMOUNT: Amount = 1_000 * UNIT;
/// Per-account lifetime cap
pub const LIFETIME_LIMIT: Amount = 10_000 * UNIT;
pub const COOLDOWN_SECS: u64 = 24 * 60 * 60;
pub const TOKEN_DECIMALS: u8 = 18;
pub const MAX_SUPPLY: Amount = 1_000_000 * UNIT;
/// Clock value of a fresh chain
pub const GENESIS_TIME: u64 = 1_700_000_000;

pub const NOT_OWNER: &str = "Ownable: caller is not the owner";
pub const MAX_SUPPLY_EXCEEDED: &str = "Token: max supply exceeded";

/// Events emitted by the faucet contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FaucetEvent {
    TokensClaimed {
        user: Address,
        amount: Amount,
        timestamp: u64,
    },
    FaucetPaused {
        paused: bool,
    },
}

/// Faucet and token state
#[derive(Debug)]
pub struct SimulatedChain {
    owner: Address,
    now: u64,
    block_number: u64,
    paused: bool,
    total_supply: Amount,
    balances: HashMap<Address, Amount>,
    last_claim: HashMap<Address, u64>,
    claimed: HashMap<Address, Amount>,
    nonces: HashMap<Address, u64>,
    receipts: HashMap<TxHash, ClaimReceipt>,
    events: Vec<FaucetEvent>,
}

impl SimulatedChain {
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            now: GENESIS_TIME,
            block_number: 0,
            paused: false,
            total_supply: 0,
            balances: HashMap::new(),
            last_claim: HashMap::new(),
            claimed: HashMap::new(),
            nonces: HashMap::new(),
            receipts: HashMap::new(),
            events: Vec::new(),
        }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn advance_time(&mut self, secs: u64) {
        self.now = self.now.saturating_add(secs);
    }

    pub fn block_number(&self) -> u64 {
        self.block_number
    }

    pub fn balance_of(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn last_claim_at(&self, account: &Address) -> u64 {
        self.last_claim.get(account).copied().unwrap_or(0)
    }

    pub fn total_claimed(&self, account: &Address) -> Amount {
        self.claimed.get(account).copied().unwrap_or(0)
    }

    pub fn remaining_allowance(&self, account: &Address) -> Amount {
        LIFETIME_LIMIT.saturating_sub(self.total_claimed(account))
    }

    pub fn can_claim(&self, account: &Address) -> bool {
        self.check_claim(account).is_ok()
    }

    pub fn events(&self) -> &[FaucetEvent] {
        &self.events
    }

    pub fn receipt(&self, hash: &TxHash) -> Option<ClaimReceipt> {
        self.receipts.get(hash).copied()
    }

    /// Evaluate `requestTokens()` without applying it; `Err` carries the
    /// revert string
    pub fn check_claim(&self, account: &Address) -> Result<(), String> {
        if self.paused {
            return Err(RevertReason::PAUSED.to_string());
        }
        if self.total_claimed(account) + CLAIM_AMOUNT > LIFETIME_LIMIT {
            return Err(RevertReason::LIFETIME_LIMIT_REACHED.to_string());
        }
        let last = self.last_claim_at(account);
        if last != 0 && self.now < last + COOLDOWN_SECS {
            return Err(RevertReason::COOLDOWN_ACTIVE.to_string());
        }
        if self.total_supply + CLAIM_AMOUNT > MAX_SUPPLY {
            return Err(MAX_SUPPLY_EXCEEDED.to_string());
        }
        Ok(())
    }

    fn next_tx_hash(&mut self, from: &Address) -> TxHash {
        let nonce = self.nonces.entry(*from).or_insert(0);
        let mut preimage = from.0.to_vec();
        preimage.extend_from_slice(&nonce.to_be_bytes());
        *nonce += 1;
        TxHash(keccak_hash::keccak(&preimage).0)
    }

    /// Mine a transaction whose effects `apply` computes; a failed
    /// transaction still gets a receipt
    fn mine<F>(&mut self, from: &Address, apply: F) -> (ClaimReceipt, Result<(), String>)
    where
        F: FnOnce(&mut Self) -> Result<(), String>,
    {
        let tx_hash = self.next_tx_hash(from);
        self.block_number += 1;
        let outcome = apply(self);
        let receipt = ClaimReceipt {
            tx_hash,
            block_number: self.block_number,
            status: if outcome.is_ok() {
                ClaimStatus::Confirmed
            } else {
                ClaimStatus::Reverted
            },
        };
        self.receipts.insert(tx_hash, receipt);
        (receipt, outcome)
    }

    /// `requestTokens()` sent by `from`
    pub fn request_tokens(&mut self, from: &Address) -> (ClaimReceipt, Result<(), String>) {
        let user = *from;
        self.mine(from, |chain| {
            chain.check_claim(&user)?;
            let now = chain.now;
            *chain.balances.entry(user).or_insert(0) += CLAIM_AMOUNT;
            *chain.claimed.entry(user).or_insert(0) += CLAIM_AMOUNT;
            chain.total_supply += CLAIM_AMOUNT;
            chain.last_claim.insert(user, now);
            chain.events.push(FaucetEvent::TokensClaimed {
                user,
                amount: CLAIM_AMOUNT,
                timestamp: now,
            });
            Ok(())
        })
    }

    /// `setPaused(bool)` sent by `from`
    pub fn set_paused(&mut self, from: &Address, paused: bool) -> (ClaimReceipt, Result<(), String>) {
        let caller = *from;
        self.mine(from, |chain| {
            if caller != chain.owner {
                return Err(NOT_OWNER.to_string());
            }
            chain.paused = paused;
            chain.events.push(FaucetEvent::FaucetPaused { paused });
            Ok(())
        })
    }
}

/// Account used by the simulated backend when no key is configured
pub fn demo_account() -> Address {
    derived_address("faucet-sim:account")
}

fn derived_address(label: &str) -> Address {
    let hash = keccak_hash::keccak(label.as_bytes());
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&hash.0[12..]);
    Address(bytes)
}

/// Synthetic contract pair for a simulated chain
pub fn simulated_addresses() -> ContractAddresses {
    ContractAddresses {
        token: derived_address("faucet-sim:token"),
        faucet: derived_address("faucet-sim:faucet"),
    }
}

/// Gateway over a `SimulatedChain`
pub struct SimulatedGateway {
    chain: Arc<Mutex<SimulatedChain>>,
    addresses: ContractAddresses,
    accounts: RwLock<Vec<Address>>,
    wallet_present: AtomicBool,
    network_up: AtomicBool,
    confirmation_delay: Duration,
    reads: AtomicU64,
    submissions: AtomicU64,
}

impl SimulatedGateway {
    /// Fresh chain owned by `owner`, with `accounts` authorized in the wallet
    pub fn new(owner: Address, accounts: Vec<Address>) -> Self {
        Self::with_chain(Arc::new(Mutex::new(SimulatedChain::new(owner))), accounts)
    }

    /// Share an existing chain, e.g. one gateway per user
    pub fn with_chain(chain: Arc<Mutex<SimulatedChain>>, accounts: Vec<Address>) -> Self {
        Self {
            chain,
            addresses: simulated_addresses(),
            accounts: RwLock::new(accounts),
            wallet_present: AtomicBool::new(true),
            network_up: AtomicBool::new(true),
            confirmation_delay: Duration::ZERO,
            reads: AtomicU64::new(0),
            submissions: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &GatewayConfig) -> GatewayResult<Self> {
        let account = match (&config.wallet.kind, &config.wallet.private_key) {
            (WalletKind::LocalKey, Some(key)) => address_of(&parse_signing_key(key)?),
            _ => demo_account(),
        };
        let mut gateway = Self::new(account, vec![account]);
        if let (Some(token), Some(faucet)) = (config.token_address, config.faucet_address) {
            gateway.addresses = ContractAddresses { token, faucet };
        }
        gateway.wallet_present = AtomicBool::new(config.wallet.kind != WalletKind::None);
        info!("Simulated gateway, account {} owns the faucet", account);
        Ok(gateway)
    }

    /// Delay between broadcast and mining
    pub fn with_confirmation_delay(mut self, delay: Duration) -> Self {
        self.confirmation_delay = delay;
        self
    }

    pub fn chain(&self) -> Arc<Mutex<SimulatedChain>> {
        self.chain.clone()
    }

    pub async fn advance_time(&self, secs: u64) {
        self.chain.lock().await.advance_time(secs);
    }

    pub async fn set_accounts(&self, accounts: Vec<Address>) {
        *self.accounts.write().await = accounts;
    }

    /// Simulate an unreachable node
    pub fn set_network_available(&self, available: bool) {
        self.network_up.store(available, Ordering::SeqCst);
    }

    /// Simulate a missing wallet
    pub fn set_wallet_present(&self, present: bool) {
        self.wallet_present.store(present, Ordering::SeqCst);
    }

    /// Number of read calls served
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of transactions broadcast
    pub fn submission_count(&self) -> u64 {
        self.submissions.load(Ordering::SeqCst)
    }

    async fn read<T, F>(&self, f: F) -> GatewayResult<T>
    where
        F: FnOnce(&SimulatedChain) -> T,
    {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if !self.network_up.load(Ordering::SeqCst) {
            return Err(GatewayError::Read("node unreachable".to_string()));
        }
        let chain = self.chain.lock().await;
        Ok(f(&*chain))
    }

    async fn signer(&self) -> GatewayResult<Address> {
        if !self.wallet_present.load(Ordering::SeqCst) {
            return Err(GatewayError::NoWallet);
        }
        self.accounts
            .read()
            .await
            .first()
            .copied()
            .ok_or(GatewayError::NoWallet)
    }

    async fn transact<F>(&self, label: &str, send: F) -> GatewayResult<TxHash>
    where
        F: FnOnce(&mut SimulatedChain, &Address) -> (ClaimReceipt, Result<(), String>),
    {
        let from = self.signer().await?;
        if !self.network_up.load(Ordering::SeqCst) {
            return Err(GatewayError::Network("node unreachable".to_string()));
        }
        self.submissions.fetch_add(1, Ordering::SeqCst);
        debug!("{} from {} pending", label, from.short());

        if !self.confirmation_delay.is_zero() {
            tokio::time::sleep(self.confirmation_delay).await;
        }

        let (receipt, outcome) = {
            let mut chain = self.chain.lock().await;
            send(&mut *chain, &from)
        };
        match outcome {
            Ok(()) => {
                debug!("{} mined: {}", label, receipt.tx_hash);
                Ok(receipt.tx_hash)
            }
            Err(reason) => {
                debug!("{} reverted: {}", label, reason);
                Err(GatewayError::reverted(&reason))
            }
        }
    }
}

#[async_trait]
impl ChainGateway for SimulatedGateway {
    async fn connect(&self) -> GatewayResult<Address> {
        if !self.wallet_present.load(Ordering::SeqCst) {
            return Err(GatewayError::NoWallet);
        }
        if !self.network_up.load(Ordering::SeqCst) {
            return Err(GatewayError::Network("node unreachable".to_string()));
        }
        self.accounts
            .read()
            .await
            .first()
            .copied()
            .ok_or(GatewayError::NoAccounts)
    }

    async fn token_balance(&self, account: Address) -> GatewayResult<Amount> {
        self.read(|chain| chain.balance_of(&account)).await
    }

    async fn token_decimals(&self) -> GatewayResult<u8> {
        self.read(|_| TOKEN_DECIMALS).await
    }

    async fn can_claim(&self, account: Address) -> GatewayResult<bool> {
        self.read(|chain| chain.can_claim(&account)).await
    }

    async fn remaining_allowance(&self, account: Address) -> GatewayResult<Amount> {
        self.read(|chain| chain.remaining_allowance(&account)).await
    }

    async fn is_paused(&self) -> GatewayResult<bool> {
        self.read(|chain| chain.is_paused()).await
    }

    async fn last_claim_at(&self, account: Address) -> GatewayResult<u64> {
        self.read(|chain| chain.last_claim_at(&account)).await
    }

    async fn total_claimed(&self, account: Address) -> GatewayResult<Amount> {
        self.read(|chain| chain.total_claimed(&account)).await
    }

    async fn chain_time(&self) -> GatewayResult<u64> {
        self.read(|chain| chain.now()).await
    }

    async fn submit_claim(&self) -> GatewayResult<TxHash> {
        self.transact("requestTokens()", |chain, from| chain.request_tokens(from))
            .await
    }

    async fn set_paused(&self, paused: bool) -> GatewayResult<TxHash> {
        self.transact("setPaused(bool)", |chain, from| chain.set_paused(from, paused))
            .await
    }

    fn contract_addresses(&self) -> ContractAddresses {
        self.addresses
    }
}
