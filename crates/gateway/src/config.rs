//! Gateway configuration

use crate::error::{GatewayError, GatewayResult};
use crate::gateway::ContractAddresses;
use faucet_common::Address;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Which gateway implementation to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// JSON-RPC node
    #[default]
    Rpc,
    /// In-process chain, for demos and tests
    Simulated,
}

impl FromStr for Backend {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rpc" => Ok(Backend::Rpc),
            "simulated" | "sim" => Ok(Backend::Simulated),
            other => Err(GatewayError::Config(format!("Unknown backend: {}", other))),
        }
    }
}

/// Where transactions get signed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletKind {
    /// No wallet available
    None,
    /// Provider endpoint that owns the keys (eth_requestAccounts / eth_sendTransaction)
    #[default]
    Injected,
    /// Key held by this client, transactions signed locally
    LocalKey,
}

impl FromStr for WalletKind {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "none" => Ok(WalletKind::None),
            "injected" => Ok(WalletKind::Injected),
            "local_key" | "local" => Ok(WalletKind::LocalKey),
            other => Err(GatewayError::Config(format!("Unknown wallet kind: {}", other))),
        }
    }
}

/// Wallet configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    pub kind: WalletKind,

    /// Provider endpoint for an injected wallet; defaults to the node URL
    pub provider_url: Option<String>,

    /// Hex private key for `local_key`
    pub private_key: Option<String>,
}

/// Gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub backend: Backend,

    /// RPC endpoint of the chain node
    pub rpc_url: String,

    /// Token contract. Environment specific, no built-in default.
    pub token_address: Option<Address>,

    /// Faucet contract. Environment specific, no built-in default.
    pub faucet_address: Option<Address>,

    /// EIP-155 chain id; queried from the node when absent
    pub chain_id: Option<u64>,

    /// Interval between receipt polls (milliseconds)
    pub poll_interval_ms: u64,

    /// Per-request HTTP timeout (seconds)
    pub request_timeout_secs: u64,

    /// Gas limit used when estimation is unavailable
    pub fallback_gas_limit: u64,

    pub wallet: WalletConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Rpc,
            rpc_url: "http://localhost:8545".to_string(),
            token_address: None,
            faucet_address: None,
            chain_id: None,
            poll_interval_ms: 1000,
            request_timeout_secs: 30,
            fallback_gas_limit: 200_000,
            wallet: WalletConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Override fields from `FAUCET_*` environment variables
    pub fn apply_env(&mut self) -> GatewayResult<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Override fields from any key lookup using the environment variable names
    pub fn apply_overrides<F>(&mut self, lookup: F) -> GatewayResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(backend) = lookup("FAUCET_BACKEND") {
            self.backend = backend.parse()?;
        }

        if let Some(rpc_url) = lookup("FAUCET_RPC_URL") {
            self.rpc_url = rpc_url;
        }

        if let Some(token) = lookup("FAUCET_TOKEN_ADDRESS") {
            self.token_address = Some(parse_address("FAUCET_TOKEN_ADDRESS", &token)?);
        }

        if let Some(faucet) = lookup("FAUCET_CONTRACT_ADDRESS") {
            self.faucet_address = Some(parse_address("FAUCET_CONTRACT_ADDRESS", &faucet)?);
        }

        if let Some(kind) = lookup("FAUCET_WALLET") {
            self.wallet.kind = kind.parse()?;
        }

        if let Some(url) = lookup("FAUCET_WALLET_URL") {
            self.wallet.provider_url = Some(url);
        }

        if let Some(key) = lookup("FAUCET_PRIVATE_KEY") {
            self.wallet.private_key = Some(key);
        }

        if let Some(chain_id) = lookup("FAUCET_CHAIN_ID") {
            self.chain_id = Some(parse_number("FAUCET_CHAIN_ID", &chain_id)?);
        }

        if let Some(interval) = lookup("FAUCET_POLL_INTERVAL_MS") {
            self.poll_interval_ms = parse_number("FAUCET_POLL_INTERVAL_MS", &interval)?;
        }

        if let Some(timeout) = lookup("FAUCET_REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = parse_number("FAUCET_REQUEST_TIMEOUT_SECS", &timeout)?;
        }

        Ok(())
    }

    /// The configured contract pair; both addresses are required
    pub fn contract_addresses(&self) -> GatewayResult<ContractAddresses> {
        let token = self
            .token_address
            .ok_or_else(|| GatewayError::Config("token_address is not configured".to_string()))?;
        let faucet = self
            .faucet_address
            .ok_or_else(|| GatewayError::Config("faucet_address is not configured".to_string()))?;
        Ok(ContractAddresses { token, faucet })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn provider_url(&self) -> &str {
        self.wallet.provider_url.as_deref().unwrap_or(&self.rpc_url)
    }
}

fn parse_address(key: &str, value: &str) -> GatewayResult<Address> {
    value
        .parse()
        .map_err(|e| GatewayError::Config(format!("{}: {}", key, e)))
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> GatewayResult<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| GatewayError::Config(format!("{}: {}", key, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_have_no_contract_addresses() {
        let config = GatewayConfig::default();
        assert_eq!(config.backend, Backend::Rpc);
        assert_eq!(config.wallet.kind, WalletKind::Injected);
        assert!(matches!(config.contract_addresses(), Err(GatewayError::Config(_))));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = GatewayConfig::default();
        config
            .apply_overrides(lookup(&[
                ("FAUCET_BACKEND", "simulated"),
                ("FAUCET_RPC_URL", "http://node:8545"),
                ("FAUCET_TOKEN_ADDRESS", "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed"),
                ("FAUCET_CONTRACT_ADDRESS", "0xfb6916095ca1df60bb79ce92ce3ea74c37c5d359"),
                ("FAUCET_WALLET", "local-key"),
                ("FAUCET_CHAIN_ID", "11155111"),
                ("FAUCET_POLL_INTERVAL_MS", "250"),
            ]))
            .unwrap();

        assert_eq!(config.backend, Backend::Simulated);
        assert_eq!(config.rpc_url, "http://node:8545");
        assert_eq!(config.wallet.kind, WalletKind::LocalKey);
        assert_eq!(config.chain_id, Some(11155111));
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
        let addresses = config.contract_addresses().unwrap();
        assert_eq!(addresses.token.to_string(), "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed");
    }

    #[test]
    fn test_bad_override_is_reported() {
        let mut config = GatewayConfig::default();
        let err = config
            .apply_overrides(lookup(&[("FAUCET_TOKEN_ADDRESS", "0x1234")]))
            .unwrap_err();
        assert!(err.to_string().contains("FAUCET_TOKEN_ADDRESS"));

        let err = config
            .apply_overrides(lookup(&[("FAUCET_POLL_INTERVAL_MS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, GatewayError::Config(_)));
    }

    #[test]
    fn test_provider_url_falls_back_to_rpc_url() {
        let mut config = GatewayConfig::default();
        assert_eq!(config.provider_url(), "http://localhost:8545");
        config.wallet.provider_url = Some("http://wallet:1248".into());
        assert_eq!(config.provider_url(), "http://wallet:1248");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: GatewayConfig =
            serde_json::from_str(r#"{"backend":"simulated","wallet":{"kind":"none"}}"#).unwrap();
        assert_eq!(config.backend, Backend::Simulated);
        assert_eq!(config.wallet.kind, WalletKind::None);
        assert_eq!(config.poll_interval_ms, 1000);
    }
}
