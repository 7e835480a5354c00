//! JSON-RPC client for Ethereum-compatible nodes and wallet providers

use crate::abi;
use faucet_common::{Address, TxHash};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Transport and protocol level RPC failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RpcError {
    /// Node unreachable, timed out, or answered with garbage HTTP
    #[error("Request failed: {0}")]
    Transport(String),

    /// JSON-RPC error object returned by the node
    #[error("RPC error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<Value>,
    },

    /// Well-formed response with an unexpected shape
    #[error("Invalid response: {0}")]
    Decode(String),
}

impl RpcError {
    /// Revert string carried by this error, if any.
    ///
    /// Checks ABI-encoded `Error(string)` data first (the `data` field may be
    /// a hex string or an object with a nested `data`), then the message.
    pub fn revert_reason(&self) -> Option<String> {
        let RpcError::Rpc { message, data, .. } = self else {
            return None;
        };

        let hex_data = match data {
            Some(Value::String(s)) => Some(s.as_str()),
            Some(Value::Object(obj)) => obj.get("data").and_then(Value::as_str),
            _ => None,
        };
        if let Some(reason) = hex_data
            .and_then(|s| abi::from_hex(s).ok())
            .and_then(|bytes| abi::decode_revert(&bytes))
        {
            return Some(reason);
        }

        if let Some(Value::Object(obj)) = data {
            if let Some(reason) = obj
                .get("message")
                .and_then(Value::as_str)
                .and_then(abi::extract_revert_message)
            {
                return Some(reason);
            }
        }

        abi::extract_revert_message(message)
    }
}

pub type RpcResult<T> = Result<T, RpcError>;

/// Transaction fields for `eth_sendTransaction` / `eth_call` / `eth_estimateGas`
#[derive(Debug, Clone, PartialEq)]
pub struct TxRequest {
    pub from: Address,
    pub to: Address,
    pub data: Vec<u8>,
    pub gas: Option<u64>,
}

impl TxRequest {
    pub fn new(from: Address, to: Address, data: Vec<u8>) -> Self {
        Self { from, to, data, gas: None }
    }

    fn to_json(&self) -> Value {
        let mut obj = json!({
            "from": self.from.to_string(),
            "to": self.to.to_string(),
            "data": abi::to_hex(&self.data),
        });
        if let Some(gas) = self.gas {
            obj["gas"] = json!(format!("0x{:x}", gas));
        }
        obj
    }
}

/// The parts of a receipt the gateway cares about
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionReceipt {
    pub transaction_hash: TxHash,
    pub block_number: u64,
    /// `true` for `status == 0x1`
    pub success: bool,
}

impl TransactionReceipt {
    fn from_json(value: &Value) -> RpcResult<Self> {
        let hash = value
            .get("transactionHash")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::Decode("receipt without transactionHash".to_string()))?;
        let transaction_hash = hash
            .parse()
            .map_err(|e| RpcError::Decode(format!("receipt hash: {}", e)))?;
        let block_number = value
            .get("blockNumber")
            .map(parse_quantity)
            .transpose()?
            .unwrap_or(0) as u64;
        let success = value
            .get("status")
            .map(parse_quantity)
            .transpose()?
            .map(|status| status == 1)
            .unwrap_or(true);

        Ok(Self {
            transaction_hash,
            block_number,
            success,
        })
    }
}

/// Parse a hex `QUANTITY`
pub fn parse_quantity(value: &Value) -> RpcResult<u128> {
    let s = value
        .as_str()
        .ok_or_else(|| RpcError::Decode(format!("expected hex quantity, got {}", value)))?;
    let digits = s.trim_start_matches("0x");
    if digits.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(digits, 16)
        .map_err(|e| RpcError::Decode(format!("bad quantity {:?}: {}", s, e)))
}

fn parse_tx_hash(value: Value) -> RpcResult<TxHash> {
    value
        .as_str()
        .ok_or_else(|| RpcError::Decode(format!("expected transaction hash, got {}", value)))?
        .parse()
        .map_err(|e| RpcError::Decode(format!("transaction hash: {}", e)))
}

/// RPC client for interacting with a node or wallet provider
pub struct RpcClient {
    url: String,
    client: reqwest::Client,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> RpcResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RpcError::Transport(format!("HTTP client setup failed: {}", e)))?;
        Ok(Self {
            url: url.into(),
            client,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Raw JSON-RPC call returning the `result` member
    pub async fn call(&self, method: &str, params: Value) -> RpcResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id
        });
        debug!("RPC -> {} #{}", method, id);

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| RpcError::Transport(format!("Invalid response body: {}", e)))?;

        if let Some(error) = body.get("error") {
            let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            debug!("RPC <- {} #{} error {}: {}", method, id, code, message);
            return Err(RpcError::Rpc {
                code,
                message,
                data: error.get("data").cloned(),
            });
        }

        Ok(body.get("result").cloned().unwrap_or(Value::Null))
    }

    /// Read-only contract call
    pub async fn eth_call(
        &self,
        from: Option<Address>,
        to: Address,
        data: &[u8],
        block: &str,
    ) -> RpcResult<Vec<u8>> {
        let mut tx = json!({ "to": to.to_string(), "data": abi::to_hex(data) });
        if let Some(from) = from {
            tx["from"] = json!(from.to_string());
        }
        let result = self.call("eth_call", json!([tx, block])).await?;
        let hex_str = result
            .as_str()
            .ok_or_else(|| RpcError::Decode(format!("eth_call returned {}", result)))?;
        abi::from_hex(hex_str).map_err(RpcError::Decode)
    }

    /// EIP-1193 authorization handshake
    pub async fn request_accounts(&self) -> RpcResult<Vec<Address>> {
        let result = self.call("eth_requestAccounts", json!([])).await?;
        parse_accounts(result)
    }

    /// Accounts already authorized, without prompting
    pub async fn accounts(&self) -> RpcResult<Vec<Address>> {
        let result = self.call("eth_accounts", json!([])).await?;
        parse_accounts(result)
    }

    pub async fn send_transaction(&self, tx: &TxRequest) -> RpcResult<TxHash> {
        let result = self.call("eth_sendTransaction", json!([tx.to_json()])).await?;
        parse_tx_hash(result)
    }

    pub async fn send_raw_transaction(&self, raw: &[u8]) -> RpcResult<TxHash> {
        let result = self
            .call("eth_sendRawTransaction", json!([abi::to_hex(raw)]))
            .await?;
        parse_tx_hash(result)
    }

    /// `None` while the transaction is still pending
    pub async fn transaction_receipt(&self, hash: &TxHash) -> RpcResult<Option<TransactionReceipt>> {
        let result = self
            .call("eth_getTransactionReceipt", json!([hash.to_string()]))
            .await?;
        if result.is_null() {
            return Ok(None);
        }
        TransactionReceipt::from_json(&result).map(Some)
    }

    pub async fn transaction_count(&self, address: &Address, block: &str) -> RpcResult<u64> {
        let result = self
            .call("eth_getTransactionCount", json!([address.to_string(), block]))
            .await?;
        Ok(parse_quantity(&result)? as u64)
    }

    pub async fn chain_id(&self) -> RpcResult<u64> {
        let result = self.call("eth_chainId", json!([])).await?;
        Ok(parse_quantity(&result)? as u64)
    }

    pub async fn gas_price(&self) -> RpcResult<u128> {
        let result = self.call("eth_gasPrice", json!([])).await?;
        parse_quantity(&result)
    }

    pub async fn estimate_gas(&self, tx: &TxRequest) -> RpcResult<u64> {
        let result = self.call("eth_estimateGas", json!([tx.to_json()])).await?;
        Ok(parse_quantity(&result)? as u64)
    }

    /// Timestamp of the latest block
    pub async fn latest_block_timestamp(&self) -> RpcResult<u64> {
        let block = self
            .call("eth_getBlockByNumber", json!(["latest", false]))
            .await?;
        let timestamp = block
            .get("timestamp")
            .ok_or_else(|| RpcError::Decode("block without timestamp".to_string()))?;
        Ok(parse_quantity(timestamp)? as u64)
    }
}

fn parse_accounts(result: Value) -> RpcResult<Vec<Address>> {
    let list = result
        .as_array()
        .ok_or_else(|| RpcError::Decode(format!("expected account list, got {}", result)))?;
    list.iter()
        .map(|v| {
            v.as_str()
                .ok_or_else(|| RpcError::Decode(format!("expected address, got {}", v)))?
                .parse()
                .map_err(|e| RpcError::Decode(format!("account: {}", e)))
        })
        .collect()
}
