//! ABI encoding for the faucet and token contract methods.
//!
//! Calldata is the 4-byte selector (first bytes of the keccak-256 hash of the
//! canonical signature) followed by the ABI-encoded arguments.

use ethabi::{ParamType, Token, Uint};
use faucet_common::{Address, Amount};

/// Selector of the `Error(string)` revert payload
pub const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

/// Calculate function selector (first 4 bytes of signature hash)
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak_hash::keccak(signature.as_bytes());
    let mut selector = [0u8; 4];
    selector.copy_from_slice(&hash.0[0..4]);
    selector
}

/// Every contract method the gateway may depend on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractCall {
    // token
    BalanceOf(Address),
    Decimals,
    // faucet
    RequestTokens,
    CanClaim(Address),
    RemainingAllowance(Address),
    IsPaused,
    LastClaimAt(Address),
    TotalClaimed(Address),
    SetPaused(bool),
}

impl ContractCall {
    const ALL_SIGNATURES: [&'static str; 9] = [
        "balanceOf(address)",
        "decimals()",
        "requestTokens()",
        "canClaim(address)",
        "remainingAllowance(address)",
        "isPaused()",
        "lastClaimAt(address)",
        "totalClaimed(address)",
        "setPaused(bool)",
    ];

    pub fn signature(&self) -> &'static str {
        match self {
            ContractCall::BalanceOf(_) => "balanceOf(address)",
            ContractCall::Decimals => "decimals()",
            ContractCall::RequestTokens => "requestTokens()",
            ContractCall::CanClaim(_) => "canClaim(address)",
            ContractCall::RemainingAllowance(_) => "remainingAllowance(address)",
            ContractCall::IsPaused => "isPaused()",
            ContractCall::LastClaimAt(_) => "lastClaimAt(address)",
            ContractCall::TotalClaimed(_) => "totalClaimed(address)",
            ContractCall::SetPaused(_) => "setPaused(bool)",
        }
    }

    /// Whether the call changes chain state
    pub fn mutates(&self) -> bool {
        matches!(self, ContractCall::RequestTokens | ContractCall::SetPaused(_))
    }

    /// Whether the call targets the token rather than the faucet
    pub fn is_token_call(&self) -> bool {
        matches!(self, ContractCall::BalanceOf(_) | ContractCall::Decimals)
    }

    fn args(&self) -> Vec<Token> {
        match self {
            ContractCall::BalanceOf(a)
            | ContractCall::CanClaim(a)
            | ContractCall::RemainingAllowance(a)
            | ContractCall::LastClaimAt(a)
            | ContractCall::TotalClaimed(a) => vec![Token::Address(to_abi_address(a))],
            ContractCall::SetPaused(paused) => vec![Token::Bool(*paused)],
            ContractCall::Decimals | ContractCall::RequestTokens | ContractCall::IsPaused => vec![],
        }
    }

    /// Encode as transaction / `eth_call` input data
    pub fn encode(&self) -> Vec<u8> {
        let mut data = selector(self.signature()).to_vec();
        data.extend_from_slice(&ethabi::encode(&self.args()));
        data
    }

    /// Decode input data back into a call; `None` for unknown selectors
    /// or malformed arguments.
    pub fn decode(data: &[u8]) -> Option<Self> {
        if data.len() < 4 {
            return None;
        }
        let (sel, rest) = data.split_at(4);
        let signature = Self::ALL_SIGNATURES
            .iter()
            .find(|sig| selector(sig) == sel)?;

        let address_arg = || -> Option<Address> {
            match ethabi::decode(&[ParamType::Address], rest).ok()?.pop()? {
                Token::Address(a) => Some(Address(a.0)),
                _ => None,
            }
        };

        let call = match *signature {
            "balanceOf(address)" => ContractCall::BalanceOf(address_arg()?),
            "decimals()" => ContractCall::Decimals,
            "requestTokens()" => ContractCall::RequestTokens,
            "canClaim(address)" => ContractCall::CanClaim(address_arg()?),
            "remainingAllowance(address)" => ContractCall::RemainingAllowance(address_arg()?),
            "isPaused()" => ContractCall::IsPaused,
            "lastClaimAt(address)" => ContractCall::LastClaimAt(address_arg()?),
            "totalClaimed(address)" => ContractCall::TotalClaimed(address_arg()?),
            "setPaused(bool)" => match ethabi::decode(&[ParamType::Bool], rest).ok()?.pop()? {
                Token::Bool(b) => ContractCall::SetPaused(b),
                _ => return None,
            },
            _ => return None,
        };
        Some(call)
    }
}

fn to_abi_address(address: &Address) -> ethabi::Address {
    ethabi::Address::from(address.0)
}

/// Decode a `bool` return value
pub fn decode_bool(data: &[u8]) -> Result<bool, String> {
    match ethabi::decode(&[ParamType::Bool], data)
        .map_err(|e| format!("Invalid bool return data: {}", e))?
        .pop()
    {
        Some(Token::Bool(b)) => Ok(b),
        other => Err(format!("Unexpected return value: {:?}", other)),
    }
}

/// Decode a `uint256` return value into base units.
///
/// Empty return data decodes as zero: calls against an address without code
/// succeed with no output.
pub fn decode_uint(data: &[u8]) -> Result<Amount, String> {
    if data.is_empty() {
        return Ok(0);
    }
    match ethabi::decode(&[ParamType::Uint(256)], data)
        .map_err(|e| format!("Invalid uint return data: {}", e))?
        .pop()
    {
        Some(Token::Uint(value)) => uint_to_amount(value),
        other => Err(format!("Unexpected return value: {:?}", other)),
    }
}

fn uint_to_amount(value: Uint) -> Result<Amount, String> {
    if value.bits() > 128 {
        return Err(format!("Value {} does not fit in 128 bits", value));
    }
    Ok(value.low_u128())
}

pub fn encode_bool(value: bool) -> Vec<u8> {
    ethabi::encode(&[Token::Bool(value)])
}

pub fn encode_uint(value: Amount) -> Vec<u8> {
    ethabi::encode(&[Token::Uint(Uint::from(value))])
}

/// Build the standard `Error(string)` revert payload
pub fn encode_revert(reason: &str) -> Vec<u8> {
    let mut data = ERROR_STRING_SELECTOR.to_vec();
    data.extend_from_slice(&ethabi::encode(&[Token::String(reason.to_string())]));
    data
}

/// Decode an `Error(string)` revert payload
pub fn decode_revert(data: &[u8]) -> Option<String> {
    if data.len() < 4 || data[..4] != ERROR_STRING_SELECTOR {
        return None;
    }
    match ethabi::decode(&[ParamType::String], &data[4..]).ok()?.pop()? {
        Token::String(reason) => Some(reason),
        _ => None,
    }
}

/// Pull a revert string out of a node's error message.
///
/// Handles geth style `execution reverted: <reason>` and hardhat style
/// `reverted with reason string '<reason>'`.
pub fn extract_revert_message(message: &str) -> Option<String> {
    const HARDHAT: &str = "reverted with reason string '";
    const GETH: &str = "execution reverted: ";

    if let Some(start) = message.find(HARDHAT) {
        let rest = &message[start + HARDHAT.len()..];
        let end = rest.find('\'').unwrap_or(rest.len());
        return Some(rest[..end].to_string());
    }
    if let Some(start) = message.find(GETH) {
        return Some(message[start + GETH.len()..].trim().to_string());
    }
    None
}

pub fn to_hex(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}

pub fn from_hex(s: &str) -> Result<Vec<u8>, String> {
    let stripped = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(stripped).map_err(|e| format!("Invalid hex {:?}: {}", s, e))
}
