use std::fmt;

use async_trait::async_trait;
use ethers::types::Address;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::domain::errors::is_rejection;

pub const ETH_REQUEST_ACCOUNTS: &str = "eth_requestAccounts";
pub const ETH_ACCOUNTS: &str = "eth_accounts";
pub const ETH_CHAIN_ID: &str = "eth_chainId";
pub const WALLET_REQUEST_PERMISSIONS: &str = "wallet_requestPermissions";

/// Error object returned by an EIP-1193 `request` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("provider error {code}: {message}")]
pub struct ProviderRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ProviderRpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn is_user_rejection(&self) -> bool {
        is_rejection(self.code, &self.message)
    }
}

/// Events pushed by the wallet outside of any request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    AccountsChanged(Vec<String>),
    /// Hex-encoded chain id, as the wallet reports it
    ChainChanged(String),
}

/// An injected wallet: JSON-RPC style requests plus account/network events.
///
/// Dropping the receiver returned by `subscribe` releases the listener.
#[async_trait]
pub trait WalletProvider: fmt::Debug + Send + Sync + 'static {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderRpcError>;

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent>;
}

/// Parses the chain id a wallet reports (`"0x1"`); decimal strings are tolerated.
pub fn parse_chain_id(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => raw.parse::<u64>().ok(),
    };
    parsed.filter(|id| *id > 0)
}

pub fn parse_chain_id_value(value: &Value) -> Option<u64> {
    match value {
        Value::String(raw) => parse_chain_id(raw),
        Value::Number(number) => number.as_u64().filter(|id| *id > 0),
        _ => None,
    }
}

/// Lowercase `0x` form of a wallet account, or `None` if it is not a hex address.
pub fn normalize_account(raw: &str) -> Option<String> {
    let digits = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X"))?;
    if digits.len() != 40 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    format!("0x{}", digits)
        .parse::<Address>()
        .ok()
        .map(|address| format!("{:?}", address))
}

/// Extracts the account list from an `eth_accounts`-style response.
pub fn parse_accounts(value: Value) -> Result<Vec<String>, ProviderRpcError> {
    let raw = serde_json::from_value::<Vec<String>>(value)
        .map_err(|e| ProviderRpcError::new(-32603, format!("Malformed accounts response: {}", e)))?;

    raw.iter()
        .map(|account| {
            normalize_account(account)
                .ok_or_else(|| ProviderRpcError::new(-32603, format!("Malformed account address: {:?}", account)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_chain_id() {
        assert_eq!(parse_chain_id("0x1"), Some(1));
        assert_eq!(parse_chain_id("0x7a69"), Some(31337));
        assert_eq!(parse_chain_id("11155111"), Some(11155111));
        assert_eq!(parse_chain_id("0x0"), None);
        assert_eq!(parse_chain_id("mainnet"), None);
        assert_eq!(parse_chain_id_value(&json!(137)), Some(137));
    }

    #[test]
    fn test_parse_accounts_lowercases() {
        let accounts = parse_accounts(json!(["0xF39Fd6e51aad88F6F4ce6aB8827279cffFb92266"])).unwrap();
        assert_eq!(accounts, vec!["0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266".to_string()]);
        assert!(parse_accounts(json!({"accounts": []})).is_err());
    }

    #[test]
    fn test_malformed_accounts_are_rejected() {
        assert_eq!(normalize_account("0x123é4567890abcdef"), None);
        assert_eq!(normalize_account("f39fd6e51aad88f6f4ce6ab8827279cfffb92266"), None);
        assert_eq!(normalize_account("0xg39fd6e51aad88f6f4ce6ab8827279cfffb92266"), None);
        assert_eq!(
            normalize_account("0X70997970C51812dc3A010C7d01b50e0d17dc79C8").as_deref(),
            Some("0x70997970c51812dc3a010c7d01b50e0d17dc79c8")
        );

        let err = parse_accounts(json!(["0xF39Fd6e51aad88F6F4ce6aB8827279cffFb92266", "not-an-account"])).unwrap_err();
        assert!(err.message.contains("not-an-account"));
        assert!(!err.is_user_rejection());
    }

    #[test]
    fn test_rejection_code() {
        assert!(ProviderRpcError::new(4001, "User rejected the request.").is_user_rejection());
        assert!(!ProviderRpcError::new(-32002, "Request already pending").is_user_rejection());
    }
}
