use std::env;
use std::time::Duration;

use ethers::types::Address;
use tracing::warn;

use crate::domain::errors::ContractError;

/// Default registry deployment
pub const DEFAULT_CONTRACT_ADDRESS: &str = "0xd9145CCE52D386f254917e481eB44e9943F39138";
pub const DEFAULT_RPC_URL: &str = "http://localhost:8545";
const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub contract_address: Address,
    /// Only used when a node stands in for the browser wallet
    pub rpc_url: String,
    pub expected_chain_id: Option<u64>,
    pub confirmations: usize,
    pub poll_interval: Duration,
    /// Bounds the wait for write confirmation; reads are never timed out
    pub write_timeout: Option<Duration>,
    pub abi_path: Option<String>,
}

impl RegistryConfig {
    /// Loads `.env` if present, then reads the process environment.
    pub fn load() -> Result<Self, ContractError> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    pub fn from_env() -> Result<Self, ContractError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ContractError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let contract_address = lookup("CERTCHAIN_CONTRACT_ADDRESS")
            .unwrap_or_else(|| DEFAULT_CONTRACT_ADDRESS.to_string())
            .parse::<Address>()
            .map_err(|e| ContractError::InvalidAddress(e.to_string()))?;

        let rpc_url = lookup("CERTCHAIN_RPC_URL").unwrap_or_else(|| DEFAULT_RPC_URL.to_string());

        let expected_chain_id = lookup("CERTCHAIN_CHAIN_ID")
            .map(|raw| parse_number("CERTCHAIN_CHAIN_ID", &raw))
            .transpose()?;

        let confirmations = lookup("CERTCHAIN_CONFIRMATIONS")
            .map(|raw| parse_number("CERTCHAIN_CONFIRMATIONS", &raw))
            .transpose()?
            .unwrap_or(1) as usize;

        let poll_interval = lookup("CERTCHAIN_POLL_INTERVAL_MS")
            .map(|raw| parse_number("CERTCHAIN_POLL_INTERVAL_MS", &raw))
            .transpose()?
            .unwrap_or(DEFAULT_POLL_INTERVAL_MS);

        let write_timeout = lookup("CERTCHAIN_WRITE_TIMEOUT_SECS")
            .map(|raw| parse_number("CERTCHAIN_WRITE_TIMEOUT_SECS", &raw))
            .transpose()?
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        Ok(Self {
            contract_address,
            rpc_url,
            expected_chain_id,
            confirmations,
            poll_interval: Duration::from_millis(poll_interval),
            write_timeout,
            abi_path: lookup("CERTCHAIN_ABI_PATH"),
        })
    }

    /// Logs a warning when the wallet sits on another network than configured.
    pub fn check_chain(&self, chain_id: Option<u64>) -> bool {
        match (self.expected_chain_id, chain_id) {
            (Some(expected), Some(actual)) if expected != actual => {
                warn!("Wallet is on chain {} but the registry is configured for chain {}", actual, expected);
                false
            }
            _ => true,
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            contract_address: DEFAULT_CONTRACT_ADDRESS.parse().unwrap_or_default(),
            rpc_url: DEFAULT_RPC_URL.to_string(),
            expected_chain_id: None,
            confirmations: 1,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            write_timeout: None,
            abi_path: None,
        }
    }
}

fn parse_number(key: &str, raw: &str) -> Result<u64, ContractError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|e| ContractError::ContractCallError(format!("Invalid {}: {}", key, e)))
}
