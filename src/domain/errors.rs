use serde::{Deserialize, Serialize};

/// EIP-1193 code a wallet returns when the user dismisses a prompt.
pub const USER_REJECTED_CODE: i64 = 4001;

/// Code string ethers-style signers use for the same situation.
pub const ACTION_REJECTED: &str = "ACTION_REJECTED";

/// Coarse classification surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ProviderUnavailable,
    UserRejected,
    OperationFailed,
    NotFound,
}

/// Wallet session errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalletError {
    #[error("No wallet provider detected")]
    ProviderUnavailable,

    #[error("User rejected the wallet request")]
    UserRejected,

    #[error("Wallet connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Wallet is not connected")]
    NotConnected,

    #[error("Connection attempt was superseded")]
    Superseded,
}

impl WalletError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WalletError::ProviderUnavailable => ErrorKind::ProviderUnavailable,
            WalletError::UserRejected => ErrorKind::UserRejected,
            WalletError::ConnectionFailed(_) | WalletError::NotConnected | WalletError::Superseded => {
                ErrorKind::OperationFailed
            }
        }
    }
}

/// Contract interaction errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContractError {
    #[error("No wallet provider detected")]
    ProviderUnavailable,

    #[error("User rejected the transaction")]
    UserRejected,

    #[error("Wallet is not connected")]
    WalletNotConnected,

    #[error("{0}")]
    NotFound(String),

    #[error("RPC error: {0}")]
    RpcError(String),

    #[error("Contract call failed: {0}")]
    ContractCallError(String),

    #[error("Transaction failed: {0}")]
    TransactionError(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("ABI error: {0}")]
    AbiError(String),

    #[error("Timed out after {0}s waiting for confirmation")]
    Timeout(u64),
}

impl ContractError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ContractError::ProviderUnavailable => ErrorKind::ProviderUnavailable,
            ContractError::UserRejected => ErrorKind::UserRejected,
            ContractError::NotFound(_) => ErrorKind::NotFound,
            _ => ErrorKind::OperationFailed,
        }
    }

    pub fn is_user_rejection(&self) -> bool {
        self.kind() == ErrorKind::UserRejected
    }
}

impl From<ethers::contract::AbiError> for ContractError {
    fn from(err: ethers::contract::AbiError) -> Self {
        ContractError::AbiError(err.to_string())
    }
}

impl From<WalletError> for ContractError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::ProviderUnavailable => ContractError::ProviderUnavailable,
            WalletError::UserRejected => ContractError::UserRejected,
            WalletError::NotConnected | WalletError::Superseded => ContractError::WalletNotConnected,
            WalletError::ConnectionFailed(reason) => ContractError::RpcError(reason),
        }
    }
}

/// True when a provider error code or message means the user said no.
pub fn is_rejection(code: i64, message: &str) -> bool {
    code == USER_REJECTED_CODE
        || message.contains(ACTION_REJECTED)
        || message.to_ascii_lowercase().contains("user rejected")
        || message.to_ascii_lowercase().contains("user denied")
}
