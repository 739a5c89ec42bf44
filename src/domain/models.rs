use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::{ContractError, ErrorKind};

// ============ WALLET SESSION ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Snapshot of the wallet session.
///
/// `address` is present exactly when the state is `Connected`; the
/// constructors are the only way to build one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletSnapshot {
    address: Option<String>,
    chain_id: Option<u64>,
    connection_state: ConnectionState,
}

impl WalletSnapshot {
    pub fn disconnected() -> Self {
        Self {
            address: None,
            chain_id: None,
            connection_state: ConnectionState::Disconnected,
        }
    }

    pub fn connecting() -> Self {
        Self {
            address: None,
            chain_id: None,
            connection_state: ConnectionState::Connecting,
        }
    }

    pub fn connected(address: &str, chain_id: Option<u64>) -> Self {
        Self {
            address: Some(address.to_ascii_lowercase()),
            chain_id,
            connection_state: ConnectionState::Connected,
        }
    }

    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    pub fn chain_id(&self) -> Option<u64> {
        self.chain_id
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection_state
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state == ConnectionState::Connected
    }

    pub fn is_connecting(&self) -> bool {
        self.connection_state == ConnectionState::Connecting
    }

    pub(crate) fn set_chain_id(&mut self, chain_id: u64) {
        self.chain_id = Some(chain_id);
    }

    pub(crate) fn set_address(&mut self, address: &str) {
        if self.is_connected() {
            self.address = Some(address.to_ascii_lowercase());
        }
    }
}

impl Default for WalletSnapshot {
    fn default() -> Self {
        Self::disconnected()
    }
}

// ============ CONTRACT RECORDS ============

/// Student record as stored by the registry contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub enrollment_number: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub photo_hash: String,
    pub is_registered: bool,
    pub registered_at: u64,
}

impl Student {
    pub fn registered_at_utc(&self) -> Option<DateTime<Utc>> {
        timestamp_to_utc(self.registered_at)
    }
}

/// Certificate record as stored by the registry contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    pub certificate_hash: String,
    pub enrollment_number: String,
    pub student_name: String,
    pub course: String,
    pub grade: String,
    pub year: u64,
    pub issuer: String,
    pub issued_at: u64,
    pub pdf_hash: String,
    pub photo_hash: String,
    pub is_valid: bool,
}

impl Certificate {
    pub fn issued_at_utc(&self) -> Option<DateTime<Utc>> {
        timestamp_to_utc(self.issued_at)
    }
}

fn timestamp_to_utc(seconds: u64) -> Option<DateTime<Utc>> {
    let seconds = i64::try_from(seconds).ok()?;
    Utc.timestamp_opt(seconds, 0).single()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_certificates: u64,
    pub total_students: u64,
}

/// On-chain confirmation of a submitted write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub transaction_hash: String,
    pub block_number: u64,
}

/// Outcome of a write operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum TransactionResult {
    #[serde(rename_all = "camelCase")]
    Confirmed {
        transaction_hash: String,
        block_number: u64,
    },
    Failed {
        kind: ErrorKind,
        error: String,
    },
}

impl TransactionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, TransactionResult::Confirmed { .. })
    }

    pub fn transaction_hash(&self) -> Option<&str> {
        match self {
            TransactionResult::Confirmed { transaction_hash, .. } => Some(transaction_hash),
            TransactionResult::Failed { .. } => None,
        }
    }

    pub fn block_number(&self) -> Option<u64> {
        match self {
            TransactionResult::Confirmed { block_number, .. } => Some(*block_number),
            TransactionResult::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            TransactionResult::Failed { error, .. } => Some(error),
            TransactionResult::Confirmed { .. } => None,
        }
    }
}

impl From<Confirmation> for TransactionResult {
    fn from(confirmation: Confirmation) -> Self {
        TransactionResult::Confirmed {
            transaction_hash: confirmation.transaction_hash,
            block_number: confirmation.block_number,
        }
    }
}

impl From<&ContractError> for TransactionResult {
    fn from(err: &ContractError) -> Self {
        TransactionResult::Failed {
            kind: err.kind(),
            error: err.to_string(),
        }
    }
}

// ============ WRITE REQUESTS ============

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterStudentRequest {
    pub enrollment_number: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub photo_hash: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueCertificateRequest {
    pub certificate_hash: String,
    pub enrollment_number: String,
    pub student_name: String,
    pub course: String,
    pub grade: String,
    pub year: u64,
    pub pdf_hash: String,
    pub photo_hash: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    pub enrollment_number: String,
    pub new_password_hash: String,
}
