use ethers::{
    contract::{Contract, ContractError as EthersContractError},
    providers::{Middleware, PendingTransaction, Provider, ProviderError, RpcError},
    types::{Address, TxHash, U256},
};
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use tracing::debug;

use crate::config::RegistryConfig;
use crate::domain::errors::{is_rejection, ContractError};
use crate::domain::models::{Certificate, Confirmation, Student};
use crate::infrastructure::contracts::abis;
use crate::infrastructure::contracts::registry::{CertificateRegistry, RegistryCall};
use crate::infrastructure::wallet::{Eip1193Client, WalletProvider};

type WalletMiddleware<P> = Provider<Eip1193Client<P>>;

type CertificateTuple = (String, String, String, String, U256, Address, U256, String, String, bool);
type StudentTuple = (String, String, String, String, bool, U256);

struct Connection<P: WalletProvider> {
    provider: Arc<WalletMiddleware<P>>,
    registry: Contract<WalletMiddleware<P>>,
}

/// Certificate registry reached through the injected wallet.
///
/// Without a provider every operation fails with `ProviderUnavailable`.
pub struct EthersCertificateRegistry<P: WalletProvider> {
    connection: Option<Connection<P>>,
    contract_address: Address,
    confirmations: usize,
    poll_interval: Duration,
}

impl<P: WalletProvider> EthersCertificateRegistry<P> {
    pub fn new(wallet: Option<Arc<P>>, config: &RegistryConfig) -> Result<Self, ContractError> {
        let connection = match wallet {
            Some(wallet) => {
                // Load ABI
                let abi = match &config.abi_path {
                    Some(path) => abis::load_abi(path)?,
                    None => abis::load_certificate_registry_abi()?,
                };

                let provider = Provider::new(Eip1193Client::new(wallet)).interval(config.poll_interval);
                let provider = Arc::new(provider);
                let registry = Contract::new(config.contract_address, abi, provider.clone());

                Some(Connection { provider, registry })
            }
            None => None,
        };

        Ok(Self {
            connection,
            contract_address: config.contract_address,
            confirmations: config.confirmations,
            poll_interval: config.poll_interval,
        })
    }

    pub fn contract_address(&self) -> Address {
        self.contract_address
    }

    fn connection(&self) -> Result<&Connection<P>, ContractError> {
        self.connection.as_ref().ok_or(ContractError::ProviderUnavailable)
    }

    fn registry(&self) -> Result<&Contract<WalletMiddleware<P>>, ContractError> {
        Ok(&self.connection()?.registry)
    }
}

#[async_trait]
impl<P: WalletProvider> CertificateRegistry for EthersCertificateRegistry<P> {
    fn is_available(&self) -> bool {
        self.connection.is_some()
    }

    async fn admin(&self) -> Result<Address, ContractError> {
        self.registry()?
            .method::<_, Address>("admin", ())?
            .call()
            .await
            .map_err(classify_contract_error)
    }

    async fn verify_certificate(&self, certificate_hash: &str) -> Result<bool, ContractError> {
        self.registry()?
            .method::<_, bool>("verifyCertificate", certificate_hash.to_string())?
            .call()
            .await
            .map_err(classify_contract_error)
    }

    async fn get_certificate(&self, certificate_hash: &str) -> Result<Certificate, ContractError> {
        let (
            enrollment_number,
            student_name,
            course,
            grade,
            year,
            issuer,
            issued_at,
            pdf_hash,
            photo_hash,
            is_valid,
        ) = self
            .registry()?
            .method::<_, CertificateTuple>("getCertificate", certificate_hash.to_string())?
            .call()
            .await
            .map_err(classify_contract_error)?;

        Ok(Certificate {
            certificate_hash: certificate_hash.to_string(),
            enrollment_number,
            student_name,
            course,
            grade,
            year: saturating_u64(year),
            issuer: format!("{:?}", issuer),
            issued_at: saturating_u64(issued_at),
            pdf_hash,
            photo_hash,
            is_valid,
        })
    }

    async fn get_student(&self, enrollment_number: &str) -> Result<Student, ContractError> {
        let (name, email, phone, photo_hash, is_registered, registered_at) = self
            .registry()?
            .method::<_, StudentTuple>("getStudent", enrollment_number.to_string())?
            .call()
            .await
            .map_err(classify_contract_error)?;

        Ok(Student {
            enrollment_number: enrollment_number.to_string(),
            name,
            email,
            phone,
            photo_hash,
            is_registered,
            registered_at: saturating_u64(registered_at),
        })
    }

    async fn certificate_hashes(&self) -> Result<Vec<String>, ContractError> {
        self.registry()?
            .method::<_, Vec<String>>("getAllCertificateHashes", ())?
            .call()
            .await
            .map_err(classify_contract_error)
    }

    async fn enrollment_numbers(&self) -> Result<Vec<String>, ContractError> {
        self.registry()?
            .method::<_, Vec<String>>("getAllEnrollmentNumbers", ())?
            .call()
            .await
            .map_err(classify_contract_error)
    }

    async fn student_certificate_hashes(&self, enrollment_number: &str) -> Result<Vec<String>, ContractError> {
        self.registry()?
            .method::<_, Vec<String>>("getStudentCertificates", enrollment_number.to_string())?
            .call()
            .await
            .map_err(classify_contract_error)
    }

    async fn total_certificates(&self) -> Result<u64, ContractError> {
        let total = self
            .registry()?
            .method::<_, U256>("getTotalCertificates", ())?
            .call()
            .await
            .map_err(classify_contract_error)?;
        Ok(saturating_u64(total))
    }

    async fn total_students(&self) -> Result<u64, ContractError> {
        let total = self
            .registry()?
            .method::<_, U256>("getTotalStudents", ())?
            .call()
            .await
            .map_err(classify_contract_error)?;
        Ok(saturating_u64(total))
    }

    async fn submit(&self, from: Address, call: &RegistryCall) -> Result<TxHash, ContractError> {
        let tokens = call.tokens();
        let contract_call = self
            .registry()?
            .method::<_, ()>(call.method_name(), tokens.as_slice())?
            .from(from);

        // Send transaction; the wallet prompts the user here
        let pending_tx = contract_call
            .send()
            .await
            .map_err(classify_contract_error)?;

        let tx_hash = *pending_tx;
        debug!("{} submitted: {:?}", call.method_name(), tx_hash);
        Ok(tx_hash)
    }

    async fn wait_for_confirmation(&self, tx_hash: TxHash) -> Result<Confirmation, ContractError> {
        let provider = &self.connection()?.provider;

        // Wait for transaction receipt
        let receipt = PendingTransaction::new(tx_hash, provider.as_ref())
            .interval(self.poll_interval)
            .confirmations(self.confirmations)
            .await
            .map_err(|e| classify_provider_error(&e))?
            .ok_or_else(|| ContractError::TransactionError("No transaction receipt".to_string()))?;

        // Check if transaction was successful
        if let Some(status) = receipt.status {
            if status.as_u64() == 0 {
                return Err(ContractError::TransactionError("Transaction reverted".to_string()));
            }
        }

        Ok(Confirmation {
            transaction_hash: format!("{:?}", receipt.transaction_hash),
            block_number: receipt.block_number.unwrap_or_default().as_u64(),
        })
    }
}

fn saturating_u64(value: U256) -> u64 {
    if value > U256::from(u64::MAX) {
        u64::MAX
    } else {
        value.as_u64()
    }
}

/// Maps an ethers contract error onto the crate's taxonomy.
pub fn classify_contract_error<M: Middleware>(err: EthersContractError<M>) -> ContractError {
    if let Some(provider_error) = err.as_provider_error() {
        return classify_provider_error(provider_error);
    }

    let message = err.to_string();
    if is_rejection(0, &message) {
        ContractError::UserRejected
    } else {
        ContractError::ContractCallError(message)
    }
}

pub fn classify_provider_error(err: &ProviderError) -> ContractError {
    match err.as_error_response() {
        Some(response) if is_rejection(response.code, &response.message) => ContractError::UserRejected,
        Some(response) => ContractError::RpcError(response.message.clone()),
        None => {
            let message = err.to_string();
            if is_rejection(0, &message) {
                ContractError::UserRejected
            } else {
                ContractError::RpcError(message)
            }
        }
    }
}
