use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ethers::types::{Address, TxHash};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::api::validation::{describe, Validate, Validator};
use crate::application::services::wallet_session::signer_address;
use crate::domain::errors::ContractError;
use crate::domain::models::{
    Certificate, Confirmation, DashboardStats, IssueCertificateRequest, RegisterStudentRequest,
    Student, TransactionResult, UpdatePasswordRequest, WalletSnapshot,
};
use crate::domain::notifications::{short_hex, Notifier};
use crate::infrastructure::contracts::registry::{CertificateRegistry, RegistryCall};

const CERTIFICATE_NOT_FOUND: &str = "Certificate not found on blockchain";

/// Loading and last-error flags, as a UI would bind them.
#[derive(Debug, Default)]
struct CallState {
    in_flight: AtomicUsize,
    last_error: Mutex<Option<String>>,
}

struct LoadingGuard<'a> {
    state: &'a CallState,
}

impl CallState {
    fn begin(&self) -> LoadingGuard<'_> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        *self.last_error.lock().unwrap_or_else(|e| e.into_inner()) = None;
        LoadingGuard { state: self }
    }

    fn record_error(&self, err: &ContractError) {
        *self.last_error.lock().unwrap_or_else(|e| e.into_inner()) = Some(err.to_string());
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.state.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Typed access to the certificate registry for the UI.
///
/// Nothing here returns a raw provider error: writes resolve to a
/// `TransactionResult`, reads to a value, an empty default, or a classified
/// `ContractError`. Writes sign with the account of the wallet session.
pub struct CertificateService<R: CertificateRegistry> {
    registry: Arc<R>,
    session: watch::Receiver<WalletSnapshot>,
    notifier: Notifier,
    write_timeout: Option<Duration>,
    expected_chain_id: Option<u64>,
    call_state: CallState,
}

impl<R: CertificateRegistry> CertificateService<R> {
    pub fn new(registry: Arc<R>, session: watch::Receiver<WalletSnapshot>, notifier: Notifier) -> Self {
        Self {
            registry,
            session,
            notifier,
            write_timeout: None,
            expected_chain_id: None,
            call_state: CallState::default(),
        }
    }

    /// Bounds the wait for on-chain confirmation of writes.
    pub fn with_write_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn with_expected_chain(mut self, chain_id: Option<u64>) -> Self {
        self.expected_chain_id = chain_id;
        self
    }

    pub fn registry(&self) -> &Arc<R> {
        &self.registry
    }

    pub fn is_loading(&self) -> bool {
        self.call_state.in_flight.load(Ordering::SeqCst) > 0
    }

    pub fn last_error(&self) -> Option<String> {
        self.call_state
            .last_error
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    // ============ READ OPERATIONS ============

    /// `false` both for unknown hashes and for failed reads.
    pub async fn verify_certificate(&self, certificate_hash: &str) -> bool {
        self.try_verify_certificate(certificate_hash).await.unwrap_or(false)
    }

    /// Like `verify_certificate`, but keeps a failed read apart from absence.
    pub async fn try_verify_certificate(&self, certificate_hash: &str) -> Result<bool, ContractError> {
        let _loading = self.call_state.begin();
        self.registry
            .verify_certificate(certificate_hash)
            .await
            .map_err(|e| self.read_failed("verifyCertificate", e))
    }

    /// Confirms existence first, then fetches the record.
    pub async fn get_certificate(&self, certificate_hash: &str) -> Result<Certificate, ContractError> {
        let _loading = self.call_state.begin();

        let exists = self
            .registry
            .verify_certificate(certificate_hash)
            .await
            .map_err(|e| self.read_failed("verifyCertificate", e))?;
        if !exists {
            return Err(ContractError::NotFound(CERTIFICATE_NOT_FOUND.to_string()));
        }

        self.registry
            .get_certificate(certificate_hash)
            .await
            .map_err(|e| self.read_failed("getCertificate", e))
    }

    /// `None` both for unregistered students and for failed reads.
    pub async fn get_student(&self, enrollment_number: &str) -> Option<Student> {
        self.try_get_student(enrollment_number).await.ok().flatten()
    }

    pub async fn try_get_student(&self, enrollment_number: &str) -> Result<Option<Student>, ContractError> {
        let _loading = self.call_state.begin();
        let student = self
            .registry
            .get_student(enrollment_number)
            .await
            .map_err(|e| self.read_failed("getStudent", e))?;

        Ok(student.is_registered.then_some(student))
    }

    /// Every certificate, fetched one by one. Records that fail to load are skipped.
    pub async fn get_all_certificates(&self) -> Vec<Certificate> {
        let _loading = self.call_state.begin();
        let hashes = match self.registry.certificate_hashes().await {
            Ok(hashes) => hashes,
            Err(e) => {
                self.read_failed("getAllCertificateHashes", e);
                return Vec::new();
            }
        };

        self.collect_certificates(hashes).await
    }

    /// Every registered student, fetched one by one.
    pub async fn get_all_students(&self) -> Vec<Student> {
        let _loading = self.call_state.begin();
        let enrollment_numbers = match self.registry.enrollment_numbers().await {
            Ok(numbers) => numbers,
            Err(e) => {
                self.read_failed("getAllEnrollmentNumbers", e);
                return Vec::new();
            }
        };

        let mut students = Vec::with_capacity(enrollment_numbers.len());
        for enrollment_number in enrollment_numbers {
            match self.registry.get_student(&enrollment_number).await {
                Ok(student) if student.is_registered => students.push(student),
                Ok(_) => {}
                Err(e) => warn!("Skipping student {}: {}", enrollment_number, e),
            }
        }
        students
    }

    /// Certificates owned by one student
    pub async fn get_student_certificates(&self, enrollment_number: &str) -> Vec<Certificate> {
        let _loading = self.call_state.begin();
        let hashes = match self.registry.student_certificate_hashes(enrollment_number).await {
            Ok(hashes) => hashes,
            Err(e) => {
                self.read_failed("getStudentCertificates", e);
                return Vec::new();
            }
        };

        self.collect_certificates(hashes).await
    }

    /// Both totals, or zero for both if either read fails.
    pub async fn get_stats(&self) -> DashboardStats {
        let _loading = self.call_state.begin();
        let (certificates, students) = tokio::join!(
            self.registry.total_certificates(),
            self.registry.total_students()
        );

        match (certificates, students) {
            (Ok(total_certificates), Ok(total_students)) => DashboardStats {
                total_certificates,
                total_students,
            },
            (Err(e), _) | (_, Err(e)) => {
                self.read_failed("stats", e);
                DashboardStats::default()
            }
        }
    }

    pub async fn get_admin(&self) -> Option<String> {
        let _loading = self.call_state.begin();
        match self.registry.admin().await {
            Ok(admin) => Some(format!("{:?}", admin)),
            Err(e) => {
                self.read_failed("admin", e);
                None
            }
        }
    }

    /// Whether the connected account is the registry admin
    pub async fn is_connected_admin(&self) -> bool {
        let Some(connected) = self.session.borrow().address().map(str::to_string) else {
            return false;
        };
        self.get_admin().await.map_or(false, |admin| admin == connected)
    }

    async fn collect_certificates(&self, hashes: Vec<String>) -> Vec<Certificate> {
        let mut certificates = Vec::with_capacity(hashes.len());
        for hash in hashes {
            match self.registry.get_certificate(&hash).await {
                Ok(certificate) => certificates.push(certificate),
                Err(e) => warn!("Skipping certificate {}: {}", hash, e),
            }
        }
        certificates
    }

    fn read_failed(&self, operation: &str, err: ContractError) -> ContractError {
        self.call_state.record_error(&err);
        match &err {
            ContractError::ProviderUnavailable => {
                warn!("{}: no wallet provider", operation);
                self.notifier.error(
                    "Wallet Not Found",
                    Some("A browser wallet is required to reach the blockchain".to_string()),
                );
            }
            other => {
                error!("{} failed: {}", operation, other);
                self.notifier.error("Blockchain Read Failed", Some(other.to_string()));
            }
        }
        err
    }

    // ============ WRITE OPERATIONS ============

    pub async fn register_student(&self, request: RegisterStudentRequest) -> TransactionResult {
        match request.validate() {
            Ok(()) => self.execute(RegistryCall::RegisterStudent(request)).await,
            Err(errors) => self.reject_input(ContractError::InvalidRequest(describe(&errors))),
        }
    }

    pub async fn issue_certificate(&self, request: IssueCertificateRequest) -> TransactionResult {
        match request.validate() {
            Ok(()) => self.execute(RegistryCall::IssueCertificate(request)).await,
            Err(errors) => self.reject_input(ContractError::InvalidRequest(describe(&errors))),
        }
    }

    pub async fn revoke_certificate(&self, certificate_hash: &str) -> TransactionResult {
        match Validator::required(certificate_hash, "certificateHash", 128) {
            Ok(()) => {
                self.execute(RegistryCall::RevokeCertificate {
                    certificate_hash: certificate_hash.to_string(),
                })
                .await
            }
            Err(e) => self.reject_input(ContractError::InvalidRequest(e.to_string())),
        }
    }

    pub async fn update_password(&self, request: UpdatePasswordRequest) -> TransactionResult {
        match request.validate() {
            Ok(()) => self.execute(RegistryCall::UpdatePassword(request)).await,
            Err(errors) => self.reject_input(ContractError::InvalidRequest(describe(&errors))),
        }
    }

    pub async fn transfer_admin(&self, new_admin: &str) -> TransactionResult {
        match Validator::ethereum_address(new_admin, "newAdmin") {
            Ok(new_admin) => self.execute(RegistryCall::TransferAdmin { new_admin }).await,
            Err(e) => self.reject_input(ContractError::InvalidAddress(format!("{} ({})", new_admin, e.message))),
        }
    }

    /// Input refused before any wallet prompt
    fn reject_input(&self, err: ContractError) -> TransactionResult {
        warn!("Write refused: {}", err);
        self.call_state.record_error(&err);
        self.notify_write_failure(&err);
        TransactionResult::from(&err)
    }

    async fn execute(&self, call: RegistryCall) -> TransactionResult {
        let _loading = self.call_state.begin();

        match self.submit_and_confirm(&call).await {
            Ok(confirmation) => {
                info!(
                    "{} confirmed: {} in block {}",
                    call.label(),
                    confirmation.transaction_hash,
                    confirmation.block_number
                );
                self.notifier.success(
                    "Transaction Confirmed",
                    Some(format!("{} confirmed in block {}", call.label(), confirmation.block_number)),
                );
                confirmation.into()
            }
            Err(err) => {
                self.call_state.record_error(&err);
                self.notify_write_failure(&err);
                TransactionResult::from(&err)
            }
        }
    }

    async fn submit_and_confirm(&self, call: &RegistryCall) -> Result<Confirmation, ContractError> {
        if !self.registry.is_available() {
            return Err(ContractError::ProviderUnavailable);
        }

        let snapshot = self.session.borrow().clone();
        let from = signer_address(&snapshot)?;
        if let (Some(expected), Some(actual)) = (self.expected_chain_id, snapshot.chain_id()) {
            if expected != actual {
                warn!("Submitting {} on chain {} (registry expects {})", call.method_name(), actual, expected);
            }
        }

        self.notifier.info(
            "Awaiting Wallet Confirmation...",
            Some("Please confirm the transaction in your wallet".to_string()),
        );

        let tx_hash = self.registry.submit(from, call).await?;
        self.notifier.info(
            "Transaction Submitted",
            Some(format!("Hash: {}", short_hex(&format!("{:?}", tx_hash)))),
        );

        self.confirm(tx_hash).await
    }

    async fn confirm(&self, tx_hash: TxHash) -> Result<Confirmation, ContractError> {
        match self.write_timeout {
            Some(limit) => tokio::time::timeout(limit, self.registry.wait_for_confirmation(tx_hash))
                .await
                .map_err(|_| ContractError::Timeout(limit.as_secs()))?,
            None => self.registry.wait_for_confirmation(tx_hash).await,
        }
    }

    fn notify_write_failure(&self, err: &ContractError) {
        if err.is_user_rejection() {
            info!("Transaction rejected by user");
            self.notifier.info(
                "Transaction Rejected",
                Some("You rejected the transaction in your wallet".to_string()),
            );
        } else {
            error!("Transaction failed: {}", err);
            self.notifier.error("Transaction Failed", Some(err.to_string()));
        }
    }
}
