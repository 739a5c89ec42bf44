use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ethers::types::{Address, TxHash, H256};
use serde_json::{json, Value};
use tokio::sync::{broadcast, Notify};

use crate::domain::errors::ContractError;
use crate::domain::models::{Certificate, Confirmation, Student};
use crate::domain::notifications::Notification;
use crate::infrastructure::contracts::registry::{CertificateRegistry, RegistryCall};
use crate::infrastructure::wallet::provider::{
    ProviderEvent, ProviderRpcError, WalletProvider, ETH_ACCOUNTS, ETH_CHAIN_ID,
    ETH_REQUEST_ACCOUNTS, WALLET_REQUEST_PERMISSIONS,
};

pub const ADMIN: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";
pub const OTHER_ACCOUNT: &str = "0x70997970c51812dc3a010c7d01b50e0d17dc79c8";

pub fn admin_address() -> Address {
    ADMIN.parse().unwrap()
}

/// Drains whatever notifications were emitted so far.
pub fn drain(rx: &mut broadcast::Receiver<Notification>) -> Vec<Notification> {
    let mut received = Vec::new();
    while let Ok(notification) = rx.try_recv() {
        received.push(notification);
    }
    received
}

// ============ WALLET PROVIDER DOUBLE ============

#[derive(Debug)]
pub struct MockWalletProvider {
    accounts: Vec<String>,
    chain_id: String,
    pre_authorized: bool,
    switch_to: Option<String>,
    reject_with: Option<ProviderRpcError>,
    gate: Option<Arc<Notify>>,
    prompt_outcomes: Mutex<VecDeque<Result<(), ProviderRpcError>>>,
    open_prompts: AtomicUsize,
    peak_prompts: AtomicUsize,
    calls: Mutex<Vec<String>>,
    events: broadcast::Sender<ProviderEvent>,
}

impl MockWalletProvider {
    pub fn new(account: &str) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            accounts: vec![account.to_string()],
            chain_id: "0x7a69".to_string(),
            pre_authorized: false,
            switch_to: None,
            reject_with: None,
            gate: None,
            prompt_outcomes: Mutex::new(VecDeque::new()),
            open_prompts: AtomicUsize::new(0),
            peak_prompts: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
            events,
        }
    }

    pub fn pre_authorized(mut self) -> Self {
        self.pre_authorized = true;
        self
    }

    pub fn with_chain(mut self, chain_id: &str) -> Self {
        self.chain_id = chain_id.to_string();
        self
    }

    pub fn switching_to(mut self, account: &str) -> Self {
        self.switch_to = Some(account.to_string());
        self
    }

    /// Prompts (`eth_requestAccounts`, `wallet_requestPermissions`) fail with this error.
    pub fn failing_prompts(mut self, err: ProviderRpcError) -> Self {
        self.reject_with = Some(err);
        self
    }

    /// Successive `eth_requestAccounts` calls settle with these outcomes, in order.
    pub fn prompt_outcomes(self, outcomes: Vec<Result<(), ProviderRpcError>>) -> Self {
        *self.prompt_outcomes.lock().unwrap() = outcomes.into();
        self
    }

    /// `eth_requestAccounts` waits until the gate is notified.
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn emit(&self, event: ProviderEvent) {
        let _ = self.events.send(event);
    }

    pub fn listener_count(&self) -> usize {
        self.events.receiver_count()
    }

    pub fn calls_to(&self, method: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|m| m.as_str() == method).count()
    }

    /// Most account prompts ever open at the same time
    pub fn peak_prompts(&self) -> usize {
        self.peak_prompts.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl WalletProvider for MockWalletProvider {
    async fn request(&self, method: &str, _params: Value) -> Result<Value, ProviderRpcError> {
        self.calls.lock().unwrap().push(method.to_string());

        match method {
            ETH_REQUEST_ACCOUNTS => {
                let open = self.open_prompts.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak_prompts.fetch_max(open, Ordering::SeqCst);
                if let Some(gate) = &self.gate {
                    gate.notified().await;
                }
                self.open_prompts.fetch_sub(1, Ordering::SeqCst);

                let scripted = self.prompt_outcomes.lock().unwrap().pop_front();
                if let Some(outcome) = scripted {
                    return outcome.map(|_| json!(self.accounts));
                }
                match &self.reject_with {
                    Some(err) => Err(err.clone()),
                    None => Ok(json!(self.accounts)),
                }
            }
            WALLET_REQUEST_PERMISSIONS => match &self.reject_with {
                Some(err) => Err(err.clone()),
                None => Ok(json!([{ "parentCapability": "eth_accounts" }])),
            },
            ETH_ACCOUNTS => {
                if let Some(account) = &self.switch_to {
                    if self.calls_to(WALLET_REQUEST_PERMISSIONS) > 0 {
                        return Ok(json!([account]));
                    }
                }
                if self.pre_authorized || self.calls_to(ETH_REQUEST_ACCOUNTS) > 0 {
                    Ok(json!(self.accounts))
                } else {
                    Ok(json!([]))
                }
            }
            ETH_CHAIN_ID => Ok(json!(self.chain_id)),
            other => Err(ProviderRpcError::new(-32601, format!("Method {} not supported", other))),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }
}

// ============ REGISTRY DOUBLE ============

#[derive(Default)]
struct LedgerState {
    admin: Address,
    students: HashMap<String, Student>,
    passwords: HashMap<String, String>,
    enrollment_order: Vec<String>,
    certificates: HashMap<String, Certificate>,
    certificate_order: Vec<String>,
    pending: HashMap<TxHash, (Address, RegistryCall)>,
    clock: u64,
}

/// Behaves like the deployed registry: admin-only writes, existence-based
/// `verifyCertificate`, default records for unknown students.
pub struct InMemoryRegistry {
    available: bool,
    state: Mutex<LedgerState>,
    failing_reads: Mutex<HashSet<String>>,
    reject_signing: bool,
    hang_confirmations: bool,
    next_tx: AtomicU64,
    next_block: AtomicU64,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self {
            available: true,
            state: Mutex::new(LedgerState {
                admin: admin_address(),
                clock: 1_700_000_000,
                ..LedgerState::default()
            }),
            failing_reads: Mutex::new(HashSet::new()),
            reject_signing: false,
            hang_confirmations: false,
            next_tx: AtomicU64::new(1),
            next_block: AtomicU64::new(100),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    pub fn rejecting_signatures(mut self) -> Self {
        self.reject_signing = true;
        self
    }

    pub fn hanging_confirmations(mut self) -> Self {
        self.hang_confirmations = true;
        self
    }

    /// Makes a read fail; keys are operation names, or `getCertificate:<hash>`.
    pub fn fail_read(&self, key: &str) {
        self.failing_reads.lock().unwrap().insert(key.to_string());
    }

    pub fn seed_certificate(&self, certificate: Certificate) {
        let mut state = self.state.lock().unwrap();
        state.certificate_order.push(certificate.certificate_hash.clone());
        state.certificates.insert(certificate.certificate_hash.clone(), certificate);
    }

    pub fn seed_enrollment_number(&self, enrollment_number: &str) {
        self.state.lock().unwrap().enrollment_order.push(enrollment_number.to_string());
    }

    pub fn password_of(&self, enrollment_number: &str) -> Option<String> {
        self.state.lock().unwrap().passwords.get(enrollment_number).cloned()
    }

    fn check(&self, key: &str) -> Result<(), ContractError> {
        if !self.available {
            return Err(ContractError::ProviderUnavailable);
        }
        if self.failing_reads.lock().unwrap().contains(key) {
            return Err(ContractError::RpcError(format!("{}: network unreachable", key)));
        }
        Ok(())
    }

    fn apply(&self, state: &mut LedgerState, from: Address, call: RegistryCall) -> Result<(), ContractError> {
        let revert = |reason: &str| ContractError::RpcError(format!("execution reverted: {}", reason));
        state.clock += 1;

        match call {
            RegistryCall::RegisterStudent(r) => {
                if state.students.contains_key(&r.enrollment_number) {
                    return Err(revert("Student already registered"));
                }
                state.enrollment_order.push(r.enrollment_number.clone());
                state.passwords.insert(r.enrollment_number.clone(), r.password_hash);
                state.students.insert(
                    r.enrollment_number.clone(),
                    Student {
                        enrollment_number: r.enrollment_number,
                        name: r.name,
                        email: r.email,
                        phone: r.phone,
                        photo_hash: r.photo_hash,
                        is_registered: true,
                        registered_at: state.clock,
                    },
                );
            }
            RegistryCall::IssueCertificate(r) => {
                if state.certificates.contains_key(&r.certificate_hash) {
                    return Err(revert("Certificate already exists"));
                }
                state.certificate_order.push(r.certificate_hash.clone());
                state.certificates.insert(
                    r.certificate_hash.clone(),
                    Certificate {
                        certificate_hash: r.certificate_hash,
                        enrollment_number: r.enrollment_number,
                        student_name: r.student_name,
                        course: r.course,
                        grade: r.grade,
                        year: r.year,
                        issuer: format!("{:?}", from),
                        issued_at: state.clock,
                        pdf_hash: r.pdf_hash,
                        photo_hash: r.photo_hash,
                        is_valid: true,
                    },
                );
            }
            RegistryCall::RevokeCertificate { certificate_hash } => {
                let certificate = state
                    .certificates
                    .get_mut(&certificate_hash)
                    .ok_or_else(|| revert("Certificate does not exist"))?;
                certificate.is_valid = false;
            }
            RegistryCall::UpdatePassword(r) => {
                if !state.students.contains_key(&r.enrollment_number) {
                    return Err(revert("Student not registered"));
                }
                state.passwords.insert(r.enrollment_number, r.new_password_hash);
            }
            RegistryCall::TransferAdmin { new_admin } => {
                state.admin = new_admin;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CertificateRegistry for InMemoryRegistry {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn admin(&self) -> Result<Address, ContractError> {
        self.check("admin")?;
        Ok(self.state.lock().unwrap().admin)
    }

    async fn verify_certificate(&self, certificate_hash: &str) -> Result<bool, ContractError> {
        self.check("verifyCertificate")?;
        Ok(self.state.lock().unwrap().certificates.contains_key(certificate_hash))
    }

    async fn get_certificate(&self, certificate_hash: &str) -> Result<Certificate, ContractError> {
        self.check("getCertificate")?;
        self.check(&format!("getCertificate:{}", certificate_hash))?;
        self.state
            .lock()
            .unwrap()
            .certificates
            .get(certificate_hash)
            .cloned()
            .ok_or_else(|| ContractError::ContractCallError("execution reverted: Certificate does not exist".to_string()))
    }

    async fn get_student(&self, enrollment_number: &str) -> Result<Student, ContractError> {
        self.check("getStudent")?;
        self.check(&format!("getStudent:{}", enrollment_number))?;
        let state = self.state.lock().unwrap();
        Ok(state.students.get(enrollment_number).cloned().unwrap_or_else(|| Student {
            enrollment_number: enrollment_number.to_string(),
            name: String::new(),
            email: String::new(),
            phone: String::new(),
            photo_hash: String::new(),
            is_registered: false,
            registered_at: 0,
        }))
    }

    async fn certificate_hashes(&self) -> Result<Vec<String>, ContractError> {
        self.check("getAllCertificateHashes")?;
        Ok(self.state.lock().unwrap().certificate_order.clone())
    }

    async fn enrollment_numbers(&self) -> Result<Vec<String>, ContractError> {
        self.check("getAllEnrollmentNumbers")?;
        Ok(self.state.lock().unwrap().enrollment_order.clone())
    }

    async fn student_certificate_hashes(&self, enrollment_number: &str) -> Result<Vec<String>, ContractError> {
        self.check("getStudentCertificates")?;
        let state = self.state.lock().unwrap();
        Ok(state
            .certificate_order
            .iter()
            .filter(|hash| {
                state
                    .certificates
                    .get(*hash)
                    .map_or(false, |c| c.enrollment_number == enrollment_number)
            })
            .cloned()
            .collect())
    }

    async fn total_certificates(&self) -> Result<u64, ContractError> {
        self.check("getTotalCertificates")?;
        Ok(self.state.lock().unwrap().certificates.len() as u64)
    }

    async fn total_students(&self) -> Result<u64, ContractError> {
        self.check("getTotalStudents")?;
        Ok(self.state.lock().unwrap().students.len() as u64)
    }

    async fn submit(&self, from: Address, call: &RegistryCall) -> Result<TxHash, ContractError> {
        if !self.available {
            return Err(ContractError::ProviderUnavailable);
        }
        if self.reject_signing {
            return Err(ContractError::UserRejected);
        }

        let mut state = self.state.lock().unwrap();
        if from != state.admin {
            // eth_estimateGas fails before the wallet ever prompts
            return Err(ContractError::RpcError("execution reverted: Only admin".to_string()));
        }

        let tx_hash = H256::from_low_u64_be(self.next_tx.fetch_add(1, Ordering::SeqCst));
        state.pending.insert(tx_hash, (from, call.clone()));
        Ok(tx_hash)
    }

    async fn wait_for_confirmation(&self, tx_hash: TxHash) -> Result<Confirmation, ContractError> {
        if self.hang_confirmations {
            std::future::pending::<()>().await;
        }

        let mut state = self.state.lock().unwrap();
        let (from, call) = state
            .pending
            .remove(&tx_hash)
            .ok_or_else(|| ContractError::TransactionError("No transaction receipt".to_string()))?;
        self.apply(&mut state, from, call)?;

        Ok(Confirmation {
            transaction_hash: format!("{:?}", tx_hash),
            block_number: self.next_block.fetch_add(1, Ordering::SeqCst),
        })
    }
}
