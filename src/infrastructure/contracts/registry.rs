use async_trait::async_trait;
use ethers::abi::Token;
use ethers::types::{Address, TxHash, U256};

use crate::domain::errors::ContractError;
use crate::domain::models::{
    Certificate, Confirmation, IssueCertificateRequest, RegisterStudentRequest, Student,
    UpdatePasswordRequest,
};

/// State-changing calls accepted by the registry contract.
///
/// The contract takes positional arguments only; `tokens` yields them in
/// the exact order of the on-chain signature.
#[derive(Debug, Clone)]
pub enum RegistryCall {
    RegisterStudent(RegisterStudentRequest),
    IssueCertificate(IssueCertificateRequest),
    RevokeCertificate { certificate_hash: String },
    UpdatePassword(UpdatePasswordRequest),
    TransferAdmin { new_admin: Address },
}

impl RegistryCall {
    pub fn method_name(&self) -> &'static str {
        match self {
            RegistryCall::RegisterStudent(_) => "registerStudent",
            RegistryCall::IssueCertificate(_) => "issueCertificate",
            RegistryCall::RevokeCertificate { .. } => "revokeCertificate",
            RegistryCall::UpdatePassword(_) => "updatePassword",
            RegistryCall::TransferAdmin { .. } => "transferAdmin",
        }
    }

    pub fn tokens(&self) -> Vec<Token> {
        match self {
            RegistryCall::RegisterStudent(r) => vec![
                Token::String(r.enrollment_number.clone()),
                Token::String(r.name.clone()),
                Token::String(r.email.clone()),
                Token::String(r.phone.clone()),
                Token::String(r.photo_hash.clone()),
                Token::String(r.password_hash.clone()),
            ],
            RegistryCall::IssueCertificate(r) => vec![
                Token::String(r.certificate_hash.clone()),
                Token::String(r.enrollment_number.clone()),
                Token::String(r.student_name.clone()),
                Token::String(r.course.clone()),
                Token::String(r.grade.clone()),
                Token::Uint(U256::from(r.year)),
                Token::String(r.pdf_hash.clone()),
                Token::String(r.photo_hash.clone()),
            ],
            RegistryCall::RevokeCertificate { certificate_hash } => {
                vec![Token::String(certificate_hash.clone())]
            }
            RegistryCall::UpdatePassword(r) => vec![
                Token::String(r.enrollment_number.clone()),
                Token::String(r.new_password_hash.clone()),
            ],
            RegistryCall::TransferAdmin { new_admin } => vec![Token::Address(*new_admin)],
        }
    }

    /// Human label for notifications and logs
    pub fn label(&self) -> String {
        match self {
            RegistryCall::RegisterStudent(r) => format!("Student {} registration", r.enrollment_number),
            RegistryCall::IssueCertificate(r) => format!("Certificate {} issuance", r.certificate_hash),
            RegistryCall::RevokeCertificate { certificate_hash } => {
                format!("Certificate {} revocation", certificate_hash)
            }
            RegistryCall::UpdatePassword(r) => format!("Password update for {}", r.enrollment_number),
            RegistryCall::TransferAdmin { new_admin } => format!("Admin transfer to {:?}", new_admin),
        }
    }
}

/// Typed surface over the deployed certificate registry.
///
/// Raw contract access only: no notifications, no fallbacks. Reads of a
/// missing key return whatever the contract returns (empty records).
#[async_trait]
pub trait CertificateRegistry: Send + Sync {
    /// Whether a provider exists to reach the chain at all
    fn is_available(&self) -> bool;

    async fn admin(&self) -> Result<Address, ContractError>;

    async fn verify_certificate(&self, certificate_hash: &str) -> Result<bool, ContractError>;

    async fn get_certificate(&self, certificate_hash: &str) -> Result<Certificate, ContractError>;

    async fn get_student(&self, enrollment_number: &str) -> Result<Student, ContractError>;

    async fn certificate_hashes(&self) -> Result<Vec<String>, ContractError>;

    async fn enrollment_numbers(&self) -> Result<Vec<String>, ContractError>;

    async fn student_certificate_hashes(&self, enrollment_number: &str) -> Result<Vec<String>, ContractError>;

    async fn total_certificates(&self) -> Result<u64, ContractError>;

    async fn total_students(&self) -> Result<u64, ContractError>;

    /// Hands the call to the signer; returns once the transaction is broadcast.
    async fn submit(&self, from: Address, call: &RegistryCall) -> Result<TxHash, ContractError>;

    async fn wait_for_confirmation(&self, tx_hash: TxHash) -> Result<Confirmation, ContractError>;
}
