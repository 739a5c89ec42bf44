use std::fmt;

use ethers::types::Address;
use serde::{Deserialize, Serialize};

use crate::domain::models::{IssueCertificateRequest, RegisterStudentRequest, UpdatePasswordRequest};

/// Field-level problem found before a request reaches the wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult<T> = Result<T, Vec<ValidationError>>;

/// Joins field errors into one line for notifications and logs.
pub fn describe(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ValidationError::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Checks applied to caller input before any wallet prompt
pub struct Validator;

impl Validator {
    /// Parses a `0x`-prefixed, 40 hex digit account.
    pub fn ethereum_address(value: &str, field: &str) -> Result<Address, ValidationError> {
        let value = value.trim();
        let digits = value
            .strip_prefix("0x")
            .ok_or_else(|| ValidationError::new(field, "must start with 0x"))?;
        if digits.len() != 40 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ValidationError::new(field, "must be 40 hexadecimal digits after 0x"));
        }
        value
            .parse::<Address>()
            .map_err(|e| ValidationError::new(field, e.to_string()))
    }

    /// Non-blank and at most `max_length` bytes.
    pub fn required(value: &str, field: &str, max_length: usize) -> Result<(), ValidationError> {
        if value.trim().is_empty() {
            return Err(ValidationError::new(field, "is required"));
        }
        Self::bounded(value, field, max_length)
    }

    pub fn bounded(value: &str, field: &str, max_length: usize) -> Result<(), ValidationError> {
        if value.len() > max_length {
            return Err(ValidationError::new(field, format!("exceeds {} characters", max_length)));
        }
        Ok(())
    }

    pub fn email(value: &str, field: &str) -> Result<(), ValidationError> {
        Self::required(value, field, 254)?;
        match value.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') && !domain.starts_with('.') => Ok(()),
            _ => Err(ValidationError::new(field, "is not an email address")),
        }
    }

    pub fn year(value: u64, field: &str) -> Result<(), ValidationError> {
        if (1900..=2200).contains(&value) {
            Ok(())
        } else {
            Err(ValidationError::new(field, "must be between 1900 and 2200"))
        }
    }

    fn all(checks: impl IntoIterator<Item = Result<(), ValidationError>>) -> ValidationResult<()> {
        let errors: Vec<ValidationError> = checks.into_iter().filter_map(Result::err).collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Write requests check themselves before being signed
pub trait Validate {
    fn validate(&self) -> ValidationResult<()>;
}

impl Validate for IssueCertificateRequest {
    fn validate(&self) -> ValidationResult<()> {
        Validator::all([
            Validator::required(&self.certificate_hash, "certificateHash", 128),
            Validator::required(&self.enrollment_number, "enrollmentNumber", 64),
            Validator::required(&self.student_name, "studentName", 128),
            Validator::required(&self.course, "course", 128),
            Validator::bounded(&self.grade, "grade", 16),
            Validator::year(self.year, "year"),
            Validator::bounded(&self.pdf_hash, "pdfHash", 128),
            Validator::bounded(&self.photo_hash, "photoHash", 128),
        ])
    }
}

impl Validate for RegisterStudentRequest {
    fn validate(&self) -> ValidationResult<()> {
        Validator::all([
            Validator::required(&self.enrollment_number, "enrollmentNumber", 64),
            Validator::required(&self.name, "name", 128),
            Validator::email(&self.email, "email"),
            Validator::bounded(&self.phone, "phone", 32),
            Validator::bounded(&self.photo_hash, "photoHash", 128),
            Validator::required(&self.password_hash, "passwordHash", 256),
        ])
    }
}

impl Validate for UpdatePasswordRequest {
    fn validate(&self) -> ValidationResult<()> {
        Validator::all([
            Validator::required(&self.enrollment_number, "enrollmentNumber", 64),
            Validator::required(&self.new_password_hash, "newPasswordHash", 256),
        ])
    }
}
