pub mod validation;

pub use validation::{describe, Validate, ValidationError, ValidationResult, Validator};
