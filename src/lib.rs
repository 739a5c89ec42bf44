pub mod api;
pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

#[cfg(test)]
mod tests;

// Main exports for external use
pub use application::services::{CertificateService, WalletSession};
pub use application::AppContext;
pub use config::RegistryConfig;
pub use domain::errors::{ContractError, ErrorKind, WalletError};
pub use infrastructure::wallet::{NodeProvider, WalletProvider};
