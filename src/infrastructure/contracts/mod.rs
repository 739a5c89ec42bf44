// Contract integration module
// This module handles all certificate registry interactions

pub mod abis;
pub mod client;
pub mod registry;

// Re-export main components for easy access
pub use client::EthersCertificateRegistry;
pub use registry::{CertificateRegistry, RegistryCall};
