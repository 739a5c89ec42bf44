use std::fs;
use ethers::abi::Abi;
use crate::domain::errors::ContractError;

const CERTIFICATE_REGISTRY_ABI: &str = include_str!("../../../../abis/certificate_registry_abi.json");

/// ABI shipped with the crate
pub fn load_certificate_registry_abi() -> Result<Abi, ContractError> {
    parse_abi("certificate_registry_abi.json", CERTIFICATE_REGISTRY_ABI)
}

/// ABI from a file on disk, for deployments that publish their own
pub fn load_abi(path: &str) -> Result<Abi, ContractError> {
    let abi_content = fs::read_to_string(path)
        .map_err(|e| ContractError::AbiError(format!("Failed to read ABI file {}: {}", path, e)))?;

    parse_abi(path, &abi_content)
}

fn parse_abi(name: &str, content: &str) -> Result<Abi, ContractError> {
    serde_json::from_str(content)
        .map_err(|e| ContractError::AbiError(format!("Failed to parse ABI file {}: {}", name, e)))
}
