use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use ethers::providers::{JsonRpcClient, JsonRpcError, ProviderError, RpcError};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use super::provider::{ProviderRpcError, WalletProvider};

/// Lets ethers drive a chain through an injected wallet.
///
/// Every call ethers makes (`eth_call`, `eth_estimateGas`,
/// `eth_sendTransaction`, receipt polling) is forwarded to the wallet's
/// `request` method, so the wallet signs writes itself.
#[derive(Debug)]
pub struct Eip1193Client<P> {
    provider: Arc<P>,
}

impl<P> Eip1193Client<P> {
    pub fn new(provider: Arc<P>) -> Self {
        Self { provider }
    }
}

impl<P> Clone for Eip1193Client<P> {
    fn clone(&self) -> Self {
        Self {
            provider: self.provider.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Eip1193Error {
    #[error(transparent)]
    JsonRpcError(#[from] JsonRpcError),

    #[error("Deserialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),
}

impl From<ProviderRpcError> for Eip1193Error {
    fn from(err: ProviderRpcError) -> Self {
        Eip1193Error::JsonRpcError(JsonRpcError {
            code: err.code,
            message: err.message,
            data: err.data,
        })
    }
}

impl RpcError for Eip1193Error {
    fn as_error_response(&self) -> Option<&JsonRpcError> {
        match self {
            Eip1193Error::JsonRpcError(err) => Some(err),
            _ => None,
        }
    }

    fn as_serde_error(&self) -> Option<&serde_json::Error> {
        match self {
            Eip1193Error::SerdeJson(err) => Some(err),
            _ => None,
        }
    }
}

impl From<Eip1193Error> for ProviderError {
    fn from(err: Eip1193Error) -> Self {
        ProviderError::JsonRpcClientError(Box::new(err))
    }
}

#[async_trait]
impl<P: WalletProvider> JsonRpcClient for Eip1193Client<P> {
    type Error = Eip1193Error;

    async fn request<T, R>(&self, method: &str, params: T) -> Result<R, Self::Error>
    where
        T: Debug + Serialize + Send + Sync,
        R: DeserializeOwned + Send,
    {
        let params = match serde_json::to_value(params)? {
            Value::Null => Value::Array(Vec::new()),
            params => params,
        };
        let result = self.provider.request(method, params).await?;
        Ok(serde_json::from_value(result)?)
    }
}
