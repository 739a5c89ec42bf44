use std::str::FromStr;

use async_trait::async_trait;
use ethers::providers::{Http, JsonRpcClient, RpcError};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::debug;

use super::provider::{ProviderEvent, ProviderRpcError, WalletProvider, ETH_ACCOUNTS, ETH_REQUEST_ACCOUNTS};
use crate::domain::errors::ContractError;

/// A JSON-RPC node used where no browser wallet exists (CLI, scripts).
///
/// Nodes never prompt, so `eth_requestAccounts` is answered with the node's
/// unlocked accounts, and no account or network events are ever pushed.
#[derive(Debug)]
pub struct NodeProvider {
    http: Http,
    events: broadcast::Sender<ProviderEvent>,
}

impl NodeProvider {
    pub fn new(rpc_url: &str) -> Result<Self, ContractError> {
        let http = Http::from_str(rpc_url).map_err(|e| ContractError::RpcError(e.to_string()))?;
        let (events, _) = broadcast::channel(1);
        Ok(Self { http, events })
    }
}

#[async_trait]
impl WalletProvider for NodeProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderRpcError> {
        let method = if method == ETH_REQUEST_ACCOUNTS { ETH_ACCOUNTS } else { method };
        let params = if params.is_null() { Value::Array(Vec::new()) } else { params };
        debug!("node request: {}", method);

        self.http
            .request::<Value, Value>(method, params)
            .await
            .map_err(|e| match e.as_error_response() {
                Some(response) => ProviderRpcError {
                    code: response.code,
                    message: response.message.clone(),
                    data: response.data.clone(),
                },
                None => ProviderRpcError::new(-32603, e.to_string()),
            })
    }

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }
}
