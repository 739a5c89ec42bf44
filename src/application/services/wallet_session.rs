use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use ethers::types::Address;
use serde_json::{json, Value};
use tokio::sync::{broadcast::error::RecvError, watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::domain::errors::WalletError;
use crate::domain::models::{ConnectionState, WalletSnapshot};
use crate::domain::notifications::{short_hex, Notifier};
use crate::infrastructure::wallet::provider::{
    normalize_account, parse_accounts, parse_chain_id_value, ProviderEvent, ProviderRpcError, WalletProvider,
    ETH_ACCOUNTS, ETH_CHAIN_ID, ETH_REQUEST_ACCOUNTS, WALLET_REQUEST_PERMISSIONS,
};

/// The single wallet session of the application.
///
/// Cheap to clone; all clones share one state. Observers follow transitions
/// through `watch()`. The provider event listener holds only a weak
/// reference, so it ends with the last handle or on `shutdown()`.
pub struct WalletSession<P: WalletProvider> {
    inner: Arc<SessionInner<P>>,
}

struct SessionInner<P: WalletProvider> {
    provider: Option<Arc<P>>,
    state: watch::Sender<WalletSnapshot>,
    notifier: Notifier,
    listener: Mutex<Option<JoinHandle<()>>>,
    /// Generation of the latest connect attempt
    attempts: AtomicU64,
    /// Held while a wallet prompt is open
    prompt: AsyncMutex<()>,
}

impl<P: WalletProvider> Clone for WalletSession<P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<P: WalletProvider> Drop for SessionInner<P> {
    fn drop(&mut self) {
        let listener = self.listener.get_mut().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = listener.take() {
            handle.abort();
        }
    }
}

impl<P: WalletProvider> WalletSession<P> {
    /// `provider` is `None` when no wallet is injected in the environment.
    pub fn new(provider: Option<Arc<P>>, notifier: Notifier) -> Self {
        let (state, _) = watch::channel(WalletSnapshot::disconnected());
        Self {
            inner: Arc::new(SessionInner {
                provider,
                state,
                notifier,
                listener: Mutex::new(None),
                attempts: AtomicU64::new(0),
                prompt: AsyncMutex::new(()),
            }),
        }
    }

    pub fn provider(&self) -> Option<Arc<P>> {
        self.inner.provider.clone()
    }

    pub fn has_provider(&self) -> bool {
        self.inner.provider.is_some()
    }

    pub fn snapshot(&self) -> WalletSnapshot {
        self.inner.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<WalletSnapshot> {
        self.inner.state.subscribe()
    }

    /// Account that signs writes
    pub fn signer_address(&self) -> Result<Address, WalletError> {
        signer_address(&self.snapshot())
    }

    /// Adopts an already authorized account and starts following provider events.
    pub async fn start(&self) {
        if let Err(e) = self.reconcile().await {
            debug!("Wallet reconciliation skipped: {}", e);
        }
        self.listen();
    }

    /// Asks the wallet for accounts it already authorized; never prompts.
    pub async fn reconcile(&self) -> Result<(), WalletError> {
        let provider = self.inner.provider.clone().ok_or(WalletError::ProviderUnavailable)?;

        let accounts = provider
            .request(ETH_ACCOUNTS, json!([]))
            .await
            .and_then(parse_accounts)
            .map_err(map_rpc_error)?;

        let Some(address) = accounts.into_iter().next() else {
            debug!("No previously authorized wallet account");
            return Ok(());
        };

        let chain_id = fetch_chain_id(provider.as_ref()).await?;

        let adopted = self.inner.state.send_if_modified(|state| {
            if state.connection_state() == ConnectionState::Disconnected {
                *state = WalletSnapshot::connected(&address, chain_id);
                true
            } else {
                false
            }
        });
        if adopted {
            info!("Restored wallet session for {} on chain {:?}", address, chain_id);
        }
        Ok(())
    }

    /// Subscribes to account and network changes once; later calls are no-ops
    /// while the listener is alive.
    pub fn listen(&self) {
        let Some(provider) = self.inner.provider.as_ref() else {
            return;
        };

        let mut listener = self.inner.listener.lock().unwrap_or_else(|e| e.into_inner());
        if listener.as_ref().map_or(false, |handle| !handle.is_finished()) {
            return;
        }

        let mut events = provider.subscribe();
        let session: Weak<SessionInner<P>> = Arc::downgrade(&self.inner);

        *listener = Some(tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        let Some(inner) = session.upgrade() else {
                            break;
                        };
                        WalletSession { inner }.handle_event(event);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Missed {} wallet events", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("Wallet event listener stopped");
        }));
    }

    /// Releases the provider event subscription.
    pub fn shutdown(&self) {
        let mut listener = self.inner.listener.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = listener.take() {
            handle.abort();
            info!("Wallet event listener released");
        }
    }

    /// Requests account access from the wallet.
    ///
    /// At most one connect is in flight; calls made while connecting or
    /// already connected return `Ok` without prompting again. Wallet prompts
    /// are serialized, and an attempt overtaken by a disconnect and a newer
    /// connect leaves the session alone and fails with `Superseded`.
    pub async fn connect(&self) -> Result<(), WalletError> {
        let Some(provider) = self.inner.provider.clone() else {
            warn!("Connect requested but no wallet provider is present");
            self.inner.notifier.error(
                "Wallet Not Found",
                Some("Install a browser wallet such as MetaMask to continue".to_string()),
            );
            return Err(WalletError::ProviderUnavailable);
        };

        let Some(attempt) = self.begin_attempt() else {
            debug!("Connect ignored: session is {:?}", self.snapshot().connection_state());
            return Ok(());
        };

        let outcome = {
            let _prompt = self.inner.prompt.lock().await;
            request_connection(provider.as_ref()).await
        };

        match outcome {
            Ok((address, chain_id)) => {
                if !self.finish_attempt(attempt, WalletSnapshot::connected(&address, chain_id)) {
                    info!("Connect attempt {} for {} was superseded", attempt, address);
                    return Err(WalletError::Superseded);
                }

                info!("Wallet connected: {} on chain {:?}", address, chain_id);
                self.inner.notifier.success(
                    "Wallet Connected",
                    Some(format!("Connected: {}", short_hex(&address))),
                );
                Ok(())
            }
            Err(err) => {
                if !self.finish_attempt(attempt, WalletSnapshot::disconnected()) {
                    debug!("Connect attempt {} was superseded before failing: {}", attempt, err);
                    return Err(err);
                }

                match &err {
                    WalletError::UserRejected => {
                        info!("Wallet connection rejected by user");
                        self.inner.notifier.info(
                            "Connection Rejected",
                            Some("You rejected the connection request".to_string()),
                        );
                    }
                    other => {
                        error!("Wallet connection failed: {}", other);
                        self.inner.notifier.error("Connection Failed", Some(other.to_string()));
                    }
                }
                Err(err)
            }
        }
    }

    /// Moves `Disconnected` to `Connecting` and opens a new attempt generation.
    fn begin_attempt(&self) -> Option<u64> {
        let mut attempt = None;
        self.inner.state.send_if_modified(|state| {
            if state.connection_state() != ConnectionState::Disconnected {
                return false;
            }
            *state = WalletSnapshot::connecting();
            attempt = Some(self.inner.attempts.fetch_add(1, Ordering::SeqCst) + 1);
            true
        });
        attempt
    }

    /// Settles `attempt` only if it is still the one the session is waiting on.
    fn finish_attempt(&self, attempt: u64, next: WalletSnapshot) -> bool {
        self.inner.state.send_if_modified(|state| {
            if !state.is_connecting() || self.inner.attempts.load(Ordering::SeqCst) != attempt {
                return false;
            }
            *state = next;
            true
        })
    }

    /// Forgets the session locally.
    ///
    /// Wallets expose no programmatic disconnect: site access stays granted
    /// until the user revokes it in the wallet itself.
    pub fn disconnect(&self) {
        self.inner.state.send_replace(WalletSnapshot::disconnected());
        info!("Wallet session cleared");
        self.inner.notifier.info(
            "Wallet Disconnected",
            Some("To revoke site access, disconnect this site in your wallet".to_string()),
        );
    }

    /// Lets the user pick a different account through the wallet's permission prompt.
    pub async fn switch_account(&self) -> Result<(), WalletError> {
        let provider = self.inner.provider.clone().ok_or(WalletError::ProviderUnavailable)?;
        if !self.snapshot().is_connected() {
            return Err(WalletError::NotConnected);
        }

        let result = async {
            let _prompt = self.inner.prompt.lock().await;
            provider
                .request(WALLET_REQUEST_PERMISSIONS, json!([{ "eth_accounts": {} }]))
                .await?;
            provider.request(ETH_ACCOUNTS, json!([])).await.and_then(parse_accounts)
        }
        .await
        .map_err(map_rpc_error);

        let accounts = match result {
            Ok(accounts) => accounts,
            Err(WalletError::UserRejected) => {
                info!("Account switch rejected by user");
                self.inner.notifier.info(
                    "Account Switch Cancelled",
                    Some("You kept the current account".to_string()),
                );
                return Err(WalletError::UserRejected);
            }
            Err(err) => {
                error!("Account switch failed: {}", err);
                self.inner.notifier.error("Account Switch Failed", Some(err.to_string()));
                return Err(err);
            }
        };

        match accounts.into_iter().next() {
            Some(address) => {
                self.handle_event(ProviderEvent::AccountsChanged(vec![address]));
                Ok(())
            }
            None => {
                self.handle_event(ProviderEvent::AccountsChanged(Vec::new()));
                Err(WalletError::NotConnected)
            }
        }
    }

    /// Applies one provider event to the session state.
    pub fn handle_event(&self, event: ProviderEvent) {
        match event {
            ProviderEvent::AccountsChanged(accounts) => self.on_accounts_changed(accounts),
            ProviderEvent::ChainChanged(raw) => self.on_chain_changed(&raw),
        }
    }

    fn on_accounts_changed(&self, accounts: Vec<String>) {
        let Some(address) = accounts.into_iter().next() else {
            let was_connected = self.inner.state.send_if_modified(|state| {
                if state.is_connected() {
                    *state = WalletSnapshot::disconnected();
                    true
                } else {
                    false
                }
            });
            if was_connected {
                info!("Wallet disconnected externally");
                self.inner.notifier.info(
                    "Wallet Disconnected",
                    Some("Your wallet was disconnected".to_string()),
                );
            }
            return;
        };

        let Some(address) = normalize_account(&address) else {
            warn!("Ignoring malformed account from wallet: {:?}", address);
            return;
        };
        let changed = self.inner.state.send_if_modified(|state| {
            if state.is_connected() && state.address() != Some(address.as_str()) {
                state.set_address(&address);
                true
            } else {
                false
            }
        });
        if changed {
            info!("Wallet account changed to {}", address);
            self.inner.notifier.info(
                "Account Changed",
                Some(format!("Switched to {}", short_hex(&address))),
            );
        }
    }

    fn on_chain_changed(&self, raw: &str) {
        let Some(chain_id) = parse_chain_id_value(&Value::String(raw.to_string())) else {
            warn!("Ignoring malformed chain id from wallet: {}", raw);
            return;
        };

        let changed = self.inner.state.send_if_modified(|state| {
            if state.is_connected() && state.chain_id() != Some(chain_id) {
                state.set_chain_id(chain_id);
                true
            } else {
                false
            }
        });
        if changed {
            info!("Wallet network changed to chain {}", chain_id);
            self.inner.notifier.info("Network Changed", Some(format!("Chain ID: {}", chain_id)));
        }
    }
}

pub(crate) fn signer_address(snapshot: &WalletSnapshot) -> Result<Address, WalletError> {
    let address = snapshot.address().ok_or(WalletError::NotConnected)?;
    address
        .parse::<Address>()
        .map_err(|e| WalletError::ConnectionFailed(format!("Invalid account address {}: {}", address, e)))
}

async fn request_connection<P: WalletProvider>(provider: &P) -> Result<(String, Option<u64>), WalletError> {
    let accounts = provider
        .request(ETH_REQUEST_ACCOUNTS, json!([]))
        .await
        .and_then(parse_accounts)
        .map_err(map_rpc_error)?;

    let address = accounts
        .into_iter()
        .next()
        .ok_or_else(|| WalletError::ConnectionFailed("Wallet returned no accounts".to_string()))?;

    let chain_id = fetch_chain_id(provider).await?;
    Ok((address, chain_id))
}

async fn fetch_chain_id<P: WalletProvider>(provider: &P) -> Result<Option<u64>, WalletError> {
    let raw = provider.request(ETH_CHAIN_ID, json!([])).await.map_err(map_rpc_error)?;
    let chain_id = parse_chain_id_value(&raw);
    if chain_id.is_none() {
        warn!("Wallet reported an unreadable chain id: {}", raw);
    }
    Ok(chain_id)
}

fn map_rpc_error(err: ProviderRpcError) -> WalletError {
    if err.is_user_rejection() {
        WalletError::UserRejected
    } else {
        WalletError::ConnectionFailed(err.message)
    }
}
