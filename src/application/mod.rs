pub mod services;

use std::sync::Arc;

use crate::config::RegistryConfig;
use crate::domain::errors::ContractError;
use crate::domain::notifications::Notifier;
use crate::infrastructure::contracts::EthersCertificateRegistry;
use crate::infrastructure::wallet::WalletProvider;

use self::services::{CertificateService, WalletSession};

/// Everything a UI needs, wired to one wallet provider.
pub struct AppContext<P: WalletProvider> {
    pub notifier: Notifier,
    pub session: WalletSession<P>,
    pub certificates: CertificateService<EthersCertificateRegistry<P>>,
}

impl<P: WalletProvider> AppContext<P> {
    /// `provider` is `None` when the environment has no injected wallet.
    pub fn new(provider: Option<Arc<P>>, config: &RegistryConfig) -> Result<Self, ContractError> {
        let notifier = Notifier::new();
        let session = WalletSession::new(provider.clone(), notifier.clone());
        let registry = Arc::new(EthersCertificateRegistry::new(provider, config)?);
        let certificates = CertificateService::new(registry, session.watch(), notifier.clone())
            .with_write_timeout(config.write_timeout)
            .with_expected_chain(config.expected_chain_id);

        Ok(Self {
            notifier,
            session,
            certificates,
        })
    }
}
