// Wallet provider plumbing: the injected-wallet interface and its ethers bridge

pub mod eip1193;
pub mod node;
pub mod provider;

pub use eip1193::{Eip1193Client, Eip1193Error};
pub use node::NodeProvider;
pub use provider::{ProviderEvent, ProviderRpcError, WalletProvider};
