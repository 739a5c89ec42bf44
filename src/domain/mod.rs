pub mod errors;
pub mod models;
pub mod notifications;

pub use errors::{ContractError, ErrorKind, WalletError};
pub use models::*;
pub use notifications::{Notification, NotificationLevel, Notifier};
