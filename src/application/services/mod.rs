pub mod certificate_service;
pub mod wallet_session;

pub use certificate_service::*;
pub use wallet_session::*;
