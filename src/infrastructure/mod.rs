pub mod contracts;
pub mod wallet;
