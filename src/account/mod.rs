//! Account management module
//!
//! In-memory account store journaled through [`crate::journal::Journal`].

pub mod credentials;
pub mod models;
pub mod store;

// Re-export commonly used types
pub use credentials::CredentialHasher;
pub use models::{
    Account, AccountProfile, BalanceChange, CounterpartyInfo, NewAccount, normalize_email,
};
pub use store::{AccountSettings, AccountStore};
