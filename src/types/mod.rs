//! Types module
//!
//! Contains core data structures used throughout the ledger.
//! This module organizes types into logical submodules:
//! - `account`: Account state and opening requests
//! - `caller`: Caller identity for authorization
//! - `fraud`: Fraud rule identifiers
//! - `transaction`: Requests, records and the status machine
//! - `error`: Error taxonomy

pub mod account;
pub mod caller;
pub mod error;
pub mod fraud;
pub mod transaction;

pub use account::{Account, AccountId, NewAccount, OwnerId};
pub use caller::Caller;
pub use error::{ErrorKind, LogError, ReplayError, StoreError, TxError};
pub use fraud::FraudRule;
pub use transaction::{
    Transaction, TransactionId, TransactionRequest, TransactionStatus, TransactionType,
};
