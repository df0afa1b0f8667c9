//! Core business logic module
//!
//! This module contains the ledger's processing components:
//! - `traits` - Storage abstractions the engine is written against
//! - `account_store` - Per-account locked balance storage
//! - `transaction_log` - Append-only record of terminal transactions
//! - `fraud_detector` - Stateless fraud rule evaluation
//! - `clock` - Injected time source
//! - `config` - Retry and timeout settings
//! - `engine` - Transaction processing orchestration

pub mod account_store;
pub mod clock;
pub mod config;
pub mod engine;
pub mod fraud_detector;
pub mod traits;
pub mod transaction_log;

pub use account_store::InMemoryAccountStore;
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::EngineConfig;
pub use engine::TransactionEngine;
pub use fraud_detector::{FraudDetector, FraudRules, FraudVerdict};
pub use traits::{AccountStore, BalanceUpdate, TransactionLog};
pub use transaction_log::InMemoryTransactionLog;
