//! Fraud-Gated Ledger Library
//! # Overview
//!
//! This library provides a money-movement ledger: account balances are
//! mutated only by a transaction engine that runs every request through a
//! fraud rule set first and commits debits and credits atomically.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (Account, Transaction, errors, etc.)
//! - [`core`] - Business logic components:
//!   - [`core::engine`] - Transaction processing orchestration
//!   - [`core::account_store`] - Per-account locked balance storage
//!   - [`core::transaction_log`] - Append-only transaction records
//!   - [`core::fraud_detector`] - Stateless fraud rules
//! - [`io`] - CSV input and output
//! - [`strategy`] - Sequential and concurrent CSV replays
//! - [`cli`] - CLI arguments parsing
//!
//! # Transaction Types
//!
//! - **Deposit**: Credit funds to an account
//! - **Withdraw**: Debit funds from an account (requires sufficient balance)
//! - **Transfer**: Debit one account and credit another as a single unit
//!
//! # Fraud Rules
//!
//! Checked in order, first match wins:
//!
//! 1. Any amount above 10000
//! 2. Any timestamp strictly between 02:00 and 06:00
//! 3. Withdraw or transfer above 5000
//!
//! # Outcomes
//!
//! Every request that passes validation, account lookup and authorization
//! ends in exactly one persisted record: `Rejected` by the fraud gate,
//! `Failed` (insufficient funds, contention, lock timeout), or `Completed`.

pub mod cli;
pub mod core;
pub mod io;
pub mod strategy;
pub mod types;

pub use core::{
    AccountStore, Clock, EngineConfig, FixedClock, FraudDetector, FraudRules, SystemClock,
    TransactionEngine, TransactionLog,
};
pub use io::{write_balances_csv, write_report_csv};
pub use types::{
    Account, AccountId, Caller, ErrorKind, NewAccount, OwnerId, Transaction, TransactionId,
    TransactionRequest, TransactionStatus, TransactionType, TxError,
};
