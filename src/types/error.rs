//! Error types for the ledger
//!
//! # Error Categories
//!
//! - **TxError**: the caller-facing taxonomy returned by the engine. Callers
//!   switch on [`TxError::kind`], never on message text.
//! - **StoreError**: failures of the account storage primitives.
//! - **LogError**: failures of the transaction log.
//! - **ReplayError**: fatal failures of the CSV replay pipeline.

use super::account::AccountId;
use super::fraud::FraudRule;
use super::transaction::TransactionId;
use rust_decimal::Decimal;
use thiserror::Error;

/// Stable classification of a [`TxError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidRequest,
    FraudDetected,
    InsufficientFunds,
    AccountNotFound,
    ConcurrencyConflict,
    Unavailable,
    Unauthorized,
    InvalidStateTransition,
}

impl ErrorKind {
    /// Wire-stable error code
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::FraudDetected => "fraud_detected",
            ErrorKind::InsufficientFunds => "insufficient_funds",
            ErrorKind::AccountNotFound => "account_not_found",
            ErrorKind::ConcurrencyConflict => "concurrency_conflict",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::InvalidStateTransition => "invalid_state_transition",
        }
    }
}

/// Errors returned by the transaction engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TxError {
    /// Malformed request shape; never persisted
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// A fraud rule matched; a rejected record was persisted
    #[error("Transaction {tx} rejected by fraud rule {rule}")]
    FraudDetected { tx: TransactionId, rule: FraudRule },

    /// Funds check failed; a failed record was persisted
    #[error("Insufficient funds in account {account}: available {available}, requested {requested}")]
    InsufficientFunds {
        account: AccountId,
        available: Decimal,
        requested: Decimal,
    },

    /// A referenced account does not exist
    #[error("Account {account} not found")]
    AccountNotFound { account: AccountId },

    /// No account carries the external account number
    #[error("Account number {account_number} not found")]
    UnknownAccountNumber { account_number: String },

    /// Optimistic checks kept failing; retryable with the same payload
    #[error("Concurrency conflict on account {account} after {attempts} attempts")]
    ConcurrencyConflict { account: AccountId, attempts: u32 },

    /// Storage could not serve the request in bounded time; retryable
    #[error("Ledger unavailable: {message}")]
    Unavailable { message: String },

    /// Caller tried to debit an account it does not own
    #[error("Owner {owner} may not debit account {account}")]
    Unauthorized { owner: u64, account: AccountId },

    /// Attempted to move a transaction out of a terminal status
    #[error("Transaction {tx} cannot move from {from} to {to}")]
    InvalidStateTransition {
        tx: TransactionId,
        from: &'static str,
        to: &'static str,
    },
}

impl TxError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TxError::InvalidRequest { .. } => ErrorKind::InvalidRequest,
            TxError::FraudDetected { .. } => ErrorKind::FraudDetected,
            TxError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            TxError::AccountNotFound { .. } | TxError::UnknownAccountNumber { .. } => {
                ErrorKind::AccountNotFound
            }
            TxError::ConcurrencyConflict { .. } => ErrorKind::ConcurrencyConflict,
            TxError::Unavailable { .. } => ErrorKind::Unavailable,
            TxError::Unauthorized { .. } => ErrorKind::Unauthorized,
            TxError::InvalidStateTransition { .. } => ErrorKind::InvalidStateTransition,
        }
    }

    pub fn code(&self) -> &'static str {
        self.kind().code()
    }

    /// Whether resubmitting the same request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::ConcurrencyConflict | ErrorKind::Unavailable
        )
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        TxError::InvalidRequest {
            message: message.into(),
        }
    }

    pub fn fraud_detected(tx: TransactionId, rule: FraudRule) -> Self {
        TxError::FraudDetected { tx, rule }
    }

    pub fn insufficient_funds(account: AccountId, available: Decimal, requested: Decimal) -> Self {
        TxError::InsufficientFunds {
            account,
            available,
            requested,
        }
    }

    pub fn account_not_found(account: AccountId) -> Self {
        TxError::AccountNotFound { account }
    }

    pub fn unknown_account_number(account_number: impl Into<String>) -> Self {
        TxError::UnknownAccountNumber {
            account_number: account_number.into(),
        }
    }

    pub fn concurrency_conflict(account: AccountId, attempts: u32) -> Self {
        TxError::ConcurrencyConflict { account, attempts }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        TxError::Unavailable {
            message: message.into(),
        }
    }

    pub fn unauthorized(owner: u64, account: AccountId) -> Self {
        TxError::Unauthorized { owner, account }
    }

    pub fn invalid_state_transition(
        tx: TransactionId,
        from: &'static str,
        to: &'static str,
    ) -> Self {
        TxError::InvalidStateTransition { tx, from, to }
    }
}

/// Errors raised by account storage
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("Account {account} not found")]
    NotFound { account: AccountId },

    #[error("Account {account} already exists")]
    DuplicateAccount { account: AccountId },

    #[error("Account number {account_number} is already in use")]
    DuplicateAccountNumber { account_number: String },

    /// Optimistic version check failed
    #[error("Account {account} changed concurrently: expected version {expected}, found {found}")]
    VersionConflict {
        account: AccountId,
        expected: u64,
        found: u64,
    },

    /// Expected-balance check of `conditional_update` failed
    #[error("Account {account} changed concurrently: expected balance {expected}, found {found}")]
    BalanceConflict {
        account: AccountId,
        expected: Decimal,
        found: Decimal,
    },

    /// Write would drive a balance below zero
    #[error("Account {account} would reach negative balance {balance}")]
    NegativeBalance { account: AccountId, balance: Decimal },

    #[error("Timed out waiting for exclusive access to account {account}")]
    LockTimeout { account: AccountId },

    #[error("Account {account} appears more than once in one commit")]
    DuplicateUpdate { account: AccountId },

    /// The log append inside a commit failed; nothing was written
    #[error(transparent)]
    Log(#[from] LogError),
}

impl StoreError {
    /// Whether this is an optimistic concurrency conflict
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            StoreError::VersionConflict { .. } | StoreError::BalanceConflict { .. }
        )
    }
}

/// Errors raised by the transaction log
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LogError {
    #[error("Transaction {tx} is already recorded")]
    DuplicateTransaction { tx: TransactionId },

    #[error("Idempotency key '{key}' already belongs to transaction {existing}")]
    DuplicateIdempotencyKey { key: String, existing: TransactionId },
}

impl From<StoreError> for TxError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound { account } => TxError::account_not_found(account),
            StoreError::VersionConflict { account, .. }
            | StoreError::BalanceConflict { account, .. } => {
                TxError::concurrency_conflict(account, 1)
            }
            StoreError::LockTimeout { .. } => TxError::unavailable(error.to_string()),
            StoreError::Log(log_error) => log_error.into(),
            StoreError::DuplicateAccount { .. }
            | StoreError::DuplicateAccountNumber { .. }
            | StoreError::NegativeBalance { .. }
            | StoreError::DuplicateUpdate { .. } => TxError::invalid_request(error.to_string()),
        }
    }
}

impl From<LogError> for TxError {
    fn from(error: LogError) -> Self {
        TxError::unavailable(format!("transaction log rejected append: {}", error))
    }
}

/// Fatal errors of the CSV replay pipeline
///
/// Per-row problems are logged and skipped; these stop the run.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("Failed to open file '{path}': {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Runtime error: {0}")]
    Runtime(String),
}
