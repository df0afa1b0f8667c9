//! Core traits for account storage and the transaction log
//!
//! The engine only talks to storage through these traits, so backends can be
//! swapped without touching the processing logic.

use crate::types::{
    Account, AccountId, LogError, OwnerId, StoreError, Transaction, TransactionId,
};
use rust_decimal::Decimal;

/// One account write inside an atomic commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceUpdate {
    pub account_id: AccountId,

    /// Version the caller read; the commit fails if the account moved on
    pub expected_version: u64,

    pub new_balance: Decimal,
}

impl BalanceUpdate {
    /// Build an update that replaces `account`'s balance, guarded by its current version
    pub fn from_snapshot(account: &Account, new_balance: Decimal) -> Self {
        BalanceUpdate {
            account_id: account.id,
            expected_version: account.version,
            new_balance,
        }
    }
}

/// Trait for account storage
///
/// Balances only change through [`AccountStore::conditional_update`] and
/// [`AccountStore::commit`]. Implementations must never expose a negative
/// balance, even transiently.
pub trait AccountStore: Send + Sync {
    /// Register a new account
    fn insert(&self, account: Account) -> Result<Account, StoreError>;

    /// Snapshot of an account
    fn get(&self, id: AccountId) -> Result<Account, StoreError>;

    fn find_by_number(&self, account_number: &str) -> Option<Account>;

    /// Accounts owned by `owner`, sorted by id
    fn find_by_owner(&self, owner: OwnerId) -> Vec<Account>;

    /// All accounts, sorted by id
    fn all(&self) -> Vec<Account>;

    /// Replace a single balance if it still equals `expected_balance`
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the account does not exist
    /// - `StoreError::BalanceConflict` if the current balance differs
    /// - `StoreError::NegativeBalance` if `new_balance` is below zero
    fn conditional_update(
        &self,
        id: AccountId,
        expected_balance: Decimal,
        new_balance: Decimal,
    ) -> Result<Account, StoreError>;

    /// Apply every update or none of them
    ///
    /// Exclusive access to each account is acquired in ascending id order,
    /// every expected version is verified and every new balance checked, then
    /// `on_commit` runs while the accounts are still held. Balances are written
    /// only when all of that succeeds.
    fn commit(
        &self,
        updates: &[BalanceUpdate],
        on_commit: &mut dyn FnMut() -> Result<(), LogError>,
    ) -> Result<(), StoreError>;
}

/// Trait for the append-only transaction log
pub trait TransactionLog: Send + Sync {
    /// Persist a terminal transaction record
    ///
    /// # Errors
    ///
    /// - `LogError::DuplicateTransaction` if the id is already recorded
    /// - `LogError::DuplicateIdempotencyKey` if a completed record with the
    ///   same key already exists
    fn append(&self, transaction: Transaction) -> Result<(), LogError>;

    /// All records in append order
    fn find_all(&self) -> Vec<Transaction>;

    fn find_by_id(&self, id: TransactionId) -> Option<Transaction>;

    /// The completed record holding `key`, if any
    fn find_by_idempotency_key(&self, key: &str) -> Option<Transaction>;
}
