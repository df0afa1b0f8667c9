//! Account-related types for the ledger
//!
//! Accounts reference their owner by id only; the owning identity is resolved
//! by whoever needs it, never embedded.

use rust_decimal::Decimal;

/// Account identifier
pub type AccountId = u64;

/// Identifier of the identity that owns an account
pub type OwnerId = u64;

/// Ledger account state
///
/// The balance is never negative in any committed state. `version` is bumped
/// on every committed balance change and serves as the optimistic concurrency
/// token for [`crate::core::AccountStore::commit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Stable internal identifier
    pub id: AccountId,

    /// Unique external-facing account number
    pub account_number: String,

    /// Current balance (fixed-point decimal)
    pub balance: Decimal,

    /// Owning identity
    pub owner_id: OwnerId,

    /// Number of committed mutations applied to this account
    pub version: u64,
}

impl Account {
    /// Create an account at version 0
    pub fn new(
        id: AccountId,
        account_number: impl Into<String>,
        owner_id: OwnerId,
        balance: Decimal,
    ) -> Self {
        Account {
            id,
            account_number: account_number.into(),
            balance,
            owner_id,
            version: 0,
        }
    }
}

/// Request to open a new account
#[derive(Debug, Clone, PartialEq)]
pub struct NewAccount {
    pub id: AccountId,
    pub account_number: String,
    pub owner_id: OwnerId,
    pub opening_balance: Decimal,
}

impl NewAccount {
    pub fn new(
        id: AccountId,
        account_number: impl Into<String>,
        owner_id: OwnerId,
        opening_balance: Decimal,
    ) -> Self {
        NewAccount {
            id,
            account_number: account_number.into(),
            owner_id,
            opening_balance,
        }
    }
}

impl From<NewAccount> for Account {
    fn from(new: NewAccount) -> Self {
        Account::new(new.id, new.account_number, new.owner_id, new.opening_balance)
    }
}
