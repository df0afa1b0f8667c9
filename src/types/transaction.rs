//! Transaction-related types for the ledger
//!
//! This module defines transaction types, the caller-facing request shape, and
//! the persisted transaction record with its one-way status machine:
//!
//! ```text
//! Pending --(fraud detected)-----> Rejected   [terminal]
//! Pending --(insufficient funds)-> Failed     [terminal]
//! Pending --(mutation committed)-> Completed  [terminal]
//! ```

use super::account::{AccountId, OwnerId};
use super::error::TxError;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Transaction identifier, assigned by the engine
pub type TransactionId = u64;

/// Transaction types supported by the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Credit funds to `to_account_id`
    Deposit,

    /// Debit funds from `from_account_id`
    Withdraw,

    /// Debit `from_account_id` and credit `to_account_id` as one unit
    Transfer,
}

impl TransactionType {
    /// Whether this type moves funds out of an account
    pub fn is_debit(&self) -> bool {
        matches!(self, TransactionType::Withdraw | TransactionType::Transfer)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "deposit",
            TransactionType::Withdraw => "withdraw",
            TransactionType::Transfer => "transfer",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = TxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "deposit" => Ok(TransactionType::Deposit),
            "withdraw" | "withdrawal" => Ok(TransactionType::Withdraw),
            "transfer" => Ok(TransactionType::Transfer),
            other => Err(TxError::invalid_request(format!(
                "unknown transaction type '{}'",
                other
            ))),
        }
    }
}

/// Lifecycle status of a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionStatus {
    Pending,
    /// Blocked by the fraud gate
    Rejected(String),
    /// Failed after the fraud gate (funds, contention, storage)
    Failed(String),
    Completed,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }

    /// Short status label used in reports and errors
    pub fn label(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Rejected(_) => "rejected",
            TransactionStatus::Failed(_) => "failed",
            TransactionStatus::Completed => "completed",
        }
    }

    /// Human-readable reason for rejected and failed transactions
    pub fn reason(&self) -> Option<&str> {
        match self {
            TransactionStatus::Rejected(reason) | TransactionStatus::Failed(reason) => {
                Some(reason)
            }
            TransactionStatus::Pending | TransactionStatus::Completed => None,
        }
    }
}

/// Caller-supplied transaction request
///
/// Shape rules are checked by [`TransactionRequest::validate`] before the
/// request enters the status machine.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRequest {
    pub tx_type: TransactionType,
    pub amount: Decimal,
    pub from_account_id: Option<AccountId>,
    pub to_account_id: Option<AccountId>,

    /// Creation time; stamped from the engine clock when absent
    pub timestamp: Option<NaiveDateTime>,

    /// Deduplicates retried submissions of the same request
    pub idempotency_key: Option<String>,
}

impl TransactionRequest {
    pub fn deposit(to: AccountId, amount: Decimal) -> Self {
        Self::new(TransactionType::Deposit, amount, None, Some(to))
    }

    pub fn withdraw(from: AccountId, amount: Decimal) -> Self {
        Self::new(TransactionType::Withdraw, amount, Some(from), None)
    }

    pub fn transfer(from: AccountId, to: AccountId, amount: Decimal) -> Self {
        Self::new(TransactionType::Transfer, amount, Some(from), Some(to))
    }

    pub fn new(
        tx_type: TransactionType,
        amount: Decimal,
        from_account_id: Option<AccountId>,
        to_account_id: Option<AccountId>,
    ) -> Self {
        TransactionRequest {
            tx_type,
            amount,
            from_account_id,
            to_account_id,
            timestamp: None,
            idempotency_key: None,
        }
    }

    pub fn at(mut self, timestamp: NaiveDateTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// Check amount and account references for the request type
    ///
    /// # Errors
    ///
    /// Returns `TxError::InvalidRequest` if:
    /// - The amount is zero or negative
    /// - A reference required by the type is missing, or one it forbids is present
    /// - A transfer names the same account on both sides
    pub fn validate(&self) -> Result<(), TxError> {
        if self.amount <= Decimal::ZERO {
            return Err(TxError::invalid_request(format!(
                "amount must be positive, got {}",
                self.amount
            )));
        }

        let (needs_from, needs_to) = match self.tx_type {
            TransactionType::Deposit => (false, true),
            TransactionType::Withdraw => (true, false),
            TransactionType::Transfer => (true, true),
        };

        check_reference(self.tx_type, "from", self.from_account_id, needs_from)?;
        check_reference(self.tx_type, "to", self.to_account_id, needs_to)?;

        if let (Some(from), Some(to)) = (self.from_account_id, self.to_account_id) {
            if from == to {
                return Err(TxError::invalid_request(format!(
                    "cannot transfer account {} to itself",
                    from
                )));
            }
        }

        Ok(())
    }
}

fn check_reference(
    tx_type: TransactionType,
    side: &str,
    reference: Option<AccountId>,
    required: bool,
) -> Result<(), TxError> {
    match (reference, required) {
        (None, true) => Err(TxError::invalid_request(format!(
            "{} requires a {} account",
            tx_type, side
        ))),
        (Some(account), false) => Err(TxError::invalid_request(format!(
            "{} must not reference a {} account (got {})",
            tx_type, side, account
        ))),
        _ => Ok(()),
    }
}

/// Transaction record as evaluated and persisted by the engine
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: TransactionId,
    pub tx_type: TransactionType,
    pub amount: Decimal,
    pub from_account_id: Option<AccountId>,
    pub to_account_id: Option<AccountId>,
    pub timestamp: Option<NaiveDateTime>,
    pub status: TransactionStatus,
    pub idempotency_key: Option<String>,

    /// Owner that submitted the request; `None` for system callers
    pub initiated_by: Option<OwnerId>,
}

impl Transaction {
    /// Create a pending transaction from a validated request
    ///
    /// A request without a timestamp is stamped with `now`.
    pub fn pending(
        id: TransactionId,
        request: TransactionRequest,
        initiated_by: Option<OwnerId>,
        now: NaiveDateTime,
    ) -> Self {
        Transaction {
            id,
            tx_type: request.tx_type,
            amount: request.amount,
            from_account_id: request.from_account_id,
            to_account_id: request.to_account_id,
            timestamp: request.timestamp.or(Some(now)),
            status: TransactionStatus::Pending,
            idempotency_key: request.idempotency_key,
            initiated_by,
        }
    }

    pub fn reject(&mut self, reason: impl Into<String>) -> Result<(), TxError> {
        self.transition(TransactionStatus::Rejected(reason.into()))
    }

    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), TxError> {
        self.transition(TransactionStatus::Failed(reason.into()))
    }

    pub fn complete(&mut self) -> Result<(), TxError> {
        self.transition(TransactionStatus::Completed)
    }

    fn transition(&mut self, next: TransactionStatus) -> Result<(), TxError> {
        if self.status.is_terminal() {
            return Err(TxError::invalid_state_transition(
                self.id,
                self.status.label(),
                next.label(),
            ));
        }
        self.status = next;
        Ok(())
    }

    /// Whether `request` describes the same movement of funds as this record
    pub fn matches_request(&self, request: &TransactionRequest) -> bool {
        self.tx_type == request.tx_type
            && self.amount == request.amount
            && self.from_account_id == request.from_account_id
            && self.to_account_id == request.to_account_id
    }
}
