//! Transaction processing engine
//!
//! This module provides the `TransactionEngine`, which coordinates fraud
//! evaluation, funds checks, and atomic balance mutation for every request.
//!
//! # Processing Pipeline
//!
//! ```text
//! validate ─▶ resolve + authorize ─▶ idempotency replay ─▶ fraud gate
//!                                                             │
//!          ┌──────────────── retry on version conflict ───────┤
//!          ▼                                                  │
//!   read balances ─▶ funds check ─▶ AccountStore::commit ─────┘
//!                                      (log append inside)
//! ```
//!
//! Validation, unknown accounts, and authorization failures are returned
//! without a trace in the log. Every request that reaches the fraud gate ends
//! in exactly one persisted terminal record.
//!
//! # Thread Safety
//!
//! The engine is `Clone`; clones share the same stores and id sequence and can
//! be used from any number of threads. No lock is held during fraud evaluation
//! or the funds check; the store's commit is the only synchronized step.

use super::clock::{Clock, SystemClock};
use super::config::EngineConfig;
use super::fraud_detector::{FraudDetector, FraudRules, FraudVerdict};
use super::traits::{AccountStore, BalanceUpdate, TransactionLog};
use super::{InMemoryAccountStore, InMemoryTransactionLog};
use crate::types::{
    Account, AccountId, Caller, LogError, NewAccount, OwnerId, StoreError, Transaction,
    TransactionId, TransactionRequest, TxError,
};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, info, instrument, warn};

/// Reason recorded on a transaction that failed the funds check
pub const REASON_INSUFFICIENT_FUNDS: &str = "insufficient_funds";

/// Reason recorded when optimistic retries ran out
pub const REASON_CONCURRENCY_CONFLICT: &str = "concurrency_conflict";

/// Reason recorded when account locks could not be acquired in time
pub const REASON_UNAVAILABLE: &str = "unavailable";

/// Outcome of one plan-and-commit attempt
enum Attempt {
    InsufficientFunds {
        account: AccountId,
        available: Decimal,
    },
    Overflow {
        account: AccountId,
    },
    State(TxError),
    Store(StoreError),
}

impl From<StoreError> for Attempt {
    fn from(error: StoreError) -> Self {
        Attempt::Store(error)
    }
}

/// Fraud-gated transaction engine
///
/// Owns the decision to mutate account state. Storage and time are injected
/// through the [`AccountStore`], [`TransactionLog`] and [`Clock`] traits.
#[derive(Clone)]
pub struct TransactionEngine {
    accounts: Arc<dyn AccountStore>,
    log: Arc<dyn TransactionLog>,
    clock: Arc<dyn Clock>,
    detector: FraudDetector,
    config: EngineConfig,

    /// Next transaction id; shared between clones
    next_id: Arc<AtomicU64>,
}

impl TransactionEngine {
    /// Create an engine over the given collaborators
    ///
    /// # Arguments
    ///
    /// * `accounts` - Account storage; its own lock timeout bounds every commit
    ///   and `config.commit_timeout` is not applied to it
    /// * `log` - Transaction log receiving every terminal record
    /// * `clock` - Time source stamping requests without a timestamp
    /// * `detector` - Fraud rules applied before any mutation
    /// * `config` - Retry settings
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        log: Arc<dyn TransactionLog>,
        clock: Arc<dyn Clock>,
        detector: FraudDetector,
        config: EngineConfig,
    ) -> Self {
        TransactionEngine {
            accounts,
            log,
            clock,
            detector,
            config,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Engine over fresh in-memory stores, the system clock and default fraud rules
    pub fn in_memory(config: EngineConfig) -> Self {
        let accounts = Arc::new(InMemoryAccountStore::with_lock_timeout(
            config.commit_timeout,
        ));
        Self::new(
            accounts,
            Arc::new(InMemoryTransactionLog::new()),
            Arc::new(SystemClock),
            FraudDetector::default(),
            config,
        )
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_fraud_rules(mut self, rules: FraudRules) -> Self {
        self.detector = FraudDetector::new(rules);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Open a new account
    ///
    /// # Errors
    ///
    /// Returns `TxError::InvalidRequest` if the opening balance is negative or
    /// the id or account number is already taken.
    pub fn open_account(&self, new_account: NewAccount) -> Result<Account, TxError> {
        if new_account.opening_balance < Decimal::ZERO {
            return Err(TxError::invalid_request(format!(
                "opening balance must not be negative, got {}",
                new_account.opening_balance
            )));
        }

        let account = self.accounts.insert(new_account.into())?;
        info!(
            account = account.id,
            owner = account.owner_id,
            balance = %account.balance,
            "Account opened"
        );
        Ok(account)
    }

    /// Process a transaction request on behalf of `caller`
    ///
    /// # Arguments
    ///
    /// * `caller` - Identity submitting the request; owners may only debit
    ///   their own accounts
    /// * `request` - The requested movement of funds
    ///
    /// # Returns
    ///
    /// * `Ok(Transaction)` - The completed record (or the earlier completed
    ///   record when an idempotency key is replayed)
    /// * `Err(TxError)` - See [`TxError::kind`] for the category
    ///
    /// # Errors
    ///
    /// - `InvalidRequest`, `AccountNotFound`, `Unauthorized`: nothing persisted
    /// - `FraudDetected`: a `Rejected` record was persisted
    /// - `InsufficientFunds`, `ConcurrencyConflict`, `Unavailable`: a `Failed`
    ///   record was persisted
    #[instrument(
        level = "debug",
        skip_all,
        fields(tx_type = %request.tx_type, amount = %request.amount)
    )]
    pub fn process(
        &self,
        caller: &Caller,
        request: TransactionRequest,
    ) -> Result<Transaction, TxError> {
        if let Err(err) = request.validate() {
            debug!(%err, "Request failed validation");
            return Err(err);
        }

        let source = self.resolve(request.from_account_id)?;
        self.resolve(request.to_account_id)?;

        if let Some(source) = &source {
            if let Err(err) = caller.authorize_debit(source) {
                warn!(%err, "Debit not authorized");
                return Err(err);
            }
        }

        if let Some(key) = &request.idempotency_key {
            if let Some(existing) = self.log.find_by_idempotency_key(key) {
                return replay(existing, &request);
            }
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut tx = Transaction::pending(id, request.clone(), caller.owner_id(), self.clock.now());

        if let FraudVerdict::Flagged(rule) = self.detector.evaluate(&tx) {
            warn!(tx = id, %rule, "Transaction rejected by fraud gate");
            tx.reject(format!("fraud: {}", rule))?;
            self.log.append(tx)?;
            return Err(TxError::fraud_detected(id, rule));
        }

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;

            match self.try_commit(&tx) {
                Ok(completed) => {
                    info!(tx = id, attempt, "Transaction committed");
                    return Ok(completed);
                }

                Err(Attempt::InsufficientFunds { account, available }) => {
                    warn!(tx = id, account, %available, "Insufficient funds");
                    let err = TxError::insufficient_funds(account, available, tx.amount);
                    return Err(self.record_failure(tx, REASON_INSUFFICIENT_FUNDS, err));
                }

                Err(Attempt::Overflow { account }) => {
                    let err = TxError::invalid_request(format!(
                        "crediting account {} would overflow its balance",
                        account
                    ));
                    return Err(self.record_failure(tx, err.code(), err));
                }

                Err(Attempt::State(err)) => return Err(err),

                Err(Attempt::Store(err)) if err.is_conflict() => {
                    if attempt <= self.config.max_retries {
                        warn!(
                            tx = id,
                            %err,
                            "Concurrency conflict, retrying (attempt {}/{})",
                            attempt,
                            self.config.max_retries + 1
                        );
                        thread::sleep(self.config.backoff_for(attempt));
                        continue;
                    }

                    let account = conflicting_account(&err).unwrap_or_default();
                    error!(tx = id, account, attempts = attempt, "Concurrency retries exhausted");
                    let err = TxError::concurrency_conflict(account, attempt);
                    return Err(self.record_failure(tx, REASON_CONCURRENCY_CONFLICT, err));
                }

                Err(Attempt::Store(StoreError::LockTimeout { account })) => {
                    error!(tx = id, account, "Timed out waiting for account lock");
                    let err = TxError::from(StoreError::LockTimeout { account });
                    return Err(self.record_failure(tx, REASON_UNAVAILABLE, err));
                }

                Err(Attempt::Store(StoreError::Log(LogError::DuplicateIdempotencyKey {
                    existing,
                    ..
                }))) => {
                    // A concurrent submission with the same key committed first.
                    return match self.log.find_by_id(existing) {
                        Some(winner) => replay(winner, &request),
                        None => Err(TxError::unavailable(format!(
                            "transaction {} holding the idempotency key is missing",
                            existing
                        ))),
                    };
                }

                Err(Attempt::Store(err)) => {
                    let err = TxError::from(err);
                    error!(tx = id, %err, "Commit failed");
                    return Err(self.record_failure(tx, err.code(), err));
                }
            }
        }
    }

    /// Read balances, check funds and commit the mutation with the log append
    fn try_commit(&self, tx: &Transaction) -> Result<Transaction, Attempt> {
        let source = tx
            .from_account_id
            .map(|id| self.accounts.get(id))
            .transpose()?;
        let target = tx
            .to_account_id
            .map(|id| self.accounts.get(id))
            .transpose()?;

        let mut updates = Vec::with_capacity(2);

        if let Some(source) = &source {
            if source.balance < tx.amount {
                return Err(Attempt::InsufficientFunds {
                    account: source.id,
                    available: source.balance,
                });
            }
            updates.push(BalanceUpdate::from_snapshot(
                source,
                source.balance - tx.amount,
            ));
        }

        if let Some(target) = &target {
            let credited = target
                .balance
                .checked_add(tx.amount)
                .ok_or(Attempt::Overflow { account: target.id })?;
            updates.push(BalanceUpdate::from_snapshot(target, credited));
        }

        let mut completed = tx.clone();
        completed.complete().map_err(Attempt::State)?;

        let log = &self.log;
        self.accounts
            .commit(&updates, &mut || log.append(completed.clone()))?;

        Ok(completed)
    }

    /// Mark `tx` failed, persist it, and hand back the error to return
    fn record_failure(&self, mut tx: Transaction, reason: &str, err: TxError) -> TxError {
        if let Err(transition) = tx.fail(reason) {
            return transition;
        }
        if let Err(log_err) = self.log.append(tx) {
            error!(%log_err, "Failed to persist failed transaction");
            return log_err.into();
        }
        err
    }

    fn resolve(&self, id: Option<AccountId>) -> Result<Option<Account>, TxError> {
        match id {
            Some(id) => match self.accounts.get(id) {
                Ok(account) => Ok(Some(account)),
                Err(err) => {
                    debug!(account = id, %err, "Account lookup failed");
                    Err(err.into())
                }
            },
            None => Ok(None),
        }
    }

    /// All persisted transactions in append order
    pub fn get_all_transactions(&self) -> Vec<Transaction> {
        self.log.find_all()
    }

    pub fn get_transaction(&self, id: TransactionId) -> Option<Transaction> {
        self.log.find_by_id(id)
    }

    /// Current balance of an account
    ///
    /// # Errors
    ///
    /// Returns `TxError::AccountNotFound` if the account does not exist
    pub fn get_account_balance(&self, id: AccountId) -> Result<Decimal, TxError> {
        Ok(self.accounts.get(id)?.balance)
    }

    pub fn get_account(&self, id: AccountId) -> Result<Account, TxError> {
        Ok(self.accounts.get(id)?)
    }

    /// Look an account up by its external account number
    ///
    /// # Errors
    ///
    /// Returns an `AccountNotFound` kind error if no account carries the number
    pub fn find_account_by_number(&self, account_number: &str) -> Result<Account, TxError> {
        self.accounts
            .find_by_number(account_number)
            .ok_or_else(|| TxError::unknown_account_number(account_number))
    }

    pub fn get_balance_by_number(&self, account_number: &str) -> Result<Decimal, TxError> {
        Ok(self.find_account_by_number(account_number)?.balance)
    }

    /// Accounts held by `owner`, sorted by id
    pub fn accounts_for_owner(&self, owner: OwnerId) -> Vec<Account> {
        self.accounts.find_by_owner(owner)
    }

    /// Snapshot of every account, sorted by id
    pub fn accounts(&self) -> Vec<Account> {
        self.accounts.all()
    }
}

/// Return `existing` for a replayed idempotency key if the payload matches
fn replay(existing: Transaction, request: &TransactionRequest) -> Result<Transaction, TxError> {
    if existing.matches_request(request) {
        info!(tx = existing.id, "Replaying completed transaction for idempotency key");
        Ok(existing)
    } else {
        Err(TxError::invalid_request(format!(
            "idempotency key '{}' already used by transaction {} with a different payload",
            existing.idempotency_key.as_deref().unwrap_or_default(),
            existing.id
        )))
    }
}

fn conflicting_account(err: &StoreError) -> Option<AccountId> {
    match err {
        StoreError::VersionConflict { account, .. } | StoreError::BalanceConflict { account, .. } => {
            Some(*account)
        }
        _ => None,
    }
}
