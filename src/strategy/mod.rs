//! Replay strategies for feeding request files through the engine
//!
//! This module defines the Strategy pattern for CSV replays. A strategy reads
//! transaction requests from a file and submits each one to a shared
//! [`TransactionEngine`] as the system caller; the engine's outcome for every
//! row is tallied in a [`ReplaySummary`].

use crate::cli::StrategyType;
use crate::core::TransactionEngine;
use crate::io::AccountReader;
use crate::types::{ErrorKind, ReplayError, Transaction, TxError};
use std::path::Path;
use tracing::{info, warn};

pub mod concurrent;
pub mod sequential;

pub use concurrent::ConcurrentStrategy;
pub use sequential::SequentialStrategy;

/// Replay strategy trait
pub trait ReplayStrategy: Send + Sync {
    /// Submit every request in `requests_path` to `engine`
    ///
    /// # Errors
    ///
    /// Returns an error only for fatal problems (file cannot be opened,
    /// runtime cannot start). Malformed rows and refused transactions are
    /// counted in the summary and processing continues.
    fn replay(
        &self,
        engine: &TransactionEngine,
        requests_path: &Path,
    ) -> Result<ReplaySummary, ReplayError>;
}

/// Create a replay strategy for the selected type
///
/// # Arguments
///
/// * `strategy_type` - Sequential or concurrent replay
/// * `workers` - Number of requests in flight at once (concurrent only)
pub fn create_strategy(strategy_type: StrategyType, workers: usize) -> Box<dyn ReplayStrategy> {
    match strategy_type {
        StrategyType::Sequential => Box::new(SequentialStrategy),
        StrategyType::Concurrent => Box::new(ConcurrentStrategy::new(workers)),
    }
}

/// Outcome of a single request row
#[derive(Debug)]
pub enum RowOutcome {
    /// Row could not be parsed; never reached the engine
    Malformed(String),
    Processed(Result<Transaction, TxError>),
}

/// Per-outcome counters for a replay
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub completed: usize,
    /// Blocked by the fraud gate
    pub rejected: usize,
    /// Persisted as failed (funds, contention, storage)
    pub failed: usize,
    /// Refused before evaluation (invalid, unknown account, unauthorized)
    pub refused: usize,
    pub malformed: usize,
}

impl ReplaySummary {
    pub fn record(&mut self, outcome: RowOutcome) {
        match outcome {
            RowOutcome::Malformed(error) => {
                warn!(%error, "Skipping malformed request row");
                self.malformed += 1;
            }
            RowOutcome::Processed(Ok(_)) => self.completed += 1,
            RowOutcome::Processed(Err(err)) => match err.kind() {
                ErrorKind::FraudDetected => self.rejected += 1,
                ErrorKind::InsufficientFunds
                | ErrorKind::ConcurrencyConflict
                | ErrorKind::Unavailable => self.failed += 1,
                ErrorKind::InvalidRequest
                | ErrorKind::AccountNotFound
                | ErrorKind::Unauthorized
                | ErrorKind::InvalidStateTransition => {
                    warn!(code = err.code(), %err, "Request refused");
                    self.refused += 1;
                }
            },
        }
    }

    pub fn total(&self) -> usize {
        self.completed + self.rejected + self.failed + self.refused + self.malformed
    }
}

/// Open every account listed in `accounts_path`
///
/// Rows that fail to parse or to open (duplicate id or number, negative
/// balance) are logged and skipped.
///
/// # Returns
///
/// The number of accounts opened
pub fn load_accounts(engine: &TransactionEngine, accounts_path: &Path) -> Result<usize, ReplayError> {
    let mut opened = 0;

    for row in AccountReader::accounts(accounts_path)? {
        let opened_account =
            row.and_then(|account| engine.open_account(account).map_err(|e| e.to_string()));
        match opened_account {
            Ok(_) => opened += 1,
            Err(error) => warn!(%error, "Skipping account row"),
        }
    }

    info!(opened, "Accounts loaded");
    Ok(opened)
}
