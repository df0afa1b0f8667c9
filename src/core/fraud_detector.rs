//! Stateless fraud rule evaluation
//!
//! Rules are checked in a fixed order and the first match wins:
//!
//! 1. Amount above `high_amount_threshold`, any transaction type
//! 2. Timestamp strictly inside the overnight window, any transaction type
//! 3. Withdraw or transfer above `debit_threshold`
//!
//! A transaction without a timestamp skips rule 2.

use crate::types::{FraudRule, Transaction};
use chrono::NaiveTime;
use rust_decimal::Decimal;

/// Thresholds and window used by [`FraudDetector`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FraudRules {
    /// Amounts strictly above this are fraudulent regardless of type
    pub high_amount_threshold: Decimal,

    /// Debits strictly above this are fraudulent
    pub debit_threshold: Decimal,

    /// Exclusive start of the suspicious window
    pub window_start: NaiveTime,

    /// Exclusive end of the suspicious window
    pub window_end: NaiveTime,
}

impl Default for FraudRules {
    fn default() -> Self {
        FraudRules {
            high_amount_threshold: Decimal::new(10_000, 0),
            debit_threshold: Decimal::new(5_000, 0),
            window_start: NaiveTime::MIN + chrono::Duration::hours(2),
            window_end: NaiveTime::MIN + chrono::Duration::hours(6),
        }
    }
}

/// Outcome of a fraud evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FraudVerdict {
    Clean,
    Flagged(FraudRule),
}

impl FraudVerdict {
    pub fn is_fraudulent(&self) -> bool {
        matches!(self, FraudVerdict::Flagged(_))
    }
}

/// Pure rule evaluator; no I/O and no shared state
#[derive(Debug, Clone, Default)]
pub struct FraudDetector {
    rules: FraudRules,
}

impl FraudDetector {
    pub fn new(rules: FraudRules) -> Self {
        FraudDetector { rules }
    }

    /// Evaluate `transaction` against the rule set
    ///
    /// # Arguments
    ///
    /// * `transaction` - The proposed transaction; only type, amount and
    ///   timestamp are read
    ///
    /// # Returns
    ///
    /// `FraudVerdict::Flagged` with the first matching rule, otherwise
    /// `FraudVerdict::Clean`
    pub fn evaluate(&self, transaction: &Transaction) -> FraudVerdict {
        if transaction.amount > self.rules.high_amount_threshold {
            return FraudVerdict::Flagged(FraudRule::HighAmount);
        }

        if let Some(timestamp) = transaction.timestamp {
            if self.in_suspicious_window(timestamp.time()) {
                return FraudVerdict::Flagged(FraudRule::SuspiciousHour);
            }
        }

        if transaction.tx_type.is_debit() && transaction.amount > self.rules.debit_threshold {
            return FraudVerdict::Flagged(FraudRule::LargeDebit);
        }

        FraudVerdict::Clean
    }

    pub fn is_fraudulent(&self, transaction: &Transaction) -> bool {
        self.evaluate(transaction).is_fraudulent()
    }

    fn in_suspicious_window(&self, time: NaiveTime) -> bool {
        time > self.rules.window_start && time < self.rules.window_end
    }
}
