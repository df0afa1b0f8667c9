//! Fraud rule identifiers shared by the detector, errors and audit records

use std::fmt;

/// A fraud rule that flagged a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FraudRule {
    /// Amount above the absolute ceiling, any transaction type
    HighAmount,

    /// Timestamp inside the overnight suspicious window, any transaction type
    SuspiciousHour,

    /// Withdraw or transfer above the debit ceiling
    LargeDebit,
}

impl FraudRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            FraudRule::HighAmount => "high_amount",
            FraudRule::SuspiciousHour => "suspicious_hour",
            FraudRule::LargeDebit => "large_debit",
        }
    }
}

impl fmt::Display for FraudRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
