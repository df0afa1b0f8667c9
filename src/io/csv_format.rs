//! CSV format handling for replay input and ledger output
//!
//! This module centralizes all CSV format concerns, providing:
//! - Row structures for deserializing account and request files
//! - Conversion from rows to domain types
//! - Balance and transaction report serialization
//!
//! All functions are pure (no file I/O) for easy testing.

use crate::types::{
    Account, AccountId, NewAccount, OwnerId, ReplayError, Transaction, TransactionRequest,
    TransactionType,
};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Write;
use std::str::FromStr;

/// Timestamp layout written to reports
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Timestamp layouts accepted on input
const INPUT_TIMESTAMP_FORMATS: [&str; 2] = [TIMESTAMP_FORMAT, "%Y-%m-%d %H:%M:%S"];

/// Row of the accounts file: `id,account_number,owner,balance`
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AccountRow {
    pub id: AccountId,
    pub account_number: String,
    pub owner: OwnerId,
    pub balance: String,
}

/// Row of the requests file: `type,from,to,amount,timestamp,key`
///
/// `from`, `to`, `timestamp` and `key` may be empty.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RequestRow {
    #[serde(rename = "type")]
    pub tx_type: String,
    #[serde(default)]
    pub from: Option<AccountId>,
    #[serde(default)]
    pub to: Option<AccountId>,
    pub amount: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
}

/// Convert an `AccountRow` into an account opening request
///
/// # Returns
///
/// Result containing either:
/// - Ok(NewAccount) - Successfully converted row
/// - Err(String) - Error message describing the conversion failure
pub fn convert_account_row(row: AccountRow) -> Result<NewAccount, String> {
    let number = row.account_number.trim();
    if number.is_empty() {
        return Err(format!("Account {} has an empty account number", row.id));
    }

    let balance = parse_amount(&row.balance)
        .map_err(|e| format!("{} for account {}", e, row.id))?;

    Ok(NewAccount::new(row.id, number, row.owner, balance))
}

/// Convert a `RequestRow` into a transaction request
///
/// Only the row's syntax is checked here; shape rules (positive amount,
/// required references) are enforced by the engine.
pub fn convert_request_row(row: RequestRow) -> Result<TransactionRequest, String> {
    let tx_type = TransactionType::from_str(&row.tx_type).map_err(|e| e.to_string())?;
    let amount = parse_amount(&row.amount)?;

    let mut request = TransactionRequest::new(tx_type, amount, row.from, row.to);

    if let Some(raw) = non_empty(row.timestamp.as_deref()) {
        request = request.at(parse_timestamp(raw)?);
    }
    if let Some(key) = non_empty(row.key.as_deref()) {
        request = request.with_idempotency_key(key);
    }

    Ok(request)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_amount(raw: &str) -> Result<Decimal, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("Missing amount".to_string());
    }
    Decimal::from_str(trimmed).map_err(|_| format!("Invalid amount '{}'", raw))
}

fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, String> {
    INPUT_TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .ok_or_else(|| format!("Invalid timestamp '{}'", raw))
}

/// Write account balances as CSV
///
/// Columns: `id,account_number,owner,balance`, sorted by id.
pub fn write_balances_csv(accounts: &[Account], output: &mut dyn Write) -> Result<(), ReplayError> {
    let mut writer = csv::Writer::from_writer(output);
    writer.write_record(["id", "account_number", "owner", "balance"])?;

    let mut sorted = accounts.to_vec();
    sorted.sort_by_key(|account| account.id);

    for account in sorted {
        writer.write_record(&[
            account.id.to_string(),
            account.account_number,
            account.owner_id.to_string(),
            format!("{:.4}", account.balance),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Write the transaction log as CSV, in log order
///
/// Columns: `id,type,from,to,amount,timestamp,status,reason,key,initiated_by`.
/// Absent values are written as empty fields.
pub fn write_report_csv(
    transactions: &[Transaction],
    output: &mut dyn Write,
) -> Result<(), ReplayError> {
    let mut writer = csv::Writer::from_writer(output);
    writer.write_record([
        "id",
        "type",
        "from",
        "to",
        "amount",
        "timestamp",
        "status",
        "reason",
        "key",
        "initiated_by",
    ])?;

    for tx in transactions {
        writer.write_record(&[
            tx.id.to_string(),
            tx.tx_type.to_string(),
            optional(tx.from_account_id),
            optional(tx.to_account_id),
            tx.amount.to_string(),
            tx.timestamp
                .map(|ts| ts.format(TIMESTAMP_FORMAT).to_string())
                .unwrap_or_default(),
            tx.status.label().to_string(),
            tx.status.reason().unwrap_or_default().to_string(),
            tx.idempotency_key.clone().unwrap_or_default(),
            optional(tx.initiated_by),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

fn optional(value: Option<u64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}
