//! I/O module
//!
//! Handles CSV input for replays and CSV output of balances and reports.
//!
//! # Components
//!
//! - `csv_format` - Row types, conversions and output serialization
//! - `reader` - Streaming row readers with line-numbered errors

pub mod csv_format;
pub mod reader;

pub use csv_format::{
    convert_account_row, convert_request_row, write_balances_csv, write_report_csv, AccountRow,
    RequestRow,
};
pub use reader::{AccountReader, RequestReader, RowReader};
