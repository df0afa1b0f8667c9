//! Streaming CSV readers for replay input
//!
//! `RowReader` deserializes one row at a time and converts it through a
//! `csv_format` conversion function, so memory use stays constant regardless
//! of file size.
//!
//! # Error Handling
//!
//! - Fatal errors (file not found) are returned from the constructors
//! - Row-level parse and conversion errors are yielded as `Err` items, prefixed
//!   with the line number (the header is line 1)

use crate::io::csv_format::{convert_account_row, convert_request_row, AccountRow, RequestRow};
use crate::types::{NewAccount, ReplayError, TransactionRequest};
use csv::{ReaderBuilder, Trim};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::path::Path;

/// Reader over transaction request rows
pub type RequestReader = RowReader<RequestRow, TransactionRequest>;

/// Reader over account rows
pub type AccountReader = RowReader<AccountRow, NewAccount>;

/// Iterator over converted CSV rows
#[derive(Debug)]
pub struct RowReader<Row, Out> {
    reader: csv::Reader<File>,
    line_num: usize,
    convert: fn(Row) -> Result<Out, String>,
}

impl<Row, Out> RowReader<Row, Out> {
    /// Open `path` for streaming, converting each row with `convert`
    ///
    /// The reader trims whitespace around every field and accepts rows with
    /// trailing optional columns left out.
    pub fn open(path: &Path, convert: fn(Row) -> Result<Out, String>) -> Result<Self, ReplayError> {
        let file = File::open(path).map_err(|source| ReplayError::Open {
            path: path.display().to_string(),
            source,
        })?;

        let reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .buffer_capacity(8 * 1024)
            .from_reader(file);

        Ok(Self {
            reader,
            line_num: 1,
            convert,
        })
    }
}

impl RequestReader {
    pub fn requests(path: &Path) -> Result<Self, ReplayError> {
        Self::open(path, convert_request_row)
    }
}

impl AccountReader {
    pub fn accounts(path: &Path) -> Result<Self, ReplayError> {
        Self::open(path, convert_account_row)
    }
}

impl<Row: DeserializeOwned, Out> Iterator for RowReader<Row, Out> {
    type Item = Result<Out, String>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.reader.deserialize::<Row>().next()?;
        self.line_num += 1;

        Some(match row {
            Ok(row) => (self.convert)(row).map_err(|e| format!("Line {}: {}", self.line_num, e)),
            Err(e) => Err(format!("Line {}: CSV parse error: {}", self.line_num, e)),
        })
    }
}
