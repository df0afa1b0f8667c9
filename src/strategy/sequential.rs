//! Sequential replay strategy
//!
//! Submits requests one at a time, in file order, on the calling thread. The
//! resulting log order matches the file order exactly.

use super::{ReplayStrategy, ReplaySummary, RowOutcome};
use crate::core::TransactionEngine;
use crate::io::RequestReader;
use crate::types::{Caller, ReplayError};
use std::path::Path;

/// Single-threaded, in-order replay
#[derive(Debug, Clone, Copy)]
pub struct SequentialStrategy;

impl ReplayStrategy for SequentialStrategy {
    fn replay(
        &self,
        engine: &TransactionEngine,
        requests_path: &Path,
    ) -> Result<ReplaySummary, ReplayError> {
        let mut summary = ReplaySummary::default();

        for row in RequestReader::requests(requests_path)? {
            let outcome = match row {
                Ok(request) => RowOutcome::Processed(engine.process(&Caller::System, request)),
                Err(error) => RowOutcome::Malformed(error),
            };
            summary.record(outcome);
        }

        Ok(summary)
    }
}
