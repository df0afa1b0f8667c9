//! Concurrent replay strategy
//!
//! Requests are read in file order and dispatched onto the tokio blocking pool,
//! with at most `workers` requests in flight. Requests touching disjoint
//! accounts commit in parallel; requests sharing an account are linearized by
//! the account store, so the final state equals some serial ordering of the
//! file, not necessarily file order.
//!
//! # Architecture
//!
//! ```text
//! RequestReader ─▶ stream::iter ─▶ map(spawn_blocking(engine.process))
//!                                        │
//!                                 buffer_unordered(workers)
//!                                        │
//!                                  ReplaySummary
//! ```

use super::{ReplayStrategy, ReplaySummary, RowOutcome};
use crate::core::TransactionEngine;
use crate::io::RequestReader;
use crate::types::{Caller, ReplayError, TransactionRequest};
use futures::stream::{self, StreamExt};
use std::path::Path;
use tracing::{debug, warn};

/// Multi-threaded replay with bounded in-flight requests
#[derive(Debug, Clone)]
pub struct ConcurrentStrategy {
    workers: usize,
}

impl ConcurrentStrategy {
    /// Create a strategy running up to `workers` requests at once
    ///
    /// Zero falls back to the number of CPU cores.
    pub fn new(workers: usize) -> Self {
        let workers = if workers == 0 {
            let fallback = num_cpus::get();
            warn!(fallback, "Invalid worker count 0, using CPU count");
            fallback
        } else {
            workers
        };

        Self { workers }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }
}

impl Default for ConcurrentStrategy {
    fn default() -> Self {
        Self::new(num_cpus::get())
    }
}

async fn dispatch(
    engine: TransactionEngine,
    row: Result<TransactionRequest, String>,
) -> Result<RowOutcome, ReplayError> {
    let request = match row {
        Ok(request) => request,
        Err(error) => return Ok(RowOutcome::Malformed(error)),
    };

    let result = tokio::task::spawn_blocking(move || engine.process(&Caller::System, request))
        .await
        .map_err(|e| ReplayError::Runtime(format!("Replay worker failed: {}", e)))?;

    Ok(RowOutcome::Processed(result))
}

impl ReplayStrategy for ConcurrentStrategy {
    fn replay(
        &self,
        engine: &TransactionEngine,
        requests_path: &Path,
    ) -> Result<ReplaySummary, ReplayError> {
        let reader = RequestReader::requests(requests_path)?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.workers)
            .max_blocking_threads(self.workers)
            .build()
            .map_err(|e| ReplayError::Runtime(format!("Failed to create tokio runtime: {}", e)))?;

        debug!(workers = self.workers, "Starting concurrent replay");

        runtime.block_on(async {
            let mut summary = ReplaySummary::default();

            let mut outcomes = stream::iter(reader)
                .map(|row| dispatch(engine.clone(), row))
                .buffer_unordered(self.workers);

            while let Some(outcome) = outcomes.next().await {
                summary.record(outcome?);
            }

            Ok::<_, ReplayError>(summary)
        })
    }
}
