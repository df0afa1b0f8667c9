use crate::core::EngineConfig;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// Replay account and transaction CSV files through the fraud-gated ledger
#[derive(Parser, Debug)]
#[command(name = "fraud-gated-ledger")]
#[command(
    about = "Replay transaction requests through the fraud-gated ledger",
    long_about = None
)]
pub struct CliArgs {
    /// Accounts CSV: id,account_number,owner,balance
    #[arg(value_name = "ACCOUNTS", help = "Path to the accounts CSV file")]
    pub accounts_file: PathBuf,

    /// Requests CSV: type,from,to,amount,timestamp,key
    #[arg(value_name = "TRANSACTIONS", help = "Path to the transaction requests CSV file")]
    pub transactions_file: PathBuf,

    /// Replay strategy
    #[arg(
        long = "strategy",
        value_name = "STRATEGY",
        default_value = "sequential",
        env = "LEDGER_STRATEGY",
        help = "Replay strategy: 'sequential' for file order or 'concurrent' for parallel replay"
    )]
    pub strategy: StrategyType,

    /// Requests in flight at once (concurrent mode only)
    #[arg(
        long = "workers",
        value_name = "COUNT",
        env = "LEDGER_WORKERS",
        help = "Requests processed concurrently (default: CPU cores)"
    )]
    pub workers: Option<usize>,

    #[arg(
        long = "max-retries",
        value_name = "COUNT",
        env = "LEDGER_MAX_RETRIES",
        help = "Commit retries after a concurrency conflict (default: 3)"
    )]
    pub max_retries: Option<u32>,

    #[arg(
        long = "retry-backoff-ms",
        value_name = "MS",
        env = "LEDGER_RETRY_BACKOFF_MS",
        help = "Base linear backoff between commit retries (default: 5)"
    )]
    pub retry_backoff_ms: Option<u64>,

    #[arg(
        long = "commit-timeout-ms",
        value_name = "MS",
        env = "LEDGER_COMMIT_TIMEOUT_MS",
        help = "Bound on waiting for account locks (default: 250)"
    )]
    pub commit_timeout_ms: Option<u64>,

    /// Where to write the transaction report
    #[arg(
        long = "report",
        value_name = "PATH",
        help = "Write every persisted transaction as CSV to this file"
    )]
    pub report: Option<PathBuf>,
}

/// Available replay strategies
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StrategyType {
    Sequential,
    Concurrent,
}

impl CliArgs {
    /// Build the engine configuration, filling unset flags from defaults
    pub fn to_engine_config(&self) -> EngineConfig {
        let default = EngineConfig::default();
        EngineConfig::new(
            self.max_retries.unwrap_or(default.max_retries),
            self.retry_backoff_ms
                .map(Duration::from_millis)
                .unwrap_or(default.retry_backoff),
            self.commit_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(default.commit_timeout),
        )
    }

    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(num_cpus::get)
    }
}
