//! Fraud-gated ledger replay CLI
//!
//! Loads accounts from one CSV file, replays transaction requests from another
//! through the fraud-gated engine, and prints the final balances to stdout.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- accounts.csv transactions.csv > balances.csv
//! cargo run -- --strategy concurrent --workers 8 accounts.csv transactions.csv
//! cargo run -- --report report.csv accounts.csv transactions.csv
//! RUST_LOG=fraud_gated_ledger=debug cargo run -- accounts.csv transactions.csv
//! ```
//!
//! Logs go to stderr; filter them with `RUST_LOG`.
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Fatal error (missing file, unwritable output, runtime failure)

use anyhow::Context;
use fraud_gated_ledger::cli;
use fraud_gated_ledger::core::TransactionEngine;
use fraud_gated_ledger::io::{write_balances_csv, write_report_csv};
use fraud_gated_ledger::strategy::{self, load_accounts};
use std::fs::File;
use std::io::BufWriter;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fraud_gated_ledger=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = cli::parse_args();
    let engine = TransactionEngine::in_memory(args.to_engine_config());
    let config = engine.config();
    info!(
        max_retries = config.max_retries,
        retry_backoff = ?config.retry_backoff,
        commit_timeout = ?config.commit_timeout,
        strategy = ?args.strategy,
        "Engine configured"
    );

    let opened = load_accounts(&engine, &args.accounts_file)
        .with_context(|| format!("loading accounts from {}", args.accounts_file.display()))?;

    let strategy = strategy::create_strategy(args.strategy, args.worker_count());
    let summary = strategy
        .replay(&engine, &args.transactions_file)
        .with_context(|| {
            format!(
                "replaying transactions from {}",
                args.transactions_file.display()
            )
        })?;

    info!(
        accounts = opened,
        completed = summary.completed,
        rejected = summary.rejected,
        failed = summary.failed,
        refused = summary.refused,
        malformed = summary.malformed,
        "Replay finished"
    );

    let mut stdout = std::io::stdout().lock();
    write_balances_csv(&engine.accounts(), &mut stdout).context("writing balances")?;

    if let Some(path) = &args.report {
        let file = File::create(path)
            .with_context(|| format!("creating report {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        write_report_csv(&engine.get_all_transactions(), &mut writer)
            .with_context(|| format!("writing report {}", path.display()))?;
    }

    Ok(())
}
