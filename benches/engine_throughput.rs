//! Benchmark suite for replay strategies and the engine hot path
//!
//! # Running Benchmarks
//!
//! ```bash
//! cargo bench
//! ```
//!
//! Request files are generated into temporary files before timing starts:
//! transfers cycling over a small set of accounts, so the concurrent strategy
//! sees real lock contention, with an occasional fraud-gated row.

use divan::Bencher;
use fraud_gated_ledger::cli::StrategyType;
use fraud_gated_ledger::core::{EngineConfig, TransactionEngine};
use fraud_gated_ledger::strategy::create_strategy;
use fraud_gated_ledger::types::{Caller, NewAccount, TransactionRequest};
use rust_decimal::Decimal;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

const ACCOUNTS: u64 = 16;

fn main() {
    divan::main();
}

fn engine() -> TransactionEngine {
    let engine = TransactionEngine::in_memory(EngineConfig::new(
        100,
        Duration::from_micros(50),
        Duration::from_secs(5),
    ));
    for id in 1..=ACCOUNTS {
        engine
            .open_account(NewAccount::new(
                id,
                format!("ACC-{}", id),
                id,
                Decimal::new(1_000_000, 0),
            ))
            .expect("Failed to open account");
    }
    engine
}

fn requests_file(rows: u64) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    writeln!(file, "type,from,to,amount,timestamp,key").expect("Failed to write header");
    for i in 0..rows {
        let from = i % ACCOUNTS + 1;
        let to = (i * 7 + 3) % ACCOUNTS + 1;
        let row = if i % 50 == 0 {
            format!("withdraw,{},,6000,2025-03-10T12:00:00,", from)
        } else if from == to {
            format!("deposit,,{},10,2025-03-10T12:00:00,", to)
        } else {
            format!("transfer,{},{},10,2025-03-10T12:00:00,", from, to)
        };
        writeln!(file, "{}", row).expect("Failed to write row");
    }
    file.flush().expect("Failed to flush temp file");
    file
}

#[divan::bench(args = [1_000, 10_000])]
fn sequential_replay(bencher: Bencher, rows: u64) {
    let file = requests_file(rows);
    bencher.with_inputs(engine).bench_values(|engine| {
        create_strategy(StrategyType::Sequential, 1)
            .replay(&engine, file.path())
            .expect("Replay failed")
    });
}

#[divan::bench(args = [1_000, 10_000])]
fn concurrent_replay(bencher: Bencher, rows: u64) {
    let file = requests_file(rows);
    bencher.with_inputs(engine).bench_values(|engine| {
        create_strategy(StrategyType::Concurrent, num_cpus::get())
            .replay(&engine, file.path())
            .expect("Replay failed")
    });
}

/// Single uncontended transfer through validation, fraud gate and commit
#[divan::bench]
fn process_transfer(bencher: Bencher) {
    let engine = engine();
    bencher.bench(|| {
        engine.process(
            &Caller::System,
            TransactionRequest::transfer(1, 2, Decimal::ONE),
        )
    });
}
