//! Append-only in-memory transaction log
//!
//! Records are kept in append order behind an `RwLock`; lookups by id and by
//! idempotency key go through `DashMap` indexes that are only written while the
//! log's write lock is held.

use super::traits::TransactionLog;
use crate::types::{LogError, Transaction, TransactionId, TransactionStatus};
use dashmap::DashMap;
use std::sync::{PoisonError, RwLock};

/// Thread-safe transaction log
#[derive(Debug, Default)]
pub struct InMemoryTransactionLog {
    entries: RwLock<Vec<Transaction>>,

    /// Transaction id to position in `entries`
    by_id: DashMap<TransactionId, usize>,

    /// Idempotency key to the completed transaction holding it
    by_key: DashMap<String, TransactionId>,
}

impl InMemoryTransactionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry_at(&self, position: usize) -> Option<Transaction> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(position)
            .cloned()
    }
}

impl TransactionLog for InMemoryTransactionLog {
    fn append(&self, transaction: Transaction) -> Result<(), LogError> {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if self.by_id.contains_key(&transaction.id) {
            return Err(LogError::DuplicateTransaction { tx: transaction.id });
        }

        // Only completed records claim their key; rejected and failed attempts
        // leave it free for a retry.
        let claims_key = transaction.status == TransactionStatus::Completed;
        if claims_key {
            if let Some(key) = &transaction.idempotency_key {
                if let Some(existing) = self.by_key.get(key) {
                    return Err(LogError::DuplicateIdempotencyKey {
                        key: key.clone(),
                        existing: *existing.value(),
                    });
                }
                self.by_key.insert(key.clone(), transaction.id);
            }
        }

        self.by_id.insert(transaction.id, entries.len());
        entries.push(transaction);
        Ok(())
    }

    fn find_all(&self) -> Vec<Transaction> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn find_by_id(&self, id: TransactionId) -> Option<Transaction> {
        let position = *self.by_id.get(&id)?.value();
        self.entry_at(position)
    }

    fn find_by_idempotency_key(&self, key: &str) -> Option<Transaction> {
        let id = *self.by_key.get(key)?.value();
        self.find_by_id(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TransactionRequest;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use std::sync::Arc;
    use std::thread;

    fn record(id: TransactionId, key: Option<&str>, completed: bool) -> Transaction {
        let now = NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        let mut request = TransactionRequest::deposit(1, Decimal::new(10, 0));
        if let Some(key) = key {
            request = request.with_idempotency_key(key);
        }
        let mut tx = Transaction::pending(id, request, None, now);
        if completed {
            tx.complete().unwrap();
        } else {
            tx.fail("insufficient_funds").unwrap();
        }
        tx
    }

    #[test]
    fn test_find_all_preserves_append_order() {
        let log = InMemoryTransactionLog::new();
        for id in [3, 1, 2] {
            log.append(record(id, None, true)).unwrap();
        }

        let ids: Vec<_> = log.find_all().into_iter().map(|tx| tx.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn test_find_by_id() {
        let log = InMemoryTransactionLog::new();
        log.append(record(1, None, true)).unwrap();
        log.append(record(2, None, false)).unwrap();

        assert_eq!(log.find_by_id(2).unwrap().status.label(), "failed");
        assert!(log.find_by_id(3).is_none());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let log = InMemoryTransactionLog::new();
        log.append(record(1, None, true)).unwrap();

        assert_eq!(
            log.append(record(1, None, false)),
            Err(LogError::DuplicateTransaction { tx: 1 })
        );
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_completed_record_claims_idempotency_key() {
        let log = InMemoryTransactionLog::new();
        log.append(record(1, Some("abc"), true)).unwrap();

        let err = log.append(record(2, Some("abc"), true)).unwrap_err();
        assert_eq!(
            err,
            LogError::DuplicateIdempotencyKey {
                key: "abc".to_string(),
                existing: 1
            }
        );
        assert_eq!(log.find_by_idempotency_key("abc").unwrap().id, 1);
    }

    #[test]
    fn test_failed_record_leaves_key_free() {
        let log = InMemoryTransactionLog::new();
        log.append(record(1, Some("retry-me"), false)).unwrap();

        assert!(log.find_by_idempotency_key("retry-me").is_none());
        log.append(record(2, Some("retry-me"), true)).unwrap();
        assert_eq!(log.find_by_idempotency_key("retry-me").unwrap().id, 2);
    }

    #[test]
    fn test_concurrent_appends_keep_every_record() {
        let log = Arc::new(InMemoryTransactionLog::new());
        let mut handles = vec![];

        for worker in 0..4u64 {
            let log = Arc::clone(&log);
            handles.push(thread::spawn(move || {
                for i in 0..100 {
                    log.append(record(worker * 1_000 + i, None, true)).unwrap();
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(log.len(), 400);
        assert!(log.find_by_id(3_099).is_some());
    }
}
