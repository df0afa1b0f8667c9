//! In-memory account storage
//!
//! `InMemoryAccountStore` keeps every account behind its own mutex inside a
//! `DashMap`, so commits on disjoint accounts never contend while commits that
//! share an account are serialized.
//!
//! # Locking
//!
//! - Slots are cloned out of the map before locking; no map shard is held while
//!   waiting on an account.
//! - Multi-account commits lock in ascending account id order.
//! - Every wait is bounded by the configured lock timeout.

use super::traits::{AccountStore, BalanceUpdate};
use crate::types::{Account, AccountId, LogError, OwnerId, StoreError};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use std::thread;
use std::time::{Duration, Instant};

/// Default bound on waiting for a single account lock
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(250);

/// Pause between attempts on a held account lock
const LOCK_RETRY_INTERVAL: Duration = Duration::from_micros(200);

type Slot = Arc<Mutex<Account>>;

/// Thread-safe account store backed by per-account mutexes
#[derive(Debug)]
pub struct InMemoryAccountStore {
    accounts: DashMap<AccountId, Slot>,

    /// Secondary index: account number to id
    numbers: DashMap<String, AccountId>,

    lock_timeout: Duration,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    /// Create a store whose lock waits give up after `lock_timeout`
    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        InMemoryAccountStore {
            accounts: DashMap::new(),
            numbers: DashMap::new(),
            lock_timeout,
        }
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    fn slot(&self, id: AccountId) -> Result<Slot, StoreError> {
        self.accounts
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(StoreError::NotFound { account: id })
    }

    fn snapshot_all(&self) -> Vec<Account> {
        let slots: Vec<Slot> = self
            .accounts
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut accounts: Vec<Account> = slots
            .iter()
            .map(|slot| slot.lock().unwrap_or_else(PoisonError::into_inner).clone())
            .collect();
        accounts.sort_by_key(|account| account.id);
        accounts
    }
}

impl Default for InMemoryAccountStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Lock `slot`, sleeping between attempts until `deadline`
///
/// A poisoned lock is recovered: balances are only written after every check
/// passed, so a panicking holder cannot leave a half-applied commit behind.
fn lock_until(
    slot: &Mutex<Account>,
    id: AccountId,
    deadline: Instant,
) -> Result<MutexGuard<'_, Account>, StoreError> {
    loop {
        match slot.try_lock() {
            Ok(guard) => return Ok(guard),
            Err(TryLockError::Poisoned(poisoned)) => return Ok(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => {
                let now = Instant::now();
                if now >= deadline {
                    return Err(StoreError::LockTimeout { account: id });
                }
                thread::sleep(LOCK_RETRY_INTERVAL.min(deadline - now));
            }
        }
    }
}

impl AccountStore for InMemoryAccountStore {
    fn insert(&self, account: Account) -> Result<Account, StoreError> {
        if account.balance < Decimal::ZERO {
            return Err(StoreError::NegativeBalance {
                account: account.id,
                balance: account.balance,
            });
        }

        // Number index first, then the account map; insert is the only writer
        // touching both and always in this order.
        match self.numbers.entry(account.account_number.clone()) {
            Entry::Occupied(_) => Err(StoreError::DuplicateAccountNumber {
                account_number: account.account_number,
            }),
            Entry::Vacant(number_entry) => match self.accounts.entry(account.id) {
                Entry::Occupied(_) => Err(StoreError::DuplicateAccount {
                    account: account.id,
                }),
                Entry::Vacant(account_entry) => {
                    account_entry.insert(Arc::new(Mutex::new(account.clone())));
                    number_entry.insert(account.id);
                    Ok(account)
                }
            },
        }
    }

    fn get(&self, id: AccountId) -> Result<Account, StoreError> {
        let slot = self.slot(id)?;
        let deadline = Instant::now() + self.lock_timeout;
        let account = lock_until(&slot, id, deadline)?.clone();
        Ok(account)
    }

    fn find_by_number(&self, account_number: &str) -> Option<Account> {
        let id = *self.numbers.get(account_number)?.value();
        self.get(id).ok()
    }

    fn find_by_owner(&self, owner: OwnerId) -> Vec<Account> {
        self.snapshot_all()
            .into_iter()
            .filter(|account| account.owner_id == owner)
            .collect()
    }

    fn all(&self) -> Vec<Account> {
        self.snapshot_all()
    }

    fn conditional_update(
        &self,
        id: AccountId,
        expected_balance: Decimal,
        new_balance: Decimal,
    ) -> Result<Account, StoreError> {
        let slot = self.slot(id)?;
        let deadline = Instant::now() + self.lock_timeout;
        let mut account = lock_until(&slot, id, deadline)?;

        if account.balance != expected_balance {
            return Err(StoreError::BalanceConflict {
                account: id,
                expected: expected_balance,
                found: account.balance,
            });
        }
        if new_balance < Decimal::ZERO {
            return Err(StoreError::NegativeBalance {
                account: id,
                balance: new_balance,
            });
        }

        account.balance = new_balance;
        account.version += 1;
        Ok(account.clone())
    }

    fn commit(
        &self,
        updates: &[BalanceUpdate],
        on_commit: &mut dyn FnMut() -> Result<(), LogError>,
    ) -> Result<(), StoreError> {
        let mut ordered: Vec<&BalanceUpdate> = updates.iter().collect();
        ordered.sort_by_key(|update| update.account_id);

        if let Some(pair) = ordered
            .windows(2)
            .find(|pair| pair[0].account_id == pair[1].account_id)
        {
            return Err(StoreError::DuplicateUpdate {
                account: pair[0].account_id,
            });
        }

        let slots = ordered
            .iter()
            .map(|update| self.slot(update.account_id))
            .collect::<Result<Vec<_>, _>>()?;

        let deadline = Instant::now() + self.lock_timeout;
        let mut guards = Vec::with_capacity(slots.len());
        for (update, slot) in ordered.iter().zip(&slots) {
            guards.push(lock_until(slot, update.account_id, deadline)?);
        }

        for (update, account) in ordered.iter().zip(&guards) {
            if account.version != update.expected_version {
                return Err(StoreError::VersionConflict {
                    account: update.account_id,
                    expected: update.expected_version,
                    found: account.version,
                });
            }
            if update.new_balance < Decimal::ZERO {
                return Err(StoreError::NegativeBalance {
                    account: update.account_id,
                    balance: update.new_balance,
                });
            }
        }

        on_commit()?;

        for (update, account) in ordered.iter().zip(guards.iter_mut()) {
            account.balance = update.new_balance;
            account.version += 1;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn dec(n: i64) -> Decimal {
        Decimal::new(n, 0)
    }

    fn seeded(balances: &[(AccountId, i64)]) -> InMemoryAccountStore {
        let store = InMemoryAccountStore::new();
        for &(id, balance) in balances {
            store
                .insert(Account::new(id, format!("ACC-{}", id), 1, dec(balance)))
                .unwrap();
        }
        store
    }

    fn no_log() -> impl FnMut() -> Result<(), LogError> {
        || Ok(())
    }

    #[test]
    fn test_insert_and_lookup() {
        let store = InMemoryAccountStore::new();
        store
            .insert(Account::new(1, "ACC-1", 10, dec(50)))
            .unwrap();
        store
            .insert(Account::new(2, "ACC-2", 20, dec(0)))
            .unwrap();

        assert_eq!(store.get(1).unwrap().balance, dec(50));
        assert_eq!(store.find_by_number("ACC-2").unwrap().id, 2);
        assert!(store.find_by_number("ACC-3").is_none());
        assert_eq!(store.find_by_owner(10).len(), 1);
        assert_eq!(store.len(), 2);
    }

    #[rstest]
    #[case::same_id(Account::new(1, "OTHER", 1, Decimal::ZERO), "already exists")]
    #[case::same_number(Account::new(2, "ACC-1", 1, Decimal::ZERO), "already in use")]
    #[case::negative(Account::new(3, "ACC-3", 1, Decimal::new(-1, 0)), "negative balance")]
    fn test_insert_rejects(#[case] account: Account, #[case] expected: &str) {
        let store = seeded(&[(1, 10)]);
        let err = store.insert(account).unwrap_err();
        assert!(err.to_string().contains(expected), "unexpected: {}", err);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_rejected_insert_leaves_number_free() {
        let store = seeded(&[(1, 10)]);
        assert!(store.insert(Account::new(1, "ACC-9", 1, dec(0))).is_err());
        assert!(store.find_by_number("ACC-9").is_none());
        store.insert(Account::new(9, "ACC-9", 1, dec(0))).unwrap();
    }

    #[test]
    fn test_get_missing_account() {
        let store = InMemoryAccountStore::new();
        assert_eq!(store.get(7), Err(StoreError::NotFound { account: 7 }));
    }

    #[test]
    fn test_all_is_sorted_by_id() {
        let store = seeded(&[(3, 0), (1, 0), (2, 0)]);
        let ids: Vec<_> = store.all().into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_conditional_update() {
        let store = seeded(&[(1, 100)]);

        let updated = store.conditional_update(1, dec(100), dec(40)).unwrap();
        assert_eq!(updated.balance, dec(40));
        assert_eq!(updated.version, 1);

        let stale = store.conditional_update(1, dec(100), dec(0)).unwrap_err();
        assert!(stale.is_conflict());

        let negative = store.conditional_update(1, dec(40), dec(-1)).unwrap_err();
        assert!(matches!(negative, StoreError::NegativeBalance { .. }));
        assert_eq!(store.get(1).unwrap().balance, dec(40));
    }

    #[test]
    fn test_commit_applies_all_updates() {
        let store = seeded(&[(1, 100), (2, 50)]);
        let updates = [
            BalanceUpdate::from_snapshot(&store.get(2).unwrap(), dec(80)),
            BalanceUpdate::from_snapshot(&store.get(1).unwrap(), dec(70)),
        ];

        store.commit(&updates, &mut no_log()).unwrap();

        let a = store.get(1).unwrap();
        let b = store.get(2).unwrap();
        assert_eq!((a.balance, a.version), (dec(70), 1));
        assert_eq!((b.balance, b.version), (dec(80), 1));
    }

    #[test]
    fn test_commit_version_conflict_applies_nothing() {
        let store = seeded(&[(1, 100), (2, 50)]);
        let stale_a = store.get(1).unwrap();
        store.conditional_update(1, dec(100), dec(90)).unwrap();

        let updates = [
            BalanceUpdate::from_snapshot(&stale_a, dec(70)),
            BalanceUpdate::from_snapshot(&store.get(2).unwrap(), dec(80)),
        ];
        let err = store.commit(&updates, &mut no_log()).unwrap_err();

        assert!(err.is_conflict());
        assert_eq!(store.get(1).unwrap().balance, dec(90));
        assert_eq!(store.get(2).unwrap().balance, dec(50));
        assert_eq!(store.get(2).unwrap().version, 0);
    }

    #[test]
    fn test_commit_negative_balance_applies_nothing() {
        let store = seeded(&[(1, 100), (2, 50)]);
        let updates = [
            BalanceUpdate::from_snapshot(&store.get(1).unwrap(), dec(-10)),
            BalanceUpdate::from_snapshot(&store.get(2).unwrap(), dec(160)),
        ];
        let err = store.commit(&updates, &mut no_log()).unwrap_err();

        assert!(matches!(err, StoreError::NegativeBalance { account: 1, .. }));
        assert_eq!(store.get(2).unwrap().balance, dec(50));
    }

    #[test]
    fn test_commit_log_failure_applies_nothing() {
        let store = seeded(&[(1, 100)]);
        let updates = [BalanceUpdate::from_snapshot(&store.get(1).unwrap(), dec(0))];
        let mut failing = || -> Result<(), LogError> { Err(LogError::DuplicateTransaction { tx: 4 }) };

        let err = store.commit(&updates, &mut failing).unwrap_err();

        assert!(matches!(err, StoreError::Log(_)));
        assert_eq!(store.get(1).unwrap().balance, dec(100));
        assert_eq!(store.get(1).unwrap().version, 0);
    }

    #[test]
    fn test_commit_rejects_duplicate_and_missing_accounts() {
        let store = seeded(&[(1, 100)]);
        let snapshot = store.get(1).unwrap();
        let duplicate = [
            BalanceUpdate::from_snapshot(&snapshot, dec(10)),
            BalanceUpdate::from_snapshot(&snapshot, dec(20)),
        ];
        assert_eq!(
            store.commit(&duplicate, &mut no_log()),
            Err(StoreError::DuplicateUpdate { account: 1 })
        );

        let missing = [BalanceUpdate {
            account_id: 5,
            expected_version: 0,
            new_balance: dec(1),
        }];
        assert_eq!(
            store.commit(&missing, &mut no_log()),
            Err(StoreError::NotFound { account: 5 })
        );
    }

    #[test]
    fn test_commit_times_out_on_held_lock() {
        let store = Arc::new(InMemoryAccountStore::with_lock_timeout(Duration::from_millis(20)));
        store.insert(Account::new(1, "ACC-1", 1, dec(100))).unwrap();
        let snapshot = store.get(1).unwrap();

        let holder = Arc::clone(&store);
        let (locked_tx, locked_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let handle = thread::spawn(move || {
            let updates = [BalanceUpdate::from_snapshot(&snapshot, dec(90))];
            let mut wait = || -> Result<(), LogError> {
                locked_tx.send(()).unwrap();
                release_rx.recv().unwrap();
                Ok(())
            };
            holder.commit(&updates, &mut wait)
        });

        locked_rx.recv().unwrap();
        let err = store.get(1).unwrap_err();
        assert_eq!(err, StoreError::LockTimeout { account: 1 });

        release_tx.send(()).unwrap();
        handle.join().unwrap().unwrap();
        assert_eq!(store.get(1).unwrap().balance, dec(90));
    }

    #[test]
    fn test_waiter_acquires_lock_released_before_deadline() {
        let store = Arc::new(InMemoryAccountStore::with_lock_timeout(Duration::from_secs(2)));
        store.insert(Account::new(1, "ACC-1", 1, dec(100))).unwrap();
        let snapshot = store.get(1).unwrap();

        let holder = Arc::clone(&store);
        let (locked_tx, locked_rx) = std::sync::mpsc::channel();
        let handle = thread::spawn(move || {
            let updates = [BalanceUpdate::from_snapshot(&snapshot, dec(90))];
            let mut hold = || -> Result<(), LogError> {
                locked_tx.send(()).unwrap();
                thread::sleep(Duration::from_millis(30));
                Ok(())
            };
            holder.commit(&updates, &mut hold)
        });

        locked_rx.recv().unwrap();
        let started = Instant::now();
        let account = store.get(1).unwrap();

        assert_eq!(account.balance, dec(90));
        assert!(started.elapsed() < Duration::from_secs(1));
        handle.join().unwrap().unwrap();
    }

    #[test]
    fn test_concurrent_commits_on_same_account_serialize() {
        let store = Arc::new(seeded(&[(1, 0)]));
        let applied = Arc::new(AtomicUsize::new(0));
        let mut handles = vec![];

        for _ in 0..8 {
            let store = Arc::clone(&store);
            let applied = Arc::clone(&applied);
            handles.push(thread::spawn(move || {
                for _ in 0..50 {
                    loop {
                        let current = store.get(1).unwrap();
                        let update = [BalanceUpdate::from_snapshot(
                            &current,
                            current.balance + Decimal::ONE,
                        )];
                        match store.commit(&update, &mut || Ok(())) {
                            Ok(()) => {
                                applied.fetch_add(1, Ordering::SeqCst);
                                break;
                            }
                            Err(err) if err.is_conflict() => continue,
                            Err(err) => panic!("unexpected error: {}", err),
                        }
                    }
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        let account = store.get(1).unwrap();
        assert_eq!(applied.load(Ordering::SeqCst), 400);
        assert_eq!(account.balance, dec(400));
        assert_eq!(account.version, 400);
    }

    #[test]
    fn test_opposite_direction_commits_do_not_deadlock() {
        let store = Arc::new(seeded(&[(1, 1_000), (2, 1_000)]));
        let mut handles = vec![];

        for direction in 0..4 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                let (from, to) = if direction % 2 == 0 { (1, 2) } else { (2, 1) };
                for _ in 0..100 {
                    loop {
                        let source = store.get(from).unwrap();
                        let target = store.get(to).unwrap();
                        let updates = [
                            BalanceUpdate::from_snapshot(&source, source.balance - Decimal::ONE),
                            BalanceUpdate::from_snapshot(&target, target.balance + Decimal::ONE),
                        ];
                        match store.commit(&updates, &mut || Ok(())) {
                            Ok(()) => break,
                            Err(err) if err.is_conflict() => continue,
                            Err(err) => panic!("unexpected error: {}", err),
                        }
                    }
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        let total = store.get(1).unwrap().balance + store.get(2).unwrap().balance;
        assert_eq!(total, dec(2_000));
        assert_eq!(store.get(1).unwrap().balance, dec(1_000));
    }
}
