//! Key-value backends the ledger persists into.
//!
//! A backend only has to offer single-key reads and writes plus one conditional
//! commit: apply a set of writes if, and only if, every key in a read set still
//! holds the bytes that were observed. Everything else (indexes, running totals,
//! multi-record atomicity) is built on top by [`crate::transaction`].
use super::error::StoreError;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Atomically verify `changes.reads` and apply `changes.writes`.
    ///
    /// Returns [`StoreError::Conflict`] naming the first key whose current value
    /// differs from the observed one; in that case nothing is written.
    fn commit(&self, changes: &ChangeSet) -> Result<(), StoreError>;
}

/// Observed reads and buffered writes of one transaction.
#[derive(Debug, Default, Clone)]
pub struct ChangeSet {
    pub reads: BTreeMap<String, Option<Vec<u8>>>,
    pub writes: BTreeMap<String, Vec<u8>>,
}

impl ChangeSet {
    pub fn is_read_only(&self) -> bool {
        self.writes.is_empty()
    }
}

pub struct SledStore {
    instance: Arc<sled::Db>,
}

impl SledStore {
    pub fn new(instance: Arc<sled::Db>) -> Self {
        Self { instance }
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Ok(Self::new(Arc::new(db)))
    }
}

impl KeyValueStore for SledStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.instance.get(key.as_bytes())?.map(|v| v.to_vec()))
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.instance.insert(key.as_bytes(), value)?;
        Ok(())
    }

    fn commit(&self, changes: &ChangeSet) -> Result<(), StoreError> {
        let outcome = self.instance.transaction(|tx| {
            for (key, observed) in &changes.reads {
                let current = tx.get(key.as_bytes())?;
                if current.as_deref() != observed.as_deref() {
                    return Err(ConflictableTransactionError::Abort(key.clone()));
                }
            }
            for (key, value) in &changes.writes {
                tx.insert(key.as_bytes(), value.as_slice())?;
            }
            Ok(())
        });

        match outcome {
            Ok(()) => Ok(()),
            Err(TransactionError::Abort(key)) => Err(StoreError::Conflict(key)),
            Err(TransactionError::Storage(e)) => Err(StoreError::Sled(e)),
        }
    }
}

/// Process-local store, used by tests and embedders without a disk.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn commit(&self, changes: &ChangeSet) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        for (key, observed) in &changes.reads {
            if entries.get(key) != observed.as_ref() {
                return Err(StoreError::Conflict(key.clone()));
            }
        }
        for (key, value) in &changes.writes {
            entries.insert(key.clone(), value.clone());
        }
        Ok(())
    }
}
