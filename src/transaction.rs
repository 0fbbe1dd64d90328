//! Optimistic transactions over a [`KeyValueStore`].
//!
//! Reads are remembered (absent keys included) and writes are buffered until
//! [`Transaction::commit`], which hands both to the backend's conditional
//! commit. A lost race surfaces as [`StoreError::Conflict`] and [`run`] replays
//! the whole closure against fresh state.
use super::error::{LedgerError, Result, StoreError};
use super::store::{ChangeSet, KeyValueStore};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

pub struct Transaction<'s> {
    store: &'s dyn KeyValueStore,
    changes: ChangeSet,
}

impl<'s> Transaction<'s> {
    pub fn begin(store: &'s dyn KeyValueStore) -> Self {
        Self {
            store,
            changes: ChangeSet::default(),
        }
    }

    /// Reads see this transaction's own pending writes first.
    pub fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>> {
        if let Some(pending) = self.changes.writes.get(key) {
            return Ok(Some(pending.clone()));
        }
        if let Some(observed) = self.changes.reads.get(key) {
            return Ok(observed.clone());
        }
        let value = self.store.get(key)?;
        self.changes.reads.insert(key.to_string(), value.clone());
        Ok(value)
    }

    pub fn put(&mut self, key: &str, value: Vec<u8>) {
        self.changes.writes.insert(key.to_string(), value);
    }

    pub fn get_json<T: DeserializeOwned>(&mut self, key: &str) -> Result<Option<T>> {
        match self.get(key)? {
            None => Ok(None),
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|source| LedgerError::Serialization {
                    key: key.to_string(),
                    source,
                }),
        }
    }

    pub fn put_json<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value).map_err(|source| LedgerError::Serialization {
            key: key.to_string(),
            source,
        })?;
        self.put(key, bytes);
        Ok(())
    }

    pub fn commit(self) -> std::result::Result<(), StoreError> {
        if self.changes.is_read_only() {
            return Ok(());
        }
        debug!(
            reads = self.changes.reads.len(),
            writes = self.changes.writes.len(),
            "committing transaction"
        );
        self.store.commit(&self.changes)
    }
}

/// Run `op` in a fresh transaction and commit, retrying on write conflicts.
///
/// A closure returning `Err` commits nothing. After `max_retries` lost races
/// the last conflicting key is reported as [`LedgerError::Conflict`].
pub fn run<T, F>(store: &dyn KeyValueStore, max_retries: u32, mut op: F) -> Result<T>
where
    F: FnMut(&mut Transaction<'_>) -> Result<T>,
{
    let mut attempt = 0;
    loop {
        let mut tx = Transaction::begin(store);
        let value = op(&mut tx)?;
        match tx.commit() {
            Ok(()) => return Ok(value),
            Err(StoreError::Conflict(key)) if attempt < max_retries => {
                attempt += 1;
                warn!(%key, attempt, "write conflict, retrying");
            }
            Err(e) => return Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn reads_observe_pending_writes() {
        let store = MemoryStore::new();
        let mut tx = Transaction::begin(&store);

        tx.put_json("k", &vec!["a"]).unwrap();
        let seen: Option<Vec<String>> = tx.get_json("k").unwrap();

        assert_eq!(seen, Some(vec!["a".to_string()]));
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn failed_closure_writes_nothing() {
        let store = MemoryStore::new();

        let res: Result<()> = run(&store, 3, |tx| {
            tx.put("k", b"v".to_vec());
            Err(LedgerError::InvalidArgument("stop".into()))
        });

        assert!(res.is_err());
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn malformed_bytes_are_a_serialization_error() {
        let store = MemoryStore::new();
        store.put("k", b"{not json").unwrap();
        let mut tx = Transaction::begin(&store);

        let err = tx.get_json::<Vec<String>>("k").unwrap_err();

        assert!(matches!(err, LedgerError::Serialization { ref key, .. } if key == "k"));
    }

    #[test]
    fn conflicting_commit_is_retried() {
        let store = MemoryStore::new();
        let calls = AtomicU32::new(0);

        run(&store, 3, |tx| {
            let current = tx.get("counter")?;
            // simulate another writer sneaking in on the first attempt
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                store.put("counter", b"1").unwrap();
            }
            let next = match current {
                Some(_) => b"2".to_vec(),
                None => b"1".to_vec(),
            };
            tx.put("counter", next);
            Ok(())
        })
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.get("counter").unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn conflicts_past_the_retry_budget_surface() {
        let store = MemoryStore::new();

        let err = run(&store, 1, |tx| {
            tx.get("hot")?;
            store.put("hot", uuid7::uuid7().to_string().as_bytes()).unwrap();
            tx.put("hot", b"mine".to_vec());
            Ok(())
        })
        .unwrap_err();

        assert!(matches!(err, LedgerError::Conflict(ref k) if k == "hot"));
    }
}
