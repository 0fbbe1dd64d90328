//! Master indexes: the ordered set of every identifier of one kind.
use super::error::{LedgerError, Result};
use super::history::HISTORY_PREFIX;
use super::service::VERSION_KEY;
use super::transaction::Transaction;
use std::collections::HashSet;

pub const AGREEMENT_INDEX: &str = "ALL_RECS";
pub const INVOICE_INDEX: &str = "ALL_INVOICES";

/// Record ids share the key space with the ledger's own bookkeeping keys.
pub fn check_record_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(LedgerError::InvalidArgument("record id must not be empty".into()));
    }
    if [AGREEMENT_INDEX, INVOICE_INDEX, VERSION_KEY].contains(&id) || id.starts_with(HISTORY_PREFIX) {
        return Err(LedgerError::InvalidArgument(format!("`{id}` is a reserved key")));
    }
    Ok(())
}

/// An identifier list stored as a JSON array under a fixed key.
///
/// Order follows insertion; each identifier appears at most once.
#[derive(Debug, Clone, Copy)]
pub struct RecordIndex {
    key: &'static str,
}

impl RecordIndex {
    pub const fn new(key: &'static str) -> Self {
        Self { key }
    }

    pub const fn agreements() -> Self {
        Self::new(AGREEMENT_INDEX)
    }

    pub const fn invoices() -> Self {
        Self::new(INVOICE_INDEX)
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    pub fn list_all(&self, tx: &mut Transaction<'_>) -> Result<Vec<String>> {
        Ok(tx.get_json(self.key)?.unwrap_or_default())
    }

    pub fn contains(&self, tx: &mut Transaction<'_>, id: &str) -> Result<bool> {
        Ok(self.list_all(tx)?.iter().any(|known| known == id))
    }

    /// Append `ids`, rejecting any that is already indexed or repeated.
    pub fn append<S: AsRef<str>>(&self, tx: &mut Transaction<'_>, ids: &[S]) -> Result<()> {
        let mut current = self.list_all(tx)?;
        let mut seen: HashSet<String> = current.iter().cloned().collect();

        for id in ids {
            let id = id.as_ref();
            if !seen.insert(id.to_string()) {
                return Err(LedgerError::DuplicateId {
                    key: self.key.to_string(),
                    id: id.to_string(),
                });
            }
            current.push(id.to_string());
        }

        tx.put_json(self.key, &current)
    }

    /// Write an empty index if none exists yet.
    pub fn ensure(&self, tx: &mut Transaction<'_>) -> Result<bool> {
        if tx.get(self.key)?.is_some() {
            return Ok(false);
        }
        tx.put_json(self.key, &Vec::<String>::new())?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{KeyValueStore, MemoryStore};
    use crate::transaction;

    #[test]
    fn append_preserves_insertion_order() {
        let store = MemoryStore::new();
        let index = RecordIndex::agreements();

        transaction::run(&store, 0, |tx| index.append(tx, &["UFA2", "UFA1"])).unwrap();
        transaction::run(&store, 0, |tx| index.append(tx, &["UFA3"])).unwrap();

        let ids = transaction::run(&store, 0, |tx| index.list_all(tx)).unwrap();
        assert_eq!(ids, ["UFA2", "UFA1", "UFA3"]);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let store = MemoryStore::new();
        let index = RecordIndex::invoices();
        transaction::run(&store, 0, |tx| index.append(tx, &["INV1"])).unwrap();

        let err = transaction::run(&store, 0, |tx| index.append(tx, &["INV2", "INV1"])).unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateId { ref id, .. } if id == "INV1"));

        let err = transaction::run(&store, 0, |tx| index.append(tx, &["INV9", "INV9"])).unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateId { ref id, .. } if id == "INV9"));

        let ids = transaction::run(&store, 0, |tx| index.list_all(tx)).unwrap();
        assert_eq!(ids, ["INV1"]);
    }

    #[test]
    fn malformed_index_aborts() {
        let store = MemoryStore::new();
        store.put(INVOICE_INDEX, b"{\"not\":\"a list\"}").unwrap();

        let err = transaction::run(&store, 0, |tx| RecordIndex::invoices().list_all(tx)).unwrap_err();

        assert!(matches!(err, LedgerError::Serialization { .. }));
    }

    #[test]
    fn reserved_keys_are_not_record_ids() {
        assert!(check_record_id("UFA-001").is_ok());
        assert!(check_record_id("").is_err());
        assert!(check_record_id(AGREEMENT_INDEX).is_err());
        assert!(check_record_id("UFA_TRXN_HISTORY_UFA1").is_err());
    }

    #[test]
    fn ensure_does_not_clobber() {
        let store = MemoryStore::new();
        let index = RecordIndex::agreements();
        transaction::run(&store, 0, |tx| index.append(tx, &["UFA1"])).unwrap();

        let created = transaction::run(&store, 0, |tx| index.ensure(tx)).unwrap();

        assert!(!created);
        assert!(transaction::run(&store, 0, |tx| index.contains(tx, "UFA1")).unwrap());
    }
}
