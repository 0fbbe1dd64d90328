//! Append-only audit trail of the payloads applied to each agreement.
use super::error::Result;
use super::transaction::Transaction;
use tracing::{Span, debug};

pub const HISTORY_PREFIX: &str = "UFA_TRXN_HISTORY_";

pub struct TransactionHistory {
    span: Span,
}

impl TransactionHistory {
    pub fn new(span: Span) -> Self {
        Self { span }
    }

    pub fn key(agreement_id: &str) -> String {
        format!("{HISTORY_PREFIX}{agreement_id}")
    }

    pub fn entries(&self, tx: &mut Transaction<'_>, agreement_id: &str) -> Result<Vec<String>> {
        Ok(tx.get_json(&Self::key(agreement_id))?.unwrap_or_default())
    }

    pub fn append(&self, tx: &mut Transaction<'_>, agreement_id: &str, payload: &str) -> Result<()> {
        let _guard = self.span.enter();
        let key = Self::key(agreement_id);
        let mut entries = self.entries(tx, agreement_id)?;
        entries.push(payload.to_string());
        debug!(agreement = agreement_id, entries = entries.len(), "appending to history");
        tx.put_json(&key, &entries)
    }
}
