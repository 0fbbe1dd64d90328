//! Upfront agreements (UFAs) and their ledger operations
use super::error::{LedgerError, Result};
use super::history::TransactionHistory;
use super::index::{RecordIndex, check_record_id};
use super::merge::{Document, merge};
use super::store::KeyValueStore;
use super::transaction::{self, Transaction};
use super::utils::{number, text};
use super::validation::ValidationEngine;
use serde_json::Value;
use std::sync::Arc;
use tracing::{Span, debug, info, info_span};

pub const NET_CHARGE: &str = "netCharge";
pub const CHARGE_TOLERANCE: &str = "chargeTolerance";
// spelling used by payloads written before the field was renamed
pub const LEGACY_CHARGE_TOLERANCE: &str = "chargTolrence";
pub const RAISED_TOTAL: &str = "raisedInvTotal";
pub const STATUS: &str = "status";
pub const SELLER_APPROVER: &str = "sellerApprover";
pub const BUYER_APPROVER: &str = "buyerApprover";
pub const EMAIL: &str = "emailid";
pub const INVOICE_LIST: &str = "allInvoiceList";
pub const PERIOD_PREFIX: &str = "invperiod_";

pub const AGREED: &str = "Agreed";

pub fn tolerance_of(doc: &Document) -> Option<f64> {
    number(doc.get(CHARGE_TOLERANCE)).or_else(|| number(doc.get(LEGACY_CHARGE_TOLERANCE)))
}

pub fn period_marker(period: &str) -> String {
    format!("{PERIOD_PREFIX}{period}")
}

/// The financial figures of an agreement. Missing figures read as zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChargeTerms {
    pub net_charge: f64,
    pub tolerance: f64,
    pub raised_total: f64,
}

impl ChargeTerms {
    pub fn of(doc: &Document) -> Self {
        Self {
            net_charge: number(doc.get(NET_CHARGE)).unwrap_or(0.0),
            tolerance: tolerance_of(doc).unwrap_or(0.0),
            raised_total: number(doc.get(RAISED_TOTAL)).unwrap_or(0.0),
        }
    }

    /// `netCharge + netCharge * tolerance / 100`, the ceiling the running total must not reach.
    pub fn max_charge(&self) -> f64 {
        self.net_charge + self.net_charge * self.tolerance / 100.0
    }

    // Shared by batch validation and expiry so both agree on the boundary.
    pub fn is_exhausted(&self) -> bool {
        self.raised_total >= self.max_charge()
    }
}

pub fn is_expired(doc: &Document) -> bool {
    ChargeTerms::of(doc).is_exhausted()
}

/// True when `who` is the email of either approver.
pub fn is_party(doc: &Document, who: &str) -> bool {
    [SELLER_APPROVER, BUYER_APPROVER].iter().any(|approver| {
        doc.get(*approver)
            .and_then(Value::as_object)
            .is_some_and(|approver| text(approver.get(EMAIL)) == who)
    })
}

pub fn is_active_for(doc: &Document, who: &str) -> bool {
    is_party(doc, who) && text(doc.get(STATUS)) == AGREED && !is_expired(doc)
}

pub(crate) fn parse_document(raw: &str) -> Result<Document> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(doc)) => Ok(doc),
        Ok(_) => Err(LedgerError::InvalidArgument("expected a JSON object".into())),
        Err(e) => Err(LedgerError::InvalidArgument(format!("malformed JSON: {e}"))),
    }
}

/// Load an agreement that must be listed in the agreement index.
pub(crate) fn load(tx: &mut Transaction<'_>, id: &str) -> Result<Option<Document>> {
    if !RecordIndex::agreements().contains(tx, id)? {
        return Ok(None);
    }
    match tx.get_json::<Document>(id)? {
        Some(doc) => Ok(Some(doc)),
        None => Err(LedgerError::NotFound {
            kind: "agreement",
            id: id.to_string(),
        }),
    }
}

pub struct AgreementLedger {
    store: Arc<dyn KeyValueStore>,
    validation: ValidationEngine,
    history: TransactionHistory,
    index: RecordIndex,
    max_retries: u32,
    span: Span,
}

impl AgreementLedger {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        validation: ValidationEngine,
        max_retries: u32,
        span: Span,
    ) -> Self {
        let history = TransactionHistory::new(info_span!(parent: &span, "history"));
        Self {
            store,
            validation,
            history,
            index: RecordIndex::agreements(),
            max_retries,
            span,
        }
    }

    pub fn validation(&self) -> &ValidationEngine {
        &self.validation
    }

    fn run<T>(&self, op: impl FnMut(&mut Transaction<'_>) -> Result<T>) -> Result<T> {
        transaction::run(self.store.as_ref(), self.max_retries, op)
    }

    /// Validate and store a new agreement.
    ///
    /// The payload is stored verbatim under `id`; the id joins the agreement
    /// index and the payload opens the agreement's history, all in one commit.
    pub fn create(&self, id: &str, role: &str, payload: &str) -> Result<()> {
        let _guard = self.span.enter();
        check_record_id(id)?;
        let doc = parse_document(payload)?;

        let messages = self.validation.validate_new_agreement(role, &doc)?;
        if !messages.is_empty() {
            info!(agreement = id, ?messages, "agreement rejected");
            return Err(LedgerError::Validation(messages));
        }

        self.run(|tx| {
            if tx.get(id)?.is_some() {
                return Err(LedgerError::DuplicateId {
                    key: id.to_string(),
                    id: id.to_string(),
                });
            }
            tx.put(id, payload.as_bytes().to_vec());
            self.index.append(tx, &[id])?;
            self.history.append(tx, id, payload)
        })?;

        info!(agreement = id, "agreement created");
        Ok(())
    }

    /// Merge `patch` into an existing agreement and record the raw patch.
    pub fn update(&self, id: &str, role: &str, patch: &str) -> Result<Document> {
        let _guard = self.span.enter();
        self.validation.authorize(role)?;
        let patch_doc = parse_document(patch)?;

        let merged = self.run(|tx| {
            let existing = load(tx, id)?.ok_or_else(|| LedgerError::NotFound {
                kind: "agreement",
                id: id.to_string(),
            })?;
            let merged = merge(&existing, &patch_doc)?;
            tx.put_json(id, &merged)?;
            self.history.append(tx, id, patch)?;
            Ok(merged)
        })?;

        debug!(agreement = id, "agreement updated");
        Ok(merged)
    }

    pub fn get(&self, id: &str) -> Result<Option<Document>> {
        self.run(|tx| load(tx, id))
    }

    /// Every indexed agreement, in index order.
    pub fn list_all(&self) -> Result<Vec<Document>> {
        self.run(|tx| {
            let ids = self.index.list_all(tx)?;
            ids.iter()
                .map(|id| {
                    tx.get_json::<Document>(id)?.ok_or_else(|| LedgerError::NotFound {
                        kind: "agreement",
                        id: id.clone(),
                    })
                })
                .collect()
        })
    }

    /// Agreed, unexpired agreements where `who` is one of the approvers.
    pub fn list_active_for_party(&self, who: &str) -> Result<Vec<Document>> {
        let _guard = self.span.enter();
        let active: Vec<Document> = self
            .list_all()?
            .into_iter()
            .filter(|doc| is_active_for(doc, who))
            .collect();
        debug!(who, count = active.len(), "listed active agreements");
        Ok(active)
    }

    pub fn history(&self, id: &str) -> Result<Vec<String>> {
        self.run(|tx| {
            if load(tx, id)?.is_none() {
                return Err(LedgerError::NotFound {
                    kind: "agreement",
                    id: id.to_string(),
                });
            }
            self.history.entries(tx, id)
        })
    }
}
