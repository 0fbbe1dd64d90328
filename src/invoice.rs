//! Invoices raised against agreements, and the batch flow that charges them
//! to an agreement's running total.
use super::agreement;
use super::error::{LedgerError, Result};
use super::history::TransactionHistory;
use super::index::RecordIndex;
use super::merge::{Document, merge};
use super::store::KeyValueStore;
use super::transaction::{self, Transaction};
use super::utils::{format_amount, number, split_ids, text};
use super::validation::ValidationEngine;
use serde_json::Value;
use std::sync::Arc;
use tracing::{Span, debug, info, info_span};

pub const INVOICE_NUMBER: &str = "invoiceNumber";
pub const UFA_NUMBER: &str = "ufanumber";
pub const BILLING_PERIOD: &str = "billingPeriod";
pub const AMOUNT: &str = "invoiceAmt";
pub const APPROVED_BY: &str = "approvedBy";
pub const RAISED_BY: &str = "raisedBy";

fn parse_batch(raw: &str) -> Result<Vec<Document>> {
    let values: Vec<Value> = serde_json::from_str(raw)
        .map_err(|e| LedgerError::InvalidArgument(format!("expected a JSON array of invoices: {e}")))?;
    values
        .into_iter()
        .map(|value| match value {
            Value::Object(doc) => Ok(doc),
            _ => Err(LedgerError::InvalidArgument("every invoice must be a JSON object".into())),
        })
        .collect()
}

/// Outcome of checking a batch against current ledger state.
struct Assessment {
    messages: Vec<String>,
    agreement: Option<(String, Document)>,
}

/// Summary of an accepted batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReceipt {
    pub agreement_id: String,
    pub billing_period: String,
    pub invoice_numbers: Vec<String>,
    pub charged: f64,
    pub raised_total: f64,
}

pub struct InvoiceLedger {
    store: Arc<dyn KeyValueStore>,
    validation: ValidationEngine,
    history: TransactionHistory,
    index: RecordIndex,
    cost_share_divisor: f64,
    max_retries: u32,
    span: Span,
}

impl InvoiceLedger {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        validation: ValidationEngine,
        cost_share_divisor: f64,
        max_retries: u32,
        span: Span,
    ) -> Self {
        let history = TransactionHistory::new(info_span!(parent: &span, "history"));
        Self {
            store,
            validation,
            history,
            index: RecordIndex::invoices(),
            cost_share_divisor,
            max_retries,
            span,
        }
    }

    fn run<T>(&self, op: impl FnMut(&mut Transaction<'_>) -> Result<T>) -> Result<T> {
        transaction::run(self.store.as_ref(), self.max_retries, op)
    }

    fn assess(&self, tx: &mut Transaction<'_>, batch: &[Document]) -> Result<Assessment> {
        let ufa_number = batch
            .first()
            .map(|first| text(first.get(UFA_NUMBER)))
            .unwrap_or_default();

        let agreement = if ufa_number.is_empty() {
            None
        } else {
            agreement::load(tx, ufa_number)?.map(|doc| (ufa_number.to_string(), doc))
        };

        let mut already_stored = Vec::new();
        for invoice in batch {
            let id = text(invoice.get(INVOICE_NUMBER));
            if !id.is_empty() && tx.get(id)?.is_some() {
                already_stored.push(id.to_string());
            }
        }

        let messages = self.validation.validate_invoice_batch(
            batch,
            agreement.as_ref().map(|(_, doc)| doc),
            &already_stored,
        );
        Ok(Assessment { messages, agreement })
    }

    /// Check a batch without writing anything.
    pub fn validate_batch(&self, role: &str, payload: &str) -> Result<Vec<String>> {
        self.validation.authorize(role)?;
        let batch = parse_batch(payload)?;
        self.run(|tx| Ok(self.assess(tx, &batch)?.messages))
    }

    /// Validate and persist a batch of invoices for one agreement and period.
    ///
    /// In a single commit: every invoice is stored, the period marker and
    /// invoice list on the agreement are extended, the running total grows by
    /// the cost-shared batch total, the invoice index gains the batch, and the
    /// updated agreement is appended to its history.
    pub fn create_batch(&self, role: &str, payload: &str) -> Result<BatchReceipt> {
        let _guard = self.span.enter();
        self.validation.authorize(role)?;
        let batch = parse_batch(payload)?;

        let receipt = self.run(|tx| {
            let assessment = self.assess(tx, &batch)?;
            let (agreement_id, mut agreement) = match assessment.agreement {
                Some(found) if assessment.messages.is_empty() => found,
                _ => return Err(LedgerError::Validation(assessment.messages)),
            };

            let mut numbers = Vec::with_capacity(batch.len());
            let mut total = 0.0;
            for invoice in &batch {
                let id = text(invoice.get(INVOICE_NUMBER));
                total += number(invoice.get(AMOUNT)).unwrap_or(0.0);
                tx.put_json(id, invoice)?;
                numbers.push(id.to_string());
            }

            let period = text(batch[0].get(BILLING_PERIOD)).to_string();
            let joined = numbers.join(",");
            let charged = total / self.cost_share_divisor;
            let raised_total = agreement::ChargeTerms::of(&agreement).raised_total + charged;

            agreement.insert(agreement::period_marker(&period), Value::String(joined));
            agreement.insert(
                agreement::RAISED_TOTAL.to_string(),
                Value::String(format_amount(raised_total)),
            );
            let mut listed: Vec<String> = split_ids(text(agreement.get(agreement::INVOICE_LIST)))
                .map(str::to_string)
                .collect();
            listed.extend(numbers.iter().cloned());
            agreement.insert(agreement::INVOICE_LIST.to_string(), Value::String(listed.join(",")));

            self.index.append(tx, &numbers)?;
            tx.put_json(&agreement_id, &agreement)?;
            let snapshot = serde_json::to_string(&agreement).map_err(|source| {
                LedgerError::Serialization {
                    key: agreement_id.clone(),
                    source,
                }
            })?;
            self.history.append(tx, &agreement_id, &snapshot)?;

            Ok(BatchReceipt {
                agreement_id,
                billing_period: period,
                invoice_numbers: numbers,
                charged,
                raised_total,
            })
        });

        match &receipt {
            Ok(r) => info!(
                agreement = %r.agreement_id,
                period = %r.billing_period,
                invoices = r.invoice_numbers.len(),
                raised_total = r.raised_total,
                "invoice batch recorded"
            ),
            Err(LedgerError::Validation(messages)) => info!(?messages, "invoice batch rejected"),
            Err(_) => {}
        }
        receipt
    }

    /// Merge field patches into existing invoices; each patch names its
    /// invoice through `invoiceNumber`. All patches land together or not at all.
    pub fn update(&self, role: &str, payload: &str) -> Result<Vec<Document>> {
        let _guard = self.span.enter();
        self.validation.authorize(role)?;
        let patches = parse_batch(payload)?;

        let updated = self.run(|tx| {
            let mut updated = Vec::with_capacity(patches.len());
            for patch in &patches {
                let id = text(patch.get(INVOICE_NUMBER));
                if id.is_empty() {
                    return Err(LedgerError::InvalidArgument(
                        "invoice patch is missing invoiceNumber".into(),
                    ));
                }
                let existing = self.load(tx, id)?.ok_or_else(|| LedgerError::NotFound {
                    kind: "invoice",
                    id: id.to_string(),
                })?;
                let merged = merge(&existing, patch)?;
                tx.put_json(id, &merged)?;
                updated.push(merged);
            }
            Ok(updated)
        })?;

        debug!(count = updated.len(), "invoices updated");
        Ok(updated)
    }

    fn load(&self, tx: &mut Transaction<'_>, id: &str) -> Result<Option<Document>> {
        if !self.index.contains(tx, id)? {
            return Ok(None);
        }
        match tx.get_json::<Document>(id)? {
            Some(doc) => Ok(Some(doc)),
            None => Err(LedgerError::NotFound {
                kind: "invoice",
                id: id.to_string(),
            }),
        }
    }

    pub fn get(&self, id: &str) -> Result<Option<Document>> {
        self.run(|tx| self.load(tx, id))
    }

    /// Invoices listed on an agreement, in the order they were raised.
    pub fn list_for_agreement(&self, agreement_id: &str) -> Result<Vec<Document>> {
        self.run(|tx| {
            let agreement = agreement::load(tx, agreement_id)?.ok_or_else(|| LedgerError::NotFound {
                kind: "agreement",
                id: agreement_id.to_string(),
            })?;
            split_ids(text(agreement.get(agreement::INVOICE_LIST)))
                .map(|id| {
                    tx.get_json::<Document>(id)?.ok_or_else(|| LedgerError::NotFound {
                        kind: "invoice",
                        id: id.to_string(),
                    })
                })
                .collect()
        })
    }

    /// Invoices that `who` raised or approved.
    pub fn list_for_user(&self, who: &str) -> Result<Vec<Document>> {
        self.run(|tx| {
            let mut matching = Vec::new();
            for id in self.index.list_all(tx)? {
                let invoice = tx.get_json::<Document>(&id)?.ok_or_else(|| LedgerError::NotFound {
                    kind: "invoice",
                    id: id.clone(),
                })?;
                if text(invoice.get(APPROVED_BY)) == who || text(invoice.get(RAISED_BY)) == who {
                    matching.push(invoice);
                }
            }
            Ok(matching)
        })
    }
}
