//! Service layer API for agreement and invoice operations
use super::agreement::{AgreementLedger, parse_document};
use super::config::LedgerConfig;
use super::error::{LedgerError, Result};
use super::index::RecordIndex;
use super::invoice::InvoiceLedger;
use super::merge::Document;
use super::operation::Operation;
use super::store::KeyValueStore;
use super::transaction;
use super::validation::ValidationEngine;
use chrono::Utc;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{Span, info, info_span, warn};

/// Installation marker, written once when a ledger is first opened.
pub const VERSION_KEY: &str = "CHAIN_CODE_VERSION";

pub fn validation_report(messages: &[String]) -> Value {
    let outcome = if messages.is_empty() { "Success" } else { "Failure" };
    json!({ "validation": outcome, "msg": messages })
}

pub struct LedgerService {
    store: Arc<dyn KeyValueStore>,
    config: LedgerConfig,
    agreements: AgreementLedger,
    invoices: InvoiceLedger,
    span: Span,
}

impl LedgerService {
    pub fn open(store: Arc<dyn KeyValueStore>, config: LedgerConfig) -> Result<Self> {
        Self::open_with_span(store, config, info_span!("ufa_ledger"))
    }

    /// Open the ledger, logging under `span`. Missing indexes and the
    /// installation marker are created; existing state is left alone.
    pub fn open_with_span(
        store: Arc<dyn KeyValueStore>,
        config: LedgerConfig,
        span: Span,
    ) -> Result<Self> {
        config
            .check()
            .map_err(|e| LedgerError::InvalidArgument(format!("{e:#}")))?;
        let validation = ValidationEngine::new(&config);
        let agreements = AgreementLedger::new(
            store.clone(),
            validation.clone(),
            config.max_commit_retries,
            info_span!(parent: &span, "agreements"),
        );
        let invoices = InvoiceLedger::new(
            store.clone(),
            validation,
            config.cost_share_divisor,
            config.max_commit_retries,
            info_span!(parent: &span, "invoices"),
        );

        let service = Self {
            store,
            config,
            agreements,
            invoices,
            span,
        };
        service.install()?;
        Ok(service)
    }

    fn install(&self) -> Result<()> {
        let _guard = self.span.enter();
        let fresh = transaction::run(self.store.as_ref(), self.config.max_commit_retries, |tx| {
            let mut fresh = RecordIndex::agreements().ensure(tx)?;
            fresh |= RecordIndex::invoices().ensure(tx)?;
            if tx.get(VERSION_KEY)?.is_none() {
                tx.put(VERSION_KEY, Utc::now().to_rfc2822().into_bytes());
                fresh = true;
            }
            Ok(fresh)
        })?;
        if fresh {
            info!(version = env!("CARGO_PKG_VERSION"), "ledger initialised");
        }
        Ok(())
    }

    pub fn agreements(&self) -> &AgreementLedger {
        &self.agreements
    }

    pub fn invoices(&self) -> &InvoiceLedger {
        &self.invoices
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn probe(&self) -> Result<Value> {
        let marker = transaction::run(self.store.as_ref(), 0, |tx| tx.get(VERSION_KEY))?;
        let version = marker
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .unwrap_or_default();
        Ok(json!({
            "status": "Success",
            "ts": Utc::now().to_rfc2822(),
            "version": version,
        }))
    }

    /// Parse and run a named operation.
    pub fn invoke(&self, name: &str, args: &[&str]) -> Result<Value> {
        match Operation::parse(name, args) {
            Ok(op) => self.execute(op),
            Err(e) => {
                warn!(operation = name, error = %e, "operation rejected");
                Ok(validation_report(&e.messages()))
            }
        }
    }

    /// Run an operation. Rejected requests come back as a failure report;
    /// ledger faults are returned as errors.
    pub fn execute(&self, op: Operation) -> Result<Value> {
        let span = info_span!(
            parent: &self.span,
            "operation",
            op = op.name(),
            request_id = %uuid7::uuid7()
        );
        let _guard = span.enter();

        match self.dispatch(op) {
            Err(e) if e.is_rejection() => {
                info!(error = %e, "operation rejected");
                Ok(validation_report(&e.messages()))
            }
            Err(e) => {
                warn!(error = %e, "operation failed");
                Err(e)
            }
            ok => ok,
        }
    }

    fn dispatch(&self, op: Operation) -> Result<Value> {
        let value = match op {
            Operation::CreateAgreement { id, role, payload } => {
                self.agreements.create(&id, &role, &payload)?;
                Value::Null
            }
            Operation::UpdateAgreement { id, role, patch } => {
                self.agreements.update(&id, &role, &patch)?;
                Value::Null
            }
            Operation::CreateInvoiceBatch { role, payload } => {
                self.invoices.create_batch(&role, &payload)?;
                Value::Null
            }
            Operation::UpdateInvoiceFields { role, payload } => {
                self.invoices.update(&role, &payload)?;
                Value::Null
            }
            Operation::GetAgreement { id } => match self.agreements.get(&id)? {
                Some(doc) => Value::Object(doc),
                None => {
                    return Err(LedgerError::NotFound {
                        kind: "agreement",
                        id,
                    });
                }
            },
            Operation::ListAgreements { who } => {
                info!(%who, "listing all agreements");
                documents(self.agreements.list_all()?)
            }
            Operation::ListActiveAgreementsForParty { who } => {
                documents(self.agreements.list_active_for_party(&who)?)
            }
            Operation::ValidateNewAgreement { role, payload } => {
                let doc = parse_document(&payload)?;
                let messages = self
                    .agreements
                    .validation()
                    .validate_new_agreement(&role, &doc)?;
                validation_report(&messages)
            }
            Operation::GetInvoicesForAgreement { agreement_id } => {
                documents(self.invoices.list_for_agreement(&agreement_id)?)
            }
            Operation::ListInvoicesForUser { who } => documents(self.invoices.list_for_user(&who)?),
            Operation::ValidateNewInvoiceBatch { role, payload } => {
                validation_report(&self.invoices.validate_batch(&role, &payload)?)
            }
            Operation::GetTransactionHistory { agreement_id } => {
                json!(self.agreements.history(&agreement_id)?)
            }
            Operation::Probe => self.probe()?,
        };
        Ok(value)
    }
}

fn documents(docs: Vec<Document>) -> Value {
    Value::Array(docs.into_iter().map(Value::Object).collect())
}
