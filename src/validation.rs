//! Business rules gating agreement creation and invoice batches.
//!
//! Both rule sets collect every violation they can see into an ordered message
//! list; an empty list means the request is acceptable. Nothing here touches
//! the store, callers resolve whatever records the rules need beforehand.
use super::agreement::{self, ChargeTerms};
use super::config::LedgerConfig;
use super::error::AuthorizationError;
use super::index::check_record_id;
use super::invoice;
use super::merge::Document;
use super::utils::{number, text};
use std::collections::HashSet;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Seller,
    Buyer,
}

impl FromStr for Role {
    type Err = AuthorizationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SELLER" => Ok(Role::Seller),
            "BUYER" => Ok(Role::Buyer),
            other => Err(AuthorizationError(format!(
                "User role `{other}` is not authorized to act on a UFA"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationEngine {
    max_tolerance: f64,
    min_batch_size: usize,
    cost_share_divisor: f64,
}

impl ValidationEngine {
    pub fn new(config: &LedgerConfig) -> Self {
        Self {
            max_tolerance: config.max_tolerance,
            min_batch_size: config.min_batch_size,
            cost_share_divisor: config.cost_share_divisor,
        }
    }

    pub fn authorize(&self, role: &str) -> Result<Role, AuthorizationError> {
        role.parse()
    }

    pub fn validate_new_agreement(
        &self,
        role: &str,
        payload: &Document,
    ) -> Result<Vec<String>, AuthorizationError> {
        self.authorize(role)?;
        let mut messages = Vec::new();

        match number(payload.get(agreement::NET_CHARGE)) {
            Some(charge) if charge > 0.0 => {}
            _ => messages.push("Invalid net charge".to_string()),
        }

        match agreement::tolerance_of(payload) {
            Some(tolerance) if (0.0..=self.max_tolerance).contains(&tolerance) => {}
            _ => messages.push(format!(
                "Tolerance is out of range. Should be between 0 and {}",
                self.max_tolerance
            )),
        }

        Ok(messages)
    }

    /// Check a proposed invoice batch against the agreement its first invoice
    /// names. `agreement` is that record when it exists; `already_stored` lists
    /// batch invoice numbers that are taken.
    pub fn validate_invoice_batch(
        &self,
        batch: &[Document],
        agreement: Option<&Document>,
        already_stored: &[String],
    ) -> Vec<String> {
        let mut messages = Vec::new();

        let Some(first) = batch.first().filter(|_| batch.len() >= self.min_batch_size) else {
            messages.push("Invalid number of invoices".to_string());
            return messages;
        };

        let ufa_number = text(first.get(invoice::UFA_NUMBER));
        if ufa_number.is_empty() {
            messages.push("UFA number not provided".to_string());
            return messages;
        }
        let Some(agreement) = agreement else {
            messages.push("Invalid UFA number provided".to_string());
            return messages;
        };

        let period = text(first.get(invoice::BILLING_PERIOD));
        check_batch_shape(batch, ufa_number, period, already_stored, &mut messages);

        let terms = ChargeTerms::of(agreement);
        let max_charge = terms.max_charge();
        if terms.is_exhausted() {
            messages.push("All charges exhausted. Invoices can not be raised".to_string());
        }

        if period.is_empty() {
            messages.push("Invalid billing period".to_string());
        } else if agreement.contains_key(&agreement::period_marker(period)) {
            messages.push(format!("Invoice already raised for the period {period}"));
        }

        let mut batch_sum = 0.0;
        for invoice in batch {
            match number(invoice.get(invoice::AMOUNT)) {
                Some(amount) if amount >= 0.0 => batch_sum += amount,
                _ => {
                    let id = text(invoice.get(invoice::INVOICE_NUMBER));
                    messages.push(format!("Invalid invoice amount in {id}"));
                    return messages;
                }
            }
        }

        if terms.raised_total + batch_sum / self.cost_share_divisor >= max_charge {
            messages.push("Invoice value is exceeding total allowed charge".to_string());
        }

        messages
    }
}

fn check_batch_shape(
    batch: &[Document],
    ufa_number: &str,
    period: &str,
    already_stored: &[String],
    messages: &mut Vec<String>,
) {
    let mut seen = HashSet::new();
    for invoice in batch {
        let id = text(invoice.get(invoice::INVOICE_NUMBER));
        if id.is_empty() {
            messages.push("Invoice number not provided".to_string());
        } else if check_record_id(id).is_err() {
            messages.push(format!("Invalid invoice number {id}"));
        } else if !seen.insert(id) {
            messages.push(format!("Duplicate invoice number {id} in batch"));
        }
        if text(invoice.get(invoice::UFA_NUMBER)) != ufa_number {
            messages.push(format!("Invoice {id} does not belong to UFA {ufa_number}"));
        }
        if text(invoice.get(invoice::BILLING_PERIOD)) != period {
            messages.push(format!("Invoice {id} is not for billing period {period}"));
        }
    }
    for id in already_stored {
        messages.push(format!("Invoice {id} already exists"));
    }
}
