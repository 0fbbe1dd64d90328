//! Named operations accepted by [`crate::service::LedgerService::invoke`].
//!
//! Each operation takes positional string arguments. Both the descriptive name
//! and the wire name used by existing clients are recognised.
use super::error::{LedgerError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    CreateAgreement { id: String, role: String, payload: String },
    UpdateAgreement { id: String, role: String, patch: String },
    CreateInvoiceBatch { role: String, payload: String },
    UpdateInvoiceFields { role: String, payload: String },
    GetAgreement { id: String },
    ListAgreements { who: String },
    ListActiveAgreementsForParty { who: String },
    ValidateNewAgreement { role: String, payload: String },
    GetInvoicesForAgreement { agreement_id: String },
    ListInvoicesForUser { who: String },
    ValidateNewInvoiceBatch { role: String, payload: String },
    GetTransactionHistory { agreement_id: String },
    Probe,
}

fn arg(args: &[&str], position: usize, name: &str) -> Result<String> {
    args.get(position)
        .map(|value| value.to_string())
        .ok_or_else(|| LedgerError::InvalidArgument(format!("missing argument {position} ({name})")))
}

impl Operation {
    pub fn parse(name: &str, args: &[&str]) -> Result<Self> {
        let op = match name {
            "createAgreement" | "createUFA" => Operation::CreateAgreement {
                id: arg(args, 0, "id")?,
                role: arg(args, 1, "role")?,
                payload: arg(args, 2, "payload")?,
            },
            "updateAgreement" | "updateUFA" => Operation::UpdateAgreement {
                id: arg(args, 0, "id")?,
                role: arg(args, 1, "role")?,
                patch: arg(args, 2, "patch")?,
            },
            "createInvoiceBatch" | "createInvoices" => Operation::CreateInvoiceBatch {
                role: arg(args, 0, "role")?,
                payload: arg(args, 1, "invoices")?,
            },
            "updateInvoiceFields" | "updateInvoices" => Operation::UpdateInvoiceFields {
                role: arg(args, 0, "role")?,
                payload: arg(args, 1, "invoices")?,
            },
            "getAgreement" | "getUFADetails" => Operation::GetAgreement {
                id: arg(args, 0, "id")?,
            },
            "listAgreements" | "getAllUFA" => Operation::ListAgreements {
                who: arg(args, 0, "who")?,
            },
            "listActiveAgreementsForParty" | "getAllNonExpiredUFA" | "getAllNonExiredUFA" => {
                Operation::ListActiveAgreementsForParty {
                    who: arg(args, 0, "who")?,
                }
            }
            "validateNewAgreement" | "validateNewUFA" => Operation::ValidateNewAgreement {
                role: arg(args, 0, "role")?,
                payload: arg(args, 1, "payload")?,
            },
            "getInvoicesForAgreement" | "getInvoicesForUFA" => Operation::GetInvoicesForAgreement {
                agreement_id: arg(args, 0, "agreementId")?,
            },
            "listInvoicesForUser" | "getAllInvoicesForUsr" => Operation::ListInvoicesForUser {
                who: arg(args, 0, "who")?,
            },
            "validateNewInvoiceBatch" | "validateNewInvoideData" => {
                Operation::ValidateNewInvoiceBatch {
                    role: arg(args, 0, "role")?,
                    payload: arg(args, 1, "invoices")?,
                }
            }
            "getTransactionHistory" => Operation::GetTransactionHistory {
                agreement_id: arg(args, 0, "agreementId")?,
            },
            "probe" => Operation::Probe,
            other => {
                return Err(LedgerError::InvalidArgument(format!("unknown operation `{other}`")));
            }
        };
        Ok(op)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operation::CreateAgreement { .. } => "createAgreement",
            Operation::UpdateAgreement { .. } => "updateAgreement",
            Operation::CreateInvoiceBatch { .. } => "createInvoiceBatch",
            Operation::UpdateInvoiceFields { .. } => "updateInvoiceFields",
            Operation::GetAgreement { .. } => "getAgreement",
            Operation::ListAgreements { .. } => "listAgreements",
            Operation::ListActiveAgreementsForParty { .. } => "listActiveAgreementsForParty",
            Operation::ValidateNewAgreement { .. } => "validateNewAgreement",
            Operation::GetInvoicesForAgreement { .. } => "getInvoicesForAgreement",
            Operation::ListInvoicesForUser { .. } => "listInvoicesForUser",
            Operation::ValidateNewInvoiceBatch { .. } => "validateNewInvoiceBatch",
            Operation::GetTransactionHistory { .. } => "getTransactionHistory",
            Operation::Probe => "probe",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_map_to_operations() {
        let op = Operation::parse("createUFA", &["UFA1", "SELLER", "{}"]).unwrap();
        assert_eq!(op.name(), "createAgreement");

        let op = Operation::parse("getInvoicesForUFA", &["UFA1"]).unwrap();
        assert_eq!(
            op,
            Operation::GetInvoicesForAgreement {
                agreement_id: "UFA1".into()
            }
        );
        assert_eq!(Operation::parse("probe", &[]).unwrap(), Operation::Probe);
    }

    #[test]
    fn missing_arguments_and_unknown_names_are_rejected() {
        assert!(matches!(
            Operation::parse("updateUFA", &["UFA1", "SELLER"]),
            Err(LedgerError::InvalidArgument(_))
        ));
        assert!(Operation::parse("deleteUFA", &["UFA1"]).is_err());
    }
}
