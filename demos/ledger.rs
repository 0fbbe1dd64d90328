//! Walks one agreement through its lifecycle against a sled database.
//!
//! Run with `RUST_LOG=debug` to see the operation spans.
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use ufa_ledger::{LedgerConfig, LedgerService, SledStore};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let dir = tempfile::tempdir()?;
    let store = Arc::new(SledStore::open(dir.path().join("ledger"))?);
    let config = match std::env::args().nth(1) {
        Some(path) => LedgerConfig::load(path)?,
        None => LedgerConfig::default(),
    };
    let service = LedgerService::open(store, config)?;

    let agreement = serde_json::json!({
        "sellerApprover": {"emailid": "seller@corp", "name": "Acme Supplies"},
        "buyerApprover": {"emailid": "buyer@corp", "name": "Globex"},
        "netCharge": "1000",
        "chargeTolerance": "10",
        "status": "Agreed",
    })
    .to_string();
    let batch = r#"[
        {"invoiceNumber":"INV-1","ufanumber":"UFA-1","billingPeriod":"2024-01","invoiceAmt":"1200","raisedBy":"seller@corp","approvedBy":"buyer@corp"},
        {"invoiceNumber":"INV-2","ufanumber":"UFA-1","billingPeriod":"2024-01","invoiceAmt":"800","raisedBy":"seller@corp","approvedBy":"buyer@corp"}
    ]"#;

    let steps: [(&str, Vec<&str>); 7] = [
        ("probe", vec![]),
        ("createUFA", vec!["UFA-1", "SELLER", agreement.as_str()]),
        ("validateNewInvoideData", vec!["SELLER", batch]),
        ("createInvoices", vec!["SELLER", batch]),
        ("createInvoices", vec!["SELLER", batch]),
        ("getAllNonExpiredUFA", vec!["buyer@corp"]),
        ("getTransactionHistory", vec!["UFA-1"]),
    ];

    for (name, args) in &steps {
        let out = service.invoke(name, args)?;
        println!("{name}: {}", serde_json::to_string_pretty(&out)?);
    }

    Ok(())
}
