//! Ledger tuning loaded from TOML.
//!
//! Every field has a default, so an empty document is a valid configuration:
//!
//! ```toml
//! cost_share_divisor = 2.0
//! max_tolerance = 10.0
//! min_batch_size = 2
//! max_commit_retries = 8
//! ```
use anyhow::Context;
use serde::Deserialize;
use std::path::Path;

/// Share of a batch total charged against an agreement's running total is
/// `batch_total / COST_SHARE_DIVISOR`; the counterparties split invoiced cost.
pub const COST_SHARE_DIVISOR: f64 = 2.0;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LedgerConfig {
    pub cost_share_divisor: f64,
    /// Upper bound (inclusive) for `chargeTolerance`, in percent.
    pub max_tolerance: f64,
    pub min_batch_size: usize,
    pub max_commit_retries: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            cost_share_divisor: COST_SHARE_DIVISOR,
            max_tolerance: 10.0,
            min_batch_size: 2,
            max_commit_retries: 8,
        }
    }
}

impl LedgerConfig {
    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
        let config: LedgerConfig = toml::from_str(raw).context("invalid ledger configuration")?;
        config.check()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&raw)
    }

    /// Reject settings that would let a batch move the running total to a
    /// non-finite value or slip past the batch size floor.
    pub(crate) fn check(&self) -> anyhow::Result<()> {
        if !(self.cost_share_divisor.is_finite() && self.cost_share_divisor > 0.0) {
            anyhow::bail!("cost_share_divisor must be a positive number");
        }
        if !(self.max_tolerance.is_finite() && self.max_tolerance >= 0.0) {
            anyhow::bail!("max_tolerance must be a non-negative number");
        }
        if self.min_batch_size < 2 {
            anyhow::bail!("min_batch_size must be at least 2");
        }
        if self.max_commit_retries == 0 {
            anyhow::bail!("max_commit_retries must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        assert_eq!(LedgerConfig::from_toml_str("").unwrap(), LedgerConfig::default());
    }

    #[test]
    fn fields_override_defaults() {
        let config = LedgerConfig::from_toml_str("cost_share_divisor = 1.0\nmin_batch_size = 3").unwrap();

        assert_eq!(config.cost_share_divisor, 1.0);
        assert_eq!(config.min_batch_size, 3);
        assert_eq!(config.max_commit_retries, 8);
    }

    #[test]
    fn rejects_non_positive_divisor_and_unknown_keys() {
        assert!(LedgerConfig::from_toml_str("cost_share_divisor = 0.0").is_err());
        assert!(LedgerConfig::from_toml_str("max_commit_retries = 0").is_err());
        assert!(LedgerConfig::from_toml_str("divisor = 2.0").is_err());
    }

    #[test]
    fn rejects_single_invoice_batches_and_nan_tolerance() {
        assert!(LedgerConfig::from_toml_str("min_batch_size = 1").is_err());
        assert!(LedgerConfig::from_toml_str("max_tolerance = nan").is_err());
        assert!(LedgerConfig::from_toml_str("max_tolerance = -1.0").is_err());

        let built = LedgerConfig {
            cost_share_divisor: f64::NAN,
            ..LedgerConfig::default()
        };
        assert!(built.check().is_err());
        assert!(LedgerConfig::default().check().is_ok());
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.toml");
        std::fs::write(&path, "max_tolerance = 5.0").unwrap();

        let config = LedgerConfig::load(&path).unwrap();

        assert_eq!(config.max_tolerance, 5.0);
    }
}
