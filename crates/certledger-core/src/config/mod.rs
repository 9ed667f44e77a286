pub mod audit;
pub mod ledger;
pub mod store;

pub use audit::AuditConfig;
pub use ledger::{LedgerConfig, MigrationPolicy};
pub use store::{ReadPoolConfig, StoreConfig, SynchronousMode};

use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Complete configuration for one ledger instance
///
/// Every instance owns its own store file and fallback file, so tests can
/// open as many isolated ledgers as they need.
///
/// # Example
///
/// ```toml
/// [store]
/// path = "/var/lib/certledger/ledger.db"
///
/// [ledger]
/// lock_timeout_ms = 5000
///
/// [audit]
/// fallback_path = "/var/lib/certledger/audit-fallback/failed_ledger_entries.jsonl"
/// retention_days = 90
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertLedgerConfig {
    pub store: StoreConfig,

    #[serde(default)]
    pub ledger: LedgerConfig,

    pub audit: AuditConfig,
}

impl CertLedgerConfig {
    /// Default layout under a single data directory:
    /// - `{dir}/ledger.db`
    /// - `{dir}/audit-fallback/failed_ledger_entries.jsonl`
    pub fn for_data_dir<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        Self {
            store: StoreConfig::new(dir.join("ledger.db")),
            ledger: LedgerConfig::default(),
            audit: AuditConfig::new(
                dir.join("audit-fallback")
                    .join("failed_ledger_entries.jsonl"),
            ),
        }
    }

    /// Parse a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| LedgerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Data directory implied by the store path
    pub fn data_dir(&self) -> PathBuf {
        self.store
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }

    /// Reject settings that would make the ledger unusable
    pub fn validate(&self) -> Result<()> {
        if self.ledger.stripe_count == 0 {
            return Err(LedgerError::Config("ledger.stripe_count must be positive".into()));
        }
        if self.ledger.lock_timeout_ms == 0 {
            return Err(LedgerError::Config(
                "ledger.lock_timeout_ms must be positive".into(),
            ));
        }
        if self.audit.retention_days == 0 {
            return Err(LedgerError::Config(
                "audit.retention_days must be at least 1".into(),
            ));
        }
        if let MigrationPolicy::FromHub { hub } = &self.ledger.migration_policy {
            crate::validate::branch_code(hub)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_data_dir_layout() {
        let config = CertLedgerConfig::for_data_dir("/data");
        assert_eq!(config.store.path, PathBuf::from("/data/ledger.db"));
        assert_eq!(
            config.audit.fallback_path,
            PathBuf::from("/data/audit-fallback/failed_ledger_entries.jsonl")
        );
        assert_eq!(config.audit.retention_days, 90);
        assert_eq!(config.ledger.lock_timeout_ms, 5000);
        assert_eq!(config.data_dir(), PathBuf::from("/data"));
    }

    #[test]
    fn test_toml_defaults_fill_in() {
        let config = CertLedgerConfig::from_toml_str(
            r#"
            [store]
            path = "/tmp/ledger.db"

            [audit]
            fallback_path = "/tmp/fallback.jsonl"
            "#,
        )
        .unwrap();

        assert!(config.store.wal_mode);
        assert_eq!(config.store.busy_timeout_ms, 5000);
        assert_eq!(config.ledger.stripe_count, 256);
        assert_eq!(config.ledger.migration_policy, MigrationPolicy::Any);
        assert!(config.audit.fsync_fallback);
    }

    #[test]
    fn test_toml_hub_policy() {
        let config = CertLedgerConfig::from_toml_str(
            r#"
            [store]
            path = "/tmp/ledger.db"

            [ledger]
            lock_timeout_ms = 250
            migration_policy = { from_hub = { hub = "SND" } }

            [audit]
            fallback_path = "/tmp/fallback.jsonl"
            retention_days = 30
            "#,
        )
        .unwrap();

        assert_eq!(config.ledger.lock_timeout_ms, 250);
        assert_eq!(
            config.ledger.migration_policy,
            MigrationPolicy::FromHub { hub: "SND".into() }
        );
        assert_eq!(config.audit.retention_days, 30);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = CertLedgerConfig::from_toml_str(
            r#"
            [store]
            path = "/tmp/ledger.db"

            [ledger]
            stripe_count = 0

            [audit]
            fallback_path = "/tmp/fallback.jsonl"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::Config(_)));
    }
}
