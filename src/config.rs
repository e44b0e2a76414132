//! Environment-driven configuration with sane defaults.

use serde::Deserialize;

use crate::db::DEFAULT_MAX_CONFLICT_RETRIES;

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub max_conflict_retries: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://cycle-ledger.db".to_string(),
            max_connections: 5,
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
        }
    }
}

impl LedgerConfig {
    /// Load from `LEDGER_*` environment variables, falling back to defaults
    /// (`LEDGER_DATABASE_URL`, `LEDGER_MAX_CONNECTIONS`,
    /// `LEDGER_MAX_CONFLICT_RETRIES`).
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();
        let settings = config::Config::builder()
            .set_default("database_url", defaults.database_url)?
            .set_default("max_connections", i64::from(defaults.max_connections))?
            .set_default(
                "max_conflict_retries",
                i64::from(defaults.max_conflict_retries),
            )?
            .add_source(config::Environment::with_prefix("LEDGER"))
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = LedgerConfig::default();
        assert_eq!(cfg.max_connections, 5);
        assert_eq!(cfg.max_conflict_retries, DEFAULT_MAX_CONFLICT_RETRIES);
        assert!(cfg.database_url.starts_with("sqlite://"));
    }

    #[test]
    fn test_from_env_uses_defaults_when_unset() {
        let cfg = LedgerConfig::from_env().expect("config should build");
        assert_eq!(cfg.max_connections, 5);
    }
}
