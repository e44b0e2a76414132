//! Capital-accounting core for fiat/crypto arbitrage cycles.
//!
//! A [`Ledger`] wraps a database pool and exposes the vault, cycle, order, and
//! transaction operations. Every mutation validates its input, applies a pure
//! state transition, and persists the result inside a single transaction.

pub mod config;
pub mod db;
pub mod error;
pub mod ledger;
pub mod models;
pub mod observability;
pub mod pricing;

pub use config::LedgerConfig;
pub use db::Db;
pub use error::LedgerError;
pub use observability::MetricsCollector;

/// Facade over the ledger database. Cheap to clone; clones share the pool and
/// the metrics counters.
#[derive(Clone)]
pub struct Ledger {
    pub(crate) db: Db,
    pub(crate) metrics: MetricsCollector,
    pub(crate) max_conflict_retries: u32,
}

impl Ledger {
    pub fn new(db: Db) -> Self {
        Self {
            db,
            metrics: MetricsCollector::new(),
            max_conflict_retries: db::DEFAULT_MAX_CONFLICT_RETRIES,
        }
    }

    /// Open the configured database, run migrations, and build the ledger.
    pub async fn from_config(config: &LedgerConfig) -> anyhow::Result<Self> {
        let pool = db::init_db(&config.database_url, config.max_connections).await?;
        Ok(Self {
            db: pool,
            metrics: MetricsCollector::new(),
            max_conflict_retries: config.max_conflict_retries,
        })
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }
}
