//! Tracing init and in-process counters.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

/// Counter names incremented by the operation layer.
pub mod metrics {
    pub const VAULT_DEPOSIT_TOTAL: &str = "vault_deposit_total";
    pub const VAULT_TRANSFER_TOTAL: &str = "vault_transfer_total";
    pub const CYCLE_CREATED_TOTAL: &str = "cycle_created_total";
    pub const CYCLE_COMPLETED_TOTAL: &str = "cycle_completed_total";
    pub const ORDER_PUBLISHED_TOTAL: &str = "order_published_total";
    pub const ORDER_CANCELLED_TOTAL: &str = "order_cancelled_total";
    pub const TRANSACTION_EXECUTED_TOTAL: &str = "transaction_executed_total";
    pub const DAY_CLOSED_TOTAL: &str = "day_closed_total";
    pub const CONFLICT_RETRIES_TOTAL: &str = "conflict_retries_total";
}

/// Shared counter map. Cloning is cheap; all clones see the same counters.
#[derive(Clone, Default)]
pub struct MetricsCollector {
    counters: Arc<RwLock<HashMap<String, u64>>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn increment(&self, name: &str) {
        let mut counters = self.counters.write().await;
        *counters.entry(name.to_string()).or_insert(0) += 1;
    }

    pub async fn get_counter(&self, name: &str) -> u64 {
        self.counters.read().await.get(name).copied().unwrap_or(0)
    }

    pub async fn snapshot(&self) -> HashMap<String, u64> {
        self.counters.read().await.clone()
    }
}

/// Install the global tracing subscriber. Safe to call more than once; later
/// calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counters_accumulate() {
        let collector = MetricsCollector::new();
        collector.increment(metrics::ORDER_PUBLISHED_TOTAL).await;
        collector.increment(metrics::ORDER_PUBLISHED_TOTAL).await;

        assert_eq!(collector.get_counter(metrics::ORDER_PUBLISHED_TOTAL).await, 2);
        assert_eq!(collector.get_counter(metrics::DAY_CLOSED_TOTAL).await, 0);

        let snapshot = collector.snapshot().await;
        assert_eq!(snapshot.get(metrics::ORDER_PUBLISHED_TOTAL), Some(&2));
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let a = MetricsCollector::new();
        let b = a.clone();
        b.increment(metrics::DAY_CLOSED_TOTAL).await;
        assert_eq!(a.get_counter(metrics::DAY_CLOSED_TOTAL).await, 1);
    }
}
