//! Pool construction, migrations, and the conflict-retry unit of work every
//! mutating operation runs through.

use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use tracing::warn;

use crate::error::LedgerError;
use crate::observability::{metrics, MetricsCollector};

pub type Db = Pool<Sqlite>;

pub const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 3;

/// Open the database, creating the file if needed, and run migrations.
pub async fn init_db(database_url: &str, max_connections: u32) -> anyhow::Result<Db> {
    let options = SqliteConnectOptions::from_str(database_url)
        .context("invalid database url")?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(3));

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .context("failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("failed to run migrations")?;

    Ok(pool)
}

/// Run a transactional operation, retrying a bounded number of times when the
/// database reports a write conflict. Exhaustion surfaces as `Conflict`.
pub async fn with_retries<T, F, Fut>(
    max_retries: u32,
    collector: &MetricsCollector,
    mut op: F,
) -> Result<T, LedgerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LedgerError>>,
{
    let mut attempt: u32 = 0;
    loop {
        match op().await {
            Err(LedgerError::Database(err)) if is_retryable(&err) => {
                attempt += 1;
                collector.increment(metrics::CONFLICT_RETRIES_TOTAL).await;
                if attempt > max_retries {
                    warn!(attempts = attempt, "write conflict retries exhausted");
                    return Err(LedgerError::Conflict);
                }
                tokio::time::sleep(Duration::from_millis(25 * u64::from(attempt))).await;
            }
            other => return other,
        }
    }
}

/// SQLITE_BUSY / SQLITE_LOCKED family: the write lost a race and can be
/// replayed safely because nothing was committed.
fn is_retryable(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => matches!(
            db_err.code().as_deref(),
            Some("5") | Some("6") | Some("517")
        ),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_retries_passes_through_success() {
        let collector = MetricsCollector::new();
        let result: Result<i32, LedgerError> =
            with_retries(3, &collector, || async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(collector.get_counter(metrics::CONFLICT_RETRIES_TOTAL).await, 0);
    }

    #[tokio::test]
    async fn test_with_retries_passes_through_domain_errors() {
        let collector = MetricsCollector::new();
        let result: Result<i32, LedgerError> =
            with_retries(3, &collector, || async { Err(LedgerError::NoActiveDay) }).await;
        assert!(matches!(result, Err(LedgerError::NoActiveDay)));
        assert_eq!(collector.get_counter(metrics::CONFLICT_RETRIES_TOTAL).await, 0);
    }

    #[test]
    fn test_non_database_errors_are_not_retryable() {
        assert!(!is_retryable(&sqlx::Error::RowNotFound));
        assert!(!is_retryable(&sqlx::Error::PoolClosed));
    }

    #[tokio::test]
    async fn test_with_retries_exhausts_into_conflict() {
        let path = std::env::temp_dir().join(format!("ledger_retry_{}.db", uuid::Uuid::new_v4()));
        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .busy_timeout(Duration::from_millis(0));
        let writer = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options.clone())
            .await
            .expect("writer pool");
        let blocked = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .expect("blocked pool");

        sqlx::query("CREATE TABLE retry_rows (n INTEGER)")
            .execute(&writer)
            .await
            .expect("create table");

        // Hold the write lock so every attempt from the other pool loses.
        let mut holder = writer.acquire().await.expect("acquire");
        sqlx::query("BEGIN IMMEDIATE")
            .execute(&mut *holder)
            .await
            .expect("begin");

        let collector = MetricsCollector::new();
        let result: Result<(), LedgerError> = with_retries(2, &collector, || async {
            sqlx::query("INSERT INTO retry_rows (n) VALUES (1)")
                .execute(&blocked)
                .await?;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(LedgerError::Conflict)));
        // Initial attempt plus two retries, each counted.
        assert_eq!(collector.get_counter(metrics::CONFLICT_RETRIES_TOTAL).await, 3);

        // Once the lock is released the same unit of work goes through.
        sqlx::query("COMMIT").execute(&mut *holder).await.expect("commit");
        let result: Result<(), LedgerError> = with_retries(2, &collector, || async {
            sqlx::query("INSERT INTO retry_rows (n) VALUES (2)")
                .execute(&blocked)
                .await?;
            Ok(())
        })
        .await;
        assert!(result.is_ok());
        assert_eq!(collector.get_counter(metrics::CONFLICT_RETRIES_TOTAL).await, 3);

        drop(holder);
        drop(writer);
        drop(blocked);
        let _ = std::fs::remove_file(&path);
    }
}
