//! Daily cycle operations: intraday status and the close-day cascade.

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use crate::db;
use crate::error::LedgerError;
use crate::models::{
    decimal_to_db, ClosedDaySummary, DailyCycle, DailyCycleRow, DayCloseOutcome, DayStatus,
    DayStatusView, NextDaySummary, Order, OrderRow, OrderStatus, Transaction, TransactionRow,
};
use crate::observability::metrics;
use crate::Ledger;

impl Ledger {
    /// Intraday view of a day: balances, capital at the 1.0 convention, and
    /// the day's orders and transactions newest-first.
    pub async fn day_status(
        &self,
        user_id: Uuid,
        daily_cycle_id: Uuid,
    ) -> Result<DayStatusView, LedgerError> {
        let mut conn = self.db.acquire().await?;
        let day = super::daily_cycle_scoped(&mut conn, daily_cycle_id, user_id).await?;

        let orders = sqlx::query_as::<_, OrderRow>(
            "SELECT * FROM orders WHERE daily_cycle_id = $1 ORDER BY created_at DESC",
        )
        .bind(day.id.to_string())
        .fetch_all(&mut *conn)
        .await?;

        let transactions = sqlx::query_as::<_, TransactionRow>(
            "SELECT * FROM transactions WHERE daily_cycle_id = $1 ORDER BY executed_at DESC",
        )
        .bind(day.id.to_string())
        .fetch_all(&mut *conn)
        .await?;

        let current_capital = day.current_capital();
        Ok(DayStatusView {
            day,
            current_capital,
            orders: orders.into_iter().map(Order::from).collect(),
            transactions: transactions.into_iter().map(Transaction::from).collect(),
        })
    }

    /// Close an active day at the given asset price and activate the next day
    /// with the closing capital as its opening capital. Balances carry over
    /// as-is; only the capital figures are revalued.
    pub async fn close_day(
        &self,
        user_id: Uuid,
        daily_cycle_id: Uuid,
        closing_asset_price: Decimal,
    ) -> Result<DayCloseOutcome, LedgerError> {
        if closing_asset_price <= Decimal::ZERO {
            return Err(LedgerError::Validation(format!(
                "closing asset price {closing_asset_price} must be positive"
            )));
        }
        let outcome = db::with_retries(self.max_conflict_retries, &self.metrics, || {
            self.close_day_in_tx(user_id, daily_cycle_id, closing_asset_price)
        })
        .await?;
        self.metrics.increment(metrics::DAY_CLOSED_TOTAL).await;
        info!(%user_id, %daily_cycle_id, day = outcome.closed.day_number,
            net_profit = %outcome.closed.net_profit, "daily cycle closed");
        Ok(outcome)
    }

    async fn close_day_in_tx(
        &self,
        user_id: Uuid,
        daily_cycle_id: Uuid,
        closing_asset_price: Decimal,
    ) -> Result<DayCloseOutcome, LedgerError> {
        let mut tx = self.db.begin().await?;
        let day = super::daily_cycle_scoped(&mut tx, daily_cycle_id, user_id).await?;
        if day.status != DayStatus::Active {
            return Err(LedgerError::DayNotActive { status: day.status });
        }

        let pending: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM orders \
             WHERE daily_cycle_id = $1 AND status IN ($2, $3)",
        )
        .bind(day.id.to_string())
        .bind(OrderStatus::Published)
        .bind(OrderStatus::Partial)
        .fetch_one(&mut *tx)
        .await?;
        if pending > 0 {
            return Err(LedgerError::ActiveOrdersRemaining { pending });
        }

        let close = day.close_at(closing_asset_price)?;
        let now = Utc::now();

        sqlx::query(
            "UPDATE daily_cycles \
             SET status = $1, closing_asset_price = $2, closing_asset_balance = $3, \
                 closing_fiat_balance = $4, closing_capital = $5, net_profit = $6, \
                 profit_rate = $7, closed_at = $8, has_active_orders = 0 \
             WHERE id = $9",
        )
        .bind(DayStatus::Completed)
        .bind(decimal_to_db(closing_asset_price))
        .bind(decimal_to_db(close.closing_asset_balance))
        .bind(decimal_to_db(close.closing_fiat_balance))
        .bind(decimal_to_db(close.closing_capital))
        .bind(decimal_to_db(close.net_profit))
        .bind(decimal_to_db(close.profit_rate))
        .bind(now)
        .bind(day.id.to_string())
        .execute(&mut *tx)
        .await?;

        let next = sqlx::query_as::<_, DailyCycleRow>(
            "SELECT * FROM daily_cycles WHERE general_cycle_id = $1 AND day_number = $2",
        )
        .bind(day.general_cycle_id.to_string())
        .bind(day.day_number + 1)
        .fetch_optional(&mut *tx)
        .await?
        .map(DailyCycle::from);

        let next_summary = match next {
            Some(next_day) => {
                sqlx::query(
                    "UPDATE daily_cycles \
                     SET status = $1, opening_capital = $2, asset_balance = $3, fiat_balance = $4 \
                     WHERE id = $5",
                )
                .bind(DayStatus::Active)
                .bind(decimal_to_db(close.closing_capital))
                .bind(decimal_to_db(close.closing_asset_balance))
                .bind(decimal_to_db(close.closing_fiat_balance))
                .bind(next_day.id.to_string())
                .execute(&mut *tx)
                .await?;
                Some(NextDaySummary {
                    day_number: next_day.day_number,
                    opening_capital: close.closing_capital,
                })
            }
            None => None,
        };

        tx.commit().await?;
        Ok(DayCloseOutcome {
            closed: ClosedDaySummary {
                day_number: day.day_number,
                opening_capital: day.opening_capital,
                closing_capital: close.closing_capital,
                net_profit: close.net_profit,
                profit_rate: close.profit_rate,
            },
            next: next_summary,
        })
    }
}
