//! Order execution: the only path that moves a day's balances.
//!
//! Each execution applies a pure balance transition and a fill progression,
//! then persists the transaction record, the order figures, and the day's
//! absolute balances in one database transaction.

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::db;
use crate::error::LedgerError;
use crate::models::{
    decimal_to_db, opt_decimal_to_db, DailyCycle, ExecuteOrder, ExecutionOutcome, FillProgress,
    Order, OrderRow, OrderSide, OrderStatus, TradeApplication, Transaction, TransactionRow,
};
use crate::observability::metrics;
use crate::Ledger;

impl Ledger {
    /// Record a (possibly partial) execution of a buy order: fiat leaves the
    /// day's balance, asset arrives.
    pub async fn execute_buy(
        &self,
        user_id: Uuid,
        input: ExecuteOrder,
    ) -> Result<ExecutionOutcome, LedgerError> {
        input.validate().map_err(LedgerError::from_validation)?;
        let outcome = db::with_retries(self.max_conflict_retries, &self.metrics, || {
            self.execute_in_tx(user_id, &input, OrderSide::Buy)
        })
        .await?;
        self.metrics
            .increment(metrics::TRANSACTION_EXECUTED_TOTAL)
            .await;
        info!(%user_id, order_id = %input.order_id, quantity = %input.executed_quantity,
            percent = %outcome.order.execution_percent, "buy execution recorded");
        Ok(outcome)
    }

    /// Record a (possibly partial) execution of a sell order: asset leaves the
    /// day's balance, fiat net of commission arrives.
    pub async fn execute_sell(
        &self,
        user_id: Uuid,
        input: ExecuteOrder,
    ) -> Result<ExecutionOutcome, LedgerError> {
        input.validate().map_err(LedgerError::from_validation)?;
        let outcome = db::with_retries(self.max_conflict_retries, &self.metrics, || {
            self.execute_in_tx(user_id, &input, OrderSide::Sell)
        })
        .await?;
        self.metrics
            .increment(metrics::TRANSACTION_EXECUTED_TOTAL)
            .await;
        info!(%user_id, order_id = %input.order_id, quantity = %input.executed_quantity,
            percent = %outcome.order.execution_percent, "sell execution recorded");
        Ok(outcome)
    }

    async fn execute_in_tx(
        &self,
        user_id: Uuid,
        input: &ExecuteOrder,
        side: OrderSide,
    ) -> Result<ExecutionOutcome, LedgerError> {
        let mut tx = self.db.begin().await?;
        let order = super::order_scoped(&mut tx, input.order_id, user_id, Some(side)).await?;
        let day = super::daily_cycle_scoped(&mut tx, order.daily_cycle_id, user_id).await?;

        let application = match side {
            OrderSide::Buy => day.apply_buy(input.executed_quantity, input.executed_price)?,
            OrderSide::Sell => {
                let cycle =
                    super::general_cycle_scoped(&mut tx, day.general_cycle_id, user_id).await?;
                day.apply_sell(
                    input.executed_quantity,
                    input.executed_price,
                    cycle.commission_rate,
                )?
            }
        };
        let fill = order.record_fill(input.executed_quantity, application.fiat_amount)?;

        let now = Utc::now();
        let transaction: Transaction = sqlx::query_as::<_, TransactionRow>(
            "INSERT INTO transactions \
             (id, order_id, daily_cycle_id, side, executed_quantity, executed_price, \
              fiat_amount, commission, asset_balance_before, asset_balance_after, \
              fiat_balance_before, fiat_balance_after, executed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) RETURNING *",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(order.id.to_string())
        .bind(day.id.to_string())
        .bind(side)
        .bind(decimal_to_db(input.executed_quantity))
        .bind(decimal_to_db(input.executed_price))
        .bind(decimal_to_db(application.fiat_amount))
        .bind(opt_decimal_to_db(application.commission))
        .bind(decimal_to_db(application.asset_before))
        .bind(decimal_to_db(application.asset_after))
        .bind(decimal_to_db(application.fiat_before))
        .bind(decimal_to_db(application.fiat_after))
        .bind(now)
        .fetch_one(&mut *tx)
        .await?
        .into();

        let updated_order = update_order_figures(&mut tx, &order, &fill, &application, now).await?;
        update_day_figures(&mut tx, &day, side, input.executed_quantity, &application).await?;
        if fill.status == OrderStatus::Completed {
            super::orders::refresh_day_active_orders(&mut tx, day.id).await?;
        }

        tx.commit().await?;
        Ok(ExecutionOutcome {
            transaction,
            order: updated_order,
            asset_balance: application.asset_after,
            fiat_balance: application.fiat_after,
        })
    }

    /// Executions for a day, newest first.
    pub async fn list_transactions(
        &self,
        user_id: Uuid,
        daily_cycle_id: Uuid,
    ) -> Result<Vec<Transaction>, LedgerError> {
        let mut conn = self.db.acquire().await?;
        let day = super::daily_cycle_scoped(&mut conn, daily_cycle_id, user_id).await?;
        let rows = sqlx::query_as::<_, TransactionRow>(
            "SELECT * FROM transactions WHERE daily_cycle_id = $1 ORDER BY executed_at DESC",
        )
        .bind(day.id.to_string())
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows.into_iter().map(Transaction::from).collect())
    }
}

async fn update_order_figures(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    order: &Order,
    fill: &FillProgress,
    application: &TradeApplication,
    now: chrono::DateTime<Utc>,
) -> Result<Order, LedgerError> {
    let commission_accrued =
        order.commission_accrued + application.commission.unwrap_or(Decimal::ZERO);
    let row = sqlx::query_as::<_, OrderRow>(
        "UPDATE orders \
         SET executed_quantity = $1, executed_total = $2, execution_percent = $3, \
             commission_accrued = $4, status = $5, is_active = $6, \
             first_execution_at = COALESCE(first_execution_at, $7), \
             last_execution_at = $7, updated_at = $7 \
         WHERE id = $8 RETURNING *",
    )
    .bind(decimal_to_db(fill.executed_quantity))
    .bind(decimal_to_db(fill.executed_total))
    .bind(decimal_to_db(fill.execution_percent))
    .bind(decimal_to_db(commission_accrued))
    .bind(fill.status)
    .bind(fill.status != OrderStatus::Completed)
    .bind(now)
    .bind(order.id.to_string())
    .fetch_one(&mut **tx)
    .await?;
    Ok(row.into())
}

async fn update_day_figures(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    day: &DailyCycle,
    side: OrderSide,
    quantity: Decimal,
    application: &TradeApplication,
) -> Result<(), LedgerError> {
    let commission = application.commission.unwrap_or(Decimal::ZERO);
    let (buys, sells, bought, spent, sold, received) = match side {
        OrderSide::Buy => (
            day.buys_count + 1,
            day.sells_count,
            day.total_bought + quantity,
            day.total_spent + application.fiat_amount,
            day.total_sold,
            day.total_received,
        ),
        OrderSide::Sell => (
            day.buys_count,
            day.sells_count + 1,
            day.total_bought,
            day.total_spent,
            day.total_sold + quantity,
            day.total_received + application.fiat_amount,
        ),
    };

    sqlx::query(
        "UPDATE daily_cycles \
         SET asset_balance = $1, fiat_balance = $2, buys_count = $3, sells_count = $4, \
             total_bought = $5, total_spent = $6, total_sold = $7, total_received = $8, \
             commissions_paid = $9 \
         WHERE id = $10",
    )
    .bind(decimal_to_db(application.asset_after))
    .bind(decimal_to_db(application.fiat_after))
    .bind(buys)
    .bind(sells)
    .bind(decimal_to_db(bought))
    .bind(decimal_to_db(spent))
    .bind(decimal_to_db(sold))
    .bind(decimal_to_db(received))
    .bind(decimal_to_db(day.commissions_paid + commission))
    .bind(day.id.to_string())
    .execute(&mut **tx)
    .await?;
    Ok(())
}
