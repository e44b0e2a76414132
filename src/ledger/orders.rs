//! Order publication, cancellation, and listing.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::db;
use crate::error::LedgerError;
use crate::models::{
    decimal_to_db, opt_decimal_to_db, Order, OrderRow, OrderSide, OrderStatus, PublishBuyOrder,
    PublishSellOrder,
};
use crate::observability::metrics;
use crate::Ledger;

impl Ledger {
    /// Publish a buy order funded by the day's fiat balance. The published
    /// quantity is the fiat amount at the published price; fiat only leaves
    /// the balance when executions land.
    pub async fn publish_buy_order(
        &self,
        user_id: Uuid,
        input: PublishBuyOrder,
    ) -> Result<Order, LedgerError> {
        input.validate().map_err(LedgerError::from_validation)?;
        let order = db::with_retries(self.max_conflict_retries, &self.metrics, || {
            self.publish_buy_order_in_tx(user_id, &input)
        })
        .await?;
        self.metrics.increment(metrics::ORDER_PUBLISHED_TOTAL).await;
        info!(%user_id, order_id = %order.id, price = %order.published_price,
            quantity = %order.published_quantity, "buy order published");
        Ok(order)
    }

    async fn publish_buy_order_in_tx(
        &self,
        user_id: Uuid,
        input: &PublishBuyOrder,
    ) -> Result<Order, LedgerError> {
        let mut tx = self.db.begin().await?;
        let day = super::daily_cycle_scoped(&mut tx, input.daily_cycle_id, user_id).await?;
        if day.fiat_balance < input.fiat_amount {
            return Err(LedgerError::InsufficientFiat {
                available: day.fiat_balance,
                requested: input.fiat_amount,
            });
        }

        let quantity = input.fiat_amount / input.price;
        let order = insert_order(
            &mut tx,
            day.id,
            OrderSide::Buy,
            quantity,
            input.price,
            input.fiat_amount,
        )
        .await?;

        if input.competitor_sell_price.is_some() {
            record_market_price(&mut tx, day.id, user_id, input.competitor_sell_price, None)
                .await?;
        }
        mark_day_has_active_orders(&mut tx, day.id).await?;

        tx.commit().await?;
        Ok(order)
    }

    /// Publish a sell order against the day's asset balance.
    pub async fn publish_sell_order(
        &self,
        user_id: Uuid,
        input: PublishSellOrder,
    ) -> Result<Order, LedgerError> {
        input.validate().map_err(LedgerError::from_validation)?;
        let order = db::with_retries(self.max_conflict_retries, &self.metrics, || {
            self.publish_sell_order_in_tx(user_id, &input)
        })
        .await?;
        self.metrics.increment(metrics::ORDER_PUBLISHED_TOTAL).await;
        info!(%user_id, order_id = %order.id, price = %order.published_price,
            quantity = %order.published_quantity, "sell order published");
        Ok(order)
    }

    async fn publish_sell_order_in_tx(
        &self,
        user_id: Uuid,
        input: &PublishSellOrder,
    ) -> Result<Order, LedgerError> {
        let mut tx = self.db.begin().await?;
        let day = super::daily_cycle_scoped(&mut tx, input.daily_cycle_id, user_id).await?;
        if day.asset_balance < input.asset_quantity {
            return Err(LedgerError::InsufficientAsset {
                available: day.asset_balance,
                requested: input.asset_quantity,
            });
        }

        let order = insert_order(
            &mut tx,
            day.id,
            OrderSide::Sell,
            input.asset_quantity,
            input.price,
            input.asset_quantity * input.price,
        )
        .await?;

        if input.competitor_buy_price.is_some() {
            record_market_price(&mut tx, day.id, user_id, None, input.competitor_buy_price)
                .await?;
        }
        mark_day_has_active_orders(&mut tx, day.id).await?;

        tx.commit().await?;
        Ok(order)
    }

    /// Cancel an order that has not finished executing. Partial fills stay on
    /// the books; only the unexecuted remainder is withdrawn.
    pub async fn cancel_order(&self, user_id: Uuid, order_id: Uuid) -> Result<Order, LedgerError> {
        let order = db::with_retries(self.max_conflict_retries, &self.metrics, || {
            self.cancel_order_in_tx(user_id, order_id)
        })
        .await?;
        self.metrics.increment(metrics::ORDER_CANCELLED_TOTAL).await;
        info!(%user_id, %order_id, "order cancelled");
        Ok(order)
    }

    async fn cancel_order_in_tx(
        &self,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<Order, LedgerError> {
        let mut tx = self.db.begin().await?;
        let order = super::order_scoped(&mut tx, order_id, user_id, None).await?;
        if !order.is_cancellable() {
            return Err(LedgerError::OrderNotCancellable {
                status: order.status,
            });
        }

        let now = Utc::now();
        let cancelled: Order = sqlx::query_as::<_, OrderRow>(
            "UPDATE orders \
             SET status = $1, is_active = 0, cancelled_at = $2, updated_at = $2 \
             WHERE id = $3 RETURNING *",
        )
        .bind(OrderStatus::Cancelled)
        .bind(now)
        .bind(order.id.to_string())
        .fetch_one(&mut *tx)
        .await?
        .into();

        refresh_day_active_orders(&mut tx, order.daily_cycle_id).await?;

        tx.commit().await?;
        Ok(cancelled)
    }

    /// Orders for a day, newest first.
    pub async fn list_orders(
        &self,
        user_id: Uuid,
        daily_cycle_id: Uuid,
    ) -> Result<Vec<Order>, LedgerError> {
        let mut conn = self.db.acquire().await?;
        let day = super::daily_cycle_scoped(&mut conn, daily_cycle_id, user_id).await?;
        let rows = sqlx::query_as::<_, OrderRow>(
            "SELECT * FROM orders WHERE daily_cycle_id = $1 ORDER BY created_at DESC",
        )
        .bind(day.id.to_string())
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows.into_iter().map(Order::from).collect())
    }
}

async fn insert_order(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    daily_cycle_id: Uuid,
    side: OrderSide,
    quantity: rust_decimal::Decimal,
    price: rust_decimal::Decimal,
    total: rust_decimal::Decimal,
) -> Result<Order, LedgerError> {
    let now = Utc::now();
    let row = sqlx::query_as::<_, OrderRow>(
        "INSERT INTO orders \
         (id, daily_cycle_id, side, published_quantity, published_price, published_total, \
          status, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8) RETURNING *",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(daily_cycle_id.to_string())
    .bind(side)
    .bind(decimal_to_db(quantity))
    .bind(decimal_to_db(price))
    .bind(decimal_to_db(total))
    .bind(OrderStatus::Published)
    .bind(now)
    .fetch_one(&mut **tx)
    .await?;
    Ok(row.into())
}

async fn record_market_price(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    daily_cycle_id: Uuid,
    user_id: Uuid,
    competitor_sell_price: Option<rust_decimal::Decimal>,
    competitor_buy_price: Option<rust_decimal::Decimal>,
) -> Result<(), LedgerError> {
    sqlx::query(
        "INSERT INTO market_prices \
         (id, daily_cycle_id, user_id, competitor_sell_price, competitor_buy_price, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(daily_cycle_id.to_string())
    .bind(user_id.to_string())
    .bind(opt_decimal_to_db(competitor_sell_price))
    .bind(opt_decimal_to_db(competitor_buy_price))
    .bind(Utc::now())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn mark_day_has_active_orders(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    daily_cycle_id: Uuid,
) -> Result<(), LedgerError> {
    sqlx::query("UPDATE daily_cycles SET has_active_orders = 1 WHERE id = $1")
        .bind(daily_cycle_id.to_string())
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Recompute the day's active-order flag from the surviving orders.
pub(super) async fn refresh_day_active_orders(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    daily_cycle_id: Uuid,
) -> Result<(), LedgerError> {
    sqlx::query(
        "UPDATE daily_cycles SET has_active_orders = EXISTS ( \
             SELECT 1 FROM orders \
             WHERE daily_cycle_id = $1 AND status IN ($2, $3)) \
         WHERE id = $1",
    )
    .bind(daily_cycle_id.to_string())
    .bind(OrderStatus::Published)
    .bind(OrderStatus::Partial)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
